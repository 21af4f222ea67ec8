//! Read-after-write consistency checking.
//!
//! A provider's read function re-fetches remote state inside a bounded retry
//! loop. On each attempt it calls [`CheckerRegistry::track`] and then
//! [`ConsistencyChecker::check_state`]. The first `track` for a resource ID
//! snapshots the resource data; later attempts compare against that same
//! snapshot until a check passes and the entry is dropped.

mod compare;
mod error;
mod skip;

pub use compare::{compare_values, slice_equal};
pub use error::MismatchError;
pub use skip::should_skip;

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::config::CheckerConfig;
use crate::resource_data::ResourceData;
use crate::retry::RetryError;
use crate::schema::SchemaMap;
use crate::value::Value;

/// Baseline captured the first time a resource ID is tracked.
#[derive(Debug)]
pub struct TrackedResource {
    id: String,
    original_state: BTreeMap<String, Value>,
    original_schema: SchemaMap,
    is_empty_state: bool,
}

impl TrackedResource {
    fn capture<D: ResourceData + ?Sized>(id: &str, data: &D, schema: &SchemaMap) -> Self {
        let original_state = schema.keys().map(|k| (k.clone(), data.get(k))).collect();
        Self {
            id: id.to_string(),
            original_state,
            original_schema: schema.clone(),
            is_empty_state: is_empty_state(&data.state_string()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn original_state(&self) -> &BTreeMap<String, Value> {
        &self.original_state
    }

    pub fn original_schema(&self) -> &SchemaMap {
        &self.original_schema
    }

    pub fn is_empty_state(&self) -> bool {
        self.is_empty_state
    }
}

/// True when the state dump holds only bookkeeping: the ID, the tainted flag,
/// empty lists and `*id` attributes.
pub fn is_empty_state(state: &str) -> bool {
    state.lines().filter(|line| !line.is_empty()).all(|line| {
        let attribute = line.split(' ').next().unwrap_or_default();
        attribute == "ID"
            || attribute == "Tainted"
            || line.ends_with(".# = 0")
            || attribute.ends_with("id")
    })
}

/// Snapshots of resources whose reads have not yet settled, keyed by ID.
///
/// Cheap to clone; clones share the same entries.
#[derive(Debug, Clone)]
pub struct CheckerRegistry {
    entries: Arc<DashMap<String, Arc<TrackedResource>>>,
    consistency_checks: bool,
}

impl Default for CheckerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self::with_config(&CheckerConfig::default())
    }

    pub fn with_config(config: &CheckerConfig) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            consistency_checks: config.consistency_checks,
        }
    }

    /// Returns a checker for the resource behind `data`, capturing a snapshot
    /// if its ID is not already tracked.
    pub fn track<D: ResourceData>(
        &self,
        data: Arc<Mutex<D>>,
        schema: &SchemaMap,
    ) -> ConsistencyChecker<D> {
        let tracked = {
            let guard = data.lock();
            let id = guard.id();
            if self.consistency_checks {
                let entry = self.entries.entry(id.clone()).or_insert_with(|| {
                    let tracked = TrackedResource::capture(&id, &*guard, schema);
                    tracing::debug!(
                        resource_id = %id,
                        attributes = tracked.original_state.len(),
                        empty_state = tracked.is_empty_state,
                        "captured state snapshot"
                    );
                    Arc::new(tracked)
                });
                Arc::clone(entry.value())
            } else {
                Arc::new(TrackedResource::capture(&id, &*guard, schema))
            }
        };

        ConsistencyChecker {
            tracked,
            data,
            registry: self.clone(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<Arc<TrackedResource>> {
        self.entries.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn settle(&self, tracked: &Arc<TrackedResource>) {
        self.entries
            .remove_if(&tracked.id, |_, current| Arc::ptr_eq(current, tracked));
    }
}

/// Handle on one tracked resource. All access to the live resource data goes
/// through its lock.
pub struct ConsistencyChecker<D> {
    tracked: Arc<TrackedResource>,
    data: Arc<Mutex<D>>,
    registry: CheckerRegistry,
}

impl<D: ResourceData> ConsistencyChecker<D> {
    pub fn get(&self, key: &str) -> Value {
        self.data.lock().get(key)
    }

    pub fn get_ok(&self, key: &str) -> Option<Value> {
        self.data.lock().get_ok(key)
    }

    pub fn set_id(&self, id: &str) {
        self.data.lock().set_id(id);
    }

    pub fn id(&self) -> String {
        self.data.lock().id()
    }

    pub fn tracked(&self) -> &TrackedResource {
        &self.tracked
    }

    /// Compares the live resource data against the snapshot.
    ///
    /// Returns a retryable [`MismatchError`] for the first attribute (in name
    /// order) that still differs. On success the snapshot is dropped, so the
    /// next `track` for this ID starts from fresh state.
    pub fn check_state(&self) -> Result<(), RetryError> {
        if !self.registry.consistency_checks {
            return Ok(());
        }

        let tracked = &self.tracked;
        if !tracked.is_empty_state {
            for (key, schema) in &tracked.original_schema {
                let new_value = self.get(key);
                let old_value = tracked.original_state.get(key).unwrap_or(&Value::Null);

                if should_skip(key, schema, old_value, &new_value) {
                    tracing::trace!(resource_id = %tracked.id, attribute = %key, "attribute skipped");
                    continue;
                }

                if !compare_values(old_value, &new_value) {
                    tracing::debug!(
                        resource_id = %tracked.id,
                        attribute = %key,
                        "state not yet consistent"
                    );
                    return Err(MismatchError {
                        attribute: key.clone(),
                        expected: old_value.clone(),
                        actual: new_value,
                    }
                    .into());
                }
            }
        }

        self.registry.settle(tracked);
        tracing::debug!(resource_id = %tracked.id, "state consistent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_data::MemoryResourceData;
    use crate::schema::{AttributeSchema, ValueType};

    fn queue_schema() -> SchemaMap {
        let mut schema = SchemaMap::new();
        schema.insert(
            "name".to_string(),
            AttributeSchema::new(ValueType::String).required(),
        );
        schema.insert(
            "description".to_string(),
            AttributeSchema::new(ValueType::String).optional(),
        );
        schema.insert(
            "queue_id".to_string(),
            AttributeSchema::new(ValueType::String).computed(),
        );
        schema
    }

    fn live(data: MemoryResourceData) -> Arc<Mutex<MemoryResourceData>> {
        Arc::new(Mutex::new(data))
    }

    #[test]
    fn test_is_empty_state_bookkeeping_only() {
        assert!(is_empty_state("ID = q1\nTainted = false\n"));
        assert!(is_empty_state("ID = q1\nmembers.# = 0\ndivision_id = d1\nTainted = false\n"));
        assert!(is_empty_state(""));
    }

    #[test]
    fn test_is_empty_state_with_attributes() {
        assert!(!is_empty_state("ID = q1\nname = Support\nTainted = false\n"));
        assert!(!is_empty_state("ID = q1\nmembers.# = 1\nTainted = false\n"));
    }

    #[test]
    fn test_track_captures_snapshot_once() {
        let registry = CheckerRegistry::new();
        let data = live(MemoryResourceData::new("q1").with_attribute("name", "Foo"));

        let first = registry.track(Arc::clone(&data), &queue_schema());
        data.lock().set("name", "Bar");
        let second = registry.track(Arc::clone(&data), &queue_schema());

        assert_eq!(first.tracked().original_state()["name"], Value::from("Foo"));
        assert_eq!(second.tracked().original_state()["name"], Value::from("Foo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_covers_every_schema_attribute() {
        let registry = CheckerRegistry::new();
        let data = live(MemoryResourceData::new("q1").with_attribute("name", "Foo"));

        let checker = registry.track(data, &queue_schema());
        let state = checker.tracked().original_state();
        assert_eq!(state.len(), 3);
        assert_eq!(state["description"], Value::Null);
    }

    #[test]
    fn test_accessors_go_through_live_data() {
        let registry = CheckerRegistry::new();
        let data = live(MemoryResourceData::new("q1").with_attribute("name", "Foo"));
        let checker = registry.track(Arc::clone(&data), &queue_schema());

        assert_eq!(checker.get("name"), Value::from("Foo"));
        assert_eq!(checker.get_ok("description"), None);
        checker.set_id("q2");
        assert_eq!(checker.id(), "q2");
        assert_eq!(data.lock().id(), "q2");
    }

    #[test]
    fn test_check_state_scalar_match() {
        let registry = CheckerRegistry::new();
        let data = live(MemoryResourceData::new("q1").with_attribute("name", "Foo"));
        let checker = registry.track(data, &queue_schema());

        assert!(checker.check_state().is_ok());
        assert!(!registry.contains("q1"));
    }

    #[test]
    fn test_check_state_scalar_mismatch_keeps_entry() {
        let registry = CheckerRegistry::new();
        let data = live(MemoryResourceData::new("q1").with_attribute("name", "Foo"));
        let checker = registry.track(Arc::clone(&data), &queue_schema());

        data.lock().set("name", "Bar");
        let err = checker.check_state().unwrap_err();

        assert!(err.is_retryable());
        let message = err.to_string();
        assert!(message.contains("mismatch on attribute name"));
        assert!(message.contains("expected value: Foo"));
        assert!(message.contains("actual value:   Bar"));
        assert!(registry.contains("q1"));
    }

    #[test]
    fn test_check_state_computed_populated() {
        let registry = CheckerRegistry::new();
        let data = live(
            MemoryResourceData::new("q1")
                .with_attribute("name", "Foo")
                .with_attribute("queue_id", ""),
        );
        let checker = registry.track(Arc::clone(&data), &queue_schema());

        data.lock().set("queue_id", "generated-id-123");
        assert!(checker.check_state().is_ok());
    }

    #[test]
    fn test_check_state_empty_snapshot_always_passes() {
        let registry = CheckerRegistry::new();
        let data = live(MemoryResourceData::new("q1"));
        let checker = registry.track(Arc::clone(&data), &queue_schema());
        assert!(checker.tracked().is_empty_state());

        data.lock().set("name", "Anything");
        data.lock().set("description", "changed");
        assert!(checker.check_state().is_ok());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_disabled_registry_passes_and_retains_nothing() {
        let config = CheckerConfig {
            consistency_checks: false,
            ..CheckerConfig::default()
        };
        let registry = CheckerRegistry::with_config(&config);
        let data = live(MemoryResourceData::new("q1").with_attribute("name", "Foo"));
        let checker = registry.track(Arc::clone(&data), &queue_schema());

        assert!(registry.is_empty());
        data.lock().set("name", "Bar");
        assert!(checker.check_state().is_ok());
    }

    #[test]
    fn test_settle_does_not_remove_newer_snapshot() {
        let registry = CheckerRegistry::new();
        let data = live(MemoryResourceData::new("q1").with_attribute("name", "Foo"));

        let stale = registry.track(Arc::clone(&data), &queue_schema());
        assert!(stale.check_state().is_ok());

        data.lock().set("name", "Bar");
        let fresh = registry.track(Arc::clone(&data), &queue_schema());

        data.lock().set("name", "Foo");
        assert!(stale.check_state().is_ok());
        assert!(registry.contains("q1"));
        assert!(Arc::ptr_eq(&registry.get("q1").unwrap(), &fresh.tracked));
    }
}
