use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::value::Value;

/// Live, mutable view of one resource instance, as a provider's read function
/// sees it.
///
/// Implementations need not be thread-safe; the checker serializes access
/// behind a lock.
pub trait ResourceData: Send {
    fn id(&self) -> String;
    fn set_id(&mut self, id: &str);
    fn get(&self, key: &str) -> Value;
    /// The value, if set and not zero.
    fn get_ok(&self, key: &str) -> Option<Value>;
    /// Human-readable instance-state dump, one `key = value` per line.
    fn state_string(&self) -> String;
}

/// In-memory resource data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryResourceData {
    id: String,
    tainted: bool,
    attributes: BTreeMap<String, Value>,
}

impl MemoryResourceData {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn set_tainted(&mut self, tainted: bool) {
        self.tainted = tainted;
    }

    pub fn tainted(&self) -> bool {
        self.tainted
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Replaces every attribute with `attributes`, keeping the ID.
    pub fn replace_attributes(&mut self, attributes: BTreeMap<String, Value>) {
        self.attributes = attributes;
    }
}

impl ResourceData for MemoryResourceData {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn get(&self, key: &str) -> Value {
        self.attributes.get(key).cloned().unwrap_or_default()
    }

    fn get_ok(&self, key: &str) -> Option<Value> {
        self.attributes.get(key).filter(|v| !v.is_zero()).cloned()
    }

    fn state_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "ID = {}", self.id);
        for (key, value) in &self.attributes {
            flatten(&mut out, key, value);
        }
        let _ = writeln!(out, "Tainted = {}", self.tainted);
        out
    }
}

fn flatten(out: &mut String, key: &str, value: &Value) {
    match value {
        Value::List(items) | Value::Set(items) => {
            let _ = writeln!(out, "{}.# = {}", key, items.len());
            for (i, item) in items.iter().enumerate() {
                flatten(out, &format!("{}.{}", key, i), item);
            }
        }
        Value::Map(entries) => {
            let _ = writeln!(out, "{}.% = {}", key, entries.len());
            for (k, v) in entries {
                flatten(out, &format!("{}.{}", key, k), v);
            }
        }
        scalar if scalar.is_zero() => {}
        scalar => {
            let _ = writeln!(out, "{} = {}", key, scalar);
        }
    }
}
