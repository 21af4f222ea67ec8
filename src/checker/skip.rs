use std::collections::BTreeMap;

use crate::schema::{AttributeSchema, Elem, SetHash};
use crate::value::Value;

/// Decides that a difference on `key` is expected and should not be diffed.
pub fn should_skip(key: &str, schema: &AttributeSchema, old: &Value, new: &Value) -> bool {
    if schema.computed {
        // Server-side default populated for the first time.
        if old.is_nil_or_empty() && !new.is_nil_or_empty() {
            return true;
        }
        match &schema.elem {
            None => return true,
            Some(Elem::Block(_)) => {
                if let (Value::List(old_items), Value::List(new_items)) = (old, new) {
                    if old_items.is_empty() && new_items.is_empty() {
                        return true;
                    }
                    if old_items.len() != new_items.len() {
                        return false;
                    }
                }
            }
            Some(Elem::Attribute(_)) => {}
        }
    }

    if let Some(hash) = &schema.set_hash {
        if let (Value::Set(old_items), Value::Set(new_items)) = (old, new) {
            if !old_items.is_empty() && !new_items.is_empty() {
                return same_hashes(hash, old_items, new_items);
            }
        }
    }

    if let Some(suppress) = &schema.diff_suppress {
        if let (Value::String(old), Value::String(new)) = (old, new) {
            return suppress.suppresses(key, old, new);
        }
    }

    if let Some(block) = schema.block() {
        // Nested sets are not diffed at all.
        if matches!(old, Value::Set(_)) {
            return true;
        }
        let old_block = leading_block(old);
        let new_block = leading_block(new);
        for (child_key, child_schema) in &block.schema {
            let old_child = field(old_block, child_key);
            let new_child = field(new_block, child_key);
            if should_skip(child_key, child_schema, old_child, new_child) {
                tracing::trace!(attribute = key, child = %child_key, "nested attribute skipped");
                return true;
            }
        }
    }

    false
}

/// Sets hash to the same multiset of element hashes.
fn same_hashes(hash: &SetHash, old: &[Value], new: &[Value]) -> bool {
    if old.len() != new.len() {
        return false;
    }
    let mut old_hashes: Vec<u64> = old.iter().map(|v| hash.hash(v)).collect();
    let mut new_hashes: Vec<u64> = new.iter().map(|v| hash.hash(v)).collect();
    old_hashes.sort_unstable();
    new_hashes.sort_unstable();
    old_hashes == new_hashes
}

/// The first block of a nested list. Max-one blocks are always stored this way.
fn leading_block(value: &Value) -> Option<&BTreeMap<String, Value>> {
    match value {
        Value::List(items) => items.first().and_then(Value::as_map),
        _ => None,
    }
}

fn field<'a>(block: Option<&'a BTreeMap<String, Value>>, key: &str) -> &'a Value {
    const NULL: &Value = &Value::Null;
    block.and_then(|b| b.get(key)).unwrap_or(NULL)
}
