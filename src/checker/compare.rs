use crate::value::Value;

/// Whether the re-read `new` value matches the snapshot `old`.
///
/// Maps compare one way: keys present only in `old` are ignored, and a
/// non-map `new` has no keys to disagree with.
pub fn compare_values(old: &Value, new: &Value) -> bool {
    match old {
        Value::Set(old_items) => match new {
            Value::Set(new_items) | Value::List(new_items) => {
                compare_item_slices(old_items, new_items)
            }
            Value::Null => compare_item_slices(old_items, &[]),
            _ => false,
        },
        Value::List(old_items) => match new {
            Value::List(new_items) | Value::Set(new_items) => {
                compare_item_slices(old_items, new_items)
            }
            Value::Null => compare_item_slices(old_items, &[]),
            _ => false,
        },
        Value::Map(old_entries) => match new {
            Value::Map(new_entries) => new_entries
                .iter()
                .all(|(k, v)| old_entries.get(k).unwrap_or(&Value::Null) == v),
            _ => true,
        },
        scalar => scalar == new,
    }
}

fn compare_item_slices(old: &[Value], new: &[Value]) -> bool {
    // A single empty block stands in for "no value" in some nested encodings.
    if new.is_empty() && old.len() == 1 {
        if let Value::Map(entries) = &old[0] {
            if entries.is_empty() {
                return true;
            }
        }
    }
    slice_equal(old, new)
}

/// Order-independent comparison: same length, and every element on each side
/// has a structurally equal counterpart on the other.
pub fn slice_equal(old: &[Value], new: &[Value]) -> bool {
    if old.len() != new.len() {
        return false;
    }
    if old.is_empty() {
        return true;
    }
    // Maps have no usable ordering, so scan both directions.
    covers(old, new) && covers(new, old)
}

fn covers(from: &[Value], to: &[Value]) -> bool {
    from.iter().all(|item| to.iter().any(|candidate| candidate == item))
}
