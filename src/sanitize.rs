//! BigQuery field-name hook
//!
//! BigQuery field names must contain only letters, numbers, and underscores
//! and start with a letter or underscore. When enabled, record keys are
//! rewritten before writing: dots become underscores and names starting with
//! a digit gain an underscore prefix.
//!
//! Traversal rule: recursion descends into list-valued fields (sanitizing
//! each object element) but NOT into object-valued fields. Nested objects
//! keep their original keys unless they sit inside a list. This asymmetry is
//! long-standing loader behavior and is kept as is.

use serde_json::Value;

/// Rewrite the keys of `value` in place. No-op on anything but an object.
/// Idempotent: already-sanitized keys are stable.
pub fn sanitize_field_names(value: &mut Value) {
    let Value::Object(map) = value else {
        return;
    };

    let keys: Vec<String> = map.keys().cloned().collect();
    for key in keys {
        if let Some(Value::Array(items)) = map.get_mut(&key) {
            for item in items {
                sanitize_field_names(item);
            }
        }

        let mut new_key = key.replace('.', "_");
        if new_key.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            new_key.insert(0, '_');
        }
        if new_key != key {
            // shift_remove keeps the remaining keys in order; the renamed
            // key lands at the end, exactly as a dict rewrite would
            if let Some(v) = map.shift_remove(&key) {
                map.insert(new_key, v);
            }
        }
    }
}
