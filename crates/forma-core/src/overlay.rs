//! Satellite overlay merging.
//!
//! A hub model is refined by satellite documents layered over it in order.
//! Mappings merge key-by-key recursively; any other value from a later
//! document replaces the earlier one. Arrays are leaves and replace
//! wholesale — element-wise array merging is ambiguous and deliberately
//! unsupported.

use serde_json::Value;

/// Layer `overlay` onto `base` in place.
pub fn overlay(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => self::overlay(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Merge documents in order: earlier documents form the base, later ones
/// override. An empty slice merges to an empty mapping.
pub fn merge(docs: &[Value]) -> Value {
    let mut merged = Value::Object(serde_json::Map::new());
    for doc in docs {
        overlay(&mut merged, doc);
    }
    merged
}
