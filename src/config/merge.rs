//! Layer merge
//!
//! - Maps: deep-merge by key (`CUSTOM_FIELDS` entries from several files
//!   combine)
//! - Scalars and sequences: later layer wins
//! - Null: ignored, so a key left blank in a project file (as the template
//!   does) keeps the value from the home file

use serde_json::Value;

/// Merge `overlay` on top of `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }

        (base, Value::Null) => base,

        (_, overlay) => overlay,
    }
}

/// Merge layers in precedence order (first is lowest)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}
