//! Layer merging.
//!
//! Layers are applied leaf by leaf: every scalar (or empty container) of the
//! overlay is set at its path in the base. Arrays therefore merge per index
//! rather than being replaced wholesale, so `USERS_1_NAME` only touches the
//! second user.

use crate::path::ConfigPath;
use serde_json::Value;

/// Apply the leaves of `overlay` on top of `base`.
///
/// - `null` leaves mean "not specified" and leave the base untouched
/// - an empty object or array only fills a path the base does not have
/// - any other leaf replaces whatever the base holds at its path
pub fn overlay_leaves(base: &mut Value, overlay: &Value) {
    for (path, leaf) in ConfigPath::leaves(overlay) {
        if path.is_root() {
            if !leaf.is_null() && !is_empty_container(leaf) {
                *base = leaf.clone();
            } else if base.is_null() {
                *base = leaf.clone();
            }
            continue;
        }
        match leaf {
            Value::Null => {}
            leaf if is_empty_container(leaf) => {
                if path.get(base).is_none() {
                    path.set(base, leaf.clone());
                }
            }
            leaf => path.set(base, leaf.clone()),
        }
    }
}

/// Merge layers in order, later layers taking precedence.
pub fn merge_layers(layers: impl IntoIterator<Item = Value>) -> Value {
    layers.into_iter().fold(Value::Null, |mut base, layer| {
        overlay_leaves(&mut base, &layer);
        base
    })
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
