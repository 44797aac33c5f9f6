//! Deep merge of build configurations.
//!
//! Merge semantics:
//! - Objects: deep-merge by key (recursive)
//! - Arrays: CONCATENATE (earlier operand's items first)
//! - Scalars and type mismatches: the later operand wins
//!
//! # Example
//!
//! ```
//! use packcli_core::merge_all;
//! use serde_json::{Map, Value, json};
//!
//! fn object(value: Value) -> Map<String, Value> {
//!     value.as_object().cloned().unwrap()
//! }
//!
//! let merged = merge_all(vec![
//!     object(json!({"mode": "development", "plugins": ["a"]})),
//!     object(json!({"mode": "production", "plugins": ["b"]})),
//! ])
//! .unwrap();
//! assert_eq!(Value::Object(merged), json!({"mode": "production", "plugins": ["a", "b"]}));
//! ```

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from [`merge_all`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// Fewer than two configurations were supplied.
    #[error("At least two configurations are required for merge.")]
    NotEnoughOperands,
}

/// Deep merge two JSON values, `overlay` taking precedence.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            Value::Object(merge_objects(base_map, overlay_map))
        }
        (Value::Array(mut base_items), Value::Array(overlay_items)) => {
            base_items.extend(overlay_items);
            Value::Array(base_items)
        }
        (_, overlay) => overlay,
    }
}

/// Deep merge two configuration objects.
pub fn merge_objects(mut base: Map<String, Value>, overlay: Map<String, Value>) -> Map<String, Value> {
    for (key, overlay_value) in overlay {
        let merged = match base.remove(&key) {
            Some(base_value) => deep_merge(base_value, overlay_value),
            None => overlay_value,
        };
        base.insert(key, merged);
    }
    base
}

/// Merges configurations left to right.
///
/// Equivalent to folding [`merge_objects`] pairwise from the first operand.
pub fn merge_all(configs: Vec<Map<String, Value>>) -> Result<Map<String, Value>, MergeError> {
    if configs.len() < 2 {
        return Err(MergeError::NotEnoughOperands);
    }
    let mut configs = configs.into_iter();
    let first = configs.next().unwrap_or_default();
    Ok(configs.fold(first, merge_objects))
}
