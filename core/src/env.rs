//! `--env` key-path parsing.
//!
//! Each occurrence of `--env` is folded into one nested mapping that is
//! handed to executable configurations.
//!
//! # Example
//!
//! ```
//! use packcli_core::parse_env_arg;
//! use serde_json::{Map, Value, json};
//!
//! let mut env = Map::new();
//! parse_env_arg("foo=bar", &mut env);
//! parse_env_arg("baz.qux", &mut env);
//! assert_eq!(Value::Object(env), json!({"foo": "bar", "baz": {"qux": true}}));
//! ```

use serde_json::{Map, Value};

/// Folds one `key.path[=value]` occurrence into `env`.
///
/// Splits on the first `=` only. Dots split the key into nested levels,
/// except a trailing dot which stays part of the last key. A key without a
/// value becomes `true`; `key=` becomes the empty string. An intermediate
/// level holding a scalar is replaced by a mapping.
pub fn parse_env_arg(raw: &str, env: &mut Map<String, Value>) {
    let (key, value) = match raw.split_once('=') {
        Some((key, value)) => (key, Value::String(value.to_string())),
        None => (raw, Value::Bool(true)),
    };

    let segments = split_key(key);
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = env;
    for segment in parents {
        let slot = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
    current.insert(last.clone(), value);
}

fn split_key(key: &str) -> Vec<String> {
    let (body, trailing_dot) = match key.strip_suffix('.') {
        Some(body) => (body, true),
        None => (key, false),
    };
    let mut segments: Vec<String> = body.split('.').map(str::to_string).collect();
    if trailing_dot {
        if let Some(last) = segments.last_mut() {
            last.push('.');
        }
    }
    segments
}
