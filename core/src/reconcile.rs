//! Command-line argument reconciliation.
//!
//! Applies parsed flag values onto a build configuration object, following
//! each flag's [`ArgumentConfig`]s, and collects every [`Problem`] found on
//! the way. The target object is only modified when no problem was found.
//!
//! # Example
//!
//! ```
//! use packcli_core::{core_flags, reconcile};
//! use serde_json::{Map, Value, json};
//!
//! let mut config = json!({"mode": "production", "entry": "./a.js"})
//!     .as_object()
//!     .cloned()
//!     .unwrap();
//! let values = json!({"mode": "development"}).as_object().cloned().unwrap();
//!
//! let problems = reconcile(&core_flags(), &mut config, &values);
//! assert!(problems.is_empty());
//! assert_eq!(config["mode"], "development");
//! assert_eq!(config["entry"], "./a.js");
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::map::Entry;
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::{ArgumentConfig, ArgumentType, FlagDefinition, FlagGroup, Problem, ProblemKind};

/// Reconciles `values` onto `target` relative to the current directory.
///
/// Keys of `values` are normalized to kebab-case; keys naming no
/// [`FlagGroup::Core`] flag are ignored.
pub fn reconcile(
    flags: &[FlagDefinition],
    target: &mut Map<String, Value>,
    values: &Map<String, Value>,
) -> Vec<Problem> {
    let base_dir = std::env::current_dir().unwrap_or_default();
    Reconciler::new(flags, &base_dir).reconcile(target, values)
}

/// Applies flag values onto configuration objects.
///
/// Paths from [`ArgumentType::Path`] configs are resolved against
/// `base_dir`.
pub struct Reconciler<'a> {
    flags: HashMap<&'a str, &'a FlagDefinition>,
    base_dir: PathBuf,
}

impl<'a> Reconciler<'a> {
    pub fn new(flags: &'a [FlagDefinition], base_dir: &Path) -> Self {
        Self {
            flags: flags
                .iter()
                .filter(|flag| flag.group == FlagGroup::Core)
                .map(|flag| (flag.name.as_str(), flag))
                .collect(),
            base_dir: base_dir.to_path_buf(),
        }
    }

    /// Applies the known subset of `values`; unknown keys are skipped.
    pub fn reconcile(
        &self,
        target: &mut Map<String, Value>,
        values: &Map<String, Value>,
    ) -> Vec<Problem> {
        let known: Vec<(String, Value)> = values
            .iter()
            .map(|(key, value)| (to_kebab_case(key), value.clone()))
            .filter(|(key, _)| self.flags.contains_key(key.as_str()))
            .collect();
        self.process(target, known)
    }

    /// Applies every entry of `values`, reporting unknown keys as
    /// [`ProblemKind::UnknownArgument`].
    pub fn process_arguments(
        &self,
        target: &mut Map<String, Value>,
        values: &Map<String, Value>,
    ) -> Vec<Problem> {
        let entries = values
            .iter()
            .map(|(key, value)| (to_kebab_case(key), value.clone()))
            .collect();
        self.process(target, entries)
    }

    fn process(&self, target: &mut Map<String, Value>, mut entries: Vec<(String, Value)>) -> Vec<Problem> {
        // Resets clear arrays before other flags append to them.
        entries.sort_by_key(|(key, _)| !self.is_reset(key));

        let mut working = target.clone();
        let mut run = Run {
            base_dir: &self.base_dir,
            added: HashMap::new(),
        };
        let mut problems = Vec::new();

        for (key, value) in entries {
            let Some(flag) = self.flags.get(key.as_str()) else {
                problems.push(Problem::new(ProblemKind::UnknownArgument, "", key));
                continue;
            };
            match value {
                Value::Array(items) => {
                    for (index, item) in items.into_iter().enumerate() {
                        problems.extend(run.process_value(flag, &mut working, item, Some(index)));
                    }
                }
                value => problems.extend(run.process_value(flag, &mut working, value, None)),
            }
        }

        if problems.is_empty() {
            *target = working;
        } else {
            debug!(count = problems.len(), "argument reconciliation found problems");
        }
        problems
    }

    fn is_reset(&self, key: &str) -> bool {
        self.flags.get(key).is_some_and(|flag| {
            !flag.configs.is_empty()
                && flag
                    .configs
                    .iter()
                    .all(|config| config.argument_type == ArgumentType::Reset)
        })
    }
}

/// State of one reconciliation: array items appended so far, keyed by the
/// concrete location of the array.
struct Run<'r> {
    base_dir: &'r Path,
    added: HashMap<String, usize>,
}

enum Slot<'c> {
    Key(&'c mut Map<String, Value>, String),
    Item(&'c mut Vec<Value>, usize),
}

impl Run<'_> {
    fn process_value(
        &mut self,
        flag: &FlagDefinition,
        config: &mut Map<String, Value>,
        value: Value,
        index: Option<usize>,
    ) -> Vec<Problem> {
        let mut problems = Vec::new();
        for argument_config in &flag.configs {
            match self.process_config(argument_config, config, &value, index) {
                Ok(()) => return Vec::new(),
                Err(problem) => problems.push(
                    problem
                        .with_value(value.clone())
                        .with_index(index),
                ),
            }
        }
        problems
            .into_iter()
            .map(|mut problem| {
                problem.argument = flag.name.clone();
                problem
            })
            .collect()
    }

    fn process_config(
        &mut self,
        argument_config: &ArgumentConfig,
        config: &mut Map<String, Value>,
        value: &Value,
        index: Option<usize>,
    ) -> Result<(), Problem> {
        if index.is_some() && !argument_config.multiple {
            return Err(Problem::new(
                ProblemKind::MultipleValuesUnexpected,
                &argument_config.path,
                "",
            ));
        }

        let Some(parsed) = self.parse_value(&argument_config.argument_type, value) else {
            let mut problem = Problem::new(ProblemKind::InvalidValue, &argument_config.path, "");
            problem.expected = argument_config.argument_type.expected();
            return Err(problem);
        };

        self.set_value(config, &argument_config.path, parsed, index.unwrap_or(0))
            .map_err(|(kind, path)| Problem::new(kind, path, ""))
    }

    fn parse_value(&self, argument_type: &ArgumentType, value: &Value) -> Option<Value> {
        match (argument_type, value) {
            (ArgumentType::String, Value::String(_)) => Some(value.clone()),
            (ArgumentType::Path, Value::String(raw)) => {
                let resolved = self.base_dir.join(raw);
                Some(Value::String(resolved.to_string_lossy().into_owned()))
            }
            (ArgumentType::Number, Value::Number(_)) => Some(value.clone()),
            (ArgumentType::Number, Value::String(raw)) => parse_number(raw),
            (ArgumentType::Boolean, Value::Bool(_)) => Some(value.clone()),
            (ArgumentType::Boolean, Value::String(raw)) => match raw.as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (ArgumentType::RegExp, Value::String(raw)) => parse_regexp(raw),
            (ArgumentType::Enum(members), value) => {
                if members.contains(value) {
                    return Some(value.clone());
                }
                let Value::String(raw) = value else {
                    return None;
                };
                members
                    .iter()
                    .find(|member| crate::display_scalar(member) == *raw)
                    .cloned()
            }
            (ArgumentType::Reset, Value::Bool(true)) => Some(Value::Array(Vec::new())),
            _ => None,
        }
    }

    fn set_value(
        &mut self,
        config: &mut Map<String, Value>,
        schema_path: &str,
        value: Value,
        index: usize,
    ) -> Result<(), (ProblemKind, String)> {
        match self.locate(config, schema_path, index)? {
            Slot::Key(object, key) => {
                object.insert(key, value);
            }
            Slot::Item(items, position) => items[position] = value,
        }
        Ok(())
    }

    /// Walks `schema_path`, creating missing objects and arrays, and returns
    /// the slot the value belongs in.
    fn locate<'c>(
        &mut self,
        config: &'c mut Map<String, Value>,
        schema_path: &str,
        index: usize,
    ) -> Result<Slot<'c>, (ProblemKind, String)> {
        let mut parts: Vec<&str> = schema_path.split('.').collect();
        let property = parts.pop().unwrap_or_default();

        let mut current = config;
        let mut location = String::new();
        for (i, part) in parts.iter().enumerate() {
            let failed_at = parts[..i].join(".");
            let (name, is_array) = split_array(part);
            let here = child_location(&location, name);

            let next = if is_array {
                let slot = current
                    .entry(name.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                let Value::Array(items) = slot else {
                    return Err((ProblemKind::UnexpectedNonArrayInPath, failed_at));
                };
                let position = self.claim(&here, items, index);
                location = format!("{here}[{position}]");
                let item = &mut items[position];
                if item.is_null() {
                    *item = Value::Object(Map::new());
                }
                item
            } else {
                location = here;
                current
                    .entry(name.to_string())
                    .or_insert_with(|| Value::Object(Map::new()))
            };

            let Value::Object(object) = next else {
                return Err((ProblemKind::UnexpectedNonObjectInPath, failed_at));
            };
            current = object;
        }

        let (name, is_array) = split_array(property);
        let here = child_location(&location, name);
        if !is_array {
            // A replaced array starts a fresh count of appended items.
            self.added.remove(&here);
            return Ok(Slot::Key(current, name.to_string()));
        }

        let slot = match current.entry(name.to_string()) {
            Entry::Vacant(vacant) => vacant.insert(Value::Array(Vec::new())),
            Entry::Occupied(occupied) => occupied.into_mut(),
        };
        if !slot.is_array() {
            let previous = slot.take();
            *slot = Value::Array(vec![previous]);
        }
        let Value::Array(items) = slot else {
            return Err((ProblemKind::UnexpectedNonArrayInPath, parts.join(".")));
        };
        let position = self.claim(&here, items, index);
        Ok(Slot::Item(items, position))
    }

    /// Reserves the array position for the `index`-th command-line item,
    /// after any items the configuration already had.
    fn claim(&mut self, location: &str, items: &mut Vec<Value>, index: usize) -> usize {
        let added = self.added.entry(location.to_string()).or_insert(0);
        while *added <= index {
            items.push(Value::Null);
            *added += 1;
        }
        items.len() - *added + index
    }
}

fn split_array(part: &str) -> (&str, bool) {
    match part.strip_suffix("[]") {
        Some(name) => (name, true),
        None => (part, false),
    }
}

fn child_location(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("valid numeric pattern")
});

static REGEXP_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(.*)/([yugi]*)$").expect("valid literal pattern"));

/// Parses a finite decimal number, preferring an integer representation.
pub fn parse_number(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if !NUMERIC.is_match(trimmed) {
        return None;
    }
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Some(Value::Number(integer.into()));
    }
    let float = trimmed.parse::<f64>().ok().filter(|n| n.is_finite())?;
    if float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        return Some(Value::Number((float as i64).into()));
    }
    Number::from_f64(float).map(Value::Number)
}

/// Validates a regular expression given as `/body/flags` or a bare pattern
/// and returns it in `/body/flags` form.
fn parse_regexp(raw: &str) -> Option<Value> {
    let (body, flags) = match REGEXP_LITERAL.captures(raw) {
        Some(captures) => (
            captures.get(1).map_or("", |m| m.as_str()).to_string(),
            captures.get(2).map_or("", |m| m.as_str()).to_string(),
        ),
        None => (raw.to_string(), String::new()),
    };
    let pattern = if flags.contains('i') {
        format!("(?i){body}")
    } else {
        body.clone()
    };
    Regex::new(&pattern).ok()?;
    Some(Value::String(format!("/{body}/{flags}")))
}

/// Converts `camelCase` and `snake_case` keys to `kebab-case`.
///
/// # Examples
///
/// ```
/// use packcli_core::to_kebab_case;
///
/// assert_eq!(to_kebab_case("outputPath"), "output-path");
/// assert_eq!(to_kebab_case("output_path"), "output-path");
/// assert_eq!(to_kebab_case("output-path"), "output-path");
/// ```
pub fn to_kebab_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch == '_' {
            out.push('-');
        } else if ch.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('-') {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_flags;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn run(config: Value, values: Value) -> (Value, Vec<Problem>) {
        let flags = core_flags();
        let mut target = object(config);
        let problems = Reconciler::new(&flags, Path::new("/work")).reconcile(&mut target, &object(values));
        (Value::Object(target), problems)
    }

    #[test]
    fn test_overrides_scalar_keeps_others() {
        let (config, problems) = run(
            json!({"mode": "production", "entry": "./a.js"}),
            json!({"mode": "development"}),
        );
        assert!(problems.is_empty());
        assert_eq!(config, json!({"mode": "development", "entry": "./a.js"}));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let (config, problems) = run(json!({"mode": "none"}), json!({"not-a-flag": 1, "env": {"a": 1}}));
        assert!(problems.is_empty());
        assert_eq!(config, json!({"mode": "none"}));
    }

    #[test]
    fn test_process_arguments_reports_unknown() {
        let flags = core_flags();
        let mut target = Map::new();
        let problems = Reconciler::new(&flags, Path::new("/"))
            .process_arguments(&mut target, &object(json!({"fooBar": true})));
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].kind, ProblemKind::UnknownArgument);
        assert_eq!(problems[0].argument, "foo-bar");
    }

    #[test]
    fn test_camel_case_keys_normalized() {
        let (config, problems) = run(json!({}), json!({"outputPath": "dist"}));
        assert!(problems.is_empty());
        assert_eq!(config["output"]["path"], "/work/dist");
    }

    #[test]
    fn test_invalid_enum_value_reports_and_leaves_target() {
        let (config, problems) = run(json!({"mode": "production"}), json!({"mode": "fast"}));
        assert_eq!(config, json!({"mode": "production"}));
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].kind, ProblemKind::InvalidValue);
        assert_eq!(problems[0].argument, "mode");
        assert_eq!(problems[0].value, Some(json!("fast")));
        assert_eq!(
            problems[0].expected.as_deref(),
            Some("development | production | none")
        );
    }

    #[test]
    fn test_entries_append_after_existing_items() {
        let (config, problems) = run(json!({"entry": ["./a.js"]}), json!({"entry": ["./b.js", "./c.js"]}));
        assert!(problems.is_empty());
        assert_eq!(config["entry"], json!(["./a.js", "./b.js", "./c.js"]));
    }

    #[test]
    fn test_scalar_entry_wrapped() {
        let (config, problems) = run(json!({"entry": "./a.js"}), json!({"entry": ["./b.js"]}));
        assert!(problems.is_empty());
        assert_eq!(config["entry"], json!(["./a.js", "./b.js"]));
    }

    #[test]
    fn test_entry_reset_before_append() {
        let (config, problems) = run(
            json!({"entry": ["./a.js"]}),
            json!({"entry": ["./b.js"], "entry-reset": true}),
        );
        assert!(problems.is_empty());
        assert_eq!(config["entry"], json!(["./b.js"]));
    }

    #[test]
    fn test_enum_false_from_string() {
        let (config, problems) = run(json!({}), json!({"devtool": "false"}));
        assert!(problems.is_empty());
        assert_eq!(config["devtool"], false);
    }

    #[test]
    fn test_numeric_string_to_number() {
        let (config, problems) = run(json!({}), json!({"parallelism": "4"}));
        assert!(problems.is_empty());
        assert_eq!(config["parallelism"], 4);
    }

    #[test]
    fn test_non_numeric_number_invalid() {
        let (_, problems) = run(json!({}), json!({"parallelism": "four"}));
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].expected.as_deref(), Some("number"));
    }

    #[test]
    fn test_multiple_values_unexpected() {
        let (_, problems) = run(json!({}), json!({"mode": ["development", "production"]}));
        assert_eq!(problems.len(), 2);
        assert!(problems
            .iter()
            .all(|p| p.kind == ProblemKind::MultipleValuesUnexpected));
        assert_eq!(problems[1].index, Some(1));
    }

    #[test]
    fn test_non_object_in_path() {
        let (config, problems) = run(json!({"output": "dist"}), json!({"output-filename": "x.js"}));
        assert_eq!(config, json!({"output": "dist"}));
        assert_eq!(problems[0].kind, ProblemKind::UnexpectedNonObjectInPath);
    }

    #[test]
    fn test_all_configs_tried_before_reporting() {
        let (_, problems) = run(json!({}), json!({"stats": 5}));
        // boolean then enum, both fail
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().all(|p| p.kind == ProblemKind::InvalidValue));
    }

    #[test]
    fn test_array_path_segments() {
        let flags = vec![FlagDefinition::new("module-rules-test")
            .core(ArgumentConfig::string("module.rules[].test").multiple())];
        let mut target = object(json!({"module": {"rules": [{"test": "a"}]}}));
        let values = object(json!({"module-rules-test": ["b", "c"]}));
        let problems = Reconciler::new(&flags, Path::new("/")).reconcile(&mut target, &values);
        assert!(problems.is_empty());
        assert_eq!(
            target["module"]["rules"],
            json!([{"test": "a"}, {"test": "b"}, {"test": "c"}])
        );
    }

    #[test]
    fn test_non_array_in_path() {
        let flags = vec![FlagDefinition::new("module-rules-test")
            .core(ArgumentConfig::string("module.rules[].test").multiple())];
        let mut target = object(json!({"module": {"rules": "nope"}}));
        let values = object(json!({"module-rules-test": ["b"]}));
        let problems = Reconciler::new(&flags, Path::new("/")).reconcile(&mut target, &values);
        assert_eq!(problems[0].kind, ProblemKind::UnexpectedNonArrayInPath);
        assert_eq!(problems[0].path, "module");
    }

    #[test]
    fn test_regexp_validated() {
        let flags = vec![FlagDefinition::new("ignore").core(ArgumentConfig::regexp("ignore"))];
        let reconciler = Reconciler::new(&flags, Path::new("/"));

        let mut target = Map::new();
        assert!(reconciler
            .reconcile(&mut target, &object(json!({"ignore": "/ab?c*/i"})))
            .is_empty());
        assert_eq!(target["ignore"], "/ab?c*/i");

        let problems = reconciler.reconcile(&mut Map::new(), &object(json!({"ignore": "(unclosed"})));
        assert_eq!(problems[0].kind, ProblemKind::InvalidValue);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42"), Some(json!(42)));
        assert_eq!(parse_number("-1.5"), Some(json!(-1.5)));
        assert_eq!(parse_number("1e3"), Some(json!(1000)));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("12px"), None);
    }
}
