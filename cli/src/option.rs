//! Option schema compiler.
//!
//! Turns [`FlagDefinition`]s into command-line options: the value grammar
//! (switch, optional value, required value), the `--no-<name>` counterpart,
//! the clap args that parse them, and value coercion. [`OptionValues`]
//! accumulates parsed occurrences.
//!
//! # Example
//!
//! ```
//! use packcli::{Arity, OptionTable};
//! use packcli_core::core_flags;
//!
//! let table = OptionTable::from_flags(&core_flags());
//! let stats = table.get("stats").unwrap();
//! assert_eq!(stats.arity, Arity::Optional);
//! assert!(table.negated("stats").is_some());
//! assert_eq!(stats.flags(), "--stats [value]");
//! ```

use std::collections::{HashMap, HashSet};

use clap::{Arg, ArgAction};
use packcli_core::{
    FlagDefinition, FlagGroup, HelpLevel, ValueKind, ValueParser, parse_env_arg, parse_number,
};
use serde_json::{Map, Value};
use tracing::debug;

/// Value clap records for an occurrence given without one. Argv entries
/// cannot contain NUL.
pub(crate) const BARE_VALUE: &str = "\0";

/// How an option takes its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Boolean only; never takes a value.
    Switch,
    /// Boolean plus another kind: `--name` alone means `true`.
    Optional,
    /// No boolean kind: a value must follow.
    Required,
    /// No value kinds at all; only the negation is meaningful.
    Hidden,
}

/// A flag compiled into its command-line form.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledOption {
    pub name: String,
    pub alias: Option<char>,
    pub kinds: Vec<ValueKind>,
    pub arity: Arity,
    pub multiple: bool,
    pub description: Option<String>,
    /// Description of `--no-<name>`, when the option has one.
    pub negation: Option<String>,
    pub default_value: Option<Value>,
    pub help_level: HelpLevel,
    pub value_name: String,
    pub value_parser: ValueParser,
    pub possible_values: Vec<Value>,
    pub group: FlagGroup,
}

impl CompiledOption {
    pub fn compile(flag: &FlagDefinition) -> Self {
        let kinds = flag.value_kinds();
        let has_boolean = kinds.contains(&ValueKind::Boolean);
        let arity = if kinds.is_empty() {
            Arity::Hidden
        } else if !has_boolean {
            Arity::Required
        } else if kinds.len() > 1 {
            Arity::Optional
        } else {
            Arity::Switch
        };

        Self {
            name: flag.name.clone(),
            alias: flag.alias,
            kinds,
            arity,
            multiple: flag.multiple,
            description: flag.summary().map(str::to_string),
            negation: flag.has_negation().then(|| flag.negation_description()),
            default_value: flag.default_value.clone(),
            help_level: flag.help_level,
            value_name: flag.value_name.clone().unwrap_or_else(|| "value".to_string()),
            value_parser: flag.value_parser,
            possible_values: flag.possible_values(),
            group: flag.group,
        }
    }

    /// Value placeholder, e.g. `<value...>` or `[value]`.
    pub fn placeholder(&self) -> Option<String> {
        let dots = if self.multiple { "..." } else { "" };
        match self.arity {
            Arity::Required => Some(format!("<{}{dots}>", self.value_name)),
            Arity::Optional => Some(format!("[{}{dots}]", self.value_name)),
            Arity::Switch | Arity::Hidden => None,
        }
    }

    /// Flags column for help, e.g. `-c, --config <pathToConfigFile...>`.
    pub fn flags(&self) -> String {
        let mut flags = match self.alias {
            Some(alias) => format!("-{alias}, --{}", self.name),
            None => format!("--{}", self.name),
        };
        if let Some(placeholder) = self.placeholder() {
            flags.push(' ');
            flags.push_str(&placeholder);
        }
        flags
    }

    /// Id and long name of the `--no-<name>` arg.
    pub fn negation_id(&self) -> String {
        format!("no-{}", self.name)
    }

    /// The option as a clap arg.
    ///
    /// Every occurrence carries exactly one value, [`BARE_VALUE`] when none
    /// was given, so occurrences of different args can be ordered by index.
    pub fn clap_arg(&self, short: Option<char>) -> Arg {
        let mut arg = Arg::new(self.name.clone())
            .long(self.name.clone())
            .action(ArgAction::Append);
        if let Some(short) = short {
            arg = arg.short(short);
        }
        match self.arity {
            Arity::Switch | Arity::Hidden => arg.num_args(0).default_missing_value(BARE_VALUE),
            Arity::Optional => arg
                .num_args(0..=1)
                .value_name(self.value_name.clone())
                .default_missing_value(BARE_VALUE),
            Arity::Required => arg.num_args(1).value_name(self.value_name.clone()),
        }
    }

    /// The `--no-<name>` arg, when the option has one.
    pub fn clap_negation(&self) -> Option<Arg> {
        self.negation.as_ref()?;
        Some(
            Arg::new(self.negation_id())
                .long(self.negation_id())
                .action(ArgAction::Append)
                .num_args(0)
                .default_missing_value(BARE_VALUE),
        )
    }

    /// Converts one raw occurrence into a value.
    ///
    /// Missing values mean `true`. When a number is acceptable it is tried
    /// first; anything else stays a string for the reconciler to judge.
    pub fn coerce(&self, raw: Option<&str>) -> Value {
        let Some(raw) = raw else {
            return Value::Bool(true);
        };
        if self.kinds.contains(&ValueKind::Number) {
            if let Some(number) = parse_number(raw) {
                return number;
            }
        }
        Value::String(raw.to_string())
    }
}

/// Options of one command, indexed by long name and alias.
#[derive(Debug, Clone, Default)]
pub struct OptionTable {
    options: Vec<CompiledOption>,
    by_name: HashMap<String, usize>,
    by_alias: HashMap<char, usize>,
}

impl OptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_flags(flags: &[FlagDefinition]) -> Self {
        let mut table = Self::new();
        for flag in flags {
            table.add(flag);
        }
        table
    }

    /// Compiles and adds `flag`. Returns `false` when the name is taken.
    pub fn add(&mut self, flag: &FlagDefinition) -> bool {
        if self.by_name.contains_key(&flag.name) {
            debug!(flag = %flag.name, "option already defined");
            return false;
        }
        let option = CompiledOption::compile(flag);
        let index = self.options.len();
        self.by_name.insert(option.name.clone(), index);
        if let Some(alias) = option.alias {
            self.by_alias.entry(alias).or_insert(index);
        }
        self.options.push(option);
        true
    }

    pub fn get(&self, name: &str) -> Option<&CompiledOption> {
        self.by_name.get(name).map(|&index| &self.options[index])
    }

    pub fn by_alias(&self, alias: char) -> Option<&CompiledOption> {
        self.by_alias.get(&alias).map(|&index| &self.options[index])
    }

    /// The option whose `--no-<name>` form this is, if it has one.
    pub fn negated(&self, name: &str) -> Option<&CompiledOption> {
        self.get(name).filter(|option| option.negation.is_some())
    }

    /// The alias of `option`, unless an earlier option claimed it.
    pub fn short_for(&self, option: &CompiledOption) -> Option<char> {
        option
            .alias
            .filter(|&alias| self.by_alias(alias).is_some_and(|owner| owner.name == option.name))
    }

    /// The `--no-<name>` arg of `option`, unless an option is literally
    /// named that way.
    pub fn negation_arg(&self, option: &CompiledOption) -> Option<Arg> {
        if self.get(&option.negation_id()).is_some() {
            return None;
        }
        option.clap_negation()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledOption> {
        self.options.iter()
    }

    /// Every spelling a user may type: long names and their negations.
    pub fn long_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.options.len());
        for option in &self.options {
            names.push(option.name.clone());
            if option.negation.is_some() {
                names.push(format!("no-{}", option.name));
            }
        }
        names
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// Parsed option values keyed by long name.
///
/// Defaults are present until the first explicit occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionValues {
    values: Map<String, Value>,
    explicit: HashSet<String>,
}

impl OptionValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values holding every default declared in `table`.
    pub fn with_defaults(table: &OptionTable) -> Self {
        let mut values = Self::new();
        for option in table.iter() {
            if let Some(default) = &option.default_value {
                values.values.insert(option.name.clone(), default.clone());
            }
        }
        values
    }

    /// Records one occurrence of `option`; `raw` is `None` for a bare flag.
    pub fn record(&mut self, option: &CompiledOption, raw: Option<&str>) {
        let name = option.name.as_str();
        let first = self.explicit.insert(name.to_string());

        match option.value_parser {
            ValueParser::KeyPath => {
                let slot = self
                    .values
                    .entry(name)
                    .or_insert_with(|| Value::Object(Map::new()));
                if first || !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let (Some(raw), Value::Object(env)) = (raw, slot) {
                    parse_env_arg(raw, env);
                }
            }
            ValueParser::Standard if option.multiple => {
                if first {
                    self.values.remove(name);
                }
                let Some(raw) = raw else {
                    self.values.insert(name.to_string(), Value::Bool(true));
                    return;
                };
                let value = option.coerce(Some(raw));
                match self.values.entry(name).or_insert_with(|| Value::Array(Vec::new())) {
                    Value::Array(items) => items.push(value),
                    bare @ Value::Bool(true) => *bare = Value::Array(vec![value]),
                    other => {
                        let previous = other.take();
                        *other = Value::Array(vec![previous, value]);
                    }
                }
            }
            ValueParser::Standard => {
                self.values.insert(name.to_string(), option.coerce(raw));
            }
        }
    }

    /// Records `--no-<name>`.
    pub fn negate(&mut self, option: &CompiledOption) {
        self.explicit.insert(option.name.clone());
        self.values.insert(option.name.clone(), Value::Bool(false));
    }

    /// Sets a value programmatically, as if given on the command line.
    pub fn insert(&mut self, name: &str, value: Value) {
        self.explicit.insert(name.to_string());
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Whether `name` was given on the command line.
    pub fn is_explicit(&self, name: &str) -> bool {
        self.explicit.contains(name)
    }

    /// `true` only for a boolean `true` value.
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(Value::Bool(true)))
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// String values of a multiple option; a single string counts as one.
    pub fn strings(&self, name: &str) -> Vec<String> {
        match self.values.get(name) {
            Some(Value::String(value)) => vec![value.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Keeps only the values whose name satisfies `keep`.
    pub fn retain(&mut self, keep: impl Fn(&str) -> bool) {
        self.values.retain(|name, _| keep(name));
        self.explicit.retain(|name| keep(name));
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packcli_core::{ArgumentConfig, cli_flags, core_flags};
    use serde_json::json;

    fn table() -> OptionTable {
        let mut flags = cli_flags();
        flags.extend(core_flags());
        OptionTable::from_flags(&flags)
    }

    #[test]
    fn test_arity_from_kinds() {
        let table = table();
        assert_eq!(table.get("watch").unwrap().arity, Arity::Switch);
        assert_eq!(table.get("mode").unwrap().arity, Arity::Required);
        assert_eq!(table.get("json").unwrap().arity, Arity::Optional);
        assert_eq!(table.get("devtool").unwrap().arity, Arity::Required);
    }

    #[test]
    fn test_hidden_stub_keeps_negation() {
        let flag = FlagDefinition::new("hints")
            .core(ArgumentConfig::enumeration("performance.hints", vec![json!(false)]));
        let option = CompiledOption::compile(&flag);
        assert_eq!(option.arity, Arity::Hidden);
        assert_eq!(option.negation.as_deref(), Some("Negative 'hints' option."));
    }

    #[test]
    fn test_negation_from_false_enum_member() {
        let table = table();
        assert!(table.negated("devtool").is_some());
        assert!(table.negated("mode").is_none());
        assert!(table.long_names().contains(&"no-devtool".to_string()));
    }

    #[test]
    fn test_placeholders() {
        let table = table();
        assert_eq!(table.get("config").unwrap().flags(), "-c, --config <pathToConfigFile...>");
        assert_eq!(table.get("json").unwrap().flags(), "-j, --json [pathToJsonFile]");
        assert_eq!(table.get("bail").unwrap().flags(), "--bail");
    }

    #[test]
    fn test_coerce_number_then_string() {
        let table = table();
        let parallelism = table.get("parallelism").unwrap();
        assert_eq!(parallelism.coerce(Some("4")), json!(4));
        assert_eq!(parallelism.coerce(Some("many")), json!("many"));
        assert_eq!(table.get("json").unwrap().coerce(None), json!(true));
    }

    #[test]
    fn test_multiple_default_cleared_on_first_occurrence() {
        let flag = FlagDefinition::new("tag")
            .with_kind(ValueKind::String)
            .multiple()
            .with_default(json!(["latest"]));
        let table = OptionTable::from_flags(&[flag]);
        let option = table.get("tag").unwrap();

        let mut values = OptionValues::with_defaults(&table);
        assert_eq!(values.get("tag"), Some(&json!(["latest"])));
        assert!(!values.is_explicit("tag"));

        values.record(option, Some("a"));
        values.record(option, Some("b"));
        assert_eq!(values.get("tag"), Some(&json!(["a", "b"])));
        assert_eq!(values.strings("tag"), vec!["a", "b"]);
    }

    #[test]
    fn test_bare_multiple_flag_is_true() {
        let table = OptionTable::from_flags(&packcli_core::dev_server_flags());
        for name in ["open", "static"] {
            let option = table.get(name).unwrap();
            assert!(option.multiple);
            assert_eq!(option.arity, Arity::Optional);

            let mut values = OptionValues::with_defaults(&table);
            values.record(option, None);
            assert_eq!(values.get(name), Some(&json!(true)));

            values.record(option, Some("docs"));
            values.record(option, Some("assets"));
            assert_eq!(values.get(name), Some(&json!(["docs", "assets"])));
        }
    }

    #[test]
    fn test_clap_args_follow_arity() {
        let table = table();
        let json = table.get("json").unwrap().clap_arg(Some('j'));
        assert_eq!(json.get_long(), Some("json"));
        assert_eq!(json.get_short(), Some('j'));
        assert!(table.negation_arg(table.get("devtool").unwrap()).is_some());
        assert!(table.negation_arg(table.get("mode").unwrap()).is_none());
    }

    #[test]
    fn test_key_path_accumulates() {
        let table = table();
        let env = table.get("env").unwrap();
        let mut values = OptionValues::new();
        values.record(env, Some("foo=bar"));
        values.record(env, Some("baz.qux"));
        assert_eq!(values.get("env"), Some(&json!({"foo": "bar", "baz": {"qux": true}})));
    }

    #[test]
    fn test_negate_sets_false() {
        let table = table();
        let mut values = OptionValues::new();
        values.negate(table.get("watch").unwrap());
        assert_eq!(values.get("watch"), Some(&json!(false)));
        assert!(values.is_explicit("watch"));
        assert!(!values.flag("watch"));
    }
}
