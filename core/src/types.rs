//! Flag type definitions.
//!
//! A [`FlagDefinition`] is the declarative description of one command-line
//! flag. Flags in the [`FlagGroup::Core`] group carry one or more
//! [`ArgumentConfig`]s describing where their value lands in the build
//! configuration; flags in [`FlagGroup::Cli`] are consumed by the driver
//! itself and only declare their [`ValueKind`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of value a flag accepts on the command line.
///
/// # Examples
///
/// ```
/// use packcli_core::ValueKind;
///
/// assert_eq!(ValueKind::Number.as_str(), "number");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    /// Switch or optional-value flag.
    Boolean,
    /// Decimal number.
    Number,
    /// Free-form string.
    String,
}

impl ValueKind {
    /// Lower-case name used in help output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
        }
    }
}

/// Help verbosity tier a flag is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HelpLevel {
    /// Shown in the default `--help` listing.
    Minimum,
    /// Shown only with `--help=verbose`.
    #[default]
    Verbose,
}

/// Which side of the driver consumes a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlagGroup {
    /// Reconciled onto the build configuration.
    Core,
    /// Consumed by the driver (config paths, `--env`, output mode, ...).
    #[default]
    Cli,
}

/// How repeated raw values of a flag are accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueParser {
    /// Coerce each value by kind; collect into a list when `multiple`.
    #[default]
    Standard,
    /// Fold `key.path=value` pairs into one nested mapping (see [`parse_env_arg`](crate::parse_env_arg)).
    KeyPath,
}

/// Type of a configuration slot a flag maps onto.
///
/// # Examples
///
/// ```
/// use packcli_core::ArgumentType;
/// use serde_json::json;
///
/// let mode = ArgumentType::Enum(vec![json!("development"), json!("production")]);
/// assert_eq!(mode.expected(), Some("development | production".to_string()));
/// assert_eq!(ArgumentType::Boolean.expected(), Some("true | false".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgumentType {
    Boolean,
    Number,
    String,
    /// String resolved to an absolute path.
    Path,
    /// Regular expression, `/body/flags` or a bare pattern.
    #[serde(rename = "RegExp")]
    RegExp,
    /// One of a fixed set of JSON scalars.
    Enum(Vec<Value>),
    /// `true` clears the addressed array.
    Reset,
}

impl ArgumentType {
    /// Value kinds this slot accepts on the command line.
    ///
    /// Enum members contribute the kind of each member, except a literal
    /// `false`, which is expressed through negation instead.
    pub fn value_kinds(&self) -> Vec<ValueKind> {
        match self {
            ArgumentType::Boolean | ArgumentType::Reset => vec![ValueKind::Boolean],
            ArgumentType::Number => vec![ValueKind::Number],
            ArgumentType::String | ArgumentType::Path | ArgumentType::RegExp => {
                vec![ValueKind::String]
            }
            ArgumentType::Enum(values) => values
                .iter()
                .filter_map(|value| match value {
                    Value::Bool(true) => Some(ValueKind::Boolean),
                    Value::Number(_) => Some(ValueKind::Number),
                    Value::String(_) => Some(ValueKind::String),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Whether a literal `false` member makes this slot negatable.
    pub fn negates(&self) -> bool {
        match self {
            ArgumentType::Boolean => true,
            ArgumentType::Enum(values) => values.iter().any(|value| value == &Value::Bool(false)),
            _ => false,
        }
    }

    /// Human-readable description of accepted values, used in problems.
    pub fn expected(&self) -> Option<String> {
        match self {
            ArgumentType::Boolean => Some("true | false".to_string()),
            ArgumentType::Reset => {
                Some("true (will reset the previous value to an empty array)".to_string())
            }
            ArgumentType::RegExp => Some("regular expression (example: /ab?c*/)".to_string()),
            ArgumentType::Enum(values) => Some(
                values
                    .iter()
                    .map(display_scalar)
                    .collect::<Vec<_>>()
                    .join(" | "),
            ),
            ArgumentType::Number => Some("number".to_string()),
            ArgumentType::String => Some("string".to_string()),
            ArgumentType::Path => Some("path".to_string()),
        }
    }
}

/// Renders a JSON scalar without quotes around strings.
pub fn display_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One way a flag maps onto the build configuration.
///
/// `path` is a dotted schema path; a segment ending in `[]` addresses an
/// array (`entry[]`, `module.rules[].test`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentConfig {
    #[serde(rename = "type")]
    pub argument_type: ArgumentType,
    pub path: String,
    pub multiple: bool,
    pub description: Option<String>,
    pub negated_description: Option<String>,
}

impl ArgumentConfig {
    /// Creates a non-multiple config of the given type.
    pub fn new(argument_type: ArgumentType, path: impl Into<String>) -> Self {
        Self {
            argument_type,
            path: path.into(),
            multiple: false,
            description: None,
            negated_description: None,
        }
    }

    pub fn boolean(path: impl Into<String>) -> Self {
        Self::new(ArgumentType::Boolean, path)
    }

    pub fn number(path: impl Into<String>) -> Self {
        Self::new(ArgumentType::Number, path)
    }

    pub fn string(path: impl Into<String>) -> Self {
        Self::new(ArgumentType::String, path)
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self::new(ArgumentType::Path, path)
    }

    pub fn regexp(path: impl Into<String>) -> Self {
        Self::new(ArgumentType::RegExp, path)
    }

    pub fn enumeration(path: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(ArgumentType::Enum(values), path)
    }

    pub fn reset(path: impl Into<String>) -> Self {
        Self::new(ArgumentType::Reset, path)
    }

    /// Marks the config as accepting several values (one per array item).
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_negated_description(mut self, description: impl Into<String>) -> Self {
        self.negated_description = Some(description.into());
        self
    }
}

/// Declarative description of a command-line flag.
///
/// Use [`FlagDefinition::new`] and chain the builder methods. Value kinds are
/// the union of explicitly declared [`kinds`](Self::kinds) and those inferred
/// from [`configs`](Self::configs); see [`value_kinds`](Self::value_kinds).
///
/// # Examples
///
/// ```
/// use packcli_core::{ArgumentConfig, FlagDefinition, FlagGroup, ValueKind};
/// use serde_json::json;
///
/// let devtool = FlagDefinition::new("devtool")
///     .with_alias('d')
///     .core(ArgumentConfig::enumeration("devtool", vec![json!(false)]))
///     .core(ArgumentConfig::string("devtool"))
///     .with_description("A developer tool to enhance debugging.");
///
/// assert_eq!(devtool.group, FlagGroup::Core);
/// assert_eq!(devtool.value_kinds(), vec![ValueKind::String]);
/// assert!(devtool.has_negation());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagDefinition {
    /// Kebab-case long name, unique within its table.
    pub name: String,
    /// Single-character short alias.
    pub alias: Option<char>,
    pub description: Option<String>,
    pub negated_description: Option<String>,
    /// Explicitly declared value kinds.
    pub kinds: Vec<ValueKind>,
    /// Configuration slots, tried in order by the reconciler.
    pub configs: Vec<ArgumentConfig>,
    pub multiple: bool,
    pub default_value: Option<Value>,
    /// Generate `--no-<name>` even without a boolean config.
    pub negatable: bool,
    pub help_level: HelpLevel,
    /// Placeholder shown in help (`<value>` by default).
    pub value_name: Option<String>,
    pub group: FlagGroup,
    pub value_parser: ValueParser,
}

impl FlagDefinition {
    /// Creates a driver flag with no kinds, configs or metadata.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            description: None,
            negated_description: None,
            kinds: Vec::new(),
            configs: Vec::new(),
            multiple: false,
            default_value: None,
            negatable: false,
            help_level: HelpLevel::Verbose,
            value_name: None,
            group: FlagGroup::Cli,
            value_parser: ValueParser::Standard,
        }
    }

    /// Adds a configuration slot and moves the flag into [`FlagGroup::Core`].
    pub fn core(mut self, config: ArgumentConfig) -> Self {
        if config.multiple {
            self.multiple = true;
        }
        self.configs.push(config);
        self.group = FlagGroup::Core;
        self
    }

    pub fn with_kind(mut self, kind: ValueKind) -> Self {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
        self
    }

    pub fn with_alias(mut self, alias: char) -> Self {
        self.alias = Some(alias);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_negated_description(mut self, description: impl Into<String>) -> Self {
        self.negated_description = Some(description.into());
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_value_name(mut self, value_name: impl Into<String>) -> Self {
        self.value_name = Some(value_name.into());
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn negatable(mut self) -> Self {
        self.negatable = true;
        self
    }

    /// Lists the flag in the default help output.
    pub fn minimum(mut self) -> Self {
        self.help_level = HelpLevel::Minimum;
        self
    }

    pub fn key_path(mut self) -> Self {
        self.value_parser = ValueParser::KeyPath;
        self
    }

    /// Union of declared and inferred value kinds, in first-seen order.
    pub fn value_kinds(&self) -> Vec<ValueKind> {
        let mut kinds = self.kinds.clone();
        for config in &self.configs {
            for kind in config.argument_type.value_kinds() {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }
        kinds
    }

    /// Whether a `--no-<name>` counterpart exists.
    pub fn has_negation(&self) -> bool {
        self.negatable
            || self
                .configs
                .iter()
                .any(|config| config.argument_type.negates())
    }

    /// Description for the `--no-<name>` counterpart.
    pub fn negation_description(&self) -> String {
        self.configs
            .iter()
            .filter(|config| config.argument_type.negates())
            .find_map(|config| config.negated_description.clone())
            .or_else(|| self.negated_description.clone())
            .unwrap_or_else(|| format!("Negative '{}' option.", self.name))
    }

    /// Flag description, falling back to the first config's description.
    pub fn summary(&self) -> Option<&str> {
        self.description.as_deref().or_else(|| {
            self.configs
                .iter()
                .find_map(|config| config.description.as_deref())
        })
    }

    /// Enum members accepted across all configs, for help output.
    pub fn possible_values(&self) -> Vec<Value> {
        let mut values = Vec::new();
        for config in &self.configs {
            if let ArgumentType::Enum(members) = &config.argument_type {
                for member in members {
                    if !values.contains(member) {
                        values.push(member.clone());
                    }
                }
            }
        }
        values
    }
}
