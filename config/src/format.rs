//! Configuration module formats.
//!
//! Data formats (JSON, YAML, TOML) are parsed in-process and can be loaded
//! synchronously. Executable configurations are programs that print their
//! configuration as JSON and are always loaded asynchronously.

use std::path::Path;

use serde_json::Value;

use crate::error::{ConfigError, Result};

/// Base names searched when no `--config` is given, in priority order.
pub const DEFAULT_CONFIG_BASENAMES: &[&str] = &[
    "packcli.config",
    ".packcli/packcli.config",
    ".packcli/packclifile",
];

/// Extensions searched for each base name, in priority order.
pub const DEFAULT_CONFIG_EXTENSIONS: &[&str] = &[
    ".json", ".yaml", ".yml", ".toml", ".js", ".mjs", ".cjs", ".py", ".sh",
];

/// Interpreters for executable configurations, by extension.
const INTERPRETERS: &[(&str, &str)] = &[
    ("js", "node"),
    ("mjs", "node"),
    ("cjs", "node"),
    ("py", "python3"),
    ("sh", "sh"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Json,
    Yaml,
    Toml,
}

/// How a configuration module is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Parsed in-process.
    Data(DataFormat),
    /// Run as a program; stdout carries the configuration.
    Executable,
    /// Unrecognized extension; the content decides.
    Unknown,
}

impl ModuleKind {
    /// Detects the module kind from the file extension.
    ///
    /// # Examples
    ///
    /// ```
    /// use packcli_config::{DataFormat, ModuleKind};
    /// use std::path::Path;
    ///
    /// assert_eq!(ModuleKind::from_path(Path::new("a.yml")), ModuleKind::Data(DataFormat::Yaml));
    /// assert_eq!(ModuleKind::from_path(Path::new("a.mjs")), ModuleKind::Executable);
    /// assert_eq!(ModuleKind::from_path(Path::new("a.conf")), ModuleKind::Unknown);
    /// ```
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => ModuleKind::Data(DataFormat::Json),
            Some("yaml") | Some("yml") => ModuleKind::Data(DataFormat::Yaml),
            Some("toml") => ModuleKind::Data(DataFormat::Toml),
            Some(ext) if interpreter_for_extension(ext).is_some() => ModuleKind::Executable,
            _ => ModuleKind::Unknown,
        }
    }
}

fn interpreter_for_extension(extension: &str) -> Option<&'static str> {
    INTERPRETERS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, program)| *program)
}

/// Interpreter used to run an executable configuration.
pub fn interpreter_for(path: &Path) -> Option<&'static str> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| interpreter_for_extension(&ext.to_ascii_lowercase()))
}

/// Parses a data configuration.
pub fn parse_data(format: DataFormat, text: &str, path: &Path) -> Result<Value> {
    let parsed = match format {
        DataFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        DataFormat::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
        DataFormat::Toml => toml::from_str::<toml::Value>(text)
            .map_err(|e| e.to_string())
            .and_then(|value| serde_json::to_value(value).map_err(|e| e.to_string())),
    };
    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Whether the content starts with a `#!` interpreter line.
pub fn has_shebang(text: &str) -> bool {
    text.starts_with("#!")
}

/// Parses content of unknown format, trying JSON, TOML, then YAML.
///
/// Content starting with a shebang fails with
/// [`ConfigError::RequiresAsync`].
pub fn sniff(text: &str, path: &Path) -> Result<Value> {
    if has_shebang(text) {
        return Err(ConfigError::RequiresAsync {
            path: path.to_path_buf(),
        });
    }
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }
    if let Ok(value) = parse_data(DataFormat::Toml, text, path) {
        return Ok(value);
    }
    parse_data(DataFormat::Yaml, text, path)
}
