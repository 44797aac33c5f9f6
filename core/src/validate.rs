//! Flag table validation.
//!
//! Catches structural errors in flag tables, such as duplicate names or
//! aliases, malformed names, and flags that can never take a value, before
//! they reach the option compiler.
//!
//! # Examples
//!
//! ```
//! use packcli_core::*;
//!
//! let flags = vec![
//!     FlagDefinition::new("mode").core(ArgumentConfig::string("mode")),
//!     FlagDefinition::new("watch").with_alias('w').with_kind(ValueKind::Boolean),
//! ];
//! assert!(validate_flags(&flags).is_empty());
//!
//! // Invalid: names must be kebab-case
//! let bad = vec![FlagDefinition::new("outputPath").core(ArgumentConfig::path("output.path"))];
//! assert!(!validate_flags(&bad).is_empty());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::FlagDefinition;

/// Flag table validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Flag name is empty or whitespace-only.
    #[error("flag name cannot be empty")]
    EmptyFlagName,
    /// Flag name is not lower-case kebab-case (e.g., `outputPath`).
    #[error("invalid flag name format: {0}")]
    InvalidFlagName(String),
    /// Flag name starts with `no-`, which collides with negations.
    #[error("flag name collides with a negation: {0}")]
    NegationPrefix(String),
    /// Two flags in the same table share a name.
    #[error("duplicate flag in table: {0}")]
    DuplicateFlag(String),
    /// Two flags in the same table share a short alias.
    #[error("duplicate alias in table: -{0}")]
    DuplicateAlias(char),
    /// Alias is not an ASCII letter.
    #[error("invalid alias for '{name}': {alias}")]
    InvalidAlias { name: String, alias: char },
    /// Flag has no value kinds and cannot be negated.
    #[error("flag accepts no values: {0}")]
    NoValueKinds(String),
    /// A config path is empty or has an empty segment.
    #[error("invalid config path for '{name}': {path}")]
    InvalidConfigPath { name: String, path: String },
}

/// Validates a flag table.
///
/// Returns every error found, in table order.
pub fn validate_flags(flags: &[FlagDefinition]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();
    let mut aliases = HashSet::new();

    for flag in flags {
        let name = flag.name.trim();
        if name.is_empty() {
            errors.push(ValidationError::EmptyFlagName);
            continue;
        }
        if !is_kebab_case(name) {
            errors.push(ValidationError::InvalidFlagName(name.to_string()));
        }
        if name.starts_with("no-") {
            errors.push(ValidationError::NegationPrefix(name.to_string()));
        }
        if !names.insert(name) {
            errors.push(ValidationError::DuplicateFlag(name.to_string()));
        }

        if let Some(alias) = flag.alias {
            if !alias.is_ascii_alphabetic() {
                errors.push(ValidationError::InvalidAlias {
                    name: name.to_string(),
                    alias,
                });
            } else if !aliases.insert(alias) {
                errors.push(ValidationError::DuplicateAlias(alias));
            }
        }

        if flag.value_kinds().is_empty() && !flag.has_negation() {
            errors.push(ValidationError::NoValueKinds(name.to_string()));
        }

        for config in &flag.configs {
            let valid = config
                .path
                .split('.')
                .all(|segment| !segment.trim_end_matches("[]").is_empty());
            if !valid {
                errors.push(ValidationError::InvalidConfigPath {
                    name: name.to_string(),
                    path: config.path.clone(),
                });
            }
        }
    }

    errors
}

fn is_kebab_case(name: &str) -> bool {
    !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--")
        && name
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
}
