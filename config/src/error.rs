//! Error types for configuration loading.
//!
//! Every variant except [`ConfigError::RequiresAsync`] is fatal for the
//! driver; that one is recovered by retrying with the asynchronous loader.

use std::path::PathBuf;

use packcli_core::MergeError;
use thiserror::Error;

/// Errors that can occur while loading and resolving configurations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading a configuration file failed.
    #[error("Failed to load '{}' config\n{source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A data configuration did not parse.
    #[error("Failed to load '{}' config\n{message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// The synchronous loader cannot handle this module.
    #[error("'{}' must be loaded asynchronously", path.display())]
    RequiresAsync { path: PathBuf },

    /// An executable configuration could not be run or exited non-zero.
    #[error("Failed to load '{}' config\n{message}", path.display())]
    ModuleFailed { path: PathBuf, message: String },

    /// The module produced no configuration.
    #[error("Failed to load '{}' config. Unable to find default export.", path.display())]
    MissingExport { path: PathBuf },

    /// The module produced something other than an object or an array of
    /// objects.
    #[error("Invalid configuration in '{}'", path.display())]
    InvalidConfiguration { path: PathBuf },

    /// Names requested with `--config-name` that no configuration carries.
    #[error("{}", format_missing_names(.0))]
    ConfigNamesNotFound(Vec<String>),

    /// An `extends` chain loads a file already in the chain.
    #[error("Recursive configuration detected: '{}'", path.display())]
    RecursiveConfiguration { path: PathBuf },

    /// `extends` is neither a string nor an array of strings.
    #[error("Invalid 'extends' in configuration: expected a string or an array of strings, got {found}")]
    InvalidExtends { found: String },

    /// Explicit merge was requested with fewer than two configurations.
    #[error(transparent)]
    Merge(#[from] MergeError),
}

fn format_missing_names(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("Configuration with the name \"{name}\" was not found."))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Convenience alias for results with [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;
