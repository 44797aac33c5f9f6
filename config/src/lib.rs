//! Configuration loading for packcli.
//!
//! This crate turns `--config`, `--config-name`, `--extends` and `--merge`
//! into a [`ResolvedConfigSet`]:
//!
//! - [`ConfigLoader::load`]: explicit files (loaded concurrently) or the
//!   first default file found (`packcli.config.json`, `.yaml`, ...).
//! - [`ModuleLoader`]: synchronous loading of data files with an
//!   asynchronous retry for executable configurations.
//! - [`ConfigExport`] / [`unwrap_export`]: values, lists, deferred values
//!   and factories, reduced to plain JSON.
//! - [`select_names`], [`ConfigLoader::resolve_extends`], [`merge`]: the
//!   post-load steps.
//!
//! Source files of every configuration are tracked in a [`PathLedger`]
//! keyed by [`ConfigId`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use packcli_config::{ConfigLoader, FileModuleLoader, LoadOptions};
//!
//! # async fn run() -> packcli_config::Result<()> {
//! let loader = ConfigLoader::new(".", Arc::new(FileModuleLoader::new()));
//! let options = LoadOptions {
//!     config: vec!["./packcli.config.json".into()],
//!     ..LoadOptions::default()
//! };
//! let set = loader.resolve(&options).await?;
//! println!("{}", set.to_value());
//! # Ok(())
//! # }
//! ```

mod error;
mod export;
mod extends;
mod format;
mod ledger;
mod loader;
mod module;
mod set;

pub use error::{ConfigError, Result};
pub use export::{ConfigExport, ConfigFactory, FactoryArgs, unwrap_export};
pub use extends::extends_paths;
pub use format::{
    DEFAULT_CONFIG_BASENAMES, DEFAULT_CONFIG_EXTENSIONS, DataFormat, ModuleKind, interpreter_for,
};
pub use ledger::{ConfigId, PathLedger};
pub use loader::{ConfigLoader, LoadOptions, merge, select_names};
pub use module::{ARGV_VAR, ENV_VAR, FileModuleLoader, ModuleLoader, require_then_import};
pub use set::{ConfigEntry, ConfigOptions, ResolvedConfigSet};
