//! Flag tables, deep merge and argument reconciliation for packcli.
//!
//! This crate holds the configuration-facing half of the build driver:
//!
//! - [`FlagDefinition`] / [`ArgumentConfig`]: declarative flag data model;
//!   a flag's value kinds are inferred from the configuration slots it maps
//!   onto.
//! - [`core_flags`], [`cli_flags`], [`dev_server_flags`]: the built-in flag
//!   tables.
//! - [`merge_all`]: deep merge of configurations (arrays concatenate,
//!   scalars take the rightmost operand).
//! - [`reconcile`] / [`Reconciler`]: applies command-line values onto a
//!   configuration and reports [`Problem`]s.
//! - [`parse_env_arg`]: folds `--env key.path=value` occurrences.
//!
//! Table validation ([`validate_flags`]) catches duplicate names or aliases
//! and malformed definitions.
//!
//! # Example
//!
//! ```
//! use packcli_core::*;
//! use serde_json::{Map, json};
//!
//! let mut config = Map::new();
//! let values = json!({"mode": "production", "entry": ["./src/index.js"]});
//! let problems = reconcile(&core_flags(), &mut config, values.as_object().unwrap());
//!
//! assert!(problems.is_empty());
//! assert_eq!(config["mode"], "production");
//! assert_eq!(config["entry"], json!(["./src/index.js"]));
//! ```

mod env;
mod flags;
mod merge;
mod problem;
mod reconcile;
mod types;
mod validate;

pub use env::parse_env_arg;
pub use flags::{
    LEGACY_ALIASES, MINIMUM_HELP_FLAGS, STATS_PRESETS, cli_flags, core_flags, dev_server_flags,
};
pub use merge::{MergeError, deep_merge, merge_all, merge_objects};
pub use problem::{Problem, ProblemKind, group_by_path};
pub use reconcile::{Reconciler, parse_number, reconcile, to_kebab_case};
pub use types::*;
pub use validate::{ValidationError, validate_flags};
