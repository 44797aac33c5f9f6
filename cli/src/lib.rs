//! packcli command-line driver.
//!
//! Compiles flag tables into a command-line grammar, dispatches commands,
//! resolves build configurations through [`packcli_config`], applies
//! command-line overrides and hands the result to an external build engine.
//!
//! # Example
//!
//! ```no_run
//! use packcli::{Cli, CliContext};
//!
//! # async fn run() -> packcli::Result<i32> {
//! let mut cli = Cli::new(CliContext::from_env()?);
//! cli.run(vec!["build".into(), "--mode".into(), "production".into()]).await
//! # }
//! ```

pub mod app;
pub mod argv;
pub mod commands;
pub mod context;
pub mod dev_server;
pub mod engine;
pub mod error;
pub mod help;
pub mod logger;
pub mod option;
pub mod packages;
pub mod plugin;
pub mod prepare;
pub mod registry;
pub mod suggest;

pub use app::Cli;
pub use argv::{ParsedArgs, parse_args};
pub use context::CliContext;
pub use dev_server::{DevServer, DevServerError, ProcessDevServer, ServeRequest};
pub use engine::{BuildEngine, BuildRequest, EngineError, ProcessEngine, Stats};
pub use error::{CliError, Result};
pub use logger::Logger;
pub use option::{Arity, CompiledOption, OptionTable, OptionValues};
pub use packages::{LocalPackages, PackageError, PackagePort};
pub use plugin::{BuiltIn, CommandKind, CommandPlugin, KNOWN_COMMANDS, KnownCommand, find_known};
pub use prepare::{PrepareOptions, RunMode, prepare};
pub use registry::{CommandRegistry, CommandSpec, Invocation, OptionsProvider, RegisteredCommand};
pub use suggest::{levenshtein_distance, suggest};
