//! Error types for the command-line driver.
//!
//! Every variant is fatal and maps to exit code 2. Build failures reported
//! by the engine are not errors; they only change the exit code of a run
//! that otherwise completed.

use packcli_config::ConfigError;
use packcli_core::{Problem, group_by_path};
use thiserror::Error;

use crate::dev_server::DevServerError;
use crate::engine::EngineError;
use crate::logger::Logger;
use crate::packages::PackageError;

/// Errors that abort a packcli invocation.
#[derive(Debug, Error)]
pub enum CliError {
    /// Malformed command line. The message may span several lines.
    #[error("{0}")]
    Usage(String),

    /// Loading or resolving configurations failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Command-line values could not be applied to a configuration.
    #[error("{}", format_problems(.0))]
    Validation(Vec<Problem>),

    /// A command needs a package that is not installed.
    #[error("{package} needs to be installed in order to run the command.")]
    MissingDependency { package: String },

    /// Installing or loading a command package failed.
    #[error(transparent)]
    Package(#[from] PackageError),

    /// The build engine failed before producing stats.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The development server failed to start.
    #[error(transparent)]
    DevServer(#[from] DevServerError),

    /// Writing output failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A recognized option carries a value the driver cannot use.
    #[error("{0}")]
    InvalidOption(String),
}

impl CliError {
    /// Usage error followed by the standard pointer to `--help`.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(format!(
            "{}\nRun 'packcli --help' to see available commands and options",
            message.into()
        ))
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        2
    }

    /// Writes the error through `logger`, one problem at a time for
    /// validation failures.
    pub fn report(&self, logger: &Logger) {
        logger.error(self);
    }
}

fn format_problems(problems: &[Problem]) -> String {
    group_by_path(problems)
        .into_iter()
        .flat_map(|(_, problems)| problems)
        .map(|problem| problem.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convenience alias for results with [`CliError`].
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use packcli_core::ProblemKind;
    use serde_json::json;

    #[test]
    fn test_validation_grouped_by_path() {
        let problems = vec![
            Problem::new(ProblemKind::InvalidValue, "mode", "mode")
                .with_value(json!("fast"))
                .with_expected("development | production | none"),
            Problem::new(ProblemKind::UnexpectedNonObjectInPath, "output", "output-path"),
            Problem::new(ProblemKind::MultipleValuesUnexpected, "mode", "mode")
                .with_value(json!("none"))
                .with_index(Some(1)),
        ];
        let logger = Logger::capture();
        CliError::Validation(problems).report(&logger);
        assert_eq!(
            logger.lines(),
            vec![
                "[packcli] Invalid value 'fast' for the '--mode' option",
                "[packcli] Expected: 'development | production | none'",
                "[packcli] Multiple values unexpected 'none' for the '--mode' option by index '1'",
                "[packcli] Unexpected non object in path for the '--output-path' option",
            ]
        );
    }

    #[test]
    fn test_usage_points_to_help() {
        let error = CliError::usage("Unknown option '--mdoe'");
        assert_eq!(
            error.to_string(),
            "Unknown option '--mdoe'\nRun 'packcli --help' to see available commands and options"
        );
        assert_eq!(error.exit_code(), 2);
    }
}
