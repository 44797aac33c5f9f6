//! Build engine port.
//!
//! The driver never compiles anything itself. It hands resolved
//! configurations to a [`BuildEngine`] and reports the [`Stats`] it gets
//! back. [`ProcessEngine`] talks to an engine executable over stdin/stdout:
//!
//! - `<engine> --version` prints the engine version.
//! - `<engine> validate` reads the configurations on stdin and exits
//!   non-zero with a message on stderr when they are invalid.
//! - `<engine> build` / `<engine> watch` read a [`BuildRequest`] on stdin
//!   and print one JSON [`Stats`] object per line, one per compilation.

use std::path::PathBuf;
use std::process::Stdio;

use futures::future::{BoxFuture, FutureExt};
use packcli_core::{FlagDefinition, core_flags};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tracing::{debug, info};

/// Package name of the build engine, used for dependency checks.
pub const ENGINE_PACKAGE: &str = "packcli-engine";
/// Overrides the engine executable.
pub const ENGINE_VAR: &str = "PACKCLI_ENGINE";

/// Errors raised by the build engine port.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine executable could not be started.
    #[error("Unable to run build engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine rejected the configuration.
    #[error("Invalid configuration object.\n{0}")]
    Validation(String),

    /// The engine exited abnormally.
    #[error("Build engine failed ({status})\n{stderr}")]
    Failed { status: String, stderr: String },

    /// Encoding a request or decoding stats failed.
    #[error("Malformed build engine data: {0}")]
    Json(#[from] serde_json::Error),

    /// Talking to the engine process failed.
    #[error("Build engine I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// What the engine is asked to build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildRequest {
    /// One configuration object or an array of them.
    pub configs: Value,
    pub watch: bool,
}

/// Result of one compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub errors: Vec<Value>,
    #[serde(default)]
    pub warnings: Vec<Value>,
    /// Human-readable rendering, printed when `--json` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Stats {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Receives stats as compilations finish.
pub type StatsSink<'a> = &'a (dyn Fn(&Stats) + Send + Sync);

/// An external build engine.
pub trait BuildEngine: Send + Sync {
    /// Flags the engine understands, reconciled onto each configuration.
    fn arguments(&self) -> Vec<FlagDefinition>;

    /// Engine version, `None` when it is not installed.
    fn version(&self) -> BoxFuture<'_, Option<String>>;

    /// Checks resolved configurations without building.
    fn validate<'a>(&'a self, configs: &'a Value) -> BoxFuture<'a, Result<(), EngineError>>;

    /// Builds, calling `sink` for every finished compilation.
    ///
    /// Returns the stats of the last compilation.
    fn run<'a>(
        &'a self,
        request: &'a BuildRequest,
        sink: StatsSink<'a>,
    ) -> BoxFuture<'a, Result<Stats, EngineError>>;
}

/// Runs an engine executable.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: PathBuf,
}

impl ProcessEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `PACKCLI_ENGINE` when set, `packcli-engine` from `PATH` otherwise.
    pub fn from_env() -> Self {
        match std::env::var_os(ENGINE_VAR).filter(|value| !value.is_empty()) {
            Some(program) => Self::new(program),
            None => Self::new(ENGINE_PACKAGE),
        }
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    fn command(&self, subcommand: &str) -> Command {
        let mut command = Command::new(&self.program);
        command.arg(subcommand);
        command
    }

    fn spawn_error(&self, source: std::io::Error) -> EngineError {
        EngineError::Spawn {
            program: self.program_name(),
            source,
        }
    }

    async fn run_with_input(&self, subcommand: &str, input: Vec<u8>) -> Result<std::process::Output, EngineError> {
        let mut child = self
            .command(subcommand)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| self.spawn_error(source))?;
        let stdin = child.stdin.take();
        let ((), output) = tokio::try_join!(feed(stdin, input), child.wait_with_output())?;
        Ok(output)
    }
}

/// Writes `input` to the engine and closes its stdin.
///
/// Runs alongside the reads of the engine's output so neither side blocks
/// on a full pipe. An engine that exits before reading everything is judged
/// by its exit status.
async fn feed(stdin: Option<ChildStdin>, input: Vec<u8>) -> std::io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    match stdin.write_all(&input).await {
        Err(error) if error.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        result => result,
    }
}

impl BuildEngine for ProcessEngine {
    fn arguments(&self) -> Vec<FlagDefinition> {
        core_flags()
    }

    fn version(&self) -> BoxFuture<'_, Option<String>> {
        async move {
            let output = Command::new(&self.program)
                .arg("--version")
                .stdin(Stdio::null())
                .stderr(Stdio::null())
                .output()
                .await
                .ok()?;
            if !output.status.success() {
                return None;
            }
            String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|line| line.trim().to_string())
        }
        .boxed()
    }

    fn validate<'a>(&'a self, configs: &'a Value) -> BoxFuture<'a, Result<(), EngineError>> {
        async move {
            let output = self.run_with_input("validate", serde_json::to_vec(configs)?).await?;
            if output.status.success() {
                Ok(())
            } else {
                Err(EngineError::Validation(
                    String::from_utf8_lossy(&output.stderr).trim().to_string(),
                ))
            }
        }
        .boxed()
    }

    fn run<'a>(
        &'a self,
        request: &'a BuildRequest,
        sink: StatsSink<'a>,
    ) -> BoxFuture<'a, Result<Stats, EngineError>> {
        async move {
            let subcommand = if request.watch { "watch" } else { "build" };
            info!(engine = %self.program_name(), subcommand, "starting build engine");

            let mut child = self
                .command(subcommand)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(|source| self.spawn_error(source))?;

            let input = serde_json::to_vec(request)?;
            let stdin = child.stdin.take();
            let stdout = child.stdout.take();
            let read = async {
                let mut last = Stats::default();
                let Some(stdout) = stdout else {
                    return Ok::<Stats, EngineError>(last);
                };
                let mut lines = BufReader::new(stdout).lines();
                while let Some(line) = lines.next_line().await? {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let stats: Stats = serde_json::from_str(&line)?;
                    debug!(
                        errors = stats.errors.len(),
                        warnings = stats.warnings.len(),
                        "compilation finished"
                    );
                    sink(&stats);
                    last = stats;
                }
                Ok(last)
            };
            let write = async { feed(stdin, input).await.map_err(EngineError::from) };
            let ((), last) = tokio::try_join!(write, read)?;

            let status = child.wait().await?;
            if !status.success() && !last.has_errors() {
                return Err(EngineError::Failed {
                    status: status.to_string(),
                    stderr: String::new(),
                });
            }
            Ok(last)
        }
        .boxed()
    }
}
