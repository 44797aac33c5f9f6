//! Module loading port.
//!
//! [`ModuleLoader`] has a synchronous entry point for modules that can be
//! read in-process and an asynchronous one for modules that must be run.
//! Callers try [`ModuleLoader::require`] first and retry with
//! [`ModuleLoader::import`] only on [`ConfigError::RequiresAsync`].

use std::path::{Path, PathBuf};
use std::process::Stdio;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::export::ConfigExport;
use crate::format::{self, ModuleKind};

/// Environment variable carrying the `--env` mapping to executable configs.
pub const ENV_VAR: &str = "PACKCLI_ENV";
/// Environment variable carrying the parsed options to executable configs.
pub const ARGV_VAR: &str = "PACKCLI_ARGV";

/// Loads configuration modules.
pub trait ModuleLoader: Send + Sync {
    /// Loads a module in-process.
    ///
    /// Fails with [`ConfigError::RequiresAsync`] for modules that can only
    /// be loaded by [`import`](Self::import).
    fn require(&self, path: &Path) -> Result<ConfigExport>;

    /// Loads any module.
    fn import<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ConfigExport>>;
}

/// Tries the synchronous loader, falling back to the asynchronous one when
/// the module requires it.
pub async fn require_then_import(loader: &dyn ModuleLoader, path: &Path) -> Result<ConfigExport> {
    match loader.require(path) {
        Err(ConfigError::RequiresAsync { .. }) => {
            debug!(path = %path.display(), "retrying module load asynchronously");
            loader.import(path).await
        }
        other => other,
    }
}

/// Loads modules from the filesystem.
#[derive(Debug, Clone, Default)]
pub struct FileModuleLoader {
    disable_interpret: bool,
    build_env: Option<String>,
}

impl FileModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs executable configs directly instead of through an interpreter.
    pub fn with_disable_interpret(mut self, disable: bool) -> Self {
        self.disable_interpret = disable;
        self
    }

    /// `BUILD_ENV` value passed to executable configs.
    pub fn with_build_env(mut self, build_env: Option<String>) -> Self {
        self.build_env = build_env;
        self
    }

    fn read(path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn executable(&self, path: &Path, interpreter: Option<&'static str>) -> ConfigExport {
        let interpreter = if self.disable_interpret { None } else { interpreter };
        let program = Program {
            path: path.to_path_buf(),
            interpreter,
            build_env: self.build_env.clone(),
        };
        ConfigExport::factory(move |env, argv| {
            let env = env.to_string();
            let argv = argv.to_string();
            ConfigExport::deferred(program.run(env, argv))
        })
    }
}

impl ModuleLoader for FileModuleLoader {
    fn require(&self, path: &Path) -> Result<ConfigExport> {
        match ModuleKind::from_path(path) {
            ModuleKind::Data(data_format) => {
                let text = Self::read(path)?;
                format::parse_data(data_format, &text, path).map(ConfigExport::Value)
            }
            ModuleKind::Executable => Err(ConfigError::RequiresAsync {
                path: path.to_path_buf(),
            }),
            ModuleKind::Unknown => {
                let text = Self::read(path)?;
                format::sniff(&text, path).map(ConfigExport::Value)
            }
        }
    }

    fn import<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ConfigExport>> {
        async move {
            match ModuleKind::from_path(path) {
                ModuleKind::Executable => Ok(self.executable(path, format::interpreter_for(path))),
                ModuleKind::Data(data_format) => {
                    let text = tokio::fs::read_to_string(path)
                        .await
                        .map_err(|source| ConfigError::Io {
                            path: path.to_path_buf(),
                            source,
                        })?;
                    format::parse_data(data_format, &text, path).map(ConfigExport::Value)
                }
                ModuleKind::Unknown => {
                    let text = tokio::fs::read_to_string(path)
                        .await
                        .map_err(|source| ConfigError::Io {
                            path: path.to_path_buf(),
                            source,
                        })?;
                    if format::has_shebang(&text) {
                        Ok(self.executable(path, None))
                    } else {
                        format::sniff(&text, path).map(ConfigExport::Value)
                    }
                }
            }
        }
        .boxed()
    }
}

/// An executable configuration, ready to run.
#[derive(Debug, Clone)]
struct Program {
    path: PathBuf,
    interpreter: Option<&'static str>,
    build_env: Option<String>,
}

impl Program {
    async fn run(self, env: String, argv: String) -> Result<ConfigExport> {
        let mut command = match self.interpreter {
            Some(interpreter) => {
                let mut command = Command::new(interpreter);
                command.arg(&self.path);
                command
            }
            None => Command::new(&self.path),
        };
        command
            .env(ENV_VAR, env)
            .env(ARGV_VAR, argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(build_env) = &self.build_env {
            command.env("BUILD_ENV", build_env);
        }

        debug!(path = %self.path.display(), interpreter = ?self.interpreter, "running executable config");
        let output = command
            .output()
            .await
            .map_err(|error| ConfigError::ModuleFailed {
                path: self.path.clone(),
                message: match self.interpreter {
                    Some(interpreter) => format!("failed to run '{interpreter}': {error}"),
                    None => error.to_string(),
                },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConfigError::ModuleFailed {
                path: self.path,
                message: format!("{} {}", output.status, stderr.trim()).trim().to_string(),
            });
        }

        let value: Value =
            serde_json::from_slice(&output.stdout).map_err(|error| ConfigError::Parse {
                path: self.path.clone(),
                message: error.to_string(),
            })?;
        Ok(ConfigExport::Value(value))
    }
}
