//! Development server port.
//!
//! `serve` resolves configurations like `build`, then hands them together
//! with each configuration's `devServer` section to a [`DevServer`].
//! [`ProcessDevServer`] runs `<dev-server>` with a [`ServeRequest`] on
//! stdin and waits for it to exit.

use std::path::PathBuf;
use std::process::Stdio;

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::info;

/// Package name of the development server.
pub const DEV_SERVER_PACKAGE: &str = "packcli-dev-server";
/// Overrides the development server executable.
pub const DEV_SERVER_VAR: &str = "PACKCLI_DEV_SERVER";

/// Errors raised by the development server port.
#[derive(Debug, Error)]
pub enum DevServerError {
    /// The server executable could not be started.
    #[error("Unable to run dev server '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The server exited with a failure status.
    #[error("Dev server exited with {0}")]
    Exited(String),

    /// Encoding the request failed.
    #[error("Malformed dev server request: {0}")]
    Json(#[from] serde_json::Error),

    /// Talking to the server process failed.
    #[error("Dev server I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the development server needs to start.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServeRequest {
    /// Resolved build configurations, in order.
    pub configs: Vec<Value>,
    /// Reconciled `devServer` options, one per served configuration.
    pub dev_server: Vec<Value>,
}

/// A development server.
pub trait DevServer: Send + Sync {
    /// Server version, `None` when it is not installed.
    fn version(&self) -> BoxFuture<'_, Option<String>>;

    /// Runs the server until it exits.
    fn start<'a>(&'a self, request: &'a ServeRequest) -> BoxFuture<'a, Result<(), DevServerError>>;
}

/// Runs a development server executable.
#[derive(Debug, Clone)]
pub struct ProcessDevServer {
    program: PathBuf,
}

impl ProcessDevServer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `PACKCLI_DEV_SERVER` when set, `packcli-dev-server` otherwise.
    pub fn from_env() -> Self {
        match std::env::var_os(DEV_SERVER_VAR).filter(|value| !value.is_empty()) {
            Some(program) => Self::new(program),
            None => Self::new(DEV_SERVER_PACKAGE),
        }
    }
}

impl DevServer for ProcessDevServer {
    fn version(&self) -> BoxFuture<'_, Option<String>> {
        async move {
            let output = Command::new(&self.program)
                .arg("--version")
                .stdin(Stdio::null())
                .stderr(Stdio::null())
                .output()
                .await
                .ok()?;
            output
                .status
                .success()
                .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
        }
        .boxed()
    }

    fn start<'a>(&'a self, request: &'a ServeRequest) -> BoxFuture<'a, Result<(), DevServerError>> {
        async move {
            info!(server = %self.program.display(), configs = request.configs.len(), "starting dev server");
            let mut child = Command::new(&self.program)
                .stdin(Stdio::piped())
                .spawn()
                .map_err(|source| DevServerError::Spawn {
                    program: self.program.display().to_string(),
                    source,
                })?;
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(&serde_json::to_vec(request)?).await?;
                stdin.shutdown().await?;
            }
            let status = child.wait().await?;
            if status.success() {
                Ok(())
            } else {
                Err(DevServerError::Exited(status.to_string()))
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_is_camel_case() {
        let request = ServeRequest {
            configs: vec![json!({"mode": "development"})],
            dev_server: vec![json!({"port": 8080})],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"configs": [{"mode": "development"}], "devServer": [{"port": 8080}]})
        );
    }
}
