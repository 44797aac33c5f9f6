//! Package port: existence checks, installation and command loading.
//!
//! [`LocalPackages`] knows the command packages built into this binary and
//! resolves every other package to an executable of the same name on
//! `PATH`. Installation asks on the terminal and runs `cargo install`.

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info};

use crate::commands::configtest::ConfigtestPlugin;
use crate::commands::info::InfoPlugin;
use crate::commands::serve::ServePlugin;
use crate::dev_server::{DEV_SERVER_PACKAGE, DEV_SERVER_VAR};
use crate::engine::{ENGINE_PACKAGE, ENGINE_VAR};
use crate::error::CliError;
use crate::logger::Logger;
use crate::plugin::{CONFIGTEST_PACKAGE, CommandPlugin, ExecPlugin, INFO_PACKAGE, SERVE_PACKAGE};
use crate::registry::CLI_PACKAGE;

/// Package needed by `--analyze`.
pub const BUNDLE_ANALYZER_PACKAGE: &str = "packcli-bundle-analyzer";

/// Errors raised by the package port.
#[derive(Debug, Error)]
pub enum PackageError {
    /// The user refused the installation.
    #[error("{package} needs to be installed in order to run the command.")]
    Declined { package: String },

    /// The installer ran and failed.
    #[error("Installation of '{package}' failed: {message}")]
    InstallFailed { package: String, message: String },

    /// The package is not installed.
    #[error("Package '{package}' not found")]
    NotFound { package: String },
}

/// Resolves, installs and loads packages.
pub trait PackagePort: Send + Sync {
    fn exists(&self, package: &str) -> bool;

    /// Installs `package`, asking first when interactive.
    fn install(&self, package: &str) -> Result<(), PackageError>;

    /// Loads the command plugin of an installed package.
    fn load(&self, package: &str) -> Result<Box<dyn CommandPlugin>, PackageError>;

    /// Installed version, `None` when missing.
    fn version(&self, package: &str) -> Option<String>;
}

/// Installs a package the current command cannot run without.
///
/// A refused installation becomes [`CliError::MissingDependency`].
pub fn install_required(packages: &dyn PackagePort, package: &str) -> crate::error::Result<()> {
    packages.install(package).map_err(|error| match error {
        PackageError::Declined { package } => CliError::MissingDependency { package },
        other => other.into(),
    })
}

/// Packages built into this binary or found on `PATH`.
#[derive(Debug, Clone)]
pub struct LocalPackages {
    logger: Logger,
    search_path: Option<OsString>,
    overrides: HashMap<String, PathBuf>,
}

impl LocalPackages {
    pub fn new(logger: Logger, search_path: Option<OsString>) -> Self {
        Self {
            logger,
            search_path,
            overrides: HashMap::new(),
        }
    }

    /// Uses `PATH`, plus the engine and dev server overrides from the
    /// environment.
    pub fn from_env(logger: Logger) -> Self {
        let mut packages = Self::new(logger, std::env::var_os("PATH"));
        for (package, var) in [(ENGINE_PACKAGE, ENGINE_VAR), (DEV_SERVER_PACKAGE, DEV_SERVER_VAR)] {
            if let Some(path) = std::env::var_os(var).filter(|path| !path.is_empty()) {
                packages = packages.with_override(package, path);
            }
        }
        packages
    }

    /// Resolves `package` to `executable` instead of searching `PATH`.
    pub fn with_override(mut self, package: &str, executable: impl Into<PathBuf>) -> Self {
        self.overrides.insert(package.to_string(), executable.into());
        self
    }

    fn is_builtin(package: &str) -> bool {
        matches!(
            package,
            CLI_PACKAGE | SERVE_PACKAGE | INFO_PACKAGE | CONFIGTEST_PACKAGE
        )
    }

    /// Executable for `package`, from the overrides or `PATH`.
    pub fn find_executable(&self, package: &str) -> Option<PathBuf> {
        if let Some(path) = self.overrides.get(package) {
            return Some(path.clone());
        }
        let search_path = self.search_path.as_ref()?;
        std::env::split_paths(search_path)
            .map(|dir| dir.join(package))
            .find(|candidate| is_executable(candidate))
    }

    fn confirm(&self, package: &str, input: &mut impl BufRead) -> bool {
        self.logger.info(format!(
            "Would you like to install '{package}' package? (That will run 'cargo install {package}') (Y/n)"
        ));
        let mut answer = String::new();
        match input.read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "" | "y" | "yes"),
        }
    }

    fn install_blocking(&self, package: &str) -> Result<(), PackageError> {
        if !self.confirm(package, &mut std::io::stdin().lock()) {
            return Err(PackageError::Declined {
                package: package.to_string(),
            });
        }
        info!(package, "installing package");
        let status = Command::new("cargo")
            .args(["install", package])
            .stdin(Stdio::null())
            .status()
            .map_err(|error| PackageError::InstallFailed {
                package: package.to_string(),
                message: error.to_string(),
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(PackageError::InstallFailed {
                package: package.to_string(),
                message: status.to_string(),
            })
        }
    }
}

/// Runs blocking work from synchronous code that may be running on a runtime
/// worker, letting the runtime move its other tasks elsewhere first.
fn blocking<T>(work: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &std::path::Path) -> bool {
    path.is_file()
}

impl PackagePort for LocalPackages {
    fn exists(&self, package: &str) -> bool {
        Self::is_builtin(package) || self.find_executable(package).is_some()
    }

    fn install(&self, package: &str) -> Result<(), PackageError> {
        blocking(|| self.install_blocking(package))
    }

    fn load(&self, package: &str) -> Result<Box<dyn CommandPlugin>, PackageError> {
        debug!(package, "loading command package");
        match package {
            SERVE_PACKAGE => Ok(Box::new(ServePlugin)),
            INFO_PACKAGE => Ok(Box::new(InfoPlugin)),
            CONFIGTEST_PACKAGE => Ok(Box::new(ConfigtestPlugin)),
            _ => self
                .find_executable(package)
                .map(|executable| Box::new(ExecPlugin::new(package, executable)) as Box<dyn CommandPlugin>)
                .ok_or_else(|| PackageError::NotFound {
                    package: package.to_string(),
                }),
        }
    }

    fn version(&self, package: &str) -> Option<String> {
        if Self::is_builtin(package) {
            return Some(env!("CARGO_PKG_VERSION").to_string());
        }
        let executable = self.find_executable(package)?;
        let output = Command::new(executable)
            .arg("--version")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
    }
}
