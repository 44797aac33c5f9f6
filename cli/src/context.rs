//! Shared state of one packcli process.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use packcli_config::{FileModuleLoader, ModuleLoader};

use crate::dev_server::{DevServer, ProcessDevServer};
use crate::engine::{BuildEngine, ProcessEngine};
use crate::error::{CliError, Result};
use crate::logger::Logger;
use crate::packages::{LocalPackages, PackagePort};

/// Working directory, output and the external collaborators.
pub struct CliContext {
    pub cwd: PathBuf,
    pub logger: Logger,
    pub engine: Arc<dyn BuildEngine>,
    pub dev_server: Arc<dyn DevServer>,
    pub packages: Arc<dyn PackagePort>,
    /// Replaces the file loader built from `--disable-interpret`.
    pub modules: Option<Arc<dyn ModuleLoader>>,
    /// `BUILD_ENV` of the process.
    pub build_env: Option<String>,
    /// Whether stdout supports colors when neither `--color` nor the
    /// configuration decides.
    pub color_supported: bool,
}

impl CliContext {
    pub fn new(
        cwd: impl Into<PathBuf>,
        logger: Logger,
        engine: Arc<dyn BuildEngine>,
        dev_server: Arc<dyn DevServer>,
        packages: Arc<dyn PackagePort>,
    ) -> Self {
        Self {
            cwd: cwd.into(),
            logger,
            engine,
            dev_server,
            packages,
            modules: None,
            build_env: None,
            color_supported: false,
        }
    }

    /// Context of the running process.
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|source| CliError::Io {
            context: "Unable to read the working directory".to_string(),
            source,
        })?;
        let logger = Logger::new();
        let mut ctx = Self::new(
            cwd,
            logger.clone(),
            Arc::new(ProcessEngine::from_env()),
            Arc::new(ProcessDevServer::from_env()),
            Arc::new(LocalPackages::from_env(logger)),
        );
        ctx.build_env = std::env::var("BUILD_ENV").ok().filter(|value| !value.is_empty());
        ctx.color_supported = std::io::stdout().is_terminal();
        Ok(ctx)
    }

    pub fn with_modules(mut self, modules: Arc<dyn ModuleLoader>) -> Self {
        self.modules = Some(modules);
        self
    }

    pub fn with_build_env(mut self, build_env: impl Into<String>) -> Self {
        self.build_env = Some(build_env.into());
        self
    }

    /// Module loader for one invocation.
    pub fn module_loader(&self, disable_interpret: bool, build_env: Option<String>) -> Arc<dyn ModuleLoader> {
        match &self.modules {
            Some(modules) => modules.clone(),
            None => Arc::new(
                FileModuleLoader::new()
                    .with_disable_interpret(disable_interpret)
                    .with_build_env(build_env),
            ),
        }
    }

    /// Context with a capturing logger, no engine and no installed
    /// packages beyond the built-in ones.
    #[cfg(test)]
    pub(crate) fn for_tests(cwd: impl Into<PathBuf>) -> Self {
        let logger = Logger::capture();
        Self::new(
            cwd,
            logger.clone(),
            Arc::new(ProcessEngine::new("/nonexistent/packcli-engine")),
            Arc::new(ProcessDevServer::new("/nonexistent/packcli-dev-server")),
            Arc::new(LocalPackages::new(logger, None)),
        )
    }
}
