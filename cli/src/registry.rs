//! Command registry.
//!
//! Commands are registered lazily, only when they are about to run or when
//! help needs them. Registration is idempotent: a command whose name or any
//! alias is already taken is skipped. Before a command's options are
//! computed, its package dependencies are checked, and installed when
//! missing and the registry is not rendering help.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use packcli_core::FlagDefinition;
use tracing::debug;

use crate::context::CliContext;
use crate::error::Result;
use crate::logger::Logger;
use crate::option::{OptionTable, OptionValues};
use crate::packages::{PackagePort, install_required};

/// Name of the driver's own package.
pub const CLI_PACKAGE: &str = "packcli";

/// Future returned by command actions; resolves to the exit code.
pub type ActionFuture = BoxFuture<'static, Result<i32>>;

/// What a command does once its arguments are parsed.
pub trait CommandAction: Send + Sync {
    fn run(&self, ctx: Arc<CliContext>, invocation: Invocation) -> ActionFuture;
}

impl<F> CommandAction for F
where
    F: Fn(Arc<CliContext>, Invocation) -> ActionFuture + Send + Sync,
{
    fn run(&self, ctx: Arc<CliContext>, invocation: Invocation) -> ActionFuture {
        self(ctx, invocation)
    }
}

/// One parsed invocation of a command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    /// Canonical command name.
    pub command: String,
    /// Positional arguments, or every raw argument for passthrough
    /// commands.
    pub operands: Vec<String>,
    pub values: OptionValues,
    /// `--color` / `--no-color`, when given.
    pub color: Option<bool>,
}

/// Static description of a command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandSpec {
    /// Name, optionally followed by positional placeholders such as
    /// `build [entries...]`.
    pub name: String,
    pub aliases: Vec<String>,
    pub description: String,
    pub usage: Option<String>,
    /// Packages that must be installed before options can be computed.
    pub dependencies: Vec<String>,
    /// Owning package; the driver itself when `None`.
    pub package: Option<String>,
    pub hidden: bool,
    /// Arguments are forwarded untouched instead of parsed.
    pub passthrough: bool,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|alias| alias.to_string()).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn with_dependency(mut self, package: impl Into<String>) -> Self {
        self.dependencies.push(package.into());
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn passthrough(mut self) -> Self {
        self.passthrough = true;
        self
    }

    /// Name without positional placeholders.
    pub fn command_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.command_name() == name || self.aliases.iter().any(|alias| alias == name)
    }

    pub fn package(&self) -> &str {
        self.package.as_deref().unwrap_or(CLI_PACKAGE)
    }

    /// `build|bundle|b [entries...]`, as listed in help.
    pub fn display_name(&self) -> String {
        let mut names = vec![self.command_name().to_string()];
        names.extend(self.aliases.iter().cloned());
        let mut display = names.join("|");
        if let Some((_, placeholders)) = self.name.split_once(' ') {
            display.push(' ');
            display.push_str(placeholders);
        }
        display
    }
}

/// Where a command's options come from.
pub enum OptionsProvider {
    Static(Vec<FlagDefinition>),
    /// Computed only after dependencies are known to be installed.
    Deferred(Box<dyn FnOnce() -> Result<Vec<FlagDefinition>> + Send>),
}

impl OptionsProvider {
    pub fn deferred<F>(provider: F) -> Self
    where
        F: FnOnce() -> Result<Vec<FlagDefinition>> + Send + 'static,
    {
        Self::Deferred(Box::new(provider))
    }
}

impl fmt::Debug for OptionsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(flags) => f.debug_tuple("Static").field(&flags.len()).finish(),
            Self::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// A command ready to run.
pub struct RegisteredCommand {
    pub spec: CommandSpec,
    pub options: OptionTable,
    action: Arc<dyn CommandAction>,
}

impl RegisteredCommand {
    pub fn action(&self) -> Arc<dyn CommandAction> {
        self.action.clone()
    }
}

impl fmt::Debug for RegisteredCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredCommand")
            .field("spec", &self.spec)
            .field("options", &self.options.len())
            .finish_non_exhaustive()
    }
}

/// Registered commands, in registration order.
pub struct CommandRegistry {
    commands: Vec<RegisteredCommand>,
    packages: Arc<dyn PackagePort>,
    logger: Logger,
    for_help: bool,
}

impl CommandRegistry {
    pub fn new(packages: Arc<dyn PackagePort>, logger: Logger) -> Self {
        Self {
            commands: Vec::new(),
            packages,
            logger,
            for_help: false,
        }
    }

    /// In help mode missing dependencies withhold options instead of being
    /// installed.
    pub fn set_for_help(&mut self, for_help: bool) {
        self.for_help = for_help;
    }

    pub fn for_help(&self) -> bool {
        self.for_help
    }

    pub fn packages(&self) -> &Arc<dyn PackagePort> {
        &self.packages
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Finds a command by name or alias.
    pub fn find(&self, name: &str) -> Option<&RegisteredCommand> {
        self.commands.iter().find(|command| command.spec.matches(name))
    }

    pub fn commands(&self) -> &[RegisteredCommand] {
        &self.commands
    }

    /// Registers a command.
    ///
    /// Returns `Ok(None)` when the name or an alias is already taken.
    pub fn register(
        &mut self,
        mut spec: CommandSpec,
        options: OptionsProvider,
        action: Arc<dyn CommandAction>,
    ) -> Result<Option<&RegisteredCommand>> {
        let taken = self.commands.iter().any(|command| {
            command.spec.matches(spec.command_name())
                || spec.aliases.iter().any(|alias| command.spec.matches(alias))
        });
        if taken {
            debug!(command = spec.command_name(), "command already registered");
            return Ok(None);
        }

        let mut all_installed = true;
        for dependency in &spec.dependencies {
            if self.packages.exists(dependency) {
                continue;
            }
            if self.for_help {
                all_installed = false;
                continue;
            }
            self.logger.error(format!(
                "For using '{}' command you need to install: '{dependency}' package.",
                spec.command_name()
            ));
            install_required(self.packages.as_ref(), dependency)?;
        }

        let flags = match options {
            OptionsProvider::Static(flags) => flags,
            OptionsProvider::Deferred(_) if !all_installed => {
                let dependencies = spec
                    .dependencies
                    .iter()
                    .map(|dependency| format!("'{dependency}'"))
                    .collect::<Vec<_>>()
                    .join(", ");
                spec.description = format!(
                    "{} To see all available options you need to install {dependencies}.",
                    spec.description
                );
                Vec::new()
            }
            OptionsProvider::Deferred(provider) => provider()?,
        };

        debug!(command = spec.command_name(), options = flags.len(), "registered command");
        self.commands.push(RegisteredCommand {
            spec,
            options: OptionTable::from_flags(&flags),
            action,
        });
        Ok(self.commands.last())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::CliError;
    use crate::packages::PackageError;
    use futures::FutureExt;
    use packcli_core::ValueKind;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use crate::plugin::CommandPlugin;

    /// Package port backed by a fixed set of installed packages.
    #[derive(Default)]
    pub(crate) struct FakePackages {
        pub(crate) installed: Mutex<HashSet<String>>,
        pub(crate) allow_install: bool,
    }

    impl FakePackages {
        pub(crate) fn with(packages: &[&str]) -> Self {
            Self {
                installed: Mutex::new(packages.iter().map(|p| p.to_string()).collect()),
                allow_install: false,
            }
        }
    }

    impl PackagePort for FakePackages {
        fn exists(&self, package: &str) -> bool {
            self.installed.lock().unwrap().contains(package)
        }

        fn install(&self, package: &str) -> std::result::Result<(), PackageError> {
            if !self.allow_install {
                return Err(PackageError::Declined {
                    package: package.to_string(),
                });
            }
            self.installed.lock().unwrap().insert(package.to_string());
            Ok(())
        }

        fn load(&self, package: &str) -> std::result::Result<Box<dyn CommandPlugin>, PackageError> {
            Err(PackageError::NotFound {
                package: package.to_string(),
            })
        }

        fn version(&self, package: &str) -> Option<String> {
            self.exists(package).then(|| "1.0.0".to_string())
        }
    }

    fn noop() -> Arc<dyn CommandAction> {
        Arc::new(|_: Arc<CliContext>, _: Invocation| async { Ok::<i32, CliError>(0) }.boxed())
    }

    fn flags() -> OptionsProvider {
        OptionsProvider::deferred(|| {
            Ok(vec![FlagDefinition::new("port").with_kind(ValueKind::Number)])
        })
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = CommandRegistry::new(Arc::new(FakePackages::default()), Logger::capture());
        let spec = CommandSpec::new("build [entries...]").with_aliases(&["bundle", "b"]);
        assert!(registry.register(spec.clone(), OptionsProvider::Static(vec![]), noop()).unwrap().is_some());
        assert!(registry.register(spec, OptionsProvider::Static(vec![]), noop()).unwrap().is_none());

        let clash = CommandSpec::new("other").with_aliases(&["b"]);
        assert!(registry.register(clash, OptionsProvider::Static(vec![]), noop()).unwrap().is_none());
        assert_eq!(registry.commands().len(), 1);
        assert!(registry.find("bundle").is_some());
    }

    #[test]
    fn test_help_withholds_options_of_missing_dependency() {
        let mut registry = CommandRegistry::new(Arc::new(FakePackages::default()), Logger::capture());
        registry.set_for_help(true);
        let spec = CommandSpec::new("serve")
            .with_description("Run the dev server.")
            .with_dependency("packcli-dev-server");
        let command = registry.register(spec, flags(), noop()).unwrap().unwrap();
        assert!(command.options.is_empty());
        assert_eq!(
            command.spec.description,
            "Run the dev server. To see all available options you need to install 'packcli-dev-server'."
        );
    }

    #[test]
    fn test_missing_dependency_is_fatal_when_running() {
        let logger = Logger::capture();
        let mut registry = CommandRegistry::new(Arc::new(FakePackages::default()), logger.clone());
        let spec = CommandSpec::new("serve").with_dependency("packcli-dev-server");
        let error = registry.register(spec, flags(), noop()).unwrap_err();
        assert!(matches!(error, CliError::MissingDependency { .. }));
        assert_eq!(
            logger.lines(),
            vec!["[packcli] For using 'serve' command you need to install: 'packcli-dev-server' package."]
        );
    }

    #[test]
    fn test_installed_dependency_yields_options() {
        let packages = FakePackages {
            allow_install: true,
            ..FakePackages::default()
        };
        let mut registry = CommandRegistry::new(Arc::new(packages), Logger::capture());
        let spec = CommandSpec::new("serve").with_dependency("packcli-dev-server");
        let command = registry.register(spec, flags(), noop()).unwrap().unwrap();
        assert!(command.options.get("port").is_some());
        assert!(registry.packages().exists("packcli-dev-server"));
    }

    #[test]
    fn test_display_name() {
        let spec = CommandSpec::new("build [entries...]").with_aliases(&["bundle", "b"]);
        assert_eq!(spec.display_name(), "build|bundle|b [entries...]");
        assert_eq!(spec.command_name(), "build");
        assert_eq!(spec.package(), "packcli");
    }
}
