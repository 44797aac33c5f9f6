//! Known commands and command plugins.
//!
//! The set of commands packcli knows about is closed: built-ins run inside
//! the driver, externals live in packages resolved through the
//! [`PackagePort`](crate::PackagePort). A loaded package exposes a
//! [`CommandPlugin`] that registers its commands.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use futures::FutureExt;
use tokio::process::Command;
use tracing::debug;

use crate::context::CliContext;
use crate::error::{CliError, Result};
use crate::registry::{CommandAction, CommandRegistry, CommandSpec, Invocation, OptionsProvider};

/// Package providing `serve`.
pub const SERVE_PACKAGE: &str = "packcli-serve";
/// Package providing `info`.
pub const INFO_PACKAGE: &str = "packcli-info";
/// Package providing `configtest`.
pub const CONFIGTEST_PACKAGE: &str = "packcli-configtest";
/// Package providing the project scaffolding commands.
pub const GENERATORS_PACKAGE: &str = "packcli-generators";

/// Commands implemented by the driver itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltIn {
    Build,
    Watch,
    Version,
    Help,
}

/// Where a known command comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    BuiltIn(BuiltIn),
    /// Provided by the named package.
    External(&'static str),
}

/// Entry of the known-command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownCommand {
    /// Name with positional placeholders.
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub usage: Option<&'static str>,
    pub kind: CommandKind,
}

impl KnownCommand {
    pub fn command_name(&self) -> &'static str {
        self.name.split_whitespace().next().unwrap_or(self.name)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.command_name() == name || self.aliases.contains(&name)
    }

    /// Registration spec for this command.
    pub fn spec(&self) -> CommandSpec {
        let mut spec = CommandSpec::new(self.name)
            .with_aliases(self.aliases)
            .with_description(self.description);
        if let Some(usage) = self.usage {
            spec = spec.with_usage(usage);
        }
        if let CommandKind::External(package) = self.kind {
            spec = spec.with_package(package);
        }
        spec
    }
}

/// Every command packcli knows, in help order.
pub const KNOWN_COMMANDS: &[KnownCommand] = &[
    KnownCommand {
        name: "build [entries...]",
        aliases: &["bundle", "b"],
        description: "Run packcli (default command, can be omitted).",
        usage: Some("[entries...] [options]"),
        kind: CommandKind::BuiltIn(BuiltIn::Build),
    },
    KnownCommand {
        name: "watch [entries...]",
        aliases: &["w"],
        description: "Run packcli and watch for files changes.",
        usage: Some("[entries...] [options]"),
        kind: CommandKind::BuiltIn(BuiltIn::Watch),
    },
    KnownCommand {
        name: "version [commands...]",
        aliases: &["v"],
        description: "Output the version number of 'packcli-engine', 'packcli' and 'packcli-dev-server' and commands.",
        usage: None,
        kind: CommandKind::BuiltIn(BuiltIn::Version),
    },
    KnownCommand {
        name: "help [command] [option]",
        aliases: &["h"],
        description: "Display help for commands and options.",
        usage: None,
        kind: CommandKind::BuiltIn(BuiltIn::Help),
    },
    KnownCommand {
        name: "serve [entries...]",
        aliases: &["server", "s"],
        description: "Run the dev server and watch for source file changes while serving.",
        usage: Some("[entries...] [options]"),
        kind: CommandKind::External(SERVE_PACKAGE),
    },
    KnownCommand {
        name: "info",
        aliases: &["i"],
        description: "Outputs information about your system.",
        usage: Some("[options]"),
        kind: CommandKind::External(INFO_PACKAGE),
    },
    KnownCommand {
        name: "init [generation-path]",
        aliases: &["create", "new", "c", "n"],
        description: "Initialize a new project.",
        usage: Some("[generation-path] [options]"),
        kind: CommandKind::External(GENERATORS_PACKAGE),
    },
    KnownCommand {
        name: "loader [output-path]",
        aliases: &["l"],
        description: "Scaffold a loader.",
        usage: Some("[output-path] [options]"),
        kind: CommandKind::External(GENERATORS_PACKAGE),
    },
    KnownCommand {
        name: "plugin [output-path]",
        aliases: &["p"],
        description: "Scaffold a plugin.",
        usage: Some("[output-path] [options]"),
        kind: CommandKind::External(GENERATORS_PACKAGE),
    },
    KnownCommand {
        name: "configtest [config-path]",
        aliases: &["t"],
        description: "Validate a packcli configuration.",
        usage: Some("[config-path]"),
        kind: CommandKind::External(CONFIGTEST_PACKAGE),
    },
];

/// Looks up a known command by name or alias.
///
/// # Examples
///
/// ```
/// use packcli::{CommandKind, find_known};
///
/// let serve = find_known("s").unwrap();
/// assert_eq!(serve.command_name(), "serve");
/// assert_eq!(serve.kind, CommandKind::External("packcli-serve"));
/// assert!(find_known("deploy").is_none());
/// ```
pub fn find_known(name: &str) -> Option<&'static KnownCommand> {
    KNOWN_COMMANDS.iter().find(|command| command.matches(name))
}

/// A package's entry point: registers the commands it provides.
pub trait CommandPlugin: Send {
    fn register(&self, registry: &mut CommandRegistry, ctx: &Arc<CliContext>) -> Result<()>;
}

/// Commands provided by an executable found on `PATH`.
///
/// Every known command owned by the package is registered as a passthrough
/// command that runs `<executable> <command> <args...>`.
#[derive(Debug, Clone)]
pub struct ExecPlugin {
    package: String,
    executable: PathBuf,
}

impl ExecPlugin {
    pub fn new(package: impl Into<String>, executable: impl Into<PathBuf>) -> Self {
        Self {
            package: package.into(),
            executable: executable.into(),
        }
    }
}

impl CommandPlugin for ExecPlugin {
    fn register(&self, registry: &mut CommandRegistry, _ctx: &Arc<CliContext>) -> Result<()> {
        let owned = KNOWN_COMMANDS
            .iter()
            .filter(|command| matches!(command.kind, CommandKind::External(package) if package == self.package));
        for known in owned {
            let executable = self.executable.clone();
            let action: Arc<dyn CommandAction> =
                Arc::new(move |_ctx: Arc<CliContext>, invocation: Invocation| {
                    run_executable(executable.clone(), invocation).boxed()
                });
            registry.register(known.spec().passthrough(), OptionsProvider::Static(Vec::new()), action)?;
        }
        Ok(())
    }
}

async fn run_executable(executable: PathBuf, invocation: Invocation) -> Result<i32> {
    debug!(executable = %executable.display(), command = %invocation.command, "running command package");
    let status = Command::new(&executable)
        .arg(&invocation.command)
        .args(&invocation.operands)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|source| CliError::Io {
            context: format!("Unable to run '{}'", executable.display()),
            source,
        })?;
    Ok(status.code().unwrap_or(2))
}
