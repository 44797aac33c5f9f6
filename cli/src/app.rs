//! Top-level dispatch: global flags, help, version and command execution.

use std::sync::Arc;

use futures::FutureExt;
use tracing::debug;

use crate::argv::parse_args;
use crate::commands::build;
use crate::context::CliContext;
use crate::dev_server::DEV_SERVER_PACKAGE;
use crate::engine::ENGINE_PACKAGE;
use crate::error::{CliError, Result};
use crate::help::{HELP_FOOTER, global_flags, render_command_help, render_global_help, render_option_help};
use crate::option::{CompiledOption, OptionTable};
use crate::packages::install_required;
use crate::plugin::{BuiltIn, CommandKind, KNOWN_COMMANDS, KnownCommand, find_known};
use crate::prepare::RunMode;
use crate::registry::{CLI_PACKAGE, CommandAction, CommandRegistry, Invocation, OptionsProvider};
use crate::suggest::levenshtein_distance;

const DEFAULT_COMMAND: &str = "build";

/// How `--help` was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HelpRequest {
    Standard,
    Verbose,
}

/// Flags accepted anywhere before `--`, split off the rest of argv.
#[derive(Debug, Default, PartialEq)]
struct GlobalArgs {
    color: Option<bool>,
    version: bool,
    help: Option<HelpRequest>,
    rest: Vec<String>,
}

impl GlobalArgs {
    fn split(args: &[String]) -> Result<Self> {
        let mut global = Self::default();
        let mut tokens = args.iter().peekable();
        while let Some(arg) = tokens.next() {
            match arg.as_str() {
                "--" => {
                    global.rest.push(arg.clone());
                    global.rest.extend(tokens.by_ref().cloned());
                }
                "--color" => global.color = Some(true),
                "--no-color" => global.color = Some(false),
                "-v" | "--version" => global.version = true,
                "-h" | "--help" => {
                    global.help = Some(HelpRequest::Standard);
                    if tokens.next_if(|next| next.as_str() == "verbose").is_some() {
                        global.help = Some(HelpRequest::Verbose);
                    }
                }
                _ => match arg.strip_prefix("--help=") {
                    Some("verbose") => global.help = Some(HelpRequest::Verbose),
                    Some(_) => {
                        return Err(CliError::Usage(
                            "Unknown value for '--help' option, please use '--help=verbose'".to_string(),
                        ));
                    }
                    None => global.rest.push(arg.clone()),
                },
            }
        }
        Ok(global)
    }
}

fn is_option(arg: &str) -> bool {
    arg.starts_with('-')
}

fn is_builtin(name: &str, builtin: BuiltIn) -> bool {
    find_known(name).is_some_and(|known| known.kind == CommandKind::BuiltIn(builtin))
}

/// The packcli program.
pub struct Cli {
    ctx: Arc<CliContext>,
    registry: CommandRegistry,
    global: OptionTable,
}

impl Cli {
    pub fn new(ctx: CliContext) -> Self {
        let registry = CommandRegistry::new(ctx.packages.clone(), ctx.logger.clone());
        Self {
            ctx: Arc::new(ctx),
            registry,
            global: OptionTable::from_flags(&global_flags()),
        }
    }

    pub fn context(&self) -> &Arc<CliContext> {
        &self.ctx
    }

    /// Runs one command line (without the program name) and returns the
    /// exit code.
    pub async fn run(&mut self, args: Vec<String>) -> Result<i32> {
        let global = GlobalArgs::split(&args)?;
        let split = global
            .rest
            .iter()
            .position(|arg| is_option(arg))
            .unwrap_or(global.rest.len());
        let (operands, unknown) = global.rest.split_at(split);
        let has_operand = !operands.is_empty();
        let operand = operands.first().map_or(DEFAULT_COMMAND, String::as_str);
        debug!(operand, ?operands, "dispatching");

        let help_syntax = is_builtin(operand, BuiltIn::Help);
        if global.help.is_some() || help_syntax {
            let mut help_args: Vec<String> = Vec::new();
            if global.help.is_some() && has_operand {
                help_args.push(operand.to_string());
            }
            help_args.extend(operands.iter().skip(1).cloned());
            help_args.extend(unknown.iter().cloned());
            if help_syntax {
                if let Some(color) = global.color {
                    help_args.push(if color { "--color" } else { "--no-color" }.to_string());
                }
                if global.version {
                    help_args.push("--version".to_string());
                }
            }
            let verbose = global.help == Some(HelpRequest::Verbose);
            return self.output_help(&help_args, verbose, help_syntax);
        }

        let version_syntax = is_builtin(operand, BuiltIn::Version);
        if global.version || version_syntax {
            let mut version_args: Vec<String> = Vec::new();
            if global.version {
                version_args.push(operand.to_string());
            }
            version_args.extend(operands.iter().skip(1).cloned());
            version_args.extend(unknown.iter().cloned());
            return self.output_version(&version_args).await;
        }

        let (command_name, command_args): (&str, Vec<String>) = if find_known(operand).is_some() {
            self.load_command(operand, true)?;
            let skip = usize::from(has_operand);
            (operand, global.rest.iter().skip(skip).cloned().collect())
        } else if self.ctx.cwd.join(operand).exists() {
            self.load_command(DEFAULT_COMMAND, true)?;
            (DEFAULT_COMMAND, global.rest.clone())
        } else {
            return Err(unknown_command(operand));
        };

        let Some(command) = self.registry.find(command_name) else {
            return Err(unknown_command(command_name));
        };
        let invocation = if command.spec.passthrough {
            Invocation {
                command: command.spec.command_name().to_string(),
                operands: command_args,
                values: Default::default(),
                color: global.color,
            }
        } else {
            let parsed = parse_args(&command.options, &command_args)?;
            Invocation {
                command: command.spec.command_name().to_string(),
                operands: parsed.operands,
                values: parsed.values,
                color: global.color,
            }
        };
        let action = command.action();
        debug!(command = %invocation.command, "running command");
        action.run(self.ctx.clone(), invocation).await
    }

    /// Registers a known command, installing its package when allowed.
    ///
    /// Without permission to install, a missing package leaves the command
    /// unregistered.
    fn load_command(&mut self, name: &str, allow_install: bool) -> Result<()> {
        let Some(known) = find_known(name) else {
            return Ok(());
        };
        if self.registry.find(known.command_name()).is_some() {
            return Ok(());
        }
        match known.kind {
            CommandKind::BuiltIn(BuiltIn::Build) => {
                build::register(&mut self.registry, &self.ctx, known, RunMode::Build)
            }
            CommandKind::BuiltIn(BuiltIn::Watch) => {
                build::register(&mut self.registry, &self.ctx, known, RunMode::Watch)
            }
            CommandKind::BuiltIn(BuiltIn::Version | BuiltIn::Help) => {
                self.register_stub(known)
            }
            CommandKind::External(package) => self.load_package(package, allow_install),
        }
    }

    /// `help` and `version` are answered before dispatch; their entries
    /// only exist for help output.
    fn register_stub(&mut self, known: &KnownCommand) -> Result<()> {
        let action: Arc<dyn CommandAction> =
            Arc::new(|_: Arc<CliContext>, _: Invocation| async { Ok::<i32, CliError>(0) }.boxed());
        self.registry
            .register(known.spec(), OptionsProvider::Static(Vec::new()), action)?;
        Ok(())
    }

    fn load_package(&mut self, package: &str, allow_install: bool) -> Result<()> {
        let packages = self.ctx.packages.clone();
        if !packages.exists(package) {
            if !allow_install {
                debug!(package, "command package not installed");
                return Ok(());
            }
            self.ctx.logger.error(format!(
                "For using this command you need to install: '{package}' package."
            ));
            install_required(packages.as_ref(), package)?;
        }
        let plugin = match packages.load(package) {
            Ok(plugin) => plugin,
            Err(error) if allow_install => return Err(error.into()),
            Err(error) => {
                debug!(package, %error, "command package not loadable");
                return Ok(());
            }
        };
        plugin
            .register(&mut self.registry, &self.ctx)
            .map_err(|error| CliError::Usage(format!("Unable to load '{package}' command\n{error}")))
    }

    fn output_help(&mut self, args: &[String], verbose: bool, help_syntax: bool) -> Result<i32> {
        self.registry.set_for_help(true);
        let logger = self.ctx.logger.clone();

        if args.is_empty() {
            for known in KNOWN_COMMANDS {
                self.load_command(known.command_name(), false)?;
            }
            logger.raw(render_global_help(&self.registry, &self.global, verbose).trim_end());
        } else if args.len() == 1 && !is_option(&args[0]) {
            let name = &args[0];
            self.load_command(name, false)?;
            let Some(command) = self.registry.find(name) else {
                return Err(CliError::usage(format!("Can't find and load command '{name}'")));
            };
            logger.raw(render_command_help(command, &self.global, verbose).trim_end());
        } else if help_syntax {
            let (command_name, option_name, command_given) = match args {
                [option] => (DEFAULT_COMMAND, option.as_str(), false),
                [command, option] if !is_option(command) => (command.as_str(), option.as_str(), true),
                _ => return Err(incorrect_help_usage()),
            };
            self.load_command(command_name, false)?;
            let Some(command) = self.registry.find(command_name) else {
                return Err(CliError::usage(format!(
                    "Can't find and load command '{command_name}'"
                )));
            };
            let Some((option, negated)) =
                lookup_option(&command.options, option_name).or_else(|| lookup_option(&self.global, option_name))
            else {
                return Err(CliError::usage(format!("Unknown option '{option_name}'")));
            };
            let usage_command = command_given.then(|| command.spec.command_name());
            for line in render_option_help(option, negated, usage_command) {
                logger.raw(line);
            }
        } else {
            return Err(incorrect_help_usage());
        }

        logger.raw(HELP_FOOTER);
        Ok(0)
    }

    async fn output_version(&mut self, args: &[String]) -> Result<i32> {
        let requested: Vec<&String> = args
            .iter()
            .filter(|arg| {
                ![BuiltIn::Build, BuiltIn::Watch, BuiltIn::Version, BuiltIn::Help]
                    .iter()
                    .any(|builtin| is_builtin(arg, *builtin))
            })
            .collect();
        if let Some(option) = requested.iter().find(|arg| is_option(arg)) {
            return Err(CliError::usage(format!("Unknown option '{option}'")));
        }

        let logger = self.ctx.logger.clone();
        for name in requested {
            self.load_command(name, false)?;
            let Some(command) = self.registry.find(name) else {
                return Err(CliError::usage(format!("Unknown command '{name}'")));
            };
            let package = command.spec.package().to_string();
            match self.ctx.packages.version(&package) {
                Some(version) => logger.raw(format!("{package} {version}")),
                None => {
                    return Err(CliError::Usage(format!(
                        "Error: External package '{package}' not found"
                    )));
                }
            }
        }

        let not_installed = || "not installed".to_string();
        let engine = self.ctx.engine.version().await.unwrap_or_else(not_installed);
        logger.raw(format!("{ENGINE_PACKAGE}: {engine}"));
        logger.raw(format!("{CLI_PACKAGE}: {}", env!("CARGO_PKG_VERSION")));
        let dev_server = self.ctx.dev_server.version().await.unwrap_or_else(not_installed);
        logger.raw(format!("{DEV_SERVER_PACKAGE} {dev_server}"));
        Ok(0)
    }
}

/// Finds `--name`, `--no-name` or `-a` in `table`.
fn lookup_option<'a>(table: &'a OptionTable, name: &str) -> Option<(&'a CompiledOption, bool)> {
    if let Some(long) = name.strip_prefix("--") {
        if let Some(option) = table.get(long) {
            return Some((option, false));
        }
        return long
            .strip_prefix("no-")
            .and_then(|positive| table.negated(positive))
            .map(|option| (option, true));
    }
    let mut chars = name.strip_prefix('-')?.chars();
    match (chars.next(), chars.next()) {
        (Some(alias), None) => table.by_alias(alias).map(|option| (option, false)),
        _ => None,
    }
}

fn incorrect_help_usage() -> CliError {
    CliError::usage(
        "Incorrect use of help\nPlease use: 'packcli help [command] [option]' | 'packcli [command] --help'",
    )
}

fn unknown_command(operand: &str) -> CliError {
    let mut message = format!("Unknown command or entry '{operand}'");
    let found = KNOWN_COMMANDS
        .iter()
        .find(|known| levenshtein_distance(operand, known.command_name()) < 3);
    if let Some(known) = found {
        message.push_str(&format!(
            "\nDid you mean '{}' (alias '{}')?",
            known.command_name(),
            known.aliases.join(", ")
        ));
    }
    CliError::usage(message)
}
