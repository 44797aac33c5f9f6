//! Help output.
//!
//! Layout is delegated to clap's help renderer: commands and option tables
//! are turned into a throwaway [`clap::Command`] built from the same args
//! [`parse_args`](crate::argv::parse_args) parses with.

use clap::Arg;
use packcli_core::{FlagDefinition, HelpLevel, ValueKind, display_scalar};

use crate::option::{Arity, CompiledOption, OptionTable};
use crate::registry::{CommandRegistry, RegisteredCommand};

/// Last line of every help output.
pub const HELP_FOOTER: &str =
    "To see list of all supported commands and options run 'packcli --help=verbose'.";

const GLOBAL_HEADING: &str = "Global options";

/// `--color`, `--version` and `--help`, accepted by every command.
pub fn global_flags() -> Vec<FlagDefinition> {
    vec![
        FlagDefinition::new("color")
            .with_kind(ValueKind::Boolean)
            .negatable()
            .with_description("Enable colors on console.")
            .with_negated_description("Disable colors on console.")
            .minimum(),
        FlagDefinition::new("version")
            .with_alias('v')
            .with_kind(ValueKind::Boolean)
            .with_description("Output the version number of 'packcli', 'packcli-engine' and 'packcli-dev-server' and commands.")
            .minimum(),
        FlagDefinition::new("help")
            .with_alias('h')
            .with_kind(ValueKind::Boolean)
            .with_kind(ValueKind::String)
            .with_value_name("verbose")
            .with_description("Display help for commands and options.")
            .minimum(),
    ]
}

/// The parser's args for `table`, dressed for rendering.
fn option_args(table: &OptionTable, verbose: bool, heading: Option<&'static str>) -> Vec<Arg> {
    let mut args = Vec::new();
    for option in table.iter() {
        let visible = verbose || option.help_level == HelpLevel::Minimum;
        args.push(
            option
                .clap_arg(table.short_for(option))
                .help(option.description.clone().unwrap_or_default())
                .hide(!visible || option.arity == Arity::Hidden)
                .help_heading(heading),
        );
        if let (Some(arg), Some(negation)) = (table.negation_arg(option), &option.negation) {
            args.push(arg.help(negation.clone()).hide(!visible).help_heading(heading));
        }
    }
    args
}

fn base_command(usage: String, about: String) -> clap::Command {
    clap::Command::new("packcli")
        .override_usage(usage)
        .about(about)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .disable_help_subcommand(true)
        .disable_colored_help(true)
}

/// Help for one command.
pub fn render_command_help(command: &RegisteredCommand, global: &OptionTable, verbose: bool) -> String {
    let spec = &command.spec;
    let usage = format!(
        "packcli {} {}",
        spec.display_name().split(' ').next().unwrap_or_default(),
        spec.usage.as_deref().unwrap_or("[options]")
    );
    let mut clap_command = base_command(usage, spec.description.clone())
        .args(option_args(&command.options, verbose, None))
        .args(option_args(global, verbose, Some(GLOBAL_HEADING)));
    clap_command.render_help().to_string()
}

/// Help for packcli itself: the default command's options and every
/// registered command.
pub fn render_global_help(registry: &CommandRegistry, global: &OptionTable, verbose: bool) -> String {
    let usage = "packcli [entries...] [options]\nAlternative usage to run commands: packcli [command] [options]".to_string();
    let build = registry.find("build");
    let about = build
        .map(|command| command.spec.description.clone())
        .unwrap_or_default();
    let mut clap_command = base_command(usage, about);
    if let Some(build) = build {
        clap_command = clap_command.args(option_args(&build.options, verbose, None));
    }
    clap_command = clap_command.args(option_args(global, verbose, Some(GLOBAL_HEADING)));
    for command in registry.commands().iter().filter(|command| !command.spec.hidden) {
        clap_command = clap_command.subcommand(
            clap::Command::new(command.spec.display_name()).about(command.spec.description.clone()),
        );
    }
    clap_command.render_help().to_string()
}

/// Help for a single option, e.g. `packcli help --mode`.
///
/// `negated` renders the `--no-<name>` form; `command` is included in the
/// usage line when the user named one.
pub fn render_option_help(option: &CompiledOption, negated: bool, command: Option<&str>) -> Vec<String> {
    let prefix = match command {
        Some(command) => format!("packcli {command}"),
        None => "packcli".to_string(),
    };
    let mut lines = Vec::new();

    if negated {
        lines.push(format!("Usage: {prefix} --no-{}", option.name));
        if let Some(description) = &option.negation {
            lines.push(format!("Description: {description}"));
        }
        return lines;
    }

    let value = option.placeholder().map(|value| format!(" {value}")).unwrap_or_default();
    lines.push(format!("Usage: {prefix} --{}{value}", option.name));
    if let Some(alias) = option.alias {
        lines.push(format!("Short: {prefix} -{alias}{value}"));
    }
    if let Some(description) = &option.description {
        lines.push(format!("Description: {description}"));
    }
    if let Some(default) = &option.default_value {
        lines.push(format!("Default value: {default}"));
    }
    if !option.possible_values.is_empty() {
        let possible = option
            .possible_values
            .iter()
            .map(display_scalar)
            .collect::<Vec<_>>()
            .join(" | ");
        lines.push(format!("Possible values: {}", serde_json::Value::String(possible)));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Logger;
    use crate::registry::tests::FakePackages;
    use crate::registry::{CommandAction, CommandSpec, Invocation, OptionsProvider};
    use crate::context::CliContext;
    use crate::error::CliError;
    use futures::FutureExt;
    use packcli_core::{cli_flags, core_flags};
    use std::sync::Arc;

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new(Arc::new(FakePackages::default()), Logger::capture());
        let action: Arc<dyn CommandAction> =
            Arc::new(|_: Arc<CliContext>, _: Invocation| async { Ok::<i32, CliError>(0) }.boxed());
        let mut flags = cli_flags();
        flags.extend(core_flags());
        registry
            .register(
                CommandSpec::new("build [entries...]")
                    .with_aliases(&["bundle", "b"])
                    .with_description("Run packcli (default command, can be omitted).")
                    .with_usage("[entries...] [options]"),
                OptionsProvider::Static(flags),
                action.clone(),
            )
            .unwrap();
        registry
            .register(
                CommandSpec::new("info").with_aliases(&["i"]).with_description("Outputs information about your system."),
                OptionsProvider::Static(vec![]),
                action,
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_global_help_lists_commands_and_minimum_options() {
        let registry = registry();
        let global = OptionTable::from_flags(&global_flags());
        let help = render_global_help(&registry, &global, false);
        assert!(help.contains("packcli [entries...] [options]"));
        assert!(help.contains("build|bundle|b [entries...]"));
        assert!(help.contains("info|i"));
        assert!(help.contains("--mode <value>"));
        assert!(help.contains("--no-color"));
        assert!(!help.contains("--parallelism"));

        let verbose = render_global_help(&registry, &global, true);
        assert!(verbose.contains("--parallelism"));
    }

    #[test]
    fn test_command_help_usage() {
        let registry = registry();
        let global = OptionTable::from_flags(&global_flags());
        let help = render_command_help(registry.find("b").unwrap(), &global, false);
        assert!(help.contains("packcli build|bundle|b [entries...] [options]"));
        assert!(help.contains("Global options"));
    }

    #[test]
    fn test_option_help() {
        let table = OptionTable::from_flags(&core_flags());
        let lines = render_option_help(table.get("mode").unwrap(), false, Some("build"));
        assert_eq!(lines[0], "Usage: packcli build --mode <value>");
        assert_eq!(
            lines.last().unwrap(),
            "Possible values: \"development | production | none\""
        );

        let lines = render_option_help(table.get("devtool").unwrap(), false, None);
        assert_eq!(lines[0], "Usage: packcli --devtool <value>");
        assert_eq!(lines[1], "Short: packcli -d <value>");

        let lines = render_option_help(table.get("watch").unwrap(), true, None);
        assert_eq!(lines[0], "Usage: packcli --no-watch");
    }
}
