//! Command-line argument parsing against an [`OptionTable`].
//!
//! The table is compiled into a [`clap::Command`] (one arg per option plus
//! its `--no-<name>` counterpart and a positional for operands). Matches are
//! replayed into [`OptionValues`] in command-line order so the last of
//! `--name` and `--no-name` wins.

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{Arg, ArgAction, ArgMatches};

use crate::error::{CliError, Result};
use crate::option::{BARE_VALUE, CompiledOption, OptionTable, OptionValues};
use crate::suggest::suggest;

/// Id of the positional collecting operands; not a valid kebab-case flag.
const OPERANDS: &str = "[operands]";

/// Outcome of parsing one command's arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedArgs {
    pub operands: Vec<String>,
    pub values: OptionValues,
}

enum Occurrence<'t> {
    Value(&'t CompiledOption, Option<String>),
    Negated(&'t CompiledOption),
}

/// The clap command that parses `table`.
fn parser(table: &OptionTable) -> clap::Command {
    let mut command = clap::Command::new("packcli")
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new(OPERANDS)
                .num_args(1..)
                .action(ArgAction::Append),
        );
    for option in table.iter() {
        command = command.arg(option.clap_arg(table.short_for(option)));
        if let Some(negation) = table.negation_arg(option) {
            command = command.arg(negation);
        }
    }
    command
}

/// Parses `args` against `table`.
///
/// # Examples
///
/// ```
/// use packcli::{OptionTable, parse_args};
/// use packcli_core::{cli_flags, core_flags};
/// use serde_json::json;
///
/// let mut flags = cli_flags();
/// flags.extend(core_flags());
/// let table = OptionTable::from_flags(&flags);
///
/// let args: Vec<String> = ["./src/a.js", "--mode", "production", "--no-bail"]
///     .iter()
///     .map(|s| s.to_string())
///     .collect();
/// let parsed = parse_args(&table, &args).unwrap();
/// assert_eq!(parsed.operands, vec!["./src/a.js"]);
/// assert_eq!(parsed.values.get("mode"), Some(&json!("production")));
/// assert_eq!(parsed.values.get("bail"), Some(&json!(false)));
/// ```
pub fn parse_args(table: &OptionTable, args: &[String]) -> Result<ParsedArgs> {
    let matches = parser(table)
        .try_get_matches_from(args)
        .map_err(|error| usage_error(table, &error))?;

    let mut occurrences: Vec<(usize, Occurrence<'_>)> = Vec::new();
    for option in table.iter() {
        for (index, raw) in values_of(&matches, &option.name) {
            let raw = (raw != BARE_VALUE).then_some(raw);
            occurrences.push((index, Occurrence::Value(option, raw)));
        }
        if option.negation.is_some() {
            for (index, _) in values_of(&matches, &option.negation_id()) {
                occurrences.push((index, Occurrence::Negated(option)));
            }
        }
    }
    occurrences.sort_by_key(|(index, _)| *index);

    let mut values = OptionValues::with_defaults(table);
    for (_, occurrence) in occurrences {
        match occurrence {
            Occurrence::Value(option, raw) => values.record(option, raw.as_deref()),
            Occurrence::Negated(option) => values.negate(option),
        }
    }

    let operands = matches
        .get_many::<String>(OPERANDS)
        .map(|operands| operands.cloned().collect())
        .unwrap_or_default();
    Ok(ParsedArgs { operands, values })
}

/// Values of `id` paired with their command-line index. Each occurrence
/// holds exactly one value.
fn values_of(matches: &ArgMatches, id: &str) -> Vec<(usize, String)> {
    // `indices_of` panics on ids the command does not define.
    let Ok(Some(values)) = matches.try_get_many::<String>(id) else {
        return Vec::new();
    };
    let Some(indices) = matches.indices_of(id) else {
        return Vec::new();
    };
    indices.zip(values.cloned()).collect()
}

fn context(error: &clap::Error, kind: ContextKind) -> Option<&str> {
    match error.get(kind) {
        Some(ContextValue::String(value)) => Some(value.as_str()),
        _ => None,
    }
}

fn usage_error(table: &OptionTable, error: &clap::Error) -> CliError {
    let arg = context(error, ContextKind::InvalidArg).unwrap_or_default();
    match error.kind() {
        ErrorKind::UnknownArgument => unknown_option(table, arg),
        ErrorKind::InvalidValue | ErrorKind::WrongNumberOfValues | ErrorKind::TooFewValues => {
            // clap renders the arg as `--name <placeholder>`.
            let name = arg.split_whitespace().next().unwrap_or(arg).trim_start_matches('-');
            let placeholder = table
                .get(name)
                .and_then(CompiledOption::placeholder)
                .unwrap_or_default();
            CliError::usage(format!("Option '--{name} {placeholder}' argument missing"))
        }
        ErrorKind::TooManyValues => match context(error, ContextKind::InvalidValue) {
            Some(value) => unknown_option(table, &format!("{arg}={value}")),
            None => unknown_option(table, arg),
        },
        _ => {
            let rendered = error.render().to_string();
            let message = rendered
                .lines()
                .next()
                .unwrap_or_default()
                .trim_start_matches("error: ")
                .to_string();
            CliError::usage(message)
        }
    }
}

fn unknown_option(table: &OptionTable, arg: &str) -> CliError {
    let mut message = format!("Unknown option '{arg}'");
    if let Some(name) = arg.strip_prefix("--") {
        let name = name.split_once('=').map_or(name, |(name, _)| name);
        let names = table.long_names();
        if let Some(found) = suggest(name, names.iter().map(String::as_str)) {
            message.push_str(&format!("\nDid you mean '--{found}'?"));
        }
    }
    CliError::usage(message)
}
