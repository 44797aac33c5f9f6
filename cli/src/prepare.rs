//! Final preparation of resolved configurations before they reach the
//! engine.
//!
//! Applies command-line values, normalizes `stats`, fills defaults the
//! engine expects from the driver and attaches the `cli` metadata.

use std::path::{Path, PathBuf};

use packcli_config::ResolvedConfigSet;
use packcli_core::{FlagDefinition, Reconciler};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{CliError, Result};
use crate::logger::Logger;
use crate::option::OptionValues;

/// Modes accepted from `BUILD_ENV`.
const BUILD_ENV_MODES: &[&str] = &["development", "production", "none"];

/// The command a configuration is prepared for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    #[default]
    Build,
    Watch,
    Serve,
}

impl RunMode {
    fn is_watching(self) -> bool {
        matches!(self, RunMode::Watch | RunMode::Serve)
    }

    fn command_name(self) -> &'static str {
        match self {
            RunMode::Build => "build",
            RunMode::Watch => "watch",
            RunMode::Serve => "serve",
        }
    }
}

/// Invocation facts that influence preparation.
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    pub run_mode: RunMode,
    /// `--watch` or `--no-watch` was given.
    pub user_set_watch: bool,
    /// `--color` / `--no-color`.
    pub color: Option<bool>,
    pub color_supported: bool,
    pub build_env: Option<String>,
}

/// Rejects `--progress` values other than `profile`.
pub fn check_progress(values: &OptionValues) -> Result<()> {
    match values.get("progress") {
        Some(Value::String(progress)) if progress != "profile" => Err(CliError::InvalidOption(format!(
            "'{progress}' is an invalid value for the --progress option. Only 'profile' is allowed."
        ))),
        _ => Ok(()),
    }
}

/// Prepares every configuration of `set` in place.
///
/// Fails on the first configuration whose command-line values produce
/// problems; no later configuration is touched.
pub fn prepare(
    set: &mut ResolvedConfigSet,
    flags: &[FlagDefinition],
    values: &OptionValues,
    cwd: &Path,
    options: &PrepareOptions,
    logger: &Logger,
) -> Result<()> {
    let reconciler = Reconciler::new(flags, cwd);
    let is_multi = set.is_multiple();
    let paths: Vec<Vec<PathBuf>> = set
        .entries()
        .iter()
        .map(|entry| set.paths_of(entry).to_vec())
        .collect();

    for (entry, paths) in set.entries_mut().iter_mut().zip(paths) {
        let config = &mut entry.options;
        let had_watch = config.contains_key("watch");

        let problems = reconciler.reconcile(config, values.as_map());
        if !problems.is_empty() {
            return Err(CliError::Validation(problems));
        }

        if options.run_mode.is_watching() && (had_watch || options.user_set_watch) {
            logger.warn(format!(
                "No need to use the '{}' command together with '{{ watch: true | false }}' or '--watch'/'--no-watch' configuration, it does not make sense.",
                options.run_mode.command_name()
            ));
            if options.run_mode == RunMode::Serve {
                config.insert("watch".to_string(), Value::Bool(false));
            }
        }

        add_build_dependencies(config, &paths);

        if !config.contains_key("mode") {
            if let Some(mode) = options
                .build_env
                .as_deref()
                .filter(|mode| BUILD_ENV_MODES.contains(mode))
            {
                config.insert("mode".to_string(), Value::String(mode.to_string()));
            }
        }

        normalize_stats(config, options);

        config.insert(
            "cli".to_string(),
            json!({
                "configPaths": paths.iter().map(|path| path.display().to_string()).collect::<Vec<_>>(),
                "helpfulOutput": values.get("json").is_none_or(|json| json == &Value::Bool(false)),
                "progress": values.get("progress").cloned().unwrap_or(Value::Null),
                "analyze": values.flag("analyze"),
                "isMultiCompiler": is_multi,
            }),
        );
        debug!(name = ?entry.name(), "prepared configuration");
    }
    Ok(())
}

/// Appends the configuration's source files to the filesystem cache's
/// build dependencies.
fn add_build_dependencies(config: &mut Map<String, Value>, paths: &[PathBuf]) {
    let Some(Value::Object(cache)) = config.get_mut("cache") else {
        return;
    };
    if cache.get("type").and_then(Value::as_str) != Some("filesystem") || paths.is_empty() {
        return;
    }
    let dependencies = cache
        .entry("buildDependencies")
        .or_insert_with(|| Value::Object(Map::new()));
    if !dependencies.is_object() {
        *dependencies = Value::Object(Map::new());
    }
    if let Value::Object(dependencies) = dependencies {
        let default_config = dependencies
            .entry("defaultConfig")
            .or_insert_with(|| Value::Array(Vec::new()));
        if !default_config.is_array() {
            let previous = default_config.take();
            *default_config = Value::Array(vec![previous]);
        }
        if let Value::Array(items) = default_config {
            items.extend(paths.iter().map(|path| Value::String(path.display().to_string())));
        }
    }
}

fn normalize_stats(config: &mut Map<String, Value>, options: &PrepareOptions) {
    let stats = match config.remove("stats") {
        None | Some(Value::Bool(true)) => json!({"preset": "normal"}),
        Some(Value::Bool(false)) => json!({"preset": "none"}),
        Some(Value::String(preset)) => json!({"preset": preset}),
        Some(other) => other,
    };
    let mut stats = match stats {
        Value::Object(stats) => stats,
        other => {
            config.insert("stats".to_string(), other);
            return;
        }
    };

    let colors = match (options.color, stats.get("colors")) {
        (Some(color), _) => Value::Bool(color),
        (None, Some(existing)) => existing.clone(),
        (None, None) => Value::Bool(options.color_supported),
    };
    stats.insert("colors".to_string(), colors);
    config.insert("stats".to_string(), Value::Object(stats));
}
