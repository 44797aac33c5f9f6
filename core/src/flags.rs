//! Built-in flag tables.
//!
//! [`core_flags`] maps onto the build configuration and is what the default
//! build engine reports as its argument table. [`cli_flags`] is consumed by
//! the driver. [`dev_server_flags`] is reconciled onto the `devServer`
//! section by the `serve` command.

use serde_json::{Value, json};

use crate::{ArgumentConfig, FlagDefinition, HelpLevel, ValueKind};

/// Flags that keep their single-letter alias from earlier releases.
pub const LEGACY_ALIASES: &[&str] = &["devtool", "output-path", "target", "watch", "extends"];

/// Flags listed in the default (non-verbose) help output.
pub const MINIMUM_HELP_FLAGS: &[&str] = &[
    "config",
    "config-name",
    "merge",
    "env",
    "mode",
    "watch",
    "watch-options-stdin",
    "stats",
    "devtool",
    "entry",
    "target",
    "name",
    "output-path",
    "extends",
];

/// Stats presets accepted by `--stats`.
pub const STATS_PRESETS: &[&str] = &[
    "none",
    "summary",
    "errors-only",
    "errors-warnings",
    "minimal",
    "normal",
    "detailed",
    "verbose",
];

fn strings(values: &[&str]) -> Vec<Value> {
    values.iter().map(|value| json!(value)).collect()
}

/// Applies legacy aliases and the minimum help tier to a table.
fn finish(flags: Vec<FlagDefinition>) -> Vec<FlagDefinition> {
    flags
        .into_iter()
        .map(|mut flag| {
            if flag.alias.is_none() && LEGACY_ALIASES.contains(&flag.name.as_str()) {
                flag.alias = flag.name.chars().next();
            }
            if MINIMUM_HELP_FLAGS.contains(&flag.name.as_str()) {
                flag.help_level = HelpLevel::Minimum;
            }
            flag
        })
        .collect()
}

/// Flags reconciled onto the build configuration.
///
/// # Examples
///
/// ```
/// use packcli_core::{HelpLevel, core_flags};
///
/// let flags = core_flags();
/// let devtool = flags.iter().find(|flag| flag.name == "devtool").unwrap();
/// assert_eq!(devtool.alias, Some('d'));
/// assert_eq!(devtool.help_level, HelpLevel::Minimum);
/// ```
pub fn core_flags() -> Vec<FlagDefinition> {
    finish(vec![
        FlagDefinition::new("entry")
            .core(
                ArgumentConfig::string("entry[]")
                    .multiple()
                    .with_description("A module that is loaded upon startup. Only the last one is exported."),
            ),
        FlagDefinition::new("entry-reset").core(
            ArgumentConfig::reset("entry")
                .with_description("Clear all items provided in 'entry' configuration."),
        ),
        FlagDefinition::new("mode").core(
            ArgumentConfig::enumeration("mode", strings(&["development", "production", "none"]))
                .with_description("Enable production optimizations or development hints."),
        ),
        FlagDefinition::new("name").core(
            ArgumentConfig::string("name")
                .with_description("Name of the configuration. Used when loading multiple configurations."),
        ),
        FlagDefinition::new("context").core(
            ArgumentConfig::path("context")
                .with_description("The base directory (absolute path!) for resolving the `entry` option."),
        ),
        FlagDefinition::new("output-path").core(
            ArgumentConfig::path("output.path")
                .with_description("The output directory as **absolute path** (required)."),
        ),
        FlagDefinition::new("output-filename").core(
            ArgumentConfig::string("output.filename")
                .with_description("Specifies the filename template of output files on disk."),
        ),
        FlagDefinition::new("output-public-path").core(
            ArgumentConfig::enumeration("output.publicPath", strings(&["auto"]))
                .with_description("The 'publicPath' specifies the public URL address of the output files."),
        )
        .core(ArgumentConfig::string("output.publicPath")),
        FlagDefinition::new("output-clean").core(
            ArgumentConfig::boolean("output.clean")
                .with_description("Clean the output directory before emit.")
                .with_negated_description("Do not clean the output directory before emit."),
        ),
        FlagDefinition::new("devtool")
            .core(
                ArgumentConfig::enumeration("devtool", vec![json!(false)])
                    .with_description("A developer tool to enhance debugging (false | eval | [inline-|hidden-|eval-][nosources-][cheap-[module-]]source-map).")
                    .with_negated_description("Do not generate source maps."),
            )
            .core(ArgumentConfig::string("devtool")),
        FlagDefinition::new("target")
            .core(
                ArgumentConfig::string("target[]")
                    .multiple()
                    .with_description("Environment to build for. An array of environments to build for all of them when possible."),
            )
            .core(
                ArgumentConfig::enumeration("target", vec![json!(false)])
                    .with_negated_description("Does not build for any environment."),
            ),
        FlagDefinition::new("target-reset").core(
            ArgumentConfig::reset("target")
                .with_description("Clear all items provided in 'target' configuration."),
        ),
        FlagDefinition::new("watch").core(
            ArgumentConfig::boolean("watch")
                .with_description("Enter watch mode, which rebuilds on file change.")
                .with_negated_description("Do not watch for file changes."),
        ),
        FlagDefinition::new("watch-options-stdin").core(
            ArgumentConfig::boolean("watchOptions.stdin")
                .with_description("Stop watching when stdin stream has ended.")
                .with_negated_description("Do not stop watching when stdin stream has ended."),
        ),
        FlagDefinition::new("watch-options-poll")
            .core(
                ArgumentConfig::string("watchOptions.poll")
                    .with_description("`number`: use polling with specified interval. `true`: use polling."),
            )
            .core(ArgumentConfig::boolean("watchOptions.poll")),
        FlagDefinition::new("stats")
            .core(
                ArgumentConfig::boolean("stats")
                    .with_description("Stats options object or preset name.")
                    .with_negated_description("Disable stats output."),
            )
            .core(ArgumentConfig::enumeration("stats", strings(STATS_PRESETS))),
        FlagDefinition::new("bail").core(
            ArgumentConfig::boolean("bail")
                .with_description("Report the first error as a hard error instead of tolerating it.")
                .with_negated_description("Tolerate the first error instead of reporting it."),
        ),
        FlagDefinition::new("cache").core(
            ArgumentConfig::boolean("cache")
                .with_description("Enable in memory caching. Disable caching.")
                .with_negated_description("Disable caching."),
        ),
        FlagDefinition::new("cache-type").core(
            ArgumentConfig::enumeration("cache.type", strings(&["memory", "filesystem"]))
                .with_description("In memory caching. Filesystem caching."),
        ),
        FlagDefinition::new("dependencies").core(
            ArgumentConfig::string("dependencies[]")
                .multiple()
                .with_description("References to another configuration to depend on."),
        ),
        FlagDefinition::new("dependencies-reset").core(
            ArgumentConfig::reset("dependencies")
                .with_description("Clear all items provided in 'dependencies' configuration."),
        ),
        FlagDefinition::new("parallelism").core(
            ArgumentConfig::number("parallelism")
                .with_description("The number of parallel processed modules in the compilation."),
        ),
        FlagDefinition::new("profile").core(
            ArgumentConfig::boolean("profile")
                .with_description("Capture timing information for each module.")
                .with_negated_description("Do not capture timing information for each module."),
        ),
        FlagDefinition::new("resolve-extensions").core(
            ArgumentConfig::string("resolve.extensions[]")
                .multiple()
                .with_description("Extensions added to the request when trying to find the file."),
        ),
        FlagDefinition::new("resolve-extensions-reset").core(
            ArgumentConfig::reset("resolve.extensions")
                .with_description("Clear all items provided in 'resolve.extensions' configuration."),
        ),
        FlagDefinition::new("performance-hints").core(
            ArgumentConfig::enumeration("performance.hints", vec![json!(false), json!("warning"), json!("error")])
                .with_description("Sets the format of the hints: warnings, errors or nothing at all.")
                .with_negated_description("Disable performance hints."),
        ),
        FlagDefinition::new("optimization-minimize").core(
            ArgumentConfig::boolean("optimization.minimize")
                .with_description("Enable minimizing the output. Uses optimization.minimizer.")
                .with_negated_description("Disable minimizing the output."),
        ),
        FlagDefinition::new("ignore-warnings").core(
            ArgumentConfig::regexp("ignoreWarnings[]")
                .multiple()
                .with_description("A RegExp to select the warning message."),
        ),
        FlagDefinition::new("ignore-warnings-reset").core(
            ArgumentConfig::reset("ignoreWarnings")
                .with_description("Clear all items provided in 'ignoreWarnings' configuration."),
        ),
    ])
}

/// Flags consumed by the driver itself.
///
/// # Examples
///
/// ```
/// use packcli_core::{ValueKind, cli_flags};
///
/// let flags = cli_flags();
/// let config = flags.iter().find(|flag| flag.name == "config").unwrap();
/// assert_eq!(config.alias, Some('c'));
/// assert!(config.multiple);
/// assert_eq!(config.value_kinds(), vec![ValueKind::String]);
/// ```
pub fn cli_flags() -> Vec<FlagDefinition> {
    finish(vec![
        FlagDefinition::new("config")
            .with_alias('c')
            .with_kind(ValueKind::String)
            .multiple()
            .with_value_name("pathToConfigFile")
            .with_description("Provide path to one or more configuration files to process, e.g. \"./packcli.config.json\"."),
        FlagDefinition::new("config-name")
            .with_kind(ValueKind::String)
            .multiple()
            .with_value_name("name")
            .with_description("Name(s) of particular configuration(s) to use if configuration file exports an array of multiple configurations."),
        FlagDefinition::new("merge")
            .with_alias('m')
            .with_kind(ValueKind::Boolean)
            .with_description("Merge two or more configurations using the deep merge algorithm."),
        FlagDefinition::new("disable-interpret")
            .with_kind(ValueKind::Boolean)
            .with_description("Disable interpreters for loading executable config files."),
        FlagDefinition::new("env")
            .with_kind(ValueKind::String)
            .multiple()
            .key_path()
            .with_value_name("value")
            .with_description("Environment variables passed to the configuration when it is a function, e.g. \"myvar\" or \"myvar=myval\"."),
        FlagDefinition::new("build-env")
            .with_kind(ValueKind::String)
            .with_value_name("value")
            .with_description("Sets the build environment (BUILD_ENV) to the value provided."),
        FlagDefinition::new("extends")
            .with_kind(ValueKind::String)
            .multiple()
            .with_value_name("value")
            .with_description("Path to the configuration to be extended (only works when using packcli)."),
        FlagDefinition::new("analyze")
            .with_kind(ValueKind::Boolean)
            .with_description("It invokes packcli-bundle-analyzer plugin to get bundle information."),
        FlagDefinition::new("progress")
            .with_kind(ValueKind::Boolean)
            .with_kind(ValueKind::String)
            .with_description("Print compilation progress during build."),
        FlagDefinition::new("json")
            .with_alias('j')
            .with_kind(ValueKind::Boolean)
            .with_kind(ValueKind::String)
            .with_value_name("pathToJsonFile")
            .with_description("Prints result as JSON or store it in a file."),
        FlagDefinition::new("fail-on-warnings")
            .with_kind(ValueKind::Boolean)
            .with_description("Stop packcli with exit code 1 on warnings."),
    ])
    .into_iter()
    .map(FlagDefinition::minimum)
    .collect()
}

/// Flags reconciled onto the `devServer` section of each configuration.
pub fn dev_server_flags() -> Vec<FlagDefinition> {
    vec![
        FlagDefinition::new("host").core(
            ArgumentConfig::enumeration("host", strings(&["local-ip", "local-ipv4", "local-ipv6"]))
                .with_description("Allows to specify a hostname to use."),
        )
        .core(ArgumentConfig::string("host")),
        FlagDefinition::new("port").core(
            ArgumentConfig::number("port")
                .with_description("Allows to specify a port to use."),
        )
        .core(ArgumentConfig::enumeration("port", strings(&["auto"])))
        .core(ArgumentConfig::string("port")),
        FlagDefinition::new("hot").core(
            ArgumentConfig::boolean("hot")
                .with_description("Enables Hot Module Replacement.")
                .with_negated_description("Disables Hot Module Replacement."),
        )
        .core(ArgumentConfig::enumeration("hot", strings(&["only"]))),
        FlagDefinition::new("open").core(
            ArgumentConfig::boolean("open")
                .with_description("Allows to specify a browser to open.")
                .with_negated_description("Does not open the default browser."),
        )
        .core(ArgumentConfig::string("open[]").multiple()),
        FlagDefinition::new("compress").core(
            ArgumentConfig::boolean("compress")
                .with_description("Enables gzip compression for everything served.")
                .with_negated_description("Disables gzip compression for everything served."),
        ),
        FlagDefinition::new("history-api-fallback").core(
            ArgumentConfig::boolean("historyApiFallback")
                .with_description("Allows to proxy requests through a specified index page.")
                .with_negated_description("Disallows to proxy requests through a specified index page."),
        ),
        FlagDefinition::new("static").core(
            ArgumentConfig::string("static[].directory")
                .multiple()
                .with_description("Allows to configure options for serving static files from directory."),
        )
        .core(
            ArgumentConfig::boolean("static")
                .with_negated_description("Disallows to configure options for serving static files from directory."),
        ),
        FlagDefinition::new("client-overlay").core(
            ArgumentConfig::boolean("client.overlay")
                .with_description("Enables a full-screen overlay in the browser when there are compiler errors or warnings.")
                .with_negated_description("Disables the full-screen overlay in the browser when there are compiler errors or warnings."),
        ),
    ]
    .into_iter()
    .map(|flag| flag.minimum())
    .collect()
}
