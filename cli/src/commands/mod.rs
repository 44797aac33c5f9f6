//! Command actions.
//!
//! `build` and `watch` live in [`build`]; `serve`, `info` and `configtest`
//! are the in-tree command packages, each exposing a
//! [`CommandPlugin`](crate::CommandPlugin).

pub mod build;
pub mod configtest;
pub mod info;
pub mod serve;

use packcli_config::{ConfigLoader, LoadOptions, ResolvedConfigSet};
use packcli_core::{FlagDefinition, validate_flags};
use serde_json::{Map, Value};
use tracing::warn;

use crate::context::CliContext;
use crate::engine::BuildEngine;
use crate::error::Result;
use crate::option::OptionValues;
use crate::packages::{BUNDLE_ANALYZER_PACKAGE, install_required};
use crate::prepare::RunMode;

/// Driver flags plus the engine's flags; the engine wins on name clashes.
pub fn builtin_options(engine: &dyn BuildEngine) -> Vec<FlagDefinition> {
    let engine_flags = engine.arguments();
    for error in validate_flags(&engine_flags) {
        warn!(%error, "engine reported a malformed flag");
    }
    let mut flags: Vec<FlagDefinition> = packcli_core::cli_flags()
        .into_iter()
        .filter(|flag| !engine_flags.iter().any(|engine_flag| engine_flag.name == flag.name))
        .collect();
    flags.extend(engine_flags);
    flags
}

/// Prepends positional entries to `--entry`.
pub(crate) fn prepend_entries(values: &mut OptionValues, operands: &[String]) {
    if operands.is_empty() {
        return;
    }
    let mut entries: Vec<Value> = operands.iter().cloned().map(Value::String).collect();
    match values.get("entry") {
        Some(Value::Array(existing)) => entries.extend(existing.iter().cloned()),
        Some(Value::String(existing)) => entries.push(Value::String(existing.clone())),
        _ => {}
    }
    values.insert("entry", Value::Array(entries));
}

/// The `env` mapping handed to configuration factories.
pub(crate) fn factory_env(mode: RunMode, values: &OptionValues) -> Value {
    let mut env = Map::new();
    let markers: &[&str] = match mode {
        RunMode::Serve => &["PACKCLI_SERVE"],
        RunMode::Watch => &["PACKCLI_WATCH"],
        RunMode::Build if values.flag("watch") => &["PACKCLI_WATCH"],
        RunMode::Build => &["PACKCLI_BUNDLE", "PACKCLI_BUILD"],
    };
    for marker in markers {
        env.insert(marker.to_string(), Value::Bool(true));
    }
    if let Some(Value::Object(user)) = values.get("env") {
        env.extend(user.iter().map(|(key, value)| (key.clone(), value.clone())));
    }
    Value::Object(env)
}

/// `--build-env`, falling back to the process `BUILD_ENV`.
pub(crate) fn build_env(ctx: &CliContext, values: &OptionValues) -> Option<String> {
    values
        .string("build-env")
        .map(str::to_string)
        .or_else(|| ctx.build_env.clone())
}

/// Loads, selects, extends and merges configurations for one invocation.
pub(crate) async fn resolve_configs(
    ctx: &CliContext,
    values: &OptionValues,
    env: Value,
) -> Result<ResolvedConfigSet> {
    let modules = ctx.module_loader(values.flag("disable-interpret"), build_env(ctx, values));
    let loader = ConfigLoader::new(&ctx.cwd, modules);
    let mut argv = values.as_map().clone();
    argv.insert("env".to_string(), env.clone());
    let options = LoadOptions {
        config: values.strings("config"),
        config_name: values.strings("config-name"),
        merge: values.flag("merge"),
        extends: values.strings("extends"),
        env,
        argv: Value::Object(argv),
    };
    Ok(loader.resolve(&options).await?)
}

/// Makes sure the bundle analyzer is available when `--analyze` is given.
pub(crate) fn check_analyzer(ctx: &CliContext, values: &OptionValues) -> Result<()> {
    if !values.flag("analyze") {
        return Ok(());
    }
    if !ctx.packages.exists(BUNDLE_ANALYZER_PACKAGE) {
        ctx.logger.error(format!(
            "It looks like {BUNDLE_ANALYZER_PACKAGE} is not installed."
        ));
        install_required(ctx.packages.as_ref(), BUNDLE_ANALYZER_PACKAGE)?;
    }
    ctx.logger
        .success(format!("{BUNDLE_ANALYZER_PACKAGE} plugin will be used."));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prepend_entries() {
        let mut values = OptionValues::new();
        values.insert("entry", json!("./c.js"));
        prepend_entries(&mut values, &["./a.js".into(), "./b.js".into()]);
        assert_eq!(values.get("entry"), Some(&json!(["./a.js", "./b.js", "./c.js"])));

        let mut values = OptionValues::new();
        prepend_entries(&mut values, &[]);
        assert!(values.get("entry").is_none());
    }

    #[test]
    fn test_factory_env_markers() {
        let mut values = OptionValues::new();
        values.insert("env", json!({"target": "web", "PACKCLI_BUILD": false}));
        assert_eq!(
            factory_env(RunMode::Build, &values),
            json!({"PACKCLI_BUNDLE": true, "PACKCLI_BUILD": false, "target": "web"})
        );
        assert_eq!(factory_env(RunMode::Watch, &OptionValues::new()), json!({"PACKCLI_WATCH": true}));
        assert_eq!(factory_env(RunMode::Serve, &OptionValues::new()), json!({"PACKCLI_SERVE": true}));

        let mut values = OptionValues::new();
        values.insert("watch", json!(true));
        assert_eq!(factory_env(RunMode::Build, &values), json!({"PACKCLI_WATCH": true}));
    }

    #[test]
    fn test_build_env_prefers_flag() {
        let ctx = CliContext::for_tests("/work").with_build_env("production");
        let mut values = OptionValues::new();
        assert_eq!(build_env(&ctx, &values).as_deref(), Some("production"));
        values.insert("build-env", json!("development"));
        assert_eq!(build_env(&ctx, &values).as_deref(), Some("development"));
    }
}
