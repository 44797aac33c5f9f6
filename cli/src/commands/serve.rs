//! `serve`: build configurations and hand them to the development server.

use std::collections::HashSet;
use std::sync::Arc;

use futures::FutureExt;
use packcli_core::{FlagDefinition, Reconciler, dev_server_flags};
use serde_json::{Map, Value};
use tracing::debug;

use super::{build_env, builtin_options, check_analyzer, factory_env, prepend_entries, resolve_configs};
use crate::context::CliContext;
use crate::dev_server::{DEV_SERVER_PACKAGE, ServeRequest};
use crate::engine::{BuildEngine, ENGINE_PACKAGE};
use crate::error::{CliError, Result};
use crate::plugin::{CommandPlugin, find_known};
use crate::prepare::{PrepareOptions, RunMode, check_progress, prepare};
use crate::registry::{CommandAction, CommandRegistry, Invocation, OptionsProvider};

/// The `packcli-serve` package.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServePlugin;

impl CommandPlugin for ServePlugin {
    fn register(&self, registry: &mut CommandRegistry, ctx: &Arc<CliContext>) -> Result<()> {
        let Some(known) = find_known("serve") else {
            return Ok(());
        };
        let engine = ctx.engine.clone();
        let options = OptionsProvider::deferred(move || Ok(serve_flags(engine.as_ref())));
        let action: Arc<dyn CommandAction> =
            Arc::new(|ctx: Arc<CliContext>, invocation: Invocation| run(ctx, invocation).boxed());
        registry.register(
            known
                .spec()
                .with_dependency(ENGINE_PACKAGE)
                .with_dependency(DEV_SERVER_PACKAGE),
            options,
            action,
        )?;
        Ok(())
    }
}

/// Build options plus the dev-server flags that do not clash with them.
fn serve_flags(engine: &dyn BuildEngine) -> Vec<FlagDefinition> {
    let mut flags = builtin_options(engine);
    for flag in dev_server_flags() {
        if !flags.iter().any(|existing| existing.name == flag.name) {
            flags.push(flag);
        }
    }
    flags
}

async fn run(ctx: Arc<CliContext>, invocation: Invocation) -> Result<i32> {
    let dev_flags = dev_server_flags();
    let dev_names: HashSet<String> = dev_flags
        .iter()
        .flat_map(|flag| [flag.name.clone(), format!("{}-reset", flag.name)])
        .collect();

    let mut values = invocation.values;
    prepend_entries(&mut values, &invocation.operands);
    let mut dev_values = values.clone();
    dev_values.retain(|name| dev_names.contains(name));
    values.retain(|name| !dev_names.contains(name));

    check_progress(&values)?;
    check_analyzer(&ctx, &values)?;

    let env = factory_env(RunMode::Serve, &values);
    let mut set = resolve_configs(&ctx, &values, env).await?;
    let flags = builtin_options(ctx.engine.as_ref());
    let options = PrepareOptions {
        run_mode: RunMode::Serve,
        user_set_watch: values.is_explicit("watch"),
        color: invocation.color,
        color_supported: ctx.color_supported,
        build_env: build_env(&ctx, &values),
    };
    prepare(&mut set, &flags, &values, &ctx.cwd, &options, &ctx.logger)?;

    let mut served: Vec<&Map<String, Value>> = set
        .entries()
        .iter()
        .map(|entry| &entry.options)
        .filter(|config| config.get("devServer").is_some_and(is_enabled))
        .collect();
    if served.is_empty() {
        served.extend(set.entries().first().map(|entry| &entry.options));
    }

    let reconciler = Reconciler::new(&dev_flags, &ctx.cwd);
    let mut request = ServeRequest {
        configs: Vec::with_capacity(served.len()),
        dev_server: Vec::with_capacity(served.len()),
    };
    for config in served {
        let mut dev_server = match config.get("devServer") {
            Some(Value::Object(dev_server)) => dev_server.clone(),
            _ => Map::new(),
        };
        let problems = reconciler.reconcile(&mut dev_server, dev_values.as_map());
        if !problems.is_empty() {
            return Err(CliError::Validation(problems));
        }
        request.configs.push(Value::Object(config.clone()));
        request.dev_server.push(Value::Object(dev_server));
    }
    check_unique_ports(&request.dev_server)?;

    debug!(servers = request.dev_server.len(), "starting dev server");
    ctx.dev_server.start(&request).await?;
    Ok(0)
}

fn is_enabled(dev_server: &Value) -> bool {
    !matches!(dev_server, Value::Null | Value::Bool(false))
}

fn check_unique_ports(dev_servers: &[Value]) -> Result<()> {
    let mut seen = HashSet::new();
    for port in dev_servers.iter().filter_map(|dev_server| dev_server.get("port")) {
        if !seen.insert(port.to_string()) {
            return Err(CliError::InvalidOption(
                "Unique ports must be specified for each devServer option in your packcli configuration. \
                 Alternatively, run only 1 devServer config using the --config-name flag to specify your desired config."
                    .to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev_server::{DevServer, DevServerError};
    use crate::engine::tests::FakeEngine;
    use crate::logger::Logger;
    use crate::argv::parse_args;
    use crate::option::{OptionTable, OptionValues};
    use crate::packages::LocalPackages;
    use futures::future::BoxFuture;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeDevServer {
        requests: Mutex<Vec<ServeRequest>>,
    }

    impl DevServer for FakeDevServer {
        fn version(&self) -> BoxFuture<'_, Option<String>> {
            async { Some("4.0.0".to_string()) }.boxed()
        }

        fn start<'a>(&'a self, request: &'a ServeRequest) -> BoxFuture<'a, std::result::Result<(), DevServerError>> {
            async move {
                self.requests.lock().unwrap().push(request.clone());
                Ok(())
            }
            .boxed()
        }
    }

    fn context(dir: &std::path::Path, dev_server: Arc<FakeDevServer>) -> Arc<CliContext> {
        let logger = Logger::capture();
        Arc::new(CliContext::new(
            dir,
            logger.clone(),
            Arc::new(FakeEngine::default()),
            dev_server,
            Arc::new(LocalPackages::new(logger, None)),
        ))
    }

    fn invocation(values: OptionValues) -> Invocation {
        Invocation {
            command: "serve".to_string(),
            values,
            ..Invocation::default()
        }
    }

    #[tokio::test]
    async fn test_dev_server_values_go_to_dev_server_section() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("packcli.config.json"),
            r#"[{"name": "app", "devServer": {"hot": true}}, {"name": "worker", "devServer": false}]"#,
        )
        .unwrap();
        let dev_server = Arc::new(FakeDevServer::default());
        let ctx = context(dir.path(), dev_server.clone());

        let mut values = OptionValues::new();
        values.insert("port", json!(8080));
        values.insert("mode", json!("development"));
        assert_eq!(run(ctx, invocation(values)).await.unwrap(), 0);

        let requests = dev_server.requests.lock().unwrap();
        assert_eq!(requests[0].configs.len(), 1);
        assert_eq!(requests[0].configs[0]["name"], "app");
        assert_eq!(requests[0].configs[0]["mode"], "development");
        assert!(requests[0].configs[0].get("port").is_none());
        assert_eq!(requests[0].dev_server[0], json!({"hot": true, "port": 8080}));
    }

    #[tokio::test]
    async fn test_first_config_served_without_dev_server_sections() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("packcli.config.json"),
            r#"[{"name": "a"}, {"name": "b"}]"#,
        )
        .unwrap();
        let dev_server = Arc::new(FakeDevServer::default());
        let ctx = context(dir.path(), dev_server.clone());
        run(ctx, invocation(OptionValues::new())).await.unwrap();

        let requests = dev_server.requests.lock().unwrap();
        assert_eq!(requests[0].configs.len(), 1);
        assert_eq!(requests[0].configs[0]["name"], "a");
        assert_eq!(requests[0].dev_server[0], json!({}));
    }

    #[tokio::test]
    async fn test_bare_open_and_static() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("packcli.config.json"), r#"{"name": "app"}"#).unwrap();
        let dev_server = Arc::new(FakeDevServer::default());
        let ctx = context(dir.path(), dev_server.clone());

        let table = OptionTable::from_flags(&serve_flags(ctx.engine.as_ref()));
        let args: Vec<String> = ["--open", "--static"].iter().map(|arg| arg.to_string()).collect();
        let parsed = parse_args(&table, &args).unwrap();
        assert_eq!(run(ctx, invocation(parsed.values)).await.unwrap(), 0);

        let requests = dev_server.requests.lock().unwrap();
        assert_eq!(requests[0].dev_server[0], json!({"open": true, "static": true}));
    }

    #[test]
    fn test_ports_must_be_unique() {
        assert!(check_unique_ports(&[json!({"port": 8080}), json!({"port": 8081})]).is_ok());
        assert!(check_unique_ports(&[json!({}), json!({})]).is_ok());
        assert!(check_unique_ports(&[json!({"port": 8080}), json!({"port": 8080})]).is_err());
    }
}
