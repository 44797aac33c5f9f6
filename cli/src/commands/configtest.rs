//! `configtest [config-path]`: validate configurations without building.

use std::sync::Arc;

use futures::FutureExt;
use packcli_config::{ConfigLoader, LoadOptions};
use tracing::debug;

use crate::context::CliContext;
use crate::engine::ENGINE_PACKAGE;
use crate::error::{CliError, Result};
use crate::plugin::{CommandPlugin, find_known};
use crate::registry::{CommandAction, CommandRegistry, Invocation, OptionsProvider};

/// The `packcli-configtest` package.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigtestPlugin;

impl CommandPlugin for ConfigtestPlugin {
    fn register(&self, registry: &mut CommandRegistry, _ctx: &Arc<CliContext>) -> Result<()> {
        let Some(known) = find_known("configtest") else {
            return Ok(());
        };
        let action: Arc<dyn CommandAction> =
            Arc::new(|ctx: Arc<CliContext>, invocation: Invocation| run(ctx, invocation).boxed());
        registry.register(
            known.spec().with_dependency(ENGINE_PACKAGE),
            OptionsProvider::Static(Vec::new()),
            action,
        )?;
        Ok(())
    }
}

async fn run(ctx: Arc<CliContext>, invocation: Invocation) -> Result<i32> {
    let loader = ConfigLoader::new(&ctx.cwd, ctx.module_loader(false, ctx.build_env.clone()));
    let options = LoadOptions {
        config: invocation.operands.first().cloned().into_iter().collect(),
        ..LoadOptions::default()
    };
    let set = loader.resolve(&options).await?;

    let paths = set.all_paths();
    if paths.is_empty() {
        return Err(CliError::InvalidOption("No configuration found.".to_string()));
    }

    let listed = paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" ,");
    ctx.logger.info(format!("Validate '{listed}'."));
    debug!(configs = set.entries().len(), "validating configuration");

    ctx.engine.validate(&set.to_value()).await?;
    ctx.logger
        .success("There are no validation errors in the given packcli configuration.");
    Ok(0)
}
