//! `build` and `watch`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, info};

use super::{build_env, builtin_options, check_analyzer, factory_env, prepend_entries, resolve_configs};
use crate::context::CliContext;
use crate::engine::{BuildRequest, ENGINE_PACKAGE, Stats};
use crate::error::{CliError, Result};
use crate::logger::Logger;
use crate::option::OptionValues;
use crate::plugin::KnownCommand;
use crate::prepare::{PrepareOptions, RunMode, check_progress, prepare};
use crate::registry::{CommandAction, CommandRegistry, Invocation, OptionsProvider};

/// Registers `build` (or `watch` when `mode` is [`RunMode::Watch`]).
pub fn register(
    registry: &mut CommandRegistry,
    ctx: &Arc<CliContext>,
    known: &KnownCommand,
    mode: RunMode,
) -> Result<()> {
    let engine = ctx.engine.clone();
    let options = OptionsProvider::deferred(move || Ok(builtin_options(engine.as_ref())));
    let action: Arc<dyn CommandAction> = Arc::new(move |ctx: Arc<CliContext>, invocation: Invocation| {
        run(ctx, invocation, mode).boxed()
    });
    registry.register(known.spec().with_dependency(ENGINE_PACKAGE), options, action)?;
    Ok(())
}

/// Where compilation stats go.
#[derive(Debug, Clone, PartialEq)]
enum StatsOutput {
    Human,
    Stdout,
    File(PathBuf),
}

impl StatsOutput {
    fn from_values(values: &OptionValues, ctx: &CliContext) -> Self {
        match values.get("json") {
            Some(Value::Bool(true)) => Self::Stdout,
            Some(Value::String(path)) => Self::File(ctx.cwd.join(path)),
            _ => Self::Human,
        }
    }
}

/// Reports each compilation and tracks the exit code.
struct Reporter {
    output: StatsOutput,
    fail_on_warnings: bool,
    logger: Logger,
    exit_code: AtomicI32,
    failure: Mutex<Option<CliError>>,
}

impl Reporter {
    fn report(&self, stats: &Stats) {
        if stats.has_errors() || (self.fail_on_warnings && stats.has_warnings()) {
            self.exit_code.store(1, Ordering::SeqCst);
        }
        if let Err(error) = self.write(stats) {
            if let Ok(mut failure) = self.failure.lock() {
                failure.get_or_insert(error);
            }
        }
    }

    fn write(&self, stats: &Stats) -> Result<()> {
        match &self.output {
            StatsOutput::Human => {
                if let Some(output) = stats.output.as_deref().filter(|output| !output.is_empty()) {
                    self.logger.raw(output);
                }
            }
            StatsOutput::Stdout => {
                let json = serde_json::to_string(&without_rendering(stats)).map_err(crate::engine::EngineError::from)?;
                self.logger.raw(json);
            }
            StatsOutput::File(path) => {
                let json = serde_json::to_string_pretty(&without_rendering(stats))
                    .map_err(crate::engine::EngineError::from)?;
                std::fs::write(path, json).map_err(|source| CliError::Io {
                    context: format!("Unable to write stats to '{}'", path.display()),
                    source,
                })?;
                self.logger.success(format!(
                    "stats are successfully stored as json to {}",
                    path.display()
                ));
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<i32> {
        let failure = self.failure.into_inner().ok().flatten();
        match failure {
            Some(error) => Err(error),
            None => Ok(self.exit_code.into_inner()),
        }
    }
}

fn without_rendering(stats: &Stats) -> Stats {
    Stats {
        output: None,
        ..stats.clone()
    }
}

/// Runs one build or watch invocation.
pub async fn run(ctx: Arc<CliContext>, invocation: Invocation, mode: RunMode) -> Result<i32> {
    let mut values = invocation.values;
    prepend_entries(&mut values, &invocation.operands);
    check_progress(&values)?;
    check_analyzer(&ctx, &values)?;

    let env = factory_env(mode, &values);
    let user_set_watch = values.is_explicit("watch");
    let mut set = resolve_configs(&ctx, &values, env).await?;
    if mode == RunMode::Watch {
        values.insert("watch", Value::Bool(true));
    }

    let flags = builtin_options(ctx.engine.as_ref());
    let options = PrepareOptions {
        run_mode: mode,
        user_set_watch,
        color: invocation.color,
        color_supported: ctx.color_supported,
        build_env: build_env(&ctx, &values),
    };
    prepare(&mut set, &flags, &values, &ctx.cwd, &options, &ctx.logger)?;

    let watch = set
        .entries()
        .iter()
        .any(|entry| entry.options.get("watch") == Some(&Value::Bool(true)));
    let request = BuildRequest {
        configs: set.to_value(),
        watch,
    };
    info!(configs = set.entries().len(), watch, "starting build");

    let reporter = Reporter {
        output: StatsOutput::from_values(&values, &ctx),
        fail_on_warnings: values.flag("fail-on-warnings"),
        logger: ctx.logger.clone(),
        exit_code: AtomicI32::new(0),
        failure: Mutex::new(None),
    };
    let sink = |stats: &Stats| reporter.report(stats);
    ctx.engine.run(&request, &sink).await?;
    let code = reporter.finish()?;
    debug!(code, "build finished");
    Ok(code)
}
