//! `info`: system and package report.

use std::sync::Arc;

use futures::FutureExt;
use packcli_core::{FlagDefinition, ValueKind};
use serde_json::{Map, Value};
use tokio::process::Command;

use crate::context::CliContext;
use crate::dev_server::DEV_SERVER_PACKAGE;
use crate::engine::ENGINE_PACKAGE;
use crate::error::{CliError, Result};
use crate::plugin::{CommandPlugin, find_known};
use crate::registry::{CLI_PACKAGE, CommandAction, CommandRegistry, Invocation, OptionsProvider};

const NOT_FOUND: &str = "Not Found";

/// The `packcli-info` package.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfoPlugin;

impl CommandPlugin for InfoPlugin {
    fn register(&self, registry: &mut CommandRegistry, _ctx: &Arc<CliContext>) -> Result<()> {
        let Some(known) = find_known("info") else {
            return Ok(());
        };
        let action: Arc<dyn CommandAction> =
            Arc::new(|ctx: Arc<CliContext>, invocation: Invocation| run(ctx, invocation).boxed());
        registry.register(known.spec(), OptionsProvider::Static(info_flags()), action)?;
        Ok(())
    }
}

fn info_flags() -> Vec<FlagDefinition> {
    vec![
        FlagDefinition::new("output")
            .with_kind(ValueKind::String)
            .with_value_name("value")
            .with_description("To get the output in a specified format (accept json or markdown)")
            .minimum(),
        FlagDefinition::new("additional-package")
            .with_alias('a')
            .with_kind(ValueKind::String)
            .multiple()
            .with_value_name("value")
            .with_description("Adds additional packages to the output")
            .minimum(),
    ]
}

/// Report layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    Json,
    Markdown,
}

/// Ordered `(section, [(key, value)])` pairs.
type Report = Vec<(&'static str, Vec<(String, String)>)>;

async fn run(ctx: Arc<CliContext>, invocation: Invocation) -> Result<i32> {
    let format = match invocation.values.string("output") {
        None => Format::Text,
        Some("json") => Format::Json,
        Some("markdown") => Format::Markdown,
        Some(other) => {
            return Err(CliError::InvalidOption(format!(
                "'{other}' is not a valid value for output"
            )));
        }
    };
    let report = gather(&ctx, &invocation.values.strings("additional-package")).await;
    ctx.logger.raw(render(&report, format));
    Ok(0)
}

async fn gather(ctx: &CliContext, additional: &[String]) -> Report {
    let cpus = std::thread::available_parallelism()
        .map(|count| count.get().to_string())
        .unwrap_or_else(|_| NOT_FOUND.to_string());
    let system = vec![
        (
            "OS".to_string(),
            format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
        ),
        ("CPUs".to_string(), cpus),
        (
            "Shell".to_string(),
            std::env::var("SHELL").unwrap_or_else(|_| NOT_FOUND.to_string()),
        ),
    ];

    let mut binaries = Vec::new();
    for binary in ["cargo", "rustc"] {
        binaries.push((binary.to_string(), binary_version(binary).await));
    }

    let found = |version: Option<String>| version.unwrap_or_else(|| NOT_FOUND.to_string());
    let mut packages = vec![
        (CLI_PACKAGE.to_string(), found(ctx.packages.version(CLI_PACKAGE))),
        (ENGINE_PACKAGE.to_string(), found(ctx.engine.version().await)),
        (DEV_SERVER_PACKAGE.to_string(), found(ctx.dev_server.version().await)),
    ];
    for package in additional {
        packages.push((package.clone(), found(ctx.packages.version(package))));
    }

    vec![("System", system), ("Binaries", binaries), ("Packages", packages)]
}

async fn binary_version(binary: &str) -> String {
    let output = Command::new(binary).arg("--version").output().await;
    match output {
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .nth(1)
            .unwrap_or(NOT_FOUND)
            .to_string(),
        _ => NOT_FOUND.to_string(),
    }
}

fn render(report: &Report, format: Format) -> String {
    match format {
        Format::Json => {
            let mut root = Map::new();
            for (section, entries) in report {
                let entries = entries
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                    .collect();
                root.insert(section.to_string(), Value::Object(entries));
            }
            serde_json::to_string_pretty(&Value::Object(root)).unwrap_or_default()
        }
        Format::Markdown => report
            .iter()
            .map(|(section, entries)| {
                let lines: Vec<String> = entries
                    .iter()
                    .map(|(key, value)| format!(" - {key}: {value}"))
                    .collect();
                format!("## {section}:\n\n{}", lines.join("\n"))
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        Format::Text => {
            let mut out = String::new();
            for (section, entries) in report {
                out.push_str(&format!("\n  {section}:\n"));
                for (key, value) in entries {
                    out.push_str(&format!("    {key}: {value}\n"));
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::OptionValues;
    use serde_json::json;

    fn sample() -> Report {
        vec![
            ("System", vec![("OS".to_string(), "linux x86_64".to_string())]),
            ("Packages", vec![("packcli".to_string(), "0.1.0".to_string())]),
        ]
    }

    #[test]
    fn test_render_formats() {
        let json: Value = serde_json::from_str(&render(&sample(), Format::Json)).unwrap();
        assert_eq!(json["System"]["OS"], "linux x86_64");
        assert_eq!(json["Packages"]["packcli"], "0.1.0");

        let markdown = render(&sample(), Format::Markdown);
        assert!(markdown.starts_with("## System:\n\n - OS: linux x86_64"));

        let text = render(&sample(), Format::Text);
        assert!(text.contains("\n  Packages:\n    packcli: 0.1.0\n"));
    }

    #[tokio::test]
    async fn test_rejects_unknown_output() {
        let ctx = Arc::new(CliContext::for_tests("/work"));
        let mut values = OptionValues::new();
        values.insert("output", json!("yaml"));
        let invocation = Invocation {
            command: "info".into(),
            values,
            ..Invocation::default()
        };
        let error = run(ctx, invocation).await.unwrap_err();
        assert_eq!(error.to_string(), "'yaml' is not a valid value for output");
    }

    #[tokio::test]
    async fn test_reports_missing_engine() {
        let ctx = Arc::new(CliContext::for_tests("/work"));
        let report = gather(&ctx, &["left-pad".to_string()]).await;
        let packages = &report[2].1;
        assert!(packages.contains(&(ENGINE_PACKAGE.to_string(), NOT_FOUND.to_string())));
        assert!(packages.contains(&("left-pad".to_string(), NOT_FOUND.to_string())));
        assert_eq!(packages[0].1, env!("CARGO_PKG_VERSION"));
    }
}
