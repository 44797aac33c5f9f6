//! `extends` resolution.
//!
//! A configuration that extends other files is replaced by the merge of the
//! extended configurations followed by itself. Chains are followed until no
//! `extends` remains; a file that reappears in its own chain is an error.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, try_join_all};
use packcli_core::merge_objects;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::export::FactoryArgs;
use crate::loader::ConfigLoader;
use crate::set::{ConfigEntry, ConfigOptions, ResolvedConfigSet};

/// Paths named by a configuration's `extends` key.
///
/// # Examples
///
/// ```
/// use packcli_config::extends_paths;
/// use serde_json::json;
///
/// let config = json!({"extends": "./base.json"});
/// assert_eq!(
///     extends_paths(config.as_object().unwrap()).unwrap(),
///     Some(vec!["./base.json".to_string()])
/// );
/// assert_eq!(extends_paths(json!({}).as_object().unwrap()).unwrap(), None);
/// ```
pub fn extends_paths(options: &Map<String, Value>) -> Result<Option<Vec<String>>> {
    match options.get("extends") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(path)) => Ok(Some(vec![path.clone()])),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(path) => Ok(path.clone()),
                other => Err(invalid_extends(other)),
            })
            .collect::<Result<Vec<_>>>()
            .map(Some),
        Some(other) => Err(invalid_extends(other)),
    }
}

fn invalid_extends(value: &Value) -> ConfigError {
    let found = match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    ConfigError::InvalidExtends {
        found: found.to_string(),
    }
}

impl ConfigLoader {
    /// Resolves `extends` for every configuration in the set.
    ///
    /// Non-empty `cli_extends` replaces each configuration's own `extends`.
    /// Configurations are resolved concurrently; the ledger is updated once
    /// all of them have finished.
    pub async fn resolve_extends(
        &self,
        set: ResolvedConfigSet,
        cli_extends: &[String],
        args: Arc<FactoryArgs>,
    ) -> Result<ResolvedConfigSet> {
        let ResolvedConfigSet {
            options,
            mut ledger,
        } = set;
        let (entries, multiple) = match options {
            ConfigOptions::Single(entry) => (vec![entry], false),
            ConfigOptions::Multiple(entries) => (entries, true),
        };

        let mut jobs = Vec::with_capacity(entries.len());
        for entry in entries {
            let extends = if cli_extends.is_empty() {
                extends_paths(&entry.options)?
            } else {
                Some(cli_extends.to_vec())
            };
            let previous = ledger.get(entry.id).map(<[PathBuf]>::to_vec).unwrap_or_default();
            let args = args.clone();
            jobs.push(async move {
                let resolved: Result<(ConfigEntry, Option<Vec<PathBuf>>)> = match extends {
                    None => Ok((entry, None)),
                    Some(paths) => self
                        .extend(entry.options, previous, paths, args)
                        .await
                        .map(|(options, paths)| (ConfigEntry { id: entry.id, options }, Some(paths))),
                };
                resolved
            });
        }
        let resolved = try_join_all(jobs).await?;

        let mut entries = Vec::with_capacity(resolved.len());
        for (entry, paths) in resolved {
            if let Some(paths) = paths {
                ledger.record(entry.id, paths);
            }
            entries.push(entry);
        }

        let options = if multiple {
            ConfigOptions::Multiple(entries)
        } else {
            match entries.pop() {
                Some(entry) => ConfigOptions::Single(entry),
                None => ConfigOptions::Multiple(entries),
            }
        };
        Ok(ResolvedConfigSet { options, ledger })
    }

    /// Merges the configurations named in `extends` under `options`.
    ///
    /// `previous` holds the files already in this configuration's chain;
    /// the returned paths are `previous` followed by the newly loaded files.
    fn extend(
        &self,
        mut options: Map<String, Value>,
        previous: Vec<PathBuf>,
        extends: Vec<String>,
        args: Arc<FactoryArgs>,
    ) -> BoxFuture<'_, Result<(Map<String, Value>, Vec<PathBuf>)>> {
        async move {
            options.remove("extends");

            let targets: Vec<PathBuf> = extends.iter().map(|path| self.resolve_path(path)).collect();
            if let Some(repeated) = targets.iter().find(|path| previous.contains(*path)) {
                return Err(ConfigError::RecursiveConfiguration {
                    path: repeated.clone(),
                });
            }

            let loads = targets
                .into_iter()
                .map(|path| self.load_file(path, args.clone()));
            let loaded = try_join_all(loads).await?;

            let mut paths = previous;
            let mut loaded_options = Vec::new();
            for file in loaded {
                paths.push(file.path);
                loaded_options.extend(file.objects);
            }
            if !loaded_options.is_empty() {
                debug!(extends = ?extends, "merging extended configurations");
                options = loaded_options
                    .into_iter()
                    .chain(std::iter::once(options))
                    .reduce(merge_objects)
                    .unwrap_or_default();
            }

            match extends_paths(&options)? {
                Some(next) => self.extend(options, paths, next, args).await,
                None => Ok((options, paths)),
            }
        }
        .boxed()
    }
}
