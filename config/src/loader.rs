//! Configuration loading pipeline.
//!
//! [`ConfigLoader::resolve`] runs the full pipeline: load explicit or
//! default configuration files, select `--config-name`s, resolve `extends`
//! chains, and apply `--merge`.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::future::try_join_all;
use packcli_core::{MergeError, merge_all};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::export::{FactoryArgs, unwrap_export};
use crate::format::{DEFAULT_CONFIG_BASENAMES, DEFAULT_CONFIG_EXTENSIONS};
use crate::module::{ModuleLoader, require_then_import};
use crate::set::{ConfigEntry, ConfigOptions, ResolvedConfigSet};

/// What to load, as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// `--config` paths, relative to the working directory.
    pub config: Vec<String>,
    /// `--config-name` selections.
    pub config_name: Vec<String>,
    /// `--merge`.
    pub merge: bool,
    /// `--extends` paths; replace every file-declared `extends` when given.
    pub extends: Vec<String>,
    /// Folded `--env` mapping handed to factory exports.
    pub env: Value,
    /// Parsed options handed to factory exports.
    pub argv: Value,
}

/// One loaded configuration file.
#[derive(Debug)]
pub(crate) struct LoadedFile {
    pub(crate) path: PathBuf,
    pub(crate) objects: Vec<Map<String, Value>>,
    pub(crate) is_array: bool,
}

/// Loads and resolves build configurations.
pub struct ConfigLoader {
    pub(crate) cwd: PathBuf,
    modules: Arc<dyn ModuleLoader>,
}

impl ConfigLoader {
    pub fn new(cwd: impl Into<PathBuf>, modules: Arc<dyn ModuleLoader>) -> Self {
        Self {
            cwd: cwd.into(),
            modules,
        }
    }

    /// Runs the whole pipeline.
    pub async fn resolve(&self, options: &LoadOptions) -> Result<ResolvedConfigSet> {
        let set = self.load(options).await?;
        let set = select_names(set, &options.config_name)?;
        let set = self
            .resolve_extends(set, &options.extends, factory_args(options))
            .await?;
        if options.merge { merge(set) } else { Ok(set) }
    }

    /// Loads explicit `--config` files, or the first default file found.
    ///
    /// Explicit files are loaded concurrently; results keep input order.
    pub async fn load(&self, options: &LoadOptions) -> Result<ResolvedConfigSet> {
        let args = factory_args(options);

        if !options.config.is_empty() {
            let loads = options
                .config
                .iter()
                .map(|path| self.load_file(self.resolve_path(path), args.clone()));
            let loaded = try_join_all(loads).await?;
            info!(count = loaded.len(), "loaded configuration files");

            // One file keeps its own shape; several always form a sequence.
            let multiple = match loaded.as_slice() {
                [file] => file.is_array,
                _ => true,
            };
            let sources = loaded
                .into_iter()
                .flat_map(|LoadedFile { path, objects, .. }| {
                    objects.into_iter().map(move |object| (object, vec![path.clone()]))
                })
                .collect();
            return Ok(ResolvedConfigSet::from_sources(sources, multiple));
        }

        match self.find_default_config() {
            Some(path) => {
                let file = self.load_file(path, args).await?;
                info!(path = %file.path.display(), "loaded default configuration");
                let LoadedFile {
                    path,
                    objects,
                    is_array,
                } = file;
                let sources = objects
                    .into_iter()
                    .map(|object| (object, vec![path.clone()]))
                    .collect();
                Ok(ResolvedConfigSet::from_sources(sources, is_array))
            }
            None => {
                debug!(cwd = %self.cwd.display(), "no default configuration found");
                Ok(ResolvedConfigSet::empty())
            }
        }
    }

    /// First existing default configuration file, in priority order.
    pub fn find_default_config(&self) -> Option<PathBuf> {
        DEFAULT_CONFIG_BASENAMES
            .iter()
            .flat_map(|base| {
                DEFAULT_CONFIG_EXTENSIONS
                    .iter()
                    .map(move |ext| format!("{base}{ext}"))
            })
            .map(|name| self.cwd.join(name))
            .find(|path| path.is_file())
    }

    /// Resolves `path` against the working directory, lexically.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        normalize(&self.cwd.join(path))
    }

    /// Loads, unwraps and validates one configuration file.
    pub(crate) async fn load_file(&self, path: PathBuf, args: Arc<FactoryArgs>) -> Result<LoadedFile> {
        debug!(path = %path.display(), "loading configuration");
        let export = require_then_import(self.modules.as_ref(), &path).await?;
        let value = unwrap_export(export, args).await?;

        match value {
            Value::Null => Err(ConfigError::MissingExport { path }),
            Value::Object(object) => Ok(LoadedFile {
                path,
                objects: vec![object],
                is_array: false,
            }),
            Value::Array(items) => {
                let mut objects = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Object(object) => objects.push(object),
                        _ => return Err(ConfigError::InvalidConfiguration { path }),
                    }
                }
                Ok(LoadedFile {
                    path,
                    objects,
                    is_array: true,
                })
            }
            _ => Err(ConfigError::InvalidConfiguration { path }),
        }
    }
}

fn factory_args(options: &LoadOptions) -> Arc<FactoryArgs> {
    Arc::new(FactoryArgs {
        env: options.env.clone(),
        argv: options.argv.clone(),
    })
}

/// Collapses `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Reduces the set to the configurations named in `names`, in that order.
///
/// The result is always a sequence. Every missing name is reported in one
/// error.
pub fn select_names(set: ResolvedConfigSet, names: &[String]) -> Result<ResolvedConfigSet> {
    if names.is_empty() {
        return Ok(set);
    }

    let ResolvedConfigSet { options, ledger } = set;
    let entries = match options {
        ConfigOptions::Single(entry) => vec![entry],
        ConfigOptions::Multiple(entries) => entries,
    };

    let mut selected = Vec::with_capacity(names.len());
    let mut missing = Vec::new();
    for name in names {
        match entries.iter().find(|entry| entry.name() == Some(name.as_str())) {
            Some(entry) => selected.push(entry.clone()),
            None => missing.push(name.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(ConfigError::ConfigNamesNotFound(missing));
    }

    Ok(ResolvedConfigSet {
        options: ConfigOptions::Multiple(selected),
        ledger,
    })
}

/// Collapses a sequence of at least two configurations into one.
///
/// The merged configuration's ledger entry is the concatenation of its
/// operands' entries.
pub fn merge(set: ResolvedConfigSet) -> Result<ResolvedConfigSet> {
    let ResolvedConfigSet { options, mut ledger } = set;
    let entries = match options {
        ConfigOptions::Multiple(entries) if entries.len() >= 2 => entries,
        _ => return Err(MergeError::NotEnoughOperands.into()),
    };

    let mut paths = Vec::new();
    for entry in &entries {
        if let Some(entry_paths) = ledger.get(entry.id) {
            paths.extend_from_slice(entry_paths);
        }
    }
    let merged = merge_all(entries.into_iter().map(|entry| entry.options).collect())?;

    let id = ledger.allocate();
    ledger.record(id, paths);
    Ok(ResolvedConfigSet {
        options: ConfigOptions::Single(ConfigEntry { id, options: merged }),
        ledger,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn named_set() -> ResolvedConfigSet {
        ResolvedConfigSet::from_sources(
            vec![
                (object(json!({"name": "client"})), vec![PathBuf::from("/a.json")]),
                (object(json!({"name": "server"})), vec![PathBuf::from("/b.json")]),
            ],
            false,
        )
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c.json")), PathBuf::from("/a/c.json"));
    }

    #[test]
    fn test_select_names_in_requested_order() {
        let set = select_names(named_set(), &["server".into(), "client".into()]).unwrap();
        let names: Vec<_> = set.entries().iter().map(|e| e.name().unwrap()).collect();
        assert_eq!(names, vec!["server", "client"]);
        assert_eq!(set.paths_of(&set.entries()[0]), &[PathBuf::from("/b.json")]);
    }

    #[test]
    fn test_select_single_name_stays_sequence() {
        let set = select_names(named_set(), &["client".into()]).unwrap();
        assert!(set.is_multiple());
        assert_eq!(set.entries().len(), 1);
    }

    #[test]
    fn test_select_reports_all_missing() {
        let error = select_names(named_set(), &["x".into(), "client".into(), "y".into()]).unwrap_err();
        match error {
            ConfigError::ConfigNamesNotFound(names) => assert_eq!(names, vec!["x", "y"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_merge_concatenates_paths() {
        let set = merge(named_set()).unwrap();
        assert!(!set.is_multiple());
        assert_eq!(set.entries()[0].name(), Some("server"));
        assert_eq!(
            set.paths_of(&set.entries()[0]),
            &[PathBuf::from("/a.json"), PathBuf::from("/b.json")]
        );
    }

    #[test]
    fn test_merge_requires_two() {
        let error = merge(ResolvedConfigSet::empty()).unwrap_err();
        assert_eq!(
            error.to_string(),
            "At least two configurations are required for merge."
        );
    }
}
