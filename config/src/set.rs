//! Resolved configuration sets.

use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::ledger::{ConfigId, PathLedger};

/// One configuration object and its identity in the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    pub id: ConfigId,
    pub options: Map<String, Value>,
}

impl ConfigEntry {
    /// Value of the `name` key, when it is a string.
    pub fn name(&self) -> Option<&str> {
        self.options.get("name").and_then(Value::as_str)
    }
}

/// Either one configuration or an ordered sequence of them.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOptions {
    Single(ConfigEntry),
    Multiple(Vec<ConfigEntry>),
}

/// Loaded configurations plus the path ledger that tracks their sources.
///
/// # Examples
///
/// ```
/// use packcli_config::ResolvedConfigSet;
///
/// let set = ResolvedConfigSet::empty();
/// assert!(!set.is_multiple());
/// assert_eq!(set.entries().len(), 1);
/// assert!(set.paths_of(&set.entries()[0]).is_empty());
/// ```
#[derive(Debug)]
pub struct ResolvedConfigSet {
    pub options: ConfigOptions,
    pub ledger: PathLedger,
}

impl ResolvedConfigSet {
    /// A single empty configuration with no source file.
    pub fn empty() -> Self {
        let mut ledger = PathLedger::new();
        let id = ledger.allocate();
        Self {
            options: ConfigOptions::Single(ConfigEntry {
                id,
                options: Map::new(),
            }),
            ledger,
        }
    }

    /// Builds a set from objects and their source paths.
    ///
    /// With `multiple == false` exactly one object is expected; any extra
    /// objects make the set multiple.
    pub fn from_sources(sources: Vec<(Map<String, Value>, Vec<PathBuf>)>, multiple: bool) -> Self {
        let mut ledger = PathLedger::new();
        let mut entries: Vec<ConfigEntry> = sources
            .into_iter()
            .map(|(options, paths)| {
                let id = ledger.allocate();
                if !paths.is_empty() {
                    ledger.record(id, paths);
                }
                ConfigEntry { id, options }
            })
            .collect();

        let options = if !multiple && entries.len() == 1 {
            ConfigOptions::Single(entries.remove(0))
        } else {
            ConfigOptions::Multiple(entries)
        };
        Self { options, ledger }
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self.options, ConfigOptions::Multiple(_))
    }

    pub fn entries(&self) -> &[ConfigEntry] {
        match &self.options {
            ConfigOptions::Single(entry) => std::slice::from_ref(entry),
            ConfigOptions::Multiple(entries) => entries,
        }
    }

    pub fn entries_mut(&mut self) -> &mut [ConfigEntry] {
        match &mut self.options {
            ConfigOptions::Single(entry) => std::slice::from_mut(entry),
            ConfigOptions::Multiple(entries) => entries,
        }
    }

    /// Source files of `entry`; empty for synthesized configurations.
    pub fn paths_of(&self, entry: &ConfigEntry) -> &[PathBuf] {
        self.ledger.get(entry.id).unwrap_or_default()
    }

    /// Every source file across the set, first-seen order, no duplicates.
    pub fn all_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in self.entries() {
            for path in self.paths_of(entry) {
                if !paths.contains(path) {
                    paths.push(path.clone());
                }
            }
        }
        paths
    }

    /// Configurations as JSON: an object when single, an array otherwise.
    pub fn to_value(&self) -> Value {
        match &self.options {
            ConfigOptions::Single(entry) => Value::Object(entry.options.clone()),
            ConfigOptions::Multiple(entries) => Value::Array(
                entries
                    .iter()
                    .map(|entry| Value::Object(entry.options.clone()))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_single_source_is_single() {
        let set = ResolvedConfigSet::from_sources(
            vec![(object(json!({"mode": "none"})), vec![PathBuf::from("/a.json")])],
            false,
        );
        assert!(!set.is_multiple());
        assert_eq!(set.to_value(), json!({"mode": "none"}));
        assert_eq!(set.all_paths(), vec![PathBuf::from("/a.json")]);
    }

    #[test]
    fn test_multiple_flag_keeps_sequence() {
        let set = ResolvedConfigSet::from_sources(
            vec![(object(json!({"name": "a"})), vec![PathBuf::from("/a.json")])],
            true,
        );
        assert!(set.is_multiple());
        assert_eq!(set.entries()[0].name(), Some("a"));
    }

    #[test]
    fn test_all_paths_deduplicates() {
        let path = PathBuf::from("/a.json");
        let set = ResolvedConfigSet::from_sources(
            vec![
                (object(json!({"name": "a"})), vec![path.clone()]),
                (object(json!({"name": "b"})), vec![path.clone()]),
            ],
            false,
        );
        assert_eq!(set.all_paths(), vec![path]);
    }
}
