//! Path ledger: which files each configuration came from.
//!
//! Configuration objects are plain JSON maps with no identity of their own,
//! so each one gets a synthetic [`ConfigId`] when it is created and the
//! ledger maps that id to the files that contributed to it.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::PathBuf;

/// Synthetic identity of one configuration object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigId(u64);

impl From<u64> for ConfigId {
    fn from(value: u64) -> Self {
        ConfigId(value)
    }
}

/// Monotonic id allocator.
#[derive(Debug)]
pub struct Gen<Id> {
    next: u64,
    phantom: PhantomData<fn() -> Id>,
}

impl<Id> Default for Gen<Id> {
    fn default() -> Self {
        Gen {
            next: 0,
            phantom: PhantomData,
        }
    }
}

impl<Id: From<u64>> Gen<Id> {
    pub fn next(&mut self) -> Id {
        let id = self.next;
        self.next = id.saturating_add(1);
        Id::from(id)
    }
}

/// Side table from configuration ids to their source files.
#[derive(Debug, Default)]
pub struct PathLedger {
    ids: Gen<ConfigId>,
    paths: HashMap<ConfigId, Vec<PathBuf>>,
}

impl PathLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an id with no recorded paths.
    pub fn allocate(&mut self) -> ConfigId {
        self.ids.next()
    }

    /// Replaces the paths recorded for `id`.
    pub fn record(&mut self, id: ConfigId, paths: Vec<PathBuf>) {
        self.paths.insert(id, paths);
    }

    pub fn get(&self, id: ConfigId) -> Option<&[PathBuf]> {
        self.paths.get(&id).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let mut ledger = PathLedger::new();
        let a = ledger.allocate();
        let b = ledger.allocate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_record_and_get() {
        let mut ledger = PathLedger::new();
        let id = ledger.allocate();
        assert!(ledger.get(id).is_none());

        ledger.record(id, vec![PathBuf::from("/a.json")]);
        assert_eq!(ledger.get(id), Some(&[PathBuf::from("/a.json")][..]));
    }
}
