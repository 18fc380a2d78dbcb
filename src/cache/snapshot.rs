//! Immutable snapshot of all stored pairs

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::value::Value;
use crate::wal::Operation;

/// A point-in-time view of every key
///
/// Never mutated once built; [`Snapshot::apply`] produces a new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    entries: BTreeMap<String, Value>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: BTreeMap<String, Value>) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    /// Copy-on-write merge of a batch, applied in order
    pub fn apply(&self, operations: &[Operation]) -> Snapshot {
        let mut entries = self.entries.clone();
        apply_operations(&mut entries, operations);
        Snapshot { entries }
    }

    pub fn into_entries(self) -> BTreeMap<String, Value> {
        self.entries
    }
}

/// Apply a batch to a plain map, in staged order
pub(crate) fn apply_operations(entries: &mut BTreeMap<String, Value>, operations: &[Operation]) {
    for op in operations {
        match op {
            Operation::Put { key, value } => {
                entries.insert(key.clone(), value.clone());
            }
            Operation::Remove { key } => {
                entries.remove(key);
            }
        }
    }
}
