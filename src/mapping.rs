//! Mapping: the minimal read surface two maps need for content equality.

use core::hash::{BuildHasher, Hash};
use std::collections::{BTreeMap, HashMap};

/// A key/value mapping that can report its size and membership of a pair.
pub trait Mapping<K, V> {
    fn entry_count(&self) -> usize;

    /// Whether `key` maps to a value equal to `value`.
    fn contains_entry(&self, key: &K, value: &V) -> bool;
}

impl<K, V, S> Mapping<K, V> for HashMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn entry_count(&self) -> usize {
        self.len()
    }

    fn contains_entry(&self, key: &K, value: &V) -> bool {
        self.get(key) == Some(value)
    }
}

impl<K, V> Mapping<K, V> for BTreeMap<K, V>
where
    K: Ord,
    V: PartialEq,
{
    fn entry_count(&self) -> usize {
        self.len()
    }

    fn contains_entry(&self, key: &K, value: &V) -> bool {
        self.get(key) == Some(value)
    }
}

impl<K, V, S> Mapping<K, V> for crate::ChainedTable<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn entry_count(&self) -> usize {
        self.len()
    }

    fn contains_entry(&self, key: &K, value: &V) -> bool {
        self.get(key) == Some(value)
    }
}

impl<K, V, S> Mapping<K, V> for crate::SharedTable<K, V, S>
where
    K: Eq + Hash + Clone,
    V: PartialEq + Clone,
    S: BuildHasher,
{
    fn entry_count(&self) -> usize {
        self.len()
    }

    fn contains_entry(&self, key: &K, value: &V) -> bool {
        self.with_table(|t| t.get(key) == Some(value))
    }
}
