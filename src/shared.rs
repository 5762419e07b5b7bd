//! SharedTable: a cloneable single-threaded handle over one `ChainedTable`.
//!
//! Every method borrows the table only for the duration of the structural
//! work and never while user callbacks run, so callbacks may call back
//! into the same table. Those callbacks receive clones of keys and values.
//! Any structural change made from inside a callback, or between two steps
//! of a traversal, is reported as `ConcurrentStructuralChange` instead of
//! being applied over a stale probe result.
//!
//! Keys and values that leave the table are dropped after the mutable
//! borrow ends, so their `Drop` may read the table too. Calling into the
//! table from `K: Hash`/`K: Eq` while it is mid-operation panics through
//! the `RefCell` borrow check.

use crate::config::TableConfig;
use crate::error::{Result, TableError};
use crate::table::{ChainedTable, Located};
use crate::traversal::{project_entry, project_key, project_value, Traversal};
use crate::views::{EntriesView, KeysView, ValuesView};
use core::cell::RefCell;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::rc::Rc;

pub struct SharedTable<K, V, S = RandomState> {
    pub(crate) inner: Rc<RefCell<ChainedTable<K, V, S>>>,
}

impl<K, V, S> Clone for SharedTable<K, V, S> {
    /// Another handle to the same table.
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K, V> SharedTable<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::from_table(ChainedTable::new())
    }

    pub fn with_config(config: TableConfig) -> Result<Self> {
        ChainedTable::with_config(config).map(Self::from_table)
    }
}

impl<K, V> Default for SharedTable<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> From<ChainedTable<K, V, S>> for SharedTable<K, V, S> {
    fn from(table: ChainedTable<K, V, S>) -> Self {
        Self::from_table(table)
    }
}

impl<K, V, S> SharedTable<K, V, S> {
    pub fn from_table(table: ChainedTable<K, V, S>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(table)),
        }
    }

    /// Whether both handles refer to the same table.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` against the underlying table. `f` must not call back into
    /// this handle.
    pub fn with_table<R>(&self, f: impl FnOnce(&ChainedTable<K, V, S>) -> R) -> R {
        f(&self.inner.borrow())
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.borrow().capacity()
    }

    pub fn structural_version(&self) -> u64 {
        self.inner.borrow().structural_version()
    }

    pub fn clear(&self) {
        let detached = self.inner.borrow_mut().detach_all();
        drop(detached);
    }
}

impl<K, V, S> SharedTable<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher,
{
    pub fn with_config_and_hasher(config: TableConfig, hasher: S) -> Result<Self> {
        ChainedTable::with_config_and_hasher(config, hasher).map(Self::from_table)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.borrow().contains_key(key)
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.inner.borrow().contains_value(value)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.borrow().get(key).cloned()
    }

    pub fn get_or_default<Q>(&self, key: &Q, default: V) -> V
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(key).unwrap_or(default)
    }

    pub fn put(&self, key: K, value: V) -> Option<V> {
        let displaced = self.inner.borrow_mut().put_displacing(key, value);
        displaced.map(|(_, old)| old)
    }

    pub fn put_if_absent(&self, key: K, value: V) -> Option<V> {
        let (existing, rejected) = {
            let mut t = self.inner.borrow_mut();
            let hash = t.make_hash(&key);
            let located = t.locate(hash, &key);
            match located {
                Located::Found { record, .. } => {
                    let existing = t.record(record).map(|r| r.value.clone());
                    (existing, Some((key, value)))
                }
                Located::Vacant { slot, distance } => {
                    t.insert_vacant(slot, distance, hash, key, value);
                    (None, None)
                }
            }
        };
        drop(rejected);
        existing
    }

    /// `put` every pair. The source iterator is drained before each `put`
    /// so it may itself read this table.
    pub fn put_all<I>(&self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in pairs {
            self.put(k, v);
        }
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let removed = self.inner.borrow_mut().remove_entry(key);
        removed.map(|(_, v)| v)
    }

    pub fn remove_if_eq<Q>(&self, key: &Q, expected: &V) -> bool
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: PartialEq,
    {
        let removed = self.inner.borrow_mut().take_if_eq(key, expected);
        removed.is_some()
    }

    pub fn replace<Q>(&self, key: &Q, value: V) -> Option<V>
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let swapped = match self.inner.borrow_mut().get_mut(key) {
            Some(v) => Ok(core::mem::replace(v, value)),
            None => Err(value),
        };
        swapped.ok()
    }

    pub fn replace_if_eq<Q>(&self, key: &Q, expected: &V, value: V) -> bool
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: PartialEq,
    {
        let swapped = self.inner.borrow_mut().swap_if_eq(key, expected, value);
        swapped.is_ok()
    }

    /// Probe for `key` and capture the structural version the outcome is
    /// valid for.
    fn locate_snapshot<Q>(&self, key: &Q) -> (u64, Located, Option<(K, V)>, u64)
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let t = self.inner.borrow();
        let hash = t.make_hash(key);
        let located = t.locate(hash, key);
        let current = located
            .record()
            .and_then(|rk| t.record(rk))
            .map(|r| (r.key.clone(), r.value.clone()));
        (hash, located, current, t.structural_version())
    }

    /// Re-borrow after a callback and apply its outcome, provided nothing
    /// structural happened in between.
    fn settle_after_callback(
        &self,
        version: u64,
        located: Located,
        hash: u64,
        key: Option<K>,
        outcome: Option<V>,
    ) -> Result<Option<V>> {
        let mut t = self.inner.borrow_mut();
        if t.structural_version() != version {
            drop(t);
            return Err(TableError::ConcurrentStructuralChange);
        }
        let (_, displaced) = t.settle(located, hash, key, outcome.clone());
        drop(t);
        drop(displaced);
        Ok(outcome)
    }

    /// Return the value for `key`, inserting `f(&key)` when absent.
    pub fn compute_if_absent<F>(&self, key: K, f: F) -> Result<Option<V>>
    where
        F: FnOnce(&K) -> Option<V>,
    {
        let (hash, located, current, version) = self.locate_snapshot(&key);
        if let Some((_, v)) = current {
            return Ok(Some(v));
        }
        let outcome = f(&key);
        self.settle_after_callback(version, located, hash, Some(key), outcome)
    }

    /// Remap an existing value; `None` removes the key.
    pub fn compute_if_present<Q, F>(&self, key: &Q, f: F) -> Result<Option<V>>
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&K, &V) -> Option<V>,
    {
        let (hash, located, current, version) = self.locate_snapshot(key);
        let Some((k, v)) = current else {
            return Ok(None);
        };
        let outcome = f(&k, &v);
        self.settle_after_callback(version, located, hash, None, outcome)
    }

    pub fn compute<F>(&self, key: K, f: F) -> Result<Option<V>>
    where
        F: FnOnce(&K, Option<&V>) -> Option<V>,
    {
        let (hash, located, current, version) = self.locate_snapshot(&key);
        let outcome = f(&key, current.as_ref().map(|(_, v)| v));
        self.settle_after_callback(version, located, hash, Some(key), outcome)
    }

    /// Insert `value` when absent, otherwise store `f(old, value)`; `None`
    /// removes the key.
    pub fn merge<F>(&self, key: K, value: V, f: F) -> Result<Option<V>>
    where
        F: FnOnce(&V, V) -> Option<V>,
    {
        let (hash, located, current, version) = self.locate_snapshot(&key);
        let outcome = match current {
            Some((_, old)) => f(&old, value),
            None => Some(value),
        };
        self.settle_after_callback(version, located, hash, Some(key), outcome)
    }

    /// Call `f` on every pair; fails if `f` changes the table structurally.
    pub fn for_each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&K, &V),
    {
        for entry in self.iter() {
            let (k, v) = entry?;
            f(&k, &v);
        }
        Ok(())
    }

    /// Replace every value with `f(key, value)`; fails if `f` changes the
    /// table structurally.
    pub fn replace_all<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&K, &V) -> V,
    {
        let mut traversal = self.iter();
        while let Some(step) = traversal.next_record() {
            let (rk, (k, v)) = step?;
            let replacement = f(&k, &v);
            let displaced = match self.inner.borrow_mut().record_mut(rk) {
                Some(r) => core::mem::replace(&mut r.value, replacement),
                None => replacement,
            };
            drop(displaced);
        }
        Ok(())
    }

    /// Removable traversal over `(K, V)` clones.
    pub fn iter(&self) -> Traversal<K, V, S, (K, V)> {
        Traversal::new(self.clone(), project_entry::<K, V>, true)
    }

    /// Non-removing traversal over values.
    pub fn elements(&self) -> Traversal<K, V, S, V> {
        Traversal::new(self.clone(), project_value::<K, V>, false)
    }

    /// Non-removing traversal over keys.
    pub fn key_enumeration(&self) -> Traversal<K, V, S, K> {
        Traversal::new(self.clone(), project_key::<K, V>, false)
    }

    pub fn keys(&self) -> KeysView<K, V, S> {
        KeysView::new(self.clone())
    }

    pub fn values(&self) -> ValuesView<K, V, S> {
        ValuesView::new(self.clone())
    }

    pub fn entries(&self) -> EntriesView<K, V, S> {
        EntriesView::new(self.clone())
    }

    pub fn content_hash(&self) -> u64
    where
        V: Hash,
    {
        self.inner.borrow().content_hash()
    }

    pub fn content_eq<M>(&self, other: &M) -> bool
    where
        M: crate::Mapping<K, V> + ?Sized,
        V: PartialEq,
    {
        let pairs: Vec<(K, V)> = self
            .inner
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        pairs.len() == other.entry_count()
            && pairs.iter().all(|(k, v)| other.contains_entry(k, v))
    }
}

impl<K, V, S, M> PartialEq<M> for SharedTable<K, V, S>
where
    K: Eq + Hash + Clone,
    V: PartialEq + Clone,
    S: BuildHasher,
    M: crate::Mapping<K, V>,
{
    fn eq(&self, other: &M) -> bool {
        self.content_eq(other)
    }
}

impl<K, V, S> fmt::Debug for SharedTable<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner.borrow(), f)
    }
}

impl<K, V, S> fmt::Display for SharedTable<K, V, S>
where
    K: fmt::Display,
    V: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner.borrow(), f)
    }
}
