//! ChainedTable: the owned table.
//!
//! Lookups follow the double-hash probe sequence from `probe` and walk the
//! whole chain of every slot they visit. A lookup stops once it has
//! visited at least `probe_depth + 1` slots and either saw an empty slot
//! or has visited as many slots as there are records. `probe_depth` is the
//! longest probe distance any insertion used since the last rehash or
//! clear, so records placed behind slots that later emptied stay
//! reachable.
//!
//! Every insert, remove, clear and rehash bumps the structural version.
//! Replacing the value of an existing record does not.

use crate::config::{TableConfig, DEFAULT_CAPACITY, MAX_CAPACITY};
use crate::error::{Result, TableError};
use crate::mapping::Mapping;
use crate::probe::{primary_index, ProbeSeq};
use crate::store::{BucketStore, Record, RecordKey, Records};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash, Hasher};
use std::collections::hash_map::{DefaultHasher, RandomState};
use tracing::{debug, trace};

/// User data pushed out of the table by `settle`: the caller's unused
/// key, an unlinked pair and an overwritten value. Callers holding a
/// `RefCell` guard drop it after the guard.
pub(crate) type Displaced<K, V> = (Option<K>, Option<(K, V)>, Option<V>);

/// Outcome of probing for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Located {
    Found {
        slot: usize,
        prev: Option<RecordKey>,
        record: RecordKey,
    },
    Vacant {
        slot: usize,
        distance: usize,
    },
}

impl Located {
    #[inline]
    pub(crate) fn record(&self) -> Option<RecordKey> {
        match *self {
            Located::Found { record, .. } => Some(record),
            Located::Vacant { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct ChainedTable<K, V, S = RandomState> {
    store: BucketStore<K, V>,
    hasher: S,
    config: TableConfig,
    threshold: usize,
    probe_depth: usize,
    version: u64,
}

impl<K, V> ChainedTable<K, V>
where
    K: Eq + Hash,
{
    /// Capacity 11, load factor 0.75.
    pub fn new() -> Self {
        Self::build(TableConfig::default(), DEFAULT_CAPACITY, RandomState::new())
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_config(TableConfig::new().with_capacity(capacity))
    }

    pub fn with_capacity_and_load_factor(capacity: usize, load_factor: f32) -> Result<Self> {
        Self::with_config(
            TableConfig::new()
                .with_capacity(capacity)
                .with_load_factor(load_factor),
        )
    }

    pub fn with_config(config: TableConfig) -> Result<Self> {
        Self::with_config_and_hasher(config, RandomState::new())
    }
}

impl<K, V, S> Default for ChainedTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> ChainedTable<K, V, S> {
    fn build(config: TableConfig, capacity: usize, hasher: S) -> Self {
        Self {
            store: BucketStore::with_capacity(capacity),
            hasher,
            threshold: config.threshold_for(capacity),
            config,
            probe_depth: 0,
            version: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    /// Current number of slots.
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Record count at which the next insertion rehashes.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn load_factor(&self) -> f32 {
        self.config.load_factor
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Counter bumped by every operation that adds, removes or relocates
    /// records.
    pub fn structural_version(&self) -> u64 {
        self.version
    }

    /// Drop every record. Capacity is kept.
    pub fn clear(&mut self) {
        drop(self.detach_all());
    }

    /// Empty the table and return its records for the caller to drop.
    pub(crate) fn detach_all(&mut self) -> Records<K, V> {
        trace!(len = self.store.len(), "clearing table");
        let records = self.store.detach();
        self.probe_depth = 0;
        self.bump();
        records
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.store.iter(),
            remaining: self.store.len(),
        }
    }

    /// Iterator with mutable access to values. Order is unspecified and
    /// may differ from `iter`.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.store.records_mut(),
        }
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for (k, v) in self.iter() {
            f(k, v);
        }
    }

    /// Replace every value with `f(key, value)`.
    pub fn replace_all<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &V) -> V,
    {
        for (k, v) in self.iter_mut() {
            *v = f(k, v);
        }
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.store.iter().any(|(_, r)| r.value == *value)
    }

    /// Order-independent hash of the contents: the wrapping sum over all
    /// records of `hash(key) ^ hash(value)`, both taken with a fixed-key
    /// SipHash so tables with different hasher seeds agree.
    pub fn content_hash(&self) -> u64
    where
        K: Hash,
        V: Hash,
    {
        self.store.iter().fold(0u64, |acc, (_, r)| {
            acc.wrapping_add(fixed_hash(&r.key) ^ fixed_hash(&r.value))
        })
    }

    #[inline]
    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    pub(crate) fn store(&self) -> &BucketStore<K, V> {
        &self.store
    }

    #[inline]
    pub(crate) fn record(&self, rk: RecordKey) -> Option<&Record<K, V>> {
        self.store.record(rk)
    }

    #[inline]
    pub(crate) fn record_mut(&mut self, rk: RecordKey) -> Option<&mut Record<K, V>> {
        self.store.record_mut(rk)
    }

    #[inline]
    fn value_of(&self, rk: RecordKey) -> Option<&V> {
        self.store.record(rk).map(|r| &r.value)
    }

    /// Grow to `2C + 1` slots (capped) and rehome every record by its
    /// cached hash. Returns false when already at the cap.
    fn grow(&mut self) -> bool {
        let old_capacity = self.store.capacity();
        let max = self.config.max_capacity;
        if old_capacity >= max {
            trace!(capacity = old_capacity, "table at maximum capacity; not growing");
            return false;
        }
        let new_capacity = old_capacity.saturating_mul(2).saturating_add(1).min(max);
        self.store.rehome(new_capacity);
        self.threshold = self.config.threshold_for(new_capacity);
        self.probe_depth = 0;
        self.bump();
        debug!(
            old_capacity,
            new_capacity,
            len = self.store.len(),
            threshold = self.threshold,
            "rehashed table"
        );
        true
    }

    /// Link a new record at a vacant probe position, growing first when
    /// this record would bring the count up to the threshold.
    pub(crate) fn insert_vacant(
        &mut self,
        slot: usize,
        distance: usize,
        hash: u64,
        key: K,
        value: V,
    ) -> RecordKey {
        let (slot, distance) = if self.store.len() + 1 >= self.threshold && self.grow() {
            (primary_index(hash, self.store.capacity()), 0)
        } else {
            (slot, distance)
        };
        self.probe_depth = self.probe_depth.max(distance);
        let rk = self.store.push_front(slot, hash, key, value);
        self.bump();
        rk
    }

    pub(crate) fn unlink_found(
        &mut self,
        slot: usize,
        prev: Option<RecordKey>,
        record: RecordKey,
    ) -> Option<Record<K, V>> {
        let removed = self.store.unlink(slot, prev, record)?;
        self.bump();
        Some(removed)
    }

    /// Apply a remapping outcome to a located key: `None` removes a found
    /// record, `Some` replaces its value or inserts `key`. Returns the
    /// record now holding the outcome and whatever left the table.
    pub(crate) fn settle(
        &mut self,
        located: Located,
        hash: u64,
        key: Option<K>,
        outcome: Option<V>,
    ) -> (Option<RecordKey>, Displaced<K, V>) {
        match (located, outcome) {
            (Located::Found { slot, prev, record }, None) => {
                let entry = self
                    .unlink_found(slot, prev, record)
                    .map(|r| (r.key, r.value));
                (None, (key, entry, None))
            }
            (Located::Found { record, .. }, Some(value)) => {
                let old = match self.store.record_mut(record) {
                    Some(r) => core::mem::replace(&mut r.value, value),
                    None => value,
                };
                (Some(record), (key, None, Some(old)))
            }
            (Located::Vacant { slot, distance }, Some(value)) => {
                debug_assert!(key.is_some(), "insertion needs an owned key");
                match key {
                    Some(key) => {
                        let rk = self.insert_vacant(slot, distance, hash, key, value);
                        (Some(rk), (None, None, None))
                    }
                    None => (None, (None, None, Some(value))),
                }
            }
            (Located::Vacant { .. }, None) => (None, (key, None, None)),
        }
    }

    pub fn cursor(&mut self) -> Cursor<'_, K, V, S> {
        Cursor {
            slot: self.store.capacity(),
            expected: self.version,
            table: self,
            next: None,
            last: None,
        }
    }
}

impl<K, V, S> ChainedTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::build(TableConfig::default(), DEFAULT_CAPACITY, hasher)
    }

    pub fn with_config_and_hasher(config: TableConfig, hasher: S) -> Result<Self> {
        let capacity = config.validate()?;
        Ok(Self::build(config, capacity, hasher))
    }

    #[inline]
    pub(crate) fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// Probe for `q`. On a miss, reports the first empty slot seen, or the
    /// last slot visited when none was empty.
    pub(crate) fn locate<Q>(&self, hash: u64, q: &Q) -> Located
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let len = self.store.len();
        let mut seq = ProbeSeq::new(hash, self.store.capacity());
        let mut vacant: Option<(usize, usize)> = None;
        let mut distance = 0usize;
        loop {
            let slot = seq.advance();
            let mut prev = None;
            let mut empty = true;
            for (rk, record) in self.store.chain(slot) {
                empty = false;
                if record.hash == hash && record.key.borrow() == q {
                    return Located::Found {
                        slot,
                        prev,
                        record: rk,
                    };
                }
                prev = Some(rk);
            }
            if empty && vacant.is_none() {
                vacant = Some((slot, distance));
            }
            if distance >= self.probe_depth {
                if let Some((slot, distance)) = vacant {
                    return Located::Vacant { slot, distance };
                }
                if distance + 1 >= len {
                    return Located::Vacant { slot, distance };
                }
            }
            distance += 1;
        }
    }

    fn find<Q>(&self, key: &Q) -> Option<RecordKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.locate(self.make_hash(key), key).record()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(key).is_some()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.value_of(self.find(key)?)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.record(self.find(key)?).map(|r| (&r.key, &r.value))
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let rk = self.find(key)?;
        self.record_mut(rk).map(|r| &mut r.value)
    }

    pub fn get_or_default<'a, Q>(&'a self, key: &Q, default: &'a V) -> &'a V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(key).unwrap_or(default)
    }

    /// Insert or overwrite. Returns the previous value; overwriting does not
    /// change the structural version.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        self.put_displacing(key, value).map(|(_, old)| old)
    }

    /// `put`, also handing back the unused `key` on overwrite.
    pub(crate) fn put_displacing(&mut self, key: K, value: V) -> Option<(K, V)> {
        let hash = self.make_hash(&key);
        match self.locate(hash, &key) {
            Located::Found { record, .. } => {
                let r = self.store.record_mut(record)?;
                Some((key, core::mem::replace(&mut r.value, value)))
            }
            Located::Vacant { slot, distance } => {
                self.insert_vacant(slot, distance, hash, key, value);
                None
            }
        }
    }

    /// Insert only when `key` is absent. Returns the existing value when
    /// present, dropping `value`.
    pub fn put_if_absent(&mut self, key: K, value: V) -> Option<&V> {
        let hash = self.make_hash(&key);
        match self.locate(hash, &key) {
            Located::Found { record, .. } => self.value_of(record),
            Located::Vacant { slot, distance } => {
                self.insert_vacant(slot, distance, hash, key, value);
                None
            }
        }
    }

    /// `put` every pair in turn.
    pub fn put_all<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in pairs {
            self.put(k, v);
        }
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.locate(self.make_hash(key), key) {
            Located::Found { slot, prev, record } => self
                .unlink_found(slot, prev, record)
                .map(|r| (r.key, r.value)),
            Located::Vacant { .. } => None,
        }
    }

    /// Remove `key` only while it maps to `expected`.
    pub fn remove_if_eq<Q>(&mut self, key: &Q, expected: &V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: PartialEq,
    {
        self.take_if_eq(key, expected).is_some()
    }

    /// `remove_if_eq`, handing back the removed pair.
    pub(crate) fn take_if_eq<Q>(&mut self, key: &Q, expected: &V) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: PartialEq,
    {
        match self.locate(self.make_hash(key), key) {
            Located::Found { slot, prev, record }
                if self.value_of(record) == Some(expected) =>
            {
                self.unlink_found(slot, prev, record)
                    .map(|r| (r.key, r.value))
            }
            _ => None,
        }
    }

    /// Overwrite the value of an existing key; never inserts.
    pub fn replace<Q>(&mut self, key: &Q, value: V) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_mut(key).map(|v| core::mem::replace(v, value))
    }

    /// Overwrite only while `key` maps to `expected`.
    pub fn replace_if_eq<Q>(&mut self, key: &Q, expected: &V, value: V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: PartialEq,
    {
        self.swap_if_eq(key, expected, value).is_ok()
    }

    /// `replace_if_eq` returning the old value on success, or `value`
    /// back when nothing was replaced.
    pub(crate) fn swap_if_eq<Q>(
        &mut self,
        key: &Q,
        expected: &V,
        value: V,
    ) -> core::result::Result<V, V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: PartialEq,
    {
        match self.get_mut(key) {
            Some(v) if *v == *expected => Ok(core::mem::replace(v, value)),
            _ => Err(value),
        }
    }

    /// Return the value for `key`, inserting `f(&key)` when absent and
    /// `f` produces one.
    pub fn compute_if_absent<F>(&mut self, key: K, f: F) -> Option<&V>
    where
        F: FnOnce(&K) -> Option<V>,
    {
        let hash = self.make_hash(&key);
        let located = self.locate(hash, &key);
        if let Some(rk) = located.record() {
            return self.value_of(rk);
        }
        let outcome = f(&key);
        let (rk, _) = self.settle(located, hash, Some(key), outcome);
        self.value_of(rk?)
    }

    /// Remap the value of an existing key; `None` removes it.
    pub fn compute_if_present<Q, F>(&mut self, key: &Q, f: F) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&K, &V) -> Option<V>,
    {
        let hash = self.make_hash(key);
        let located = self.locate(hash, key);
        let record = self.record(located.record()?)?;
        let outcome = f(&record.key, &record.value);
        let (rk, _) = self.settle(located, hash, None, outcome);
        self.value_of(rk?)
    }

    /// Remap the value for `key`, present or not; `None` removes it or
    /// leaves it absent.
    pub fn compute<F>(&mut self, key: K, f: F) -> Option<&V>
    where
        F: FnOnce(&K, Option<&V>) -> Option<V>,
    {
        let hash = self.make_hash(&key);
        let located = self.locate(hash, &key);
        let current = located.record().and_then(|rk| self.value_of(rk));
        let outcome = f(&key, current);
        let (rk, _) = self.settle(located, hash, Some(key), outcome);
        self.value_of(rk?)
    }

    /// Insert `value` when absent, otherwise replace the value with
    /// `f(old, value)`; `None` removes it.
    pub fn merge<F>(&mut self, key: K, value: V, f: F) -> Option<&V>
    where
        F: FnOnce(&V, V) -> Option<V>,
    {
        let hash = self.make_hash(&key);
        let located = self.locate(hash, &key);
        let outcome = match located.record().and_then(|rk| self.value_of(rk)) {
            Some(old) => f(old, value),
            None => Some(value),
        };
        let (rk, _) = self.settle(located, hash, Some(key), outcome);
        self.value_of(rk?)
    }

    /// Keep only the pairs for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut cursor = self.cursor();
        while let Some((k, v)) = cursor.next_entry() {
            if !keep(k, v) {
                let _ = cursor.remove();
            }
        }
    }

    /// Compare contents against any mapping, ignoring order.
    pub fn content_eq<M>(&self, other: &M) -> bool
    where
        M: Mapping<K, V> + ?Sized,
        V: PartialEq,
    {
        self.len() == other.entry_count()
            && self.iter().all(|(k, v)| other.contains_entry(k, v))
    }

    /// Unlink a record the caller already holds, re-deriving its slot
    /// through the probe sequence.
    pub(crate) fn remove_record(&mut self, rk: RecordKey) -> Option<(K, V)> {
        let record = self.record(rk)?;
        match self.locate(record.hash, &record.key) {
            Located::Found { slot, prev, record } if record == rk => self
                .unlink_found(slot, prev, record)
                .map(|r| (r.key, r.value)),
            _ => None,
        }
    }
}

impl<K, V, S> ChainedTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    /// Copy every pair of an iterator into a table sized
    /// `max(2 * len, 11)` with load factor 0.75.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let pairs = pairs.into_iter();
        let (lower, _) = pairs.size_hint();
        let capacity = lower
            .saturating_mul(2)
            .clamp(DEFAULT_CAPACITY, MAX_CAPACITY);
        let mut table = Self::build(
            TableConfig::default().with_capacity(capacity),
            capacity,
            S::default(),
        );
        table.put_all(pairs);
        table
    }
}

fn fixed_hash<T: Hash + ?Sized>(t: &T) -> u64 {
    let mut h = DefaultHasher::new();
    t.hash(&mut h);
    h.finish()
}

/// Removing walk over an owned table.
///
/// `next_entry` yields pairs in traversal order; `remove` unlinks the pair
/// it yielded last.
pub struct Cursor<'a, K, V, S> {
    table: &'a mut ChainedTable<K, V, S>,
    slot: usize,
    next: Option<RecordKey>,
    last: Option<RecordKey>,
    expected: u64,
}

impl<'a, K, V, S> Cursor<'a, K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn has_next(&mut self) -> bool {
        let (next, slot) = self.table.store.advance(self.next, self.slot);
        self.next = next;
        self.slot = slot;
        next.is_some()
    }

    pub fn next_entry(&mut self) -> Option<(&K, &V)> {
        debug_assert_eq!(self.expected, self.table.version);
        let (next, slot) = self.table.store.advance(self.next, self.slot);
        self.slot = slot;
        let rk = next?;
        let record = self.table.store.record(rk)?;
        self.next = record.next;
        self.last = Some(rk);
        Some((&record.key, &record.value))
    }

    /// Remove the pair returned by the last `next_entry`.
    pub fn remove(&mut self) -> Result<(K, V)> {
        let rk = self
            .last
            .take()
            .ok_or(TableError::IllegalState("remove called without a preceding advance"))?;
        if self.expected != self.table.version {
            return Err(TableError::ConcurrentStructuralChange);
        }
        let removed = self
            .table
            .remove_record(rk)
            .ok_or(TableError::ConcurrentStructuralChange)?;
        self.expected = self.table.version;
        Ok(removed)
    }
}

impl<'a, K, V, S> fmt::Debug for Cursor<'a, K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("slot", &self.slot)
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}

/// Iterator over `(&K, &V)` in traversal order.
pub struct Iter<'a, K, V> {
    inner: crate::store::StoreIter<'a, K, V>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let (_, r) = self.inner.next()?;
        self.remaining = self.remaining.saturating_sub(1);
        Some((&r.key, &r.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V> {}

/// Iterator over `(&K, &mut V)`.
pub struct IterMut<'a, K, V> {
    inner: slotmap::basic::ValuesMut<'a, RecordKey, Record<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|r| (&r.key, &mut r.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }
}

pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }
}

pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    #[inline]
    fn next(&mut self) -> Option<&'a mut V> {
        self.inner.next().map(|(_, v)| v)
    }
}

/// Owning iterator over `(K, V)`.
pub struct IntoIter<K, V> {
    inner: slotmap::basic::IntoIter<RecordKey, Record<K, V>>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    #[inline]
    fn next(&mut self) -> Option<(K, V)> {
        self.inner.next().map(|(_, r)| (r.key, r.value))
    }
}

impl<K, V, S> IntoIterator for ChainedTable<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter {
            inner: self.store.into_records(),
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a ChainedTable<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<K, V, S> Extend<(K, V)> for ChainedTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        self.put_all(iter);
    }
}

impl<K, V, S> FromIterator<(K, V)> for ChainedTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_pairs(iter)
    }
}

impl<K, V, S> fmt::Debug for ChainedTable<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// `{k1=v1, k2=v2}` in traversal order.
impl<K, V, S> fmt::Display for ChainedTable<K, V, S>
where
    K: fmt::Display,
    V: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}

impl<K, V, S, M> PartialEq<M> for ChainedTable<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
    M: Mapping<K, V>,
{
    fn eq(&self, other: &M) -> bool {
        self.content_eq(other)
    }
}

impl<K, V, S> Eq for ChainedTable<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, S> Hash for ChainedTable<K, V, S>
where
    K: Hash,
    V: Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.content_hash());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[derive(Clone, Default)]
    struct ConstBuildHasher;
    struct ConstHasher;
    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> Self::Hasher {
            ConstHasher
        }
    }
    impl Hasher for ConstHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            0
        }
    }

    /// Hashes a `u64` key to itself so slot placement is predictable.
    #[derive(Clone, Default)]
    struct IdentityBuildHasher;
    struct IdentityHasher(u64);
    impl BuildHasher for IdentityBuildHasher {
        type Hasher = IdentityHasher;
        fn build_hasher(&self) -> Self::Hasher {
            IdentityHasher(0)
        }
    }
    impl Hasher for IdentityHasher {
        fn write(&mut self, bytes: &[u8]) {
            for b in bytes {
                self.0 = (self.0 << 8) | u64::from(*b);
            }
        }
        fn write_u64(&mut self, n: u64) {
            self.0 = n;
        }
        fn finish(&self) -> u64 {
            self.0
        }
    }

    fn identity_table(capacity: usize) -> ChainedTable<u64, u64, IdentityBuildHasher> {
        ChainedTable::with_config_and_hasher(
            TableConfig::new().with_capacity(capacity),
            IdentityBuildHasher,
        )
        .unwrap()
    }

    #[test]
    fn eighth_insert_rehashes_capacity_eleven_once() {
        let mut t: ChainedTable<i32, i32> =
            ChainedTable::with_capacity_and_load_factor(11, 0.75).unwrap();
        assert_eq!(t.threshold(), 8);
        for k in 1..=7 {
            t.put(k, k);
            assert_eq!(t.capacity(), 11, "no growth before the 8th insert");
        }
        let before = t.structural_version();
        t.put(8, 8);
        assert_eq!(t.capacity(), 23);
        assert_eq!(t.threshold(), 17);
        assert_eq!(t.len(), 8);
        // One bump for the rehash, one for the insert.
        assert_eq!(t.structural_version(), before + 2);
        for k in 1..=8 {
            assert_eq!(t.get(&k), Some(&k));
        }
    }

    #[test]
    fn overwrite_returns_previous_without_structural_bump() {
        let mut t: ChainedTable<i32, i32> = ChainedTable::new();
        assert_eq!(t.put(5, 23), None);
        let v = t.structural_version();
        assert_eq!(t.put(5, 45), Some(23));
        assert_eq!(t.get(&5), Some(&45));
        assert_eq!(t.structural_version(), v);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn removing_absent_key_changes_nothing() {
        let mut t: ChainedTable<i32, i32> = ChainedTable::new();
        t.put(1, 1);
        let v = t.structural_version();
        assert_eq!(t.remove(&12), None);
        assert_eq!(t.len(), 1);
        assert_eq!(t.structural_version(), v);
    }

    #[test]
    fn constructor_rejects_bad_load_factor() {
        for lf in [0.0f32, -0.5, f32::NAN] {
            let r: Result<ChainedTable<i32, i32>> =
                ChainedTable::with_capacity_and_load_factor(5, lf);
            assert!(matches!(r, Err(TableError::InvalidArgument(_))));
        }
    }

    #[test]
    fn zero_capacity_becomes_one_and_still_grows() {
        let mut t: ChainedTable<i32, i32> = ChainedTable::with_capacity(0).unwrap();
        assert_eq!(t.capacity(), 1);
        for k in 0..20 {
            t.put(k, k * 2);
        }
        assert!(t.capacity() > 1);
        for k in 0..20 {
            assert_eq!(t.get(&k), Some(&(k * 2)));
        }
    }

    #[test]
    fn growth_stops_at_max_capacity() {
        let config = TableConfig::new().with_capacity(3).with_max_capacity(7);
        let mut t: ChainedTable<i32, i32> = ChainedTable::with_config(config).unwrap();
        for k in 0..50 {
            t.put(k, k);
        }
        assert_eq!(t.capacity(), 7);
        assert_eq!(t.len(), 50);
        for k in 0..50 {
            assert_eq!(t.get(&k), Some(&k));
        }
    }

    #[test]
    fn colliding_keys_share_chains_and_stay_reachable() {
        let mut t: ChainedTable<String, i32, ConstBuildHasher> =
            ChainedTable::with_hasher(ConstBuildHasher);
        for i in 0..30 {
            assert_eq!(t.put(format!("k{i}"), i), None);
        }
        assert_eq!(t.len(), 30);
        for i in 0..30 {
            assert_eq!(t.get(format!("k{i}").as_str()), Some(&i));
        }
        for i in (0..30).step_by(3) {
            assert_eq!(t.remove(format!("k{i}").as_str()), Some(i));
        }
        for i in 0..30 {
            assert_eq!(t.contains_key(format!("k{i}").as_str()), i % 3 != 0);
        }
    }

    #[test]
    fn records_behind_an_emptied_slot_stay_reachable() {
        // Capacity 11: keys 3 and 14 share primary slot 3; 14 steps by
        // 7 - (14 % 7) = 7, landing on slot 10 once two records exist.
        let mut t = identity_table(11);
        t.put(3, 30);
        t.put(5, 50);
        t.put(14, 140);
        assert_eq!(t.remove(&3), Some(30));
        // Slot 3 is empty now; 14 must still be found past it.
        assert_eq!(t.get(&14), Some(&140));
        assert_eq!(t.put(14, 141), Some(140));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn chained_records_behind_a_head_are_found() {
        // Fill every slot visited by key 0's probe so its insertion chains
        // under an existing head.
        let mut t: ChainedTable<u64, u64, IdentityBuildHasher> =
            ChainedTable::with_config_and_hasher(
                TableConfig::new().with_capacity(5).with_load_factor(100.0),
                IdentityBuildHasher,
            )
            .unwrap();
        for k in 0..40u64 {
            t.put(k, k + 1);
        }
        assert_eq!(t.capacity(), 5);
        for k in 0..40u64 {
            assert_eq!(t.get(&k), Some(&(k + 1)), "key {k}");
        }
        for k in (0..40u64).filter(|k| k % 2 == 1) {
            assert_eq!(t.remove(&k), Some(k + 1));
        }
        for k in 0..40u64 {
            assert_eq!(t.contains_key(&k), k % 2 == 0, "key {k}");
        }
    }

    #[test]
    fn conditional_operations() {
        let mut t: ChainedTable<i32, i32> = ChainedTable::new();
        for k in 1..=10 {
            t.put(k, k * 10);
        }
        assert!(!t.replace_if_eq(&0, &0, 1));
        assert!(t.replace_if_eq(&1, &10, 11));
        assert!(!t.replace_if_eq(&2, &99, 0));
        assert_eq!(t.get(&2), Some(&20));
        assert_eq!(t.replace(&0, 0), None);
        assert!(!t.contains_key(&0));
        assert_eq!(t.replace(&7, 99), Some(70));
        assert!(t.remove_if_eq(&9, &90));
        assert!(!t.remove_if_eq(&1, &12));
        assert_eq!(t.len(), 9);
        assert_eq!(t.put_if_absent(1, 0), Some(&11));
        assert_eq!(t.put_if_absent(52, 222), None);
        assert_eq!(t.get(&52), Some(&222));
    }

    #[test]
    fn compute_family() {
        let mut t: ChainedTable<i32, String> = ChainedTable::new();
        for i in 0..10 {
            t.put(i, format!("val {i}"));
        }
        assert_eq!(
            t.compute_if_absent(10, |_| Some("BOOM!".to_string())).cloned(),
            Some("BOOM!".to_string())
        );
        assert_eq!(
            t.compute_if_absent(3, |_| Some("ignored".to_string())).cloned(),
            Some("val 3".to_string())
        );
        assert_eq!(t.compute_if_absent(40, |_| None), None);
        assert!(!t.contains_key(&40));

        assert_eq!(t.compute_if_present(&9, |_, _| None), None);
        assert!(!t.contains_key(&9));
        assert_eq!(t.compute_if_present(&12, |k, v| Some(format!("{v}{k}"))), None);
        assert_eq!(
            t.compute_if_present(&3, |k, v| Some(format!("{k} - {v}"))).cloned(),
            Some("3 - val 3".to_string())
        );
        assert_eq!(
            t.compute(4, |_, v| v.map(|v| format!("{v} - four"))).cloned(),
            Some("val 4 - four".to_string())
        );
        assert_eq!(
            t.compute(70, |_, v| Some(v.map_or("1".to_string(), |v| format!("{v}1")))).cloned(),
            Some("1".to_string())
        );
        let len = t.len();
        assert_eq!(t.compute(4, |_, _| None), None);
        assert_eq!(t.len(), len - 1);
    }

    #[test]
    fn merge_concatenates_or_inserts() {
        let mut t: ChainedTable<i32, String> = ChainedTable::new();
        assert_eq!(
            t.merge(9, "x".into(), |a, b| Some(format!("{a}{b}"))).cloned(),
            Some("x".to_string())
        );
        t.put(9, "val 9".to_string());
        assert_eq!(
            t.merge(9, "val 9".into(), |a, b| Some(format!("{a}{b}"))).cloned(),
            Some("val 9val 9".to_string())
        );
        assert_eq!(t.merge(9, "y".into(), |_, _| None), None);
        assert!(t.is_empty());
    }

    #[test]
    fn iteration_walks_every_chain_member() {
        let mut t: ChainedTable<String, i32, ConstBuildHasher> =
            ChainedTable::with_hasher(ConstBuildHasher);
        for i in 0..12 {
            t.put(format!("k{i}"), i);
        }
        let seen: BTreeSet<i32> = t.values().copied().collect();
        assert_eq!(seen, (0..12).collect());
        assert_eq!(t.iter().len(), 12);
        assert_eq!(t.keys().count(), 12);
    }

    #[test]
    fn cursor_removal_contract() {
        let mut t: ChainedTable<i32, i32> = ChainedTable::new();
        for k in 0..6 {
            t.put(k, k);
        }
        let mut c = t.cursor();
        assert_eq!(
            c.remove().unwrap_err(),
            TableError::IllegalState("remove called without a preceding advance")
        );
        assert!(c.has_next());
        let (k, _) = c.next_entry().map(|(k, v)| (*k, *v)).unwrap();
        let (rk, _) = c.remove().unwrap();
        assert_eq!(rk, k);
        assert!(matches!(c.remove(), Err(TableError::IllegalState(_))));
        let mut rest = 0;
        while c.next_entry().is_some() {
            rest += 1;
        }
        assert_eq!(rest, 5);
        assert_eq!(t.len(), 5);
        assert!(!t.contains_key(&k));
    }

    #[test]
    fn retain_keeps_matching_pairs() {
        let mut t: ChainedTable<i32, i32> = (0..100).map(|k| (k, k)).collect();
        t.retain(|k, _| k % 4 == 0);
        assert_eq!(t.len(), 25);
        assert!(t.iter().all(|(k, v)| k % 4 == 0 && k == v));
    }

    #[test]
    fn replace_all_and_values_mut() {
        let mut t: ChainedTable<i32, i32> = (1..=5).map(|k| (k, k)).collect();
        let v = t.structural_version();
        t.replace_all(|_, v| v + 1);
        for v in t.values_mut() {
            *v *= 10;
        }
        for k in 1..=5 {
            assert_eq!(t.get(&k), Some(&((k + 1) * 10)));
        }
        assert_eq!(t.structural_version(), v);
    }

    #[test]
    fn clear_resets_contents_and_bumps() {
        let mut t: ChainedTable<i32, i32> = (1..=10).map(|k| (k, k)).collect();
        let cap = t.capacity();
        let v = t.structural_version();
        t.clear();
        assert_eq!(t.len(), 0);
        assert_eq!(t.capacity(), cap);
        assert!(t.structural_version() > v);
        assert_eq!(t.get(&3), None);
    }

    #[test]
    fn display_and_equality() {
        let mut a: ChainedTable<i32, i32> = ChainedTable::new();
        assert_eq!(a.to_string(), "{}");
        a.put(1, 10);
        assert_eq!(a.to_string(), "{1=10}");
        a.put(2, 20);
        let s = a.to_string();
        assert!(s == "{1=10, 2=20}" || s == "{2=20, 1=10}", "{s}");

        let mut b: ChainedTable<i32, i32> = ChainedTable::new();
        b.put(2, 20);
        b.put(1, 10);
        assert_eq!(a, b);
        assert_eq!(a.content_hash(), b.content_hash());
        b.remove(&1);
        assert_ne!(a, b);
    }

    #[test]
    fn into_iter_yields_owned_pairs() {
        let t: ChainedTable<i32, String> = (0..5).map(|k| (k, k.to_string())).collect();
        let mut pairs: Vec<(i32, String)> = t.into_iter().collect();
        pairs.sort();
        assert_eq!(pairs, (0..5).map(|k| (k, k.to_string())).collect::<Vec<_>>());
    }

    #[test]
    fn from_pairs_sizes_like_a_copy() {
        let t: ChainedTable<i32, i32> = ChainedTable::from_pairs((0..3).map(|k| (k, k)));
        assert_eq!(t.capacity(), 11);
        let t: ChainedTable<i32, i32> = ChainedTable::from_pairs((0..20).map(|k| (k, k)));
        assert!(t.capacity() >= 40);
        assert_eq!(t.len(), 20);
    }
}
