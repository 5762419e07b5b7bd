//! Traversal: fail-fast, one-shot walk over a `SharedTable`.
//!
//! A traversal keeps its own position (slot index plus the next record of
//! the current chain) and the structural version seen at creation. Each
//! advance first compares that version with the table's and yields
//! `ConcurrentStructuralChange` on mismatch, after which the traversal is
//! exhausted. `remove` unlinks the element produced last and moves the
//! expected version forward so the walk can continue.

use crate::error::{Result, TableError};
use crate::shared::SharedTable;
use crate::store::RecordKey;
use core::fmt;
use core::hash::{BuildHasher, Hash};

pub(crate) fn project_entry<K: Clone, V: Clone>(k: &K, v: &V) -> (K, V) {
    (k.clone(), v.clone())
}

pub(crate) fn project_key<K: Clone, V>(k: &K, _: &V) -> K {
    k.clone()
}

pub(crate) fn project_value<K, V: Clone>(_: &K, v: &V) -> V {
    v.clone()
}

pub struct Traversal<K, V, S, T> {
    table: SharedTable<K, V, S>,
    slot: usize,
    next: Option<RecordKey>,
    last: Option<RecordKey>,
    expected: u64,
    removable: bool,
    done: bool,
    project: fn(&K, &V) -> T,
}

impl<K, V, S, T> Traversal<K, V, S, T> {
    pub(crate) fn new(
        table: SharedTable<K, V, S>,
        project: fn(&K, &V) -> T,
        removable: bool,
    ) -> Self {
        let (slot, expected) = {
            let t = table.inner.borrow();
            (t.capacity(), t.structural_version())
        };
        Self {
            table,
            slot,
            next: None,
            last: None,
            expected,
            removable,
            done: false,
            project,
        }
    }

    /// Whether another element remains. Does not check the structural
    /// version.
    pub fn has_next(&mut self) -> bool {
        if self.done {
            return false;
        }
        let t = self.table.inner.borrow();
        let (next, slot) = t.store().advance(self.next, self.slot);
        self.next = next;
        self.slot = slot;
        next.is_some()
    }

    pub(crate) fn next_record(&mut self) -> Option<Result<(RecordKey, T)>> {
        if self.done {
            return None;
        }
        let t = self.table.inner.borrow();
        if t.structural_version() != self.expected {
            self.done = true;
            return Some(Err(TableError::ConcurrentStructuralChange));
        }
        let (next, slot) = t.store().advance(self.next, self.slot);
        self.slot = slot;
        let Some(rk) = next else {
            self.done = true;
            self.next = None;
            return None;
        };
        let Some(record) = t.record(rk) else {
            self.done = true;
            return Some(Err(TableError::ConcurrentStructuralChange));
        };
        self.next = record.next;
        self.last = Some(rk);
        Some(Ok((rk, (self.project)(&record.key, &record.value))))
    }
}

impl<K, V, S, T> Traversal<K, V, S, T>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Remove the element produced by the last `next`.
    pub fn remove(&mut self) -> Result<()> {
        if !self.removable {
            return Err(TableError::IllegalState("traversal does not support removal"));
        }
        let rk = self
            .last
            .take()
            .ok_or(TableError::IllegalState("remove called without a preceding next"))?;
        let removed = {
            let mut t = self.table.inner.borrow_mut();
            if t.structural_version() != self.expected {
                return Err(TableError::ConcurrentStructuralChange);
            }
            let removed = t.remove_record(rk);
            self.expected = t.structural_version();
            removed
        };
        removed
            .map(drop)
            .ok_or(TableError::ConcurrentStructuralChange)
    }
}

impl<K, V, S, T> Traversal<K, V, S, T> {
    /// Overwrite the value of the element produced by the last `next` and
    /// return the old one. Not a structural change, so the walk goes on.
    pub fn set_value(&mut self, value: V) -> Result<V> {
        if !self.removable {
            return Err(TableError::IllegalState(
                "traversal does not support modification",
            ));
        }
        let rk = self
            .last
            .ok_or(TableError::IllegalState("set_value called without a preceding next"))?;
        let mut t = self.table.inner.borrow_mut();
        if t.structural_version() != self.expected {
            return Err(TableError::ConcurrentStructuralChange);
        }
        let r = t
            .record_mut(rk)
            .ok_or(TableError::ConcurrentStructuralChange)?;
        Ok(core::mem::replace(&mut r.value, value))
    }
}

impl<K, V, S, T> Iterator for Traversal<K, V, S, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        self.next_record().map(|step| step.map(|(_, item)| item))
    }
}

impl<K, V, S, T> fmt::Debug for Traversal<K, V, S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traversal")
            .field("slot", &self.slot)
            .field("expected", &self.expected)
            .field("removable", &self.removable)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
