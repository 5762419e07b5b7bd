//! BucketStore: slot vector over a generational record arena.
//!
//! Each slot holds the key of the head record of its chain; each record
//! holds the key of the next record. Records live in a `SlotMap`, so
//! relinking during a rehash moves keys around and never the records
//! themselves, and the arena's free list recycles storage after removal.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Arena key of one stored record.
    pub(crate) struct RecordKey;
}

#[derive(Debug, Clone)]
pub(crate) struct Record<K, V> {
    pub(crate) hash: u64,
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) next: Option<RecordKey>,
}

pub(crate) type Records<K, V> = SlotMap<RecordKey, Record<K, V>>;

#[derive(Debug, Clone)]
pub(crate) struct BucketStore<K, V> {
    slots: Vec<Option<RecordKey>>,
    records: Records<K, V>,
}

impl<K, V> BucketStore<K, V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity >= 1);
        Self {
            slots: vec![None; capacity],
            records: SlotMap::with_key(),
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live records, which is always the summed chain length.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub(crate) fn head(&self, slot: usize) -> Option<RecordKey> {
        self.slots.get(slot).copied().flatten()
    }

    #[inline]
    pub(crate) fn record(&self, key: RecordKey) -> Option<&Record<K, V>> {
        self.records.get(key)
    }

    #[inline]
    pub(crate) fn record_mut(&mut self, key: RecordKey) -> Option<&mut Record<K, V>> {
        self.records.get_mut(key)
    }

    /// Make a new record the head of `slot`'s chain.
    pub(crate) fn push_front(&mut self, slot: usize, hash: u64, key: K, value: V) -> RecordKey {
        let next = self.head(slot);
        let rk = self.records.insert(Record {
            hash,
            key,
            value,
            next,
        });
        if let Some(s) = self.slots.get_mut(slot) {
            *s = Some(rk);
        }
        rk
    }

    /// Unlink `target` from `slot`'s chain, `prev` being the record linked
    /// in front of it (or `None` when `target` is the head).
    pub(crate) fn unlink(
        &mut self,
        slot: usize,
        prev: Option<RecordKey>,
        target: RecordKey,
    ) -> Option<Record<K, V>> {
        let record = self.records.remove(target)?;
        match prev.and_then(|p| self.records.get_mut(p)) {
            Some(p) => {
                debug_assert_eq!(p.next, Some(target));
                p.next = record.next;
            }
            None => {
                if let Some(s) = self.slots.get_mut(slot) {
                    debug_assert_eq!(*s, Some(target));
                    *s = record.next;
                }
            }
        }
        Some(record)
    }

    pub(crate) fn chain(&self, slot: usize) -> Chain<'_, K, V> {
        Chain {
            store: self,
            cur: self.head(slot),
        }
    }

    /// Empty every slot and hand the records back; capacity is kept.
    pub(crate) fn detach(&mut self) -> Records<K, V> {
        self.slots.iter_mut().for_each(|s| *s = None);
        core::mem::take(&mut self.records)
    }

    /// Relink every record into a fresh slot vector of `new_capacity`,
    /// homing each by its cached hash. Old slots are scanned from the top
    /// down and each chain head to tail; every record is pushed to the
    /// front of its new chain.
    pub(crate) fn rehome(&mut self, new_capacity: usize) {
        debug_assert!(new_capacity >= 1);
        let old = core::mem::replace(&mut self.slots, vec![None; new_capacity]);
        for head in old.into_iter().rev() {
            let mut cur = head;
            while let Some(rk) = cur {
                let Some(record) = self.records.get_mut(rk) else {
                    break;
                };
                cur = record.next;
                let slot = crate::probe::primary_index(record.hash, new_capacity);
                record.next = self.slots.get(slot).copied().flatten();
                if let Some(s) = self.slots.get_mut(slot) {
                    *s = Some(rk);
                }
            }
        }
    }

    /// Records in traversal order: slots from the top down, chains head to
    /// tail.
    pub(crate) fn iter(&self) -> StoreIter<'_, K, V> {
        StoreIter {
            store: self,
            slot: self.slots.len(),
            cur: None,
        }
    }

    pub(crate) fn records_mut(&mut self) -> slotmap::basic::ValuesMut<'_, RecordKey, Record<K, V>> {
        self.records.values_mut()
    }

    pub(crate) fn into_records(self) -> slotmap::basic::IntoIter<RecordKey, Record<K, V>> {
        self.records.into_iter()
    }

    /// Step a traversal position: given the next record to yield (or
    /// `None`) and the count of slots not yet scanned, return the record to
    /// yield and the updated position.
    pub(crate) fn advance(
        &self,
        mut cur: Option<RecordKey>,
        mut slot: usize,
    ) -> (Option<RecordKey>, usize) {
        while cur.is_none() && slot > 0 {
            slot -= 1;
            cur = self.head(slot);
        }
        (cur, slot)
    }
}

/// Walk of one chain.
pub(crate) struct Chain<'a, K, V> {
    store: &'a BucketStore<K, V>,
    cur: Option<RecordKey>,
}

impl<'a, K, V> Iterator for Chain<'a, K, V> {
    type Item = (RecordKey, &'a Record<K, V>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let rk = self.cur?;
        let record = self.store.records.get(rk)?;
        self.cur = record.next;
        Some((rk, record))
    }
}

pub(crate) struct StoreIter<'a, K, V> {
    store: &'a BucketStore<K, V>,
    slot: usize,
    cur: Option<RecordKey>,
}

impl<'a, K, V> Iterator for StoreIter<'a, K, V> {
    type Item = (RecordKey, &'a Record<K, V>);

    fn next(&mut self) -> Option<Self::Item> {
        let (cur, slot) = self.store.advance(self.cur, self.slot);
        self.slot = slot;
        let rk = cur?;
        let record = self.store.records.get(rk)?;
        self.cur = record.next;
        Some((rk, record))
    }
}
