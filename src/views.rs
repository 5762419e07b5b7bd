//! Live key, value and entry views over a `SharedTable`.
//!
//! A view is only another handle to the table. Reads and removals go
//! straight to the table; iteration is a `Traversal`.

use crate::shared::SharedTable;
use crate::traversal::{project_entry, project_key, project_value, Traversal};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};

pub struct KeysView<K, V, S> {
    table: SharedTable<K, V, S>,
}

pub struct ValuesView<K, V, S> {
    table: SharedTable<K, V, S>,
}

pub struct EntriesView<K, V, S> {
    table: SharedTable<K, V, S>,
}

impl<K, V, S> KeysView<K, V, S> {
    pub(crate) fn new(table: SharedTable<K, V, S>) -> Self {
        Self { table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Clears the backing table.
    pub fn clear(&self) {
        self.table.clear();
    }
}

impl<K, V, S> KeysView<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher,
{
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains_key(key)
    }

    /// Remove `key` from the backing table; true if it was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.remove(key).is_some()
    }

    pub fn iter(&self) -> Traversal<K, V, S, K> {
        Traversal::new(self.table.clone(), project_key::<K, V>, true)
    }
}

impl<K, V, S> ValuesView<K, V, S> {
    pub(crate) fn new(table: SharedTable<K, V, S>) -> Self {
        Self { table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn clear(&self) {
        self.table.clear();
    }
}

impl<K, V, S> ValuesView<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher,
{
    pub fn contains(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.table.contains_value(value)
    }

    pub fn iter(&self) -> Traversal<K, V, S, V> {
        Traversal::new(self.table.clone(), project_value::<K, V>, true)
    }
}

impl<K, V, S> EntriesView<K, V, S> {
    pub(crate) fn new(table: SharedTable<K, V, S>) -> Self {
        Self { table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn clear(&self) {
        self.table.clear();
    }
}

impl<K, V, S> EntriesView<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone + PartialEq,
    S: BuildHasher,
{
    pub fn contains(&self, key: &K, value: &V) -> bool {
        self.table.with_table(|t| t.get(key) == Some(value))
    }

    /// Remove the pair only if `key` currently maps to `value`.
    pub fn remove(&self, key: &K, value: &V) -> bool {
        self.table.remove_if_eq(key, value)
    }

    pub fn iter(&self) -> Traversal<K, V, S, (K, V)> {
        Traversal::new(self.table.clone(), project_entry::<K, V>, true)
    }
}

macro_rules! view_into_iter {
    ($view:ident, $item:ty, $project:ident) => {
        impl<K, V, S> IntoIterator for &$view<K, V, S>
        where
            K: Clone,
            V: Clone,
        {
            type Item = crate::Result<$item>;
            type IntoIter = Traversal<K, V, S, $item>;

            fn into_iter(self) -> Self::IntoIter {
                Traversal::new(self.table.clone(), $project::<K, V>, true)
            }
        }

        impl<K, V, S> fmt::Debug for $view<K, V, S> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($view))
                    .field("len", &self.table.len())
                    .finish()
            }
        }
    };
}

view_into_iter!(KeysView, K, project_key);
view_into_iter!(ValuesView, V, project_value);
view_into_iter!(EntriesView, (K, V), project_entry);
