//! chained-table: a single-threaded hash table with a fixed bucket array,
//! a double-hashing probe sequence and per-slot collision chains.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a key/value map whose placement rules are simple enough to
//!   state exactly, whose traversals fail fast on structural change, and
//!   whose callbacks may safely call back into the table.
//! - Layers:
//!   - `store::BucketStore`: the slot array plus a `slotmap` arena of
//!     records. Each slot holds the key of its chain head; records link
//!     to the next record of the same chain by arena key.
//!   - `probe`: primary index and step derivation, and the `ProbeSeq`
//!     iterator over slots.
//!   - `ChainedTable<K, V, S>`: the owned table. Lookup, insertion,
//!     removal, growth, the compute family and owned iteration.
//!   - `SharedTable<K, V, S>`: an `Rc<RefCell<_>>` handle. Callbacks run
//!     without a borrow held, and structural change made while they run
//!     is reported as `TableError::ConcurrentStructuralChange`.
//!   - `Traversal` and the views: fail-fast walks over a `SharedTable`.
//!
//! Placement
//! - The primary slot of a hash `h` is `h % capacity`. The probe step is
//!   `P - h % P` where `P` is the largest factorless number below the
//!   capacity, so each probe lands on a fresh slot for prime capacities.
//! - An insert goes to the first empty slot of the probe sequence. When
//!   the probe visits `len` slots without finding one, the record is
//!   pushed onto the chain of the last slot visited.
//! - A lookup walks the whole chain of every slot it visits. It keeps
//!   probing past empty slots until it has covered the longest insertion
//!   distance seen since the last rehash or clear, so records whose
//!   earlier slots were later emptied stay reachable.
//!
//! Growth
//! - Before inserting a new key, if `len + 1 >= threshold` the capacity
//!   becomes `2 * capacity + 1` (capped at `max_capacity`) and every
//!   record is relinked from its cached hash. `K: Hash` never runs
//!   during a rehash.
//!
//! Structural version
//! - Bumped by each insert of a new key, each removal, every rehash and
//!   every `clear`. Replacing a value is not structural.
//!
//! Constraints
//! - Single-threaded: `SharedTable` is `!Send`/`!Sync` through `Rc`.
//! - Calling back into a `SharedTable` from `K: Hash`/`K: Eq` panics
//!   through the `RefCell` borrow check.
//! - Keys are immutable post-insert; there is no `key_mut`.

mod config;
mod error;
mod mapping;
mod probe;
mod shared;
mod store;
mod table;
mod table_proptest;
mod traversal;
mod views;

// Public surface
pub use config::{TableConfig, DEFAULT_CAPACITY, DEFAULT_LOAD_FACTOR, MAX_CAPACITY};
pub use error::{Result, TableError};
pub use mapping::Mapping;
pub use shared::SharedTable;
pub use table::{ChainedTable, Cursor, IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
pub use traversal::Traversal;
pub use views::{EntriesView, KeysView, ValuesView};
