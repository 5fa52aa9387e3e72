//! chain-table: a single-threaded hash table over fixed-size byte keys and
//! values, using separate chaining and in-place rehashing.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a reusable associative container that copies caller bytes in
//!   and out, so no caller buffer is ever aliased by table storage.
//! - Layers:
//!   - EntryVec<Bucket>: growable, default-initialized slot array. Only
//!     grows; growth is fallible and may be capped.
//!   - Chains: each bucket roots a doubly-linked chain of nodes living in a
//!     `SlotMap` arena, linked by generational `NodeKey`s.
//!   - ChainedHashTable<C, S>: public API. Hashes with `S: BuildHasher`,
//!     tests equality with `C: KeyCompare`, and runs optional discard hooks
//!     when it drops stored bytes.
//!
//! Constraints
//! - Single-threaded: the boxed discard hooks are not `Send`/`Sync`, so
//!   neither is the table (no atomics, no locking).
//! - Keys are unique under `C`; `S` must hash `C`-equal keys identically.
//! - Load factor stays at or below `max_load_factor` (0.7 by default)
//!   before every insert; buckets grow by `growth_factor` (2) and never
//!   shrink.
//! - Hooks: mutation takes `&mut self`, so a hook can only reach the
//!   table through a shared borrow. Read-only lookups from inside a hook
//!   are fine; nothing is half-linked while a lookup runs.
//!
//! Rehashing
//! - Growth redistributes nodes into the same, enlarged, bucket array. Each
//!   node is detached from its old chain before its new index is computed
//!   and is then parked on the target bucket's `relocated` chain. A final
//!   sweep promotes `relocated` to `head`. Nodes therefore move once and no
//!   chain is scanned while it is being rebuilt.
//! - Node storage is not touched by a rehash; only links change.
//!
//! Failure semantics
//! - Operations return `Result<Status, Error>`. `Status::ValueOk` means an
//!   output buffer was written. `Error::Invalid` is a bad argument,
//!   `Error::NoMem` an allocation or growth failure (table unchanged),
//!   `Error::NotFound` an absent key, and `Error::OutOfBounds` a broken
//!   internal invariant.
//!
//! Notes and non-goals
//! - No iteration order beyond "each live pair exactly once".
//! - No shrinking on removal.
//! - No persistence.

mod chain;
mod chained_table;
mod chained_table_proptest;
mod config;
mod entries;
mod error;
mod hooks;

// Public surface
pub use chained_table::{ChainedHashTable, Iter};
pub use config::{TableBuilder, TableConfig};
pub use error::{Error, Result, Status};
pub use hooks::{BytewiseCompare, DiscardHook, Djb2Hasher, Djb2State, KeyCompare};
