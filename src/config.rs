//! Table configuration and the builder used to create tables.

use crate::chained_table::ChainedHashTable;
use crate::error::{Error, Result};
use crate::hooks::{BytewiseCompare, DiscardHook, Djb2State, KeyCompare};
use core::hash::BuildHasher;

/// Sizing policy of a table, fixed at creation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TableConfig {
    /// Number of buckets allocated up front.
    pub initial_capacity: usize,
    /// Multiplier applied to the bucket count on every resize.
    pub growth_factor: usize,
    /// Resize before an insert would push `len / capacity` above this.
    pub max_load_factor: f64,
    /// Hard ceiling on the bucket count. Growth past it fails with `NoMem`.
    pub max_capacity: usize,
}

impl TableConfig {
    pub const INITIAL_CAPACITY: usize = 32;
    pub const GROWTH_FACTOR: usize = 2;
    pub const MAX_LOAD_FACTOR: f64 = 0.7;

    /// Reject zero initial capacity, a growth factor below 2, a load factor
    /// outside (0, 1], or a ceiling below the initial capacity.
    pub fn validate(&self) -> Result<()> {
        let load_ok = self.max_load_factor > 0.0 && self.max_load_factor <= 1.0;
        if self.initial_capacity == 0
            || self.growth_factor < 2
            || !load_ok
            || self.max_capacity < self.initial_capacity
        {
            return Err(Error::Invalid);
        }
        Ok(())
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: Self::INITIAL_CAPACITY,
            growth_factor: Self::GROWTH_FACTOR,
            max_load_factor: Self::MAX_LOAD_FACTOR,
            max_capacity: usize::MAX,
        }
    }
}

/// Builder for [`ChainedHashTable`].
///
/// A compare hook is mandatory; `build` fails with [`Error::Invalid`] if
/// none was supplied or if `key_size` is zero.
///
/// ```
/// use chain_table::{BytewiseCompare, TableBuilder};
///
/// let table = TableBuilder::new(8, 4)
///     .compare(BytewiseCompare)
///     .initial_capacity(64)
///     .build()
///     .unwrap();
/// assert_eq!(table.capacity(), 64);
/// ```
pub struct TableBuilder<C = BytewiseCompare, S = Djb2State> {
    key_size: usize,
    value_size: usize,
    compare: Option<C>,
    hasher: S,
    discard_key: Option<DiscardHook>,
    discard_value: Option<DiscardHook>,
    config: TableConfig,
}

impl TableBuilder {
    /// Builder for keys of `key_size` bytes and values of `value_size` bytes.
    pub fn new(key_size: usize, value_size: usize) -> Self {
        Self {
            key_size,
            value_size,
            compare: None,
            hasher: Djb2State,
            discard_key: None,
            discard_value: None,
            config: TableConfig::default(),
        }
    }
}

impl<C, S> TableBuilder<C, S>
where
    C: KeyCompare,
    S: BuildHasher,
{
    /// Key equality hook. Required.
    pub fn compare<C2: KeyCompare>(self, compare: C2) -> TableBuilder<C2, S> {
        TableBuilder {
            key_size: self.key_size,
            value_size: self.value_size,
            compare: Some(compare),
            hasher: self.hasher,
            discard_key: self.discard_key,
            discard_value: self.discard_value,
            config: self.config,
        }
    }

    /// Hash state; must agree with the compare hook on equal keys.
    pub fn hasher<S2: BuildHasher>(self, hasher: S2) -> TableBuilder<C, S2> {
        TableBuilder {
            key_size: self.key_size,
            value_size: self.value_size,
            compare: self.compare,
            hasher,
            discard_key: self.discard_key,
            discard_value: self.discard_value,
            config: self.config,
        }
    }

    /// Called with every stored key the table discards (remove, clear, drop).
    pub fn on_discard_key<F>(mut self, f: F) -> Self
    where
        F: FnMut(&[u8]) + 'static,
    {
        self.discard_key = Some(Box::new(f));
        self
    }

    /// Called with every stored value the table discards without handing it
    /// back to the caller (overwrite or remove without an output buffer,
    /// clear, drop).
    pub fn on_discard_value<F>(mut self, f: F) -> Self
    where
        F: FnMut(&[u8]) + 'static,
    {
        self.discard_value = Some(Box::new(f));
        self
    }

    /// Buckets allocated at creation.
    pub fn initial_capacity(mut self, n: usize) -> Self {
        self.config.initial_capacity = n;
        self
    }

    /// Bucket multiplier per resize (at least 2).
    pub fn growth_factor(mut self, n: usize) -> Self {
        self.config.growth_factor = n;
        self
    }

    /// Load threshold in (0, 1] that triggers a resize.
    pub fn max_load_factor(mut self, f: f64) -> Self {
        self.config.max_load_factor = f;
        self
    }

    /// Bucket ceiling; growth past it fails with [`Error::NoMem`].
    pub fn max_capacity(mut self, n: usize) -> Self {
        self.config.max_capacity = n;
        self
    }

    /// Replace all sizing parameters at once.
    pub fn config(mut self, config: TableConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate and allocate the table.
    pub fn build(self) -> Result<ChainedHashTable<C, S>> {
        if self.key_size == 0 {
            return Err(Error::Invalid);
        }
        let compare = self.compare.ok_or(Error::Invalid)?;
        self.config.validate()?;
        ChainedHashTable::from_parts(
            self.key_size,
            self.value_size,
            compare,
            self.hasher,
            self.discard_key,
            self.discard_value,
            self.config,
        )
    }
}
