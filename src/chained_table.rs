//! ChainedHashTable: byte-copying hash table with doubly-linked collision
//! chains and in-place rehashing.

use crate::chain::{self, Bucket, Node, NodeArena, Walk};
use crate::config::{TableBuilder, TableConfig};
use crate::entries::EntryVec;
use crate::error::{Error, Result, Status};
use crate::hooks::{hash_bytes, BytewiseCompare, DiscardHook, Djb2State, KeyCompare};
use core::fmt;
use core::hash::BuildHasher;

/// Hash table over fixed-size byte keys and values.
///
/// Every key is exactly `key_size` bytes and every value exactly
/// `value_size` bytes (possibly zero, which makes the table a set). Bytes
/// are copied in on `put` and copied out on `get`/`remove`; callers never
/// hold references into table-owned storage across calls.
pub struct ChainedHashTable<C = BytewiseCompare, S = Djb2State> {
    len: usize,
    key_size: usize,
    value_size: usize,
    buckets: EntryVec<Bucket>,
    nodes: NodeArena,
    compare: C,
    hasher: S,
    discard_key: Option<DiscardHook>,
    discard_value: Option<DiscardHook>,
    config: TableConfig,
}

impl ChainedHashTable {
    /// Table with bytewise key comparison and the default djb2 hash.
    pub fn new(key_size: usize, value_size: usize) -> Result<Self> {
        TableBuilder::new(key_size, value_size)
            .compare(BytewiseCompare)
            .build()
    }
}

impl<C, S> ChainedHashTable<C, S>
where
    C: KeyCompare,
    S: BuildHasher,
{
    pub(crate) fn from_parts(
        key_size: usize,
        value_size: usize,
        compare: C,
        hasher: S,
        discard_key: Option<DiscardHook>,
        discard_value: Option<DiscardHook>,
        config: TableConfig,
    ) -> Result<Self> {
        let mut buckets = EntryVec::with_limit(config.max_capacity);
        if buckets.resize(config.initial_capacity) != config.initial_capacity {
            return Err(Error::NoMem);
        }
        log::trace!(
            "Created table: key_size={key_size} value_size={value_size} capacity={}",
            config.initial_capacity
        );
        Ok(Self {
            len: 0,
            key_size,
            value_size,
            buckets,
            nodes: NodeArena::with_key(),
            compare,
            hasher,
            discard_key,
            discard_value,
            config,
        })
    }

    /// Number of live key/value pairs.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no pairs are stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.capacity()
    }

    /// Byte length every key must have.
    pub fn key_size(&self) -> usize {
        self.key_size
    }

    /// Byte length every value must have.
    pub fn value_size(&self) -> usize {
        self.value_size
    }

    /// Sizing parameters the table was built with.
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Current `len / capacity`.
    pub fn load_factor(&self) -> f64 {
        self.len() as f64 / self.capacity() as f64
    }

    /// Store a copy of `value` under a copy of `key`.
    ///
    /// If `key` is already present its value is overwritten in place. The
    /// previous value is copied into `old_value` when supplied (returning
    /// [`Status::ValueOk`]); otherwise it is handed to the value discard
    /// hook and the call returns [`Status::Ok`]. Inserting a new key always
    /// returns [`Status::Ok`].
    ///
    /// The load check runs before the lookup, so an overwrite at the
    /// threshold grows the table too. Any [`Error::NoMem`] (byte copy or
    /// growth) is reported before the table changes.
    pub fn put(&mut self, key: &[u8], value: &[u8], old_value: Option<&mut [u8]>) -> Result<Status> {
        self.check_key(key)?;
        self.check_value(value)?;
        if let Some(out) = old_value.as_deref() {
            self.check_value(out)?;
        }

        // Node keys survive a rehash, so the lookup can precede growth.
        let bucket = self.buckets.at(self.index_of(key)).ok_or(Error::OutOfBounds)?;
        let existing = chain::locate(&self.nodes, bucket, key, &self.compare);
        let fresh = match existing {
            Some(_) => None,
            None => Some(Node::new(copy_bytes(key)?, copy_bytes(value)?)),
        };

        if self.needs_grow() {
            self.grow()?;
        }

        let Some(node) = fresh else {
            let node = existing
                .and_then(|k| self.nodes.get_mut(k))
                .ok_or(Error::OutOfBounds)?;
            let status = match old_value {
                Some(out) => {
                    out.copy_from_slice(&node.value);
                    Status::ValueOk
                }
                None => {
                    discard(&mut self.discard_value, &node.value);
                    Status::Ok
                }
            };
            node.value.copy_from_slice(value);
            return Ok(status);
        };

        let index = self.index_of(key);
        let k = self.nodes.insert(node);
        let Some(bucket) = self.buckets.at_mut(index) else {
            self.nodes.remove(k);
            return Err(Error::OutOfBounds);
        };
        chain::push_front(&mut self.nodes, &mut bucket.head, k);
        self.len += 1;
        Ok(Status::Ok)
    }

    /// Copy the value stored under `key` into `out`.
    pub fn get(&self, key: &[u8], out: &mut [u8]) -> Result<Status> {
        self.check_key(key)?;
        self.check_value(out)?;
        let node = self.find(key)?;
        out.copy_from_slice(&node.value);
        Ok(Status::ValueOk)
    }

    /// Owned copy of the value stored under `key`.
    pub fn get_owned(&self, key: &[u8]) -> Result<Box<[u8]>> {
        self.check_key(key)?;
        let node = self.find(key)?;
        copy_bytes(&node.value)
    }

    /// True if `key` is stored. Wrong-sized keys are never present.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.check_key(key).is_ok() && self.find(key).is_ok()
    }

    /// Remove the pair stored under `key`.
    ///
    /// The value is copied into `old_value` when supplied
    /// ([`Status::ValueOk`]), otherwise handed to the value discard hook
    /// ([`Status::Ok`]). The key discard hook always runs.
    pub fn remove(&mut self, key: &[u8], old_value: Option<&mut [u8]>) -> Result<Status> {
        self.check_key(key)?;
        if let Some(out) = old_value.as_deref() {
            self.check_value(out)?;
        }

        let index = self.index_of(key);
        let bucket = self.buckets.at_mut(index).ok_or(Error::OutOfBounds)?;
        let k = chain::locate(&self.nodes, bucket, key, &self.compare).ok_or(Error::NotFound)?;
        chain::unlink(&mut self.nodes, bucket, k);
        let node = self.nodes.remove(k).ok_or(Error::OutOfBounds)?;
        self.len -= 1;

        let status = match old_value {
            Some(out) => {
                out.copy_from_slice(&node.value);
                Status::ValueOk
            }
            None => {
                discard(&mut self.discard_value, &node.value);
                Status::Ok
            }
        };
        discard(&mut self.discard_key, &node.key);
        Ok(status)
    }

    /// Discard every pair, keeping the current capacity.
    pub fn clear(&mut self) {
        self.discard_all();
        log::trace!("Cleared table, capacity={}", self.buckets.capacity());
    }

    /// Iterate over all live pairs in unspecified order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            nodes: &self.nodes,
            buckets: self.buckets.iter(),
            chain: chain::walk(&self.nodes, None),
            remaining: self.len,
        }
    }

    /// Visit every live pair exactly once, in unspecified order.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&[u8], &[u8]),
    {
        for (k, v) in self.iter() {
            visit(k, v);
        }
    }

    /// Like [`for_each`](Self::for_each), also reporting the index of the
    /// bucket holding each pair.
    pub fn for_each_in_bucket<F>(&self, mut visit: F)
    where
        F: FnMut(usize, &[u8], &[u8]),
    {
        let nodes = &self.nodes;
        for (i, bucket) in self.buckets.iter().enumerate() {
            for k in chain::walk(nodes, bucket.head) {
                let node = &nodes[k];
                visit(i, &*node.key, &*node.value);
            }
        }
    }

    /// Check chain links, bucket placement and the element count.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let capacity = self.buckets.capacity();
        let mut seen = 0usize;
        for (i, bucket) in self.buckets.iter().enumerate() {
            assert!(bucket.relocated.is_none(), "bucket {i} left a relocated chain");
            let mut prev: Option<chain::NodeKey> = None;
            for k in chain::walk(&self.nodes, bucket.head) {
                let node = &self.nodes[k];
                assert_eq!(node.prev(), prev, "bucket {i}: prev link broken");
                assert_eq!(
                    bucket_index(&self.hasher, &node.key, capacity),
                    i,
                    "node stored in the wrong bucket"
                );
                prev = Some(k);
                seen += 1;
                assert!(seen <= self.nodes.len(), "cycle in bucket {i}");
            }
        }
        assert_eq!(seen, self.len, "chain lengths disagree with len");
        assert_eq!(self.nodes.len(), self.len, "arena holds unlinked nodes");
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.key_size {
            return Err(Error::Invalid);
        }
        Ok(())
    }

    fn check_value(&self, value: &[u8]) -> Result<()> {
        if value.len() != self.value_size {
            return Err(Error::Invalid);
        }
        Ok(())
    }

    #[inline]
    fn index_of(&self, key: &[u8]) -> usize {
        bucket_index(&self.hasher, key, self.buckets.capacity())
    }

    fn find(&self, key: &[u8]) -> Result<&Node> {
        let bucket = self.buckets.at(self.index_of(key)).ok_or(Error::OutOfBounds)?;
        let k = chain::locate(&self.nodes, bucket, key, &self.compare).ok_or(Error::NotFound)?;
        Ok(&self.nodes[k])
    }

    fn needs_grow(&self) -> bool {
        (self.len + 1) as f64 > self.buckets.capacity() as f64 * self.config.max_load_factor
    }

    /// Grow the buckets by the growth factor and redistribute every node.
    /// On failure the table keeps its old capacity and contents.
    fn grow(&mut self) -> Result<()> {
        let old_capacity = self.buckets.capacity();
        let wanted = old_capacity.saturating_mul(self.config.growth_factor);
        let new_capacity = self.buckets.resize(wanted);
        if new_capacity == old_capacity {
            log::warn!("Could not grow table past {old_capacity} buckets ({} elements)", self.len);
            return Err(Error::NoMem);
        }
        self.rehash(old_capacity, new_capacity)?;
        log::debug!(
            "Resized table {old_capacity} -> {new_capacity} buckets ({} elements)",
            self.len
        );
        Ok(())
    }

    /// Move every node from the first `old_capacity` buckets to its bucket
    /// under `new_capacity`.
    ///
    /// Nodes are detached from `head` before their new index is computed,
    /// since that index may be the bucket being drained. Moved nodes go onto
    /// `relocated`, never `head`, so a bucket visited later in the pass does
    /// not see them again. The final sweep promotes `relocated` to `head`.
    fn rehash(&mut self, old_capacity: usize, new_capacity: usize) -> Result<()> {
        for i in 0..old_capacity {
            loop {
                let bucket = self.buckets.at_mut(i).ok_or(Error::OutOfBounds)?;
                let Some(k) = chain::pop_front(&mut self.nodes, &mut bucket.head) else {
                    break;
                };
                let target = bucket_index(&self.hasher, &self.nodes[k].key, new_capacity);
                match self.buckets.at_mut(target) {
                    Some(dst) => chain::push_front(&mut self.nodes, &mut dst.relocated, k),
                    None => {
                        log::warn!("Rehash mapped a node to bucket {target} of {new_capacity}");
                        if let Some(src) = self.buckets.at_mut(i) {
                            chain::push_front(&mut self.nodes, &mut src.head, k);
                        }
                        self.promote_relocated();
                        return Err(Error::OutOfBounds);
                    }
                }
            }
        }
        self.promote_relocated();
        Ok(())
    }

    /// Splice every bucket's `relocated` chain onto its `head`.
    fn promote_relocated(&mut self) {
        for bucket in self.buckets.iter_mut() {
            if bucket.head.is_none() {
                bucket.head = bucket.relocated.take();
                continue;
            }
            while let Some(k) = chain::pop_front(&mut self.nodes, &mut bucket.relocated) {
                chain::push_front(&mut self.nodes, &mut bucket.head, k);
            }
        }
    }
}

impl<C, S> ChainedHashTable<C, S> {
    /// Release every node, running the discard hooks bucket by bucket.
    fn discard_all(&mut self) {
        for bucket in self.buckets.iter_mut() {
            while let Some(k) = chain::pop_front(&mut self.nodes, &mut bucket.head) {
                if let Some(node) = self.nodes.remove(k) {
                    discard(&mut self.discard_key, &node.key);
                    discard(&mut self.discard_value, &node.value);
                }
            }
        }
        self.len = 0;
    }
}

impl<C, S> Drop for ChainedHashTable<C, S> {
    fn drop(&mut self) {
        if self.discard_key.is_none() && self.discard_value.is_none() {
            return;
        }
        self.discard_all();
    }
}


impl<C, S> fmt::Debug for ChainedHashTable<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedHashTable")
            .field("len", &self.len)
            .field("capacity", &self.buckets.capacity())
            .field("key_size", &self.key_size)
            .field("value_size", &self.value_size)
            .finish_non_exhaustive()
    }
}

impl<'a, C, S> IntoIterator for &'a ChainedHashTable<C, S>
where
    C: KeyCompare,
    S: BuildHasher,
{
    type Item = (&'a [u8], &'a [u8]);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// Iterator over `(key, value)` byte slices of a [`ChainedHashTable`].
pub struct Iter<'a> {
    nodes: &'a NodeArena,
    buckets: core::slice::Iter<'a, Bucket>,
    chain: Walk<'a>,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let nodes: &'a NodeArena = self.nodes;
        loop {
            if let Some(k) = self.chain.next() {
                let node = &nodes[k];
                self.remaining = self.remaining.saturating_sub(1);
                return Some((&*node.key, &*node.value));
            }
            let bucket = self.buckets.next()?;
            self.chain = chain::walk(nodes, bucket.head);
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

#[inline]
fn bucket_index<S: BuildHasher>(hasher: &S, key: &[u8], capacity: usize) -> usize {
    (hash_bytes(hasher, key) % capacity as u64) as usize
}

#[inline]
fn discard(hook: &mut Option<DiscardHook>, bytes: &[u8]) {
    if let Some(f) = hook.as_mut() {
        f(bytes);
    }
}

/// Heap copy of `src`, reporting allocation failure instead of aborting.
fn copy_bytes(src: &[u8]) -> Result<Box<[u8]>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(src.len()).map_err(|_| Error::NoMem)?;
    buf.extend_from_slice(src);
    Ok(buf.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cmp::Ordering;
    use core::hash::Hasher;
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeSet;
    use std::rc::Rc;
    use test_log::test;

    fn k8(n: u64) -> [u8; 8] {
        n.to_le_bytes()
    }

    fn v4(n: u32) -> [u8; 4] {
        n.to_le_bytes()
    }

    fn get_u32<C: KeyCompare, S: BuildHasher>(t: &ChainedHashTable<C, S>, key: &[u8]) -> Result<u32> {
        let mut out = [0u8; 4];
        t.get(key, &mut out)?;
        Ok(u32::from_le_bytes(out))
    }

    /// Every key hashes to the same value, forcing a single chain.
    #[derive(Clone, Default)]
    struct ConstState;
    struct ConstHasher;
    impl BuildHasher for ConstState {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> ConstHasher {
            ConstHasher
        }
    }
    impl Hasher for ConstHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            0
        }
    }

    /// Invariant: put then get round-trips; len counts distinct keys.
    #[test]
    fn put_get_round_trip() {
        let mut t = ChainedHashTable::new(8, 4).unwrap();
        assert!(t.is_empty());
        for i in 0..10u64 {
            assert_eq!(t.put(&k8(i), &v4(i as u32 * 3), None), Ok(Status::Ok));
        }
        assert_eq!(t.len(), 10);
        for i in 0..10u64 {
            assert_eq!(get_u32(&t, &k8(i)), Ok(i as u32 * 3));
        }
        assert_eq!(get_u32(&t, &k8(99)), Err(Error::NotFound));
        t.assert_consistent();
    }

    /// Invariant: overwriting reports the previous value and keeps len.
    #[test]
    fn overwrite_returns_old_value() {
        let mut t = ChainedHashTable::new(1, 4).unwrap();
        assert_eq!(t.put(b"A", &v4(1), None), Ok(Status::Ok));
        let mut old = [0u8; 4];
        assert_eq!(t.put(b"A", &v4(2), Some(&mut old)), Ok(Status::ValueOk));
        assert_eq!(u32::from_le_bytes(old), 1);
        assert_eq!(get_u32(&t, b"A"), Ok(2));
        assert_eq!(t.len(), 1);
    }

    /// Invariant: overwriting without an output buffer returns Ok.
    #[test]
    fn overwrite_without_buffer_is_ok() {
        let mut t = ChainedHashTable::new(1, 4).unwrap();
        t.put(b"A", &v4(1), None).unwrap();
        assert_eq!(t.put(b"A", &v4(2), None), Ok(Status::Ok));
        assert_eq!(get_u32(&t, b"A"), Ok(2));
    }

    /// Invariant: remove unlinks the pair; a second remove is NotFound.
    #[test]
    fn remove_then_get_is_not_found() {
        let mut t = ChainedHashTable::new(8, 4).unwrap();
        t.put(&k8(1), &v4(10), None).unwrap();
        t.put(&k8(2), &v4(20), None).unwrap();
        let mut old = [0u8; 4];
        assert_eq!(t.remove(&k8(1), Some(&mut old)), Ok(Status::ValueOk));
        assert_eq!(u32::from_le_bytes(old), 10);
        assert_eq!(t.get(&k8(1), &mut old), Err(Error::NotFound));
        assert_eq!(t.remove(&k8(1), None), Err(Error::NotFound));
        assert_eq!(t.len(), 1);
        assert_eq!(t.remove(&k8(2), None), Ok(Status::Ok));
        assert!(t.is_empty());
        t.assert_consistent();
    }

    /// Invariant: the 23rd insert into 32 buckets resizes once, to 64, and
    /// all earlier pairs survive.
    #[test]
    fn twenty_third_insert_doubles_capacity() {
        let mut t = ChainedHashTable::new(8, 4).unwrap();
        assert_eq!(t.capacity(), 32);
        for i in 0..22u64 {
            t.put(&k8(i * 7919), &v4(i as u32), None).unwrap();
        }
        assert_eq!(t.capacity(), 32);
        t.put(&k8(22 * 7919), &v4(22), None).unwrap();
        assert_eq!(t.capacity(), 64);
        assert_eq!(t.len(), 23);
        for i in 0..23u64 {
            assert_eq!(get_u32(&t, &k8(i * 7919)), Ok(i as u32));
        }
        t.assert_consistent();
    }

    /// Invariant: the load factor stays bounded across many resizes.
    #[test]
    fn load_factor_bounded_after_every_put() {
        let mut t = ChainedHashTable::new(8, 4).unwrap();
        for i in 0..5_000u64 {
            t.put(&k8(i.wrapping_mul(0x9e37_79b9_7f4a_7c15)), &v4(i as u32), None).unwrap();
            assert!(t.len() as f64 <= t.capacity() as f64 * 0.7 + 1.0);
        }
        assert_eq!(t.capacity(), 8192);
        t.assert_consistent();
    }

    /// Invariant: when every key lands in one chain, rehash still moves
    /// each node exactly once and the chain stays acyclic.
    #[test]
    fn rehash_with_single_chain() {
        let mut t = TableBuilder::new(8, 4)
            .compare(BytewiseCompare)
            .hasher(ConstState)
            .build()
            .unwrap();
        for i in 0..100u64 {
            t.put(&k8(i), &v4(i as u32), None).unwrap();
        }
        assert!(t.capacity() > 32);
        t.assert_consistent();
        for i in 0..100u64 {
            assert_eq!(get_u32(&t, &k8(i)), Ok(i as u32));
        }
    }

    /// Invariant: a node whose new index equals its old index is moved onto
    /// `relocated` and not scanned twice.
    #[test]
    fn rehash_keeps_nodes_that_stay_in_place() {
        // Identity hash: key n maps to n % capacity, so keys below the old
        // capacity stay put and keys above it move forward.
        #[derive(Clone, Default)]
        struct IdState;
        struct IdHasher(u64);
        impl BuildHasher for IdState {
            type Hasher = IdHasher;
            fn build_hasher(&self) -> IdHasher {
                IdHasher(0)
            }
        }
        impl Hasher for IdHasher {
            fn write(&mut self, bytes: &[u8]) {
                let mut b = [0u8; 8];
                b.copy_from_slice(bytes);
                self.0 = u64::from_le_bytes(b);
            }
            fn finish(&self) -> u64 {
                self.0
            }
        }
        let mut t = TableBuilder::new(8, 4)
            .compare(BytewiseCompare)
            .hasher(IdState)
            .initial_capacity(4)
            .max_load_factor(1.0)
            .build()
            .unwrap();
        // 0 and 4 share bucket 0 at capacity 4; 1 and 5 share bucket 1.
        for n in [0u64, 4, 1, 5] {
            t.put(&k8(n), &v4(n as u32), None).unwrap();
        }
        assert_eq!(t.capacity(), 4);
        t.put(&k8(2), &v4(2), None).unwrap();
        assert_eq!(t.capacity(), 8);
        let mut placement = Vec::new();
        t.for_each_in_bucket(|i, k, _| placement.push((i, u64::from_le_bytes(k.try_into().unwrap()))));
        placement.sort();
        assert_eq!(placement, vec![(0, 0), (1, 1), (2, 2), (4, 4), (5, 5)]);
        t.assert_consistent();
    }

    /// Invariant: a capped table reports NoMem and is left unchanged.
    #[test]
    fn capped_growth_fails_without_side_effects() {
        let mut t = TableBuilder::new(8, 4)
            .compare(BytewiseCompare)
            .max_capacity(32)
            .build()
            .unwrap();
        for i in 0..22u64 {
            t.put(&k8(i), &v4(i as u32), None).unwrap();
        }
        assert_eq!(t.put(&k8(22), &v4(22), None), Err(Error::NoMem));
        assert_eq!(t.len(), 22);
        assert_eq!(t.capacity(), 32);
        assert!(!t.contains_key(&k8(22)));
        for i in 0..22u64 {
            assert_eq!(get_u32(&t, &k8(i)), Ok(i as u32));
        }
        // Removal still works and frees room for the insert.
        t.remove(&k8(0), None).unwrap();
        assert_eq!(t.put(&k8(22), &v4(22), None), Ok(Status::Ok));
        t.assert_consistent();
    }

    /// Invariant: wrong-sized arguments are rejected before any mutation.
    #[test]
    fn size_mismatches_are_invalid() {
        let mut t = ChainedHashTable::new(8, 4).unwrap();
        assert_eq!(t.put(b"short", &v4(1), None), Err(Error::Invalid));
        assert_eq!(t.put(&k8(1), b"toolong", None), Err(Error::Invalid));
        let mut small = [0u8; 2];
        assert_eq!(t.put(&k8(1), &v4(1), Some(&mut small)), Err(Error::Invalid));
        assert!(t.is_empty());
        t.put(&k8(1), &v4(1), None).unwrap();
        assert_eq!(t.get(&k8(1), &mut small), Err(Error::Invalid));
        assert_eq!(t.get(b"", &mut [0u8; 4]), Err(Error::Invalid));
        assert_eq!(t.remove(&k8(1), Some(&mut small)), Err(Error::Invalid));
        assert!(!t.contains_key(b"x"));
        assert_eq!(t.len(), 1);
    }

    /// Invariant: zero-sized values model a set.
    #[test]
    fn zero_sized_values_act_as_set() {
        let mut t = ChainedHashTable::new(2, 0).unwrap();
        assert_eq!(t.put(b"ab", &[], None), Ok(Status::Ok));
        assert_eq!(t.put(b"ab", &[], Some(&mut [])), Ok(Status::ValueOk));
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(b"ab", &mut []), Ok(Status::ValueOk));
        assert_eq!(t.get_owned(b"ab").unwrap().len(), 0);
        assert!(t.contains_key(b"ab"));
        assert!(!t.contains_key(b"zz"));
    }

    /// Invariant: a custom comparator defines key equality.
    #[test]
    fn custom_compare_defines_equality() {
        // Case-insensitive ASCII keys, with a hash consistent with it.
        #[derive(Clone, Default)]
        struct FoldState;
        struct FoldHasher(u64);
        impl BuildHasher for FoldState {
            type Hasher = FoldHasher;
            fn build_hasher(&self) -> FoldHasher {
                FoldHasher(5381)
            }
        }
        impl Hasher for FoldHasher {
            fn write(&mut self, bytes: &[u8]) {
                for b in bytes {
                    self.0 = self.0.wrapping_mul(33).wrapping_add(u64::from(b.to_ascii_lowercase()));
                }
            }
            fn finish(&self) -> u64 {
                self.0
            }
        }
        let fold = |a: &[u8], b: &[u8]| -> Ordering {
            a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase())
        };
        let mut t = TableBuilder::new(3, 4)
            .compare(fold)
            .hasher(FoldState)
            .build()
            .unwrap();
        t.put(b"abc", &v4(1), None).unwrap();
        let mut old = [0u8; 4];
        assert_eq!(t.put(b"ABC", &v4(2), Some(&mut old)), Ok(Status::ValueOk));
        assert_eq!(u32::from_le_bytes(old), 1);
        assert_eq!(t.len(), 1);
        assert_eq!(get_u32(&t, b"aBc"), Ok(2));
    }

    /// Invariant: discard hooks run exactly once per discarded key/value,
    /// and never for values copied out to the caller.
    #[test]
    fn discard_hooks_fire_once_per_discard() {
        let keys = Rc::new(RefCell::new(Vec::<Vec<u8>>::new()));
        let values = Rc::new(RefCell::new(Vec::<Vec<u8>>::new()));
        let (ks, vs) = (keys.clone(), values.clone());
        let mut t = TableBuilder::new(1, 1)
            .compare(BytewiseCompare)
            .on_discard_key(move |k| ks.borrow_mut().push(k.to_vec()))
            .on_discard_value(move |v| vs.borrow_mut().push(v.to_vec()))
            .build()
            .unwrap();

        t.put(b"a", b"1", None).unwrap();
        t.put(b"a", b"2", None).unwrap(); // overwrite discards "1"
        let mut old = [0u8; 1];
        t.put(b"a", b"3", Some(&mut old)).unwrap(); // "2" handed back
        assert_eq!(*values.borrow(), vec![b"1".to_vec()]);
        assert!(keys.borrow().is_empty());

        t.put(b"b", b"4", None).unwrap();
        t.remove(b"b", None).unwrap(); // discards key b, value 4
        t.put(b"c", b"5", None).unwrap();
        t.remove(b"c", Some(&mut old)).unwrap(); // discards key c only
        assert_eq!(*keys.borrow(), vec![b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(*values.borrow(), vec![b"1".to_vec(), b"4".to_vec()]);

        drop(t); // discards key a, value 3
        assert_eq!(keys.borrow().len(), 3);
        assert_eq!(values.borrow().last(), Some(&b"3".to_vec()));
    }

    /// Invariant: clear discards everything, keeps capacity, and the table
    /// remains usable.
    #[test]
    fn clear_discards_and_keeps_capacity() {
        let count = Rc::new(Cell::new(0usize));
        let c = count.clone();
        let mut t = TableBuilder::new(8, 4)
            .compare(BytewiseCompare)
            .on_discard_value(move |_| c.set(c.get() + 1))
            .build()
            .unwrap();
        for i in 0..50u64 {
            t.put(&k8(i), &v4(0), None).unwrap();
        }
        let cap = t.capacity();
        t.clear();
        assert_eq!(count.get(), 50);
        assert!(t.is_empty());
        assert_eq!(t.capacity(), cap);
        assert_eq!(t.iter().count(), 0);
        t.put(&k8(1), &v4(1), None).unwrap();
        assert_eq!(get_u32(&t, &k8(1)), Ok(1));
        drop(t);
        assert_eq!(count.get(), 51);
    }

    /// Invariant: enumeration yields every live pair exactly once.
    #[test]
    fn enumeration_visits_each_pair_once() {
        let mut t = ChainedHashTable::new(8, 4).unwrap();
        for i in 0..200u64 {
            t.put(&k8(i), &v4(i as u32), None).unwrap();
        }
        for i in (0..200u64).step_by(3) {
            t.remove(&k8(i), None).unwrap();
        }
        let expected: BTreeSet<u64> = (0..200).filter(|i| i % 3 != 0).collect();

        let it = t.iter();
        assert_eq!(it.len(), expected.len());
        let seen: Vec<u64> = it
            .map(|(k, v)| {
                let k = u64::from_le_bytes(k.try_into().unwrap());
                assert_eq!(u32::from_le_bytes(v.try_into().unwrap()), k as u32);
                k
            })
            .collect();
        assert_eq!(seen.len(), expected.len());
        assert_eq!(seen.iter().copied().collect::<BTreeSet<_>>(), expected);

        let mut visited = 0;
        t.for_each(|_, _| visited += 1);
        assert_eq!(visited, expected.len());

        let mut by_bucket = 0;
        let cap = t.capacity();
        t.for_each_in_bucket(|i, _, _| {
            assert!(i < cap);
            by_bucket += 1;
        });
        assert_eq!(by_bucket, expected.len());
    }

    /// Invariant: removal works at every chain position (head, interior, tail, sole).
    #[test]
    fn remove_from_every_chain_position() {
        let mut t = TableBuilder::new(8, 4)
            .compare(BytewiseCompare)
            .hasher(ConstState)
            .build()
            .unwrap();
        // Chain order after prepends: 4 3 2 1 0
        for i in 0..5u64 {
            t.put(&k8(i), &v4(i as u32), None).unwrap();
        }
        for (key, left) in [(2u64, 4usize), (4, 3), (0, 2), (1, 1), (3, 0)] {
            assert_eq!(t.remove(&k8(key), None), Ok(Status::Ok));
            assert_eq!(t.len(), left);
            t.assert_consistent();
        }
    }

    /// Invariant: a compare hook may run read-only lookups on the table
    /// that is calling it.
    #[test]
    fn compare_hook_can_look_up_same_table() {
        type DynCompare = Box<dyn Fn(&[u8], &[u8]) -> Ordering>;
        type Table = ChainedHashTable<DynCompare>;

        let slot: Rc<RefCell<Option<Table>>> = Rc::new(RefCell::new(None));
        let nested = Rc::new(Cell::new(false));
        let inner_result = Rc::new(Cell::new(None::<bool>));
        let (weak, busy, result) = (Rc::downgrade(&slot), nested.clone(), inner_result.clone());
        let compare: DynCompare = Box::new(move |a: &[u8], b: &[u8]| {
            if !busy.get() {
                busy.set(true);
                if let Some(slot) = weak.upgrade() {
                    if let Some(t) = slot.borrow().as_ref() {
                        result.set(Some(t.contains_key(b"zz")));
                    }
                }
                busy.set(false);
            }
            a.cmp(b)
        });
        let mut t: Table = TableBuilder::new(2, 0).compare(compare).build().unwrap();
        t.put(b"aa", &[], None).unwrap();
        *slot.borrow_mut() = Some(t);

        let found = slot.borrow().as_ref().map(|t| t.contains_key(b"aa"));
        assert_eq!(found, Some(true));
        assert_eq!(inner_result.get(), Some(false));
    }

    /// Invariant: the load check precedes the lookup, so an overwrite at
    /// the threshold grows the table without changing len.
    #[test]
    fn overwrite_at_threshold_grows() {
        let mut t = ChainedHashTable::new(8, 4).unwrap();
        for i in 0..22u64 {
            t.put(&k8(i), &v4(i as u32), None).unwrap();
        }
        assert_eq!(t.capacity(), 32);
        let mut old = [0u8; 4];
        assert_eq!(t.put(&k8(0), &v4(100), Some(&mut old)), Ok(Status::ValueOk));
        assert_eq!(u32::from_le_bytes(old), 0);
        assert_eq!(t.capacity(), 64);
        assert_eq!(t.len(), 22);
        assert_eq!(get_u32(&t, &k8(0)), Ok(100));
        t.assert_consistent();
    }

    /// Invariant: a put that fails with NoMem changes neither membership,
    /// values nor capacity, for inserts and overwrites alike.
    #[test]
    fn failed_put_leaves_table_untouched() {
        let mut t = TableBuilder::new(8, 4)
            .compare(BytewiseCompare)
            .max_capacity(32)
            .build()
            .unwrap();
        for i in 0..22u64 {
            t.put(&k8(i), &v4(i as u32), None).unwrap();
        }
        let mut old = [0xffu8; 4];
        assert_eq!(t.put(&k8(5), &v4(500), Some(&mut old)), Err(Error::NoMem));
        assert_eq!(old, [0xff; 4]);
        assert_eq!(get_u32(&t, &k8(5)), Ok(5));
        assert_eq!(t.put(&k8(99), &v4(99), None), Err(Error::NoMem));
        assert!(!t.contains_key(&k8(99)));
        assert_eq!(t.capacity(), 32);
        assert_eq!(t.len(), 22);
        t.assert_consistent();
    }

    #[test]
    fn debug_output_reports_shape() {
        let t = ChainedHashTable::new(8, 4).unwrap();
        let s = format!("{t:?}");
        assert!(s.contains("capacity: 32"), "{s}");
        assert!(s.contains("key_size: 8"), "{s}");
    }
}
