//! Key hooks: comparison, hashing and discard callbacks.
//!
//! The table only ever sees raw key/value bytes. What those bytes mean is
//! up to the caller, who describes equality through [`KeyCompare`] and
//! hashing through a [`BuildHasher`]. The two must agree: keys that compare
//! `Equal` must hash identically.

use core::cmp::Ordering;
use core::hash::{BuildHasher, Hasher};

/// Total order / equality test on raw key bytes.
///
/// Only `Ordering::Equal` is significant to the table; the ordering between
/// unequal keys is never used.
pub trait KeyCompare {
    fn compare(&self, key: &[u8], other: &[u8]) -> Ordering;
}

impl<F> KeyCompare for F
where
    F: Fn(&[u8], &[u8]) -> Ordering,
{
    #[inline]
    fn compare(&self, key: &[u8], other: &[u8]) -> Ordering {
        self(key, other)
    }
}

/// Lexicographic comparison of the key bytes.
#[derive(Copy, Clone, Debug, Default)]
pub struct BytewiseCompare;

impl KeyCompare for BytewiseCompare {
    #[inline]
    fn compare(&self, key: &[u8], other: &[u8]) -> Ordering {
        key.cmp(other)
    }
}

/// Callback invoked with the bytes of a stored key or value right before
/// the table releases them.
pub type DiscardHook = Box<dyn FnMut(&[u8])>;

const DJB2_SEED: u64 = 5381;

/// Default hash builder: Bernstein's multiplicative byte hash
/// (`h = h * 33 + byte`, seeded with 5381).
#[derive(Copy, Clone, Debug, Default)]
pub struct Djb2State;

impl BuildHasher for Djb2State {
    type Hasher = Djb2Hasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        Djb2Hasher { hash: DJB2_SEED }
    }
}

/// Running djb2 state: `hash * 33 + byte` per input byte, seeded with 5381.
#[derive(Copy, Clone, Debug)]
pub struct Djb2Hasher {
    hash: u64,
}

impl Hasher for Djb2Hasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.hash = self.hash.wrapping_mul(33).wrapping_add(u64::from(b));
        }
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }
}

/// Hash raw key bytes with `state`. Bytes are written as-is, without the
/// length prefix `<[u8] as Hash>` would add.
#[inline]
pub(crate) fn hash_bytes<S: BuildHasher>(state: &S, key: &[u8]) -> u64 {
    let mut h = state.build_hasher();
    h.write(key);
    h.finish()
}
