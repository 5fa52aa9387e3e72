#![cfg(test)]

// Property tests for ChainedHashTable kept inside the crate so they can use
// the internal `assert_consistent` check after every operation.

use crate::chained_table::ChainedHashTable;
use crate::config::TableBuilder;
use crate::error::{Error, Status};
use crate::hooks::{BytewiseCompare, KeyCompare};
use core::hash::{BuildHasher, Hasher};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeSet, HashMap};

// Pool-indexed operations so that shrinking converges on earlier keys.
#[derive(Clone, Debug)]
enum Op {
    Put(usize, u32, bool),
    Get(usize),
    Remove(usize, bool),
    Contains(u32),
    Iterate,
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<u32>, Vec<Op>)> {
    proptest::collection::vec(any::<u32>(), 1..=48).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            8 => (idx.clone(), any::<u32>(), any::<bool>()).prop_map(|(i, v, o)| Op::Put(i, v, o)),
            3 => idx.clone().prop_map(Op::Get),
            3 => (idx.clone(), any::<bool>()).prop_map(|(i, o)| Op::Remove(i, o)),
            1 => any::<u32>().prop_map(Op::Contains),
            1 => Just(Op::Iterate),
            1 => Just(Op::Clear),
        ];
        proptest::collection::vec(op, 1..200).prop_map(move |ops| (pool.clone(), ops))
    })
}

// State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - put/get round-trip; overwrite returns the previous value via ValueOk.
// - remove of an absent key is NotFound and leaves len unchanged.
// - iteration yields each live pair exactly once.
// - len/is_empty parity with the model; load factor bound after each put.
// - chain links and bucket placement stay consistent across resizes.
fn run_scenario<C, S>(
    mut sut: ChainedHashTable<C, S>,
    pool: &[u32],
    ops: Vec<Op>,
) -> Result<(), TestCaseError>
where
    C: KeyCompare,
    S: BuildHasher,
{
    let mut model: HashMap<u32, u32> = HashMap::new();

    for op in ops {
        match op {
            Op::Put(i, v, want_old) => {
                let k = pool[i];
                let mut old = [0u8; 4];
                let out = if want_old { Some(&mut old[..]) } else { None };
                let status = sut.put(&k.to_le_bytes(), &v.to_le_bytes(), out);
                let prev = model.insert(k, v);
                match (prev, want_old) {
                    (Some(p), true) => {
                        prop_assert_eq!(status, Ok(Status::ValueOk));
                        prop_assert_eq!(u32::from_le_bytes(old), p);
                    }
                    _ => prop_assert_eq!(status, Ok(Status::Ok)),
                }
                prop_assert!(sut.len() as f64 <= sut.capacity() as f64 * 0.7 + 1.0);
            }
            Op::Get(i) => {
                let k = pool[i];
                let mut out = [0u8; 4];
                let r = sut.get(&k.to_le_bytes(), &mut out);
                match model.get(&k) {
                    Some(&v) => {
                        prop_assert_eq!(r, Ok(Status::ValueOk));
                        prop_assert_eq!(u32::from_le_bytes(out), v);
                    }
                    None => prop_assert_eq!(r, Err(Error::NotFound)),
                }
            }
            Op::Remove(i, want_old) => {
                let k = pool[i];
                let before = sut.len();
                let mut old = [0u8; 4];
                let out = if want_old { Some(&mut old[..]) } else { None };
                let r = sut.remove(&k.to_le_bytes(), out);
                match model.remove(&k) {
                    Some(v) if want_old => {
                        prop_assert_eq!(r, Ok(Status::ValueOk));
                        prop_assert_eq!(u32::from_le_bytes(old), v);
                    }
                    Some(_) => prop_assert_eq!(r, Ok(Status::Ok)),
                    None => {
                        prop_assert_eq!(r, Err(Error::NotFound));
                        prop_assert_eq!(sut.len(), before);
                    }
                }
            }
            Op::Contains(raw) => {
                prop_assert_eq!(sut.contains_key(&raw.to_le_bytes()), model.contains_key(&raw));
            }
            Op::Iterate => {
                let pairs: Vec<(u32, u32)> = sut
                    .iter()
                    .map(|(k, v)| {
                        (
                            u32::from_le_bytes(k.try_into().unwrap()),
                            u32::from_le_bytes(v.try_into().unwrap()),
                        )
                    })
                    .collect();
                let unique: BTreeSet<u32> = pairs.iter().map(|&(k, _)| k).collect();
                prop_assert_eq!(unique.len(), pairs.len(), "a key was yielded twice");
                let mut expected: Vec<(u32, u32)> = model.iter().map(|(&k, &v)| (k, v)).collect();
                let mut got = pairs;
                expected.sort_unstable();
                got.sort_unstable();
                prop_assert_eq!(got, expected);
            }
            Op::Clear => {
                let cap = sut.capacity();
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.capacity(), cap);
            }
        }

        sut.assert_consistent();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let sut = TableBuilder::new(4, 4)
            .compare(BytewiseCompare)
            .initial_capacity(4)
            .build()
            .unwrap();
        run_scenario(sut, &pool, ops)?;
    }
}

// Collision variant: a hasher that only keeps the low two bits of the first
// byte, so most keys share a handful of chains at every capacity.
#[derive(Clone, Default)]
struct CoarseState;
struct CoarseHasher(u64);
impl BuildHasher for CoarseState {
    type Hasher = CoarseHasher;
    fn build_hasher(&self) -> Self::Hasher {
        CoarseHasher(0)
    }
}
impl Hasher for CoarseHasher {
    fn write(&mut self, bytes: &[u8]) {
        if let Some(&b) = bytes.first() {
            self.0 = u64::from(b & 0b11);
        }
    }
    fn finish(&self) -> u64 {
        self.0
    }
}

// Same invariants under heavy collisions; exercises unlinking at every chain
// position and rehash of long chains.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut = TableBuilder::new(4, 4)
            .compare(BytewiseCompare)
            .hasher(CoarseState)
            .initial_capacity(2)
            .build()
            .unwrap();
        run_scenario(sut, &pool, ops)?;
    }
}
