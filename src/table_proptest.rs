#![cfg(test)]

// Property tests for ChainedTable kept inside the crate so they can check
// crate-private state such as the structural version after each op.

use crate::config::TableConfig;
use crate::table::ChainedTable;
use hashbrown::HashMap;
use proptest::prelude::*;
use std::collections::hash_map::RandomState;
use std::collections::BTreeSet;
use std::hash::{BuildHasher, Hasher};

// Narrow key space so operations keep hitting the same keys and chains.
#[derive(Clone, Debug)]
enum OpI {
    Put(u8, i32),
    PutIfAbsent(u8, i32),
    Remove(u8),
    RemoveIfEq(u8, i32),
    Replace(u8, i32),
    Get(u8),
    Merge(u8, i32),
    ComputeIfPresent(u8, bool),
    Retain(u8),
    Clear,
    Iterate,
}

fn arb_ops() -> impl Strategy<Value = Vec<OpI>> {
    let key = 0u8..24;
    let op = prop_oneof![
        4 => (key.clone(), any::<i32>()).prop_map(|(k, v)| OpI::Put(k, v)),
        1 => (key.clone(), any::<i32>()).prop_map(|(k, v)| OpI::PutIfAbsent(k, v)),
        2 => key.clone().prop_map(OpI::Remove),
        1 => (key.clone(), -2i32..2).prop_map(|(k, v)| OpI::RemoveIfEq(k, v)),
        1 => (key.clone(), any::<i32>()).prop_map(|(k, v)| OpI::Replace(k, v)),
        2 => key.clone().prop_map(OpI::Get),
        1 => (key.clone(), -4i32..4).prop_map(|(k, v)| OpI::Merge(k, v)),
        1 => (key.clone(), any::<bool>()).prop_map(|(k, drop)| OpI::ComputeIfPresent(k, drop)),
        1 => (2u8..5).prop_map(OpI::Retain),
        1 => Just(OpI::Clear),
        1 => Just(OpI::Iterate),
    ];
    proptest::collection::vec(op, 1..120)
}

fn arb_config() -> impl Strategy<Value = TableConfig> {
    prop_oneof![
        Just(TableConfig::default()),
        (0usize..4).prop_map(|c| TableConfig::new().with_capacity(c)),
        // Small cap: growth stops and chains absorb the overflow.
        (1usize..4, 4usize..8).prop_map(|(c, max)| TableConfig::new()
            .with_capacity(c)
            .with_max_capacity(max)),
        Just(TableConfig::new().with_capacity(5).with_load_factor(100.0)),
    ]
}

fn check_state_machine<S: BuildHasher>(
    mut sut: ChainedTable<u8, i32, S>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<u8, i32> = HashMap::new();
    for op in ops {
        let before = sut.structural_version();
        let model_len = model.len();
        let mut structural = false;
        match op {
            OpI::Put(k, v) => {
                let prev = sut.put(k, v);
                structural = prev.is_none();
                prop_assert_eq!(prev, model.insert(k, v));
            }
            OpI::PutIfAbsent(k, v) => {
                let existing = sut.put_if_absent(k, v).copied();
                prop_assert_eq!(existing, model.get(&k).copied());
                structural = existing.is_none();
                model.entry(k).or_insert(v);
            }
            OpI::Remove(k) => {
                let removed = sut.remove(&k);
                structural = removed.is_some();
                prop_assert_eq!(removed, model.remove(&k));
            }
            OpI::RemoveIfEq(k, v) => {
                let removed = sut.remove_if_eq(&k, &v);
                let expected = model.get(&k) == Some(&v);
                prop_assert_eq!(removed, expected);
                if expected {
                    model.remove(&k);
                }
                structural = removed;
            }
            OpI::Replace(k, v) => {
                let prev = sut.replace(&k, v);
                let mv = model.get_mut(&k).map(|m| std::mem::replace(m, v));
                prop_assert_eq!(prev, mv);
            }
            OpI::Get(k) => {
                prop_assert_eq!(sut.get(&k), model.get(&k));
                prop_assert_eq!(sut.contains_key(&k), model.contains_key(&k));
            }
            OpI::Merge(k, v) => {
                // Summing to zero removes the key.
                let combine = |a: &i32, b: i32| Some(a.wrapping_add(b)).filter(|s| *s != 0);
                let got = sut.merge(k, v, combine).copied();
                let expected = match model.get(&k) {
                    Some(old) => combine(old, v),
                    None => Some(v),
                };
                structural = model.contains_key(&k) != expected.is_some();
                match expected {
                    Some(n) => {
                        model.insert(k, n);
                    }
                    None => {
                        model.remove(&k);
                    }
                }
                prop_assert_eq!(got, expected);
            }
            OpI::ComputeIfPresent(k, drop) => {
                let got = sut
                    .compute_if_present(&k, |_, v| {
                        if drop {
                            None
                        } else {
                            Some(v.wrapping_mul(3))
                        }
                    })
                    .copied();
                match model.get(&k).copied() {
                    Some(_) if drop => {
                        model.remove(&k);
                        structural = true;
                        prop_assert_eq!(got, None);
                    }
                    Some(old) => {
                        model.insert(k, old.wrapping_mul(3));
                        prop_assert_eq!(got, Some(old.wrapping_mul(3)));
                    }
                    None => {
                        prop_assert_eq!(got, None);
                    }
                }
            }
            OpI::Retain(m) => {
                sut.retain(|k, _| k % m != 0);
                model.retain(|k, _| k % m != 0);
                structural = model.len() != model_len;
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
                structural = true;
            }
            OpI::Iterate => {
                let pairs: BTreeSet<(u8, i32)> = sut.iter().map(|(k, v)| (*k, *v)).collect();
                let m_pairs: BTreeSet<(u8, i32)> = model.iter().map(|(k, v)| (*k, *v)).collect();
                prop_assert_eq!(sut.iter().count(), sut.len());
                prop_assert_eq!(pairs, m_pairs);
            }
        }

        // Post-conditions after each op
        // 1) Value-only operations leave the structural version alone.
        if !structural {
            prop_assert_eq!(sut.structural_version(), before);
        } else {
            prop_assert!(sut.structural_version() != before);
        }
        // 2) Size parity
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        // 3) Growth keeps the count under the threshold until the cap.
        prop_assert!(
            sut.len() < sut.threshold()
                || sut.capacity() == sut.config().max_capacity
                || sut.is_empty()
        );
    }
    // Every model key is reachable at the end.
    for (k, v) in &model {
        prop_assert_eq!(sut.get(k), Some(v));
    }
    let std_model: std::collections::HashMap<u8, i32> = model.into_iter().collect();
    prop_assert!(sut == std_model);
    Ok(())
}

// Property: State-machine equivalence against hashbrown::HashMap.
// Invariants exercised across random operations and configurations:
// - Every read agrees with the model, including after rehashes and clears.
// - The structural version moves exactly when a key is added or removed.
// - `iter` yields each live pair exactly once.
// - With growth capped, overflowing records still resolve through chains.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(config in arb_config(), ops in arb_ops()) {
        let sut = ChainedTable::with_config_and_hasher(config, RandomState::new()).unwrap();
        check_state_machine(sut, ops)?;
    }
}

// Collision variant using a constant hasher: every record shares one
// primary slot and one probe step.
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

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions(config in arb_config(), ops in arb_ops()) {
        let sut = ChainedTable::with_config_and_hasher(config, ConstBuildHasher).unwrap();
        check_state_machine(sut, ops)?;
    }
}
