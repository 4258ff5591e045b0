/// Property and fuzz tests for copy-on-write B-tree invariants.
///
/// Runs randomized insert/delete workloads against a `BTreeMap` model and
/// checks after every step:
/// - Structural invariants (`verify`): page sizes, key order, separators,
///   equal leaf depth, the leftmost sentinel
/// - Lookups and full scans agree with the model
/// - Every live page in the store is reachable (old versions are freed)
use std::collections::BTreeMap;

use cowtree::{BTree, MemoryPageStore};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn assert_matches_model(btree: &mut BTree<MemoryPageStore>, model: &BTreeMap<Vec<u8>, Vec<u8>>) {
    let stats = btree.verify().expect("verify should succeed");
    assert_eq!(stats.entries, model.len());
    assert_eq!(
        btree.store().live_pages(),
        stats.pages,
        "unreachable pages left in the store"
    );

    let mut actual = Vec::new();
    btree
        .scan(|k, v| {
            actual.push((k.to_vec(), v.to_vec()));
            Ok(true)
        })
        .expect("scan should succeed");
    let expected: Vec<_> = model.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    assert_eq!(actual, expected);
}

fn random_key(rng: &mut StdRng, keyspace: u32) -> Vec<u8> {
    let mut key = format!("{:06}", rng.gen_range(0..keyspace)).into_bytes();
    // occasional long keys exercise separator growth and three-way splits
    if rng.gen_ratio(1, 8) {
        let len = rng.gen_range(100..1000);
        key.resize(len, b'~');
    }
    key
}

fn random_value(rng: &mut StdRng) -> Vec<u8> {
    let len = match rng.gen_range(0..10) {
        0 => rng.gen_range(2000..=3000),
        1..=3 => rng.gen_range(200..1000),
        _ => rng.gen_range(0..64),
    };
    let byte = rng.gen::<u8>();
    vec![byte; len]
}

fn run_workload(seed: u64, steps: usize, keyspace: u32, insert_ratio: f64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut btree = BTree::new(MemoryPageStore::new());
    let mut model = BTreeMap::new();

    for step in 0..steps {
        let key = random_key(&mut rng, keyspace);
        if rng.gen_bool(insert_ratio) {
            let value = random_value(&mut rng);
            btree.insert(&key, &value).expect("insert should succeed");
            model.insert(key.clone(), value.clone());
            assert_eq!(btree.get(&key).unwrap(), Some(value), "step {}", step);
        } else {
            let removed = btree.delete(&key).expect("delete should succeed");
            assert_eq!(removed, model.remove(&key).is_some(), "step {}", step);
            assert_eq!(btree.get(&key).unwrap(), None, "step {}", step);
        }
        if step % 16 == 0 {
            assert_matches_model(&mut btree, &model);
        }
    }
    assert_matches_model(&mut btree, &model);

    // drain everything back to the sentinel leaf
    let keys: Vec<_> = model.keys().cloned().collect();
    for key in keys {
        assert!(btree.delete(&key).unwrap());
        model.remove(&key);
    }
    assert_matches_model(&mut btree, &model);
    assert_eq!(btree.height().unwrap(), 1);
    assert!(btree.is_empty().unwrap());
}

#[test]
fn test_random_insert_heavy() {
    for seed in 0..4 {
        run_workload(seed, 600, 2000, 0.8);
    }
}

#[test]
fn test_random_balanced() {
    for seed in 10..14 {
        run_workload(seed, 800, 300, 0.5);
    }
}

#[test]
fn test_random_delete_heavy_small_keyspace() {
    for seed in 20..24 {
        run_workload(seed, 800, 64, 0.35);
    }
}

#[derive(Debug, Clone)]
enum PropOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        4 => prop::collection::vec(b'a'..=b'f', 1..6),
        1 => prop::collection::vec(any::<u8>(), 1..1000),
    ]
}

fn op_strategy() -> impl Strategy<Value = PropOp> {
    let value = prop_oneof![
        4 => prop::collection::vec(any::<u8>(), 0..128),
        1 => prop::collection::vec(any::<u8>(), 1000..3000),
    ];
    prop_oneof![
        (key_strategy(), value).prop_map(|(k, v)| PropOp::Put(k, v)),
        key_strategy().prop_map(PropOp::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]
    #[test]
    fn btree_matches_btreemap_random_ops(ops in prop::collection::vec(op_strategy(), 1..120)) {
        let mut btree = BTree::new(MemoryPageStore::new());
        let mut reference = BTreeMap::new();

        for op in ops {
            match op {
                PropOp::Put(key, value) => {
                    btree.insert(&key, &value).expect("insert");
                    reference.insert(key, value);
                }
                PropOp::Delete(key) => {
                    let expected = reference.remove(&key).is_some();
                    let removed = btree.delete(&key).expect("delete");
                    prop_assert_eq!(removed, expected);
                }
            }
        }

        let stats = btree.verify().expect("verify");
        prop_assert_eq!(stats.entries, reference.len());
        prop_assert_eq!(btree.store().live_pages(), stats.pages);
        for (key, value) in &reference {
            prop_assert_eq!(btree.get(key).expect("get"), Some(value.clone()));
        }
    }

    #[test]
    fn scan_from_returns_the_tail(
        keys in prop::collection::btree_set(prop::collection::vec(any::<u8>(), 1..24), 0..200),
        start in prop::collection::vec(any::<u8>(), 1..24),
    ) {
        let mut btree = BTree::new(MemoryPageStore::new());
        for key in &keys {
            btree.insert(key, &[0u8; 150]).expect("insert");
        }

        let mut actual = Vec::new();
        btree
            .scan_from(&start, |k, _| {
                actual.push(k.to_vec());
                Ok(true)
            })
            .expect("scan_from");
        let expected: Vec<Vec<u8>> = keys.range(start.clone()..).cloned().collect();
        prop_assert_eq!(actual, expected);
    }
}
