//! End-to-end scenarios from the spec's scenario table, degree 3, i64 keys,
//! 1024-byte arena blocks.

use arena_bptree::{BTree, Config, I64Comparator, Key};

fn new_tree() -> BTree<I64Comparator, 3> {
    BTree::with_config(
        I64Comparator,
        Config {
            block_size: 1024,
            assertions_enabled: true,
        },
    )
}

fn keys_i64(tree: &BTree<I64Comparator, 3>) -> Vec<i64> {
    tree.keys().iter().map(Key::to_i64).collect()
}

#[test]
fn scenario_1_insert_then_update_distinct_keys() {
    let mut tree = new_tree();
    tree.insert(Key::from_i64(11), Some(&12i64.to_le_bytes()));
    tree.insert(Key::from_i64(12), Some(&11i64.to_le_bytes()));

    assert_eq!(keys_i64(&tree), vec![11, 12]);
    assert_eq!(tree.find(Key::from_i64(11)).1, Some(12i64.to_le_bytes().as_slice()));
    assert_eq!(tree.find(Key::from_i64(12)).1, Some(11i64.to_le_bytes().as_slice()));
}

#[test]
fn scenario_2_reinserting_null_value_is_idempotent() {
    let mut tree = new_tree();
    tree.insert(Key::from_i64(15), None);
    tree.insert(Key::from_i64(15), None);

    assert_eq!(keys_i64(&tree), vec![15]);
    assert_eq!(tree.find(Key::from_i64(15)), (true, None));
}

#[test]
fn scenario_3_ascending_inserts_right_edge_splits() {
    let mut tree = new_tree();
    for i in 0..9i64 {
        tree.insert(Key::from_i64(i), Some(&i.to_le_bytes()));
    }

    assert_eq!(keys_i64(&tree), (0..9).collect::<Vec<_>>());
    assert_eq!(tree.find(Key::from_i64(5)).1, Some(5i64.to_le_bytes().as_slice()));
    assert_eq!(tree.find(Key::from_i64(10)), (false, None));
}

#[test]
fn scenario_4_null_key_is_legal_and_sorts_first() {
    let mut tree = new_tree();
    tree.insert(Key::NULL, Some(&99i64.to_le_bytes()));

    let keys = tree.keys();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].is_null());
    assert_eq!(tree.find(Key::NULL), (true, Some(99i64.to_le_bytes().as_slice())));
}

#[test]
fn scenario_5_mixed_sign_keys_sort_correctly() {
    let mut tree = new_tree();
    for k in [7, -29, 39, 49, -50, -45, 38, -12, -47, 5] {
        tree.insert(Key::from_i64(k), None);
    }

    assert_eq!(
        keys_i64(&tree),
        vec![-50, -47, -45, -29, -12, 5, 7, 38, 39, 49]
    );
    assert_eq!(tree.find(Key::from_i64(38)), (true, None));
    assert_eq!(tree.find(Key::from_i64(0)), (false, None));
}

#[test]
fn scenario_descending_inserts_left_edge_and_repeated_root_splits() {
    let mut tree = new_tree();
    for k in (0..200i64).rev() {
        tree.insert(Key::from_i64(k), None);
    }
    assert_eq!(keys_i64(&tree), (0..200).collect::<Vec<_>>());
}

#[test]
fn empty_tree_boundary_behaviors() {
    let tree = new_tree();
    assert_eq!(tree.find(Key::from_i64(0)), (false, None));
    assert!(tree.keys().is_empty());
    assert_eq!(
        tree.print(|k| k.to_i64().to_string(), |v| format!("{:?}", v)),
        "empty"
    );
}

#[test]
fn single_item_null_key_and_null_value() {
    let mut tree = new_tree();
    tree.insert(Key::NULL, None);
    assert_eq!(tree.find(Key::NULL), (true, None));
}
