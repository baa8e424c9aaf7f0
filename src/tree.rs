use std::collections::VecDeque;

use crate::arena::Arena;
use crate::comparator::{compare_keys, Comparator};
use crate::item::{Item, Key};
use crate::node::{self, Node};
use crate::Location;

/// Tunables for a [`BTree`], mirroring the knobs the block arena exposes.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Byte budget per arena block, for both the node region and the value region.
    pub block_size: u32,
    /// When `true`, every mutation re-walks the whole tree to check the structural invariants
    /// (separator correctness, parent links, leaf-chain ordering), even in release builds. Debug
    /// builds additionally run [`Node::validate`] regardless of this flag.
    pub assertions_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            block_size: 4096,
            assertions_enabled: false,
        }
    }
}

/// An in-memory B+tree over fixed-width keys and opaque byte-string values, backed by a
/// [block arena](crate::arena::Arena) instead of native allocation.
///
/// Parent nodes separate their children by *maximum* key, not by a pivot strictly between them:
/// the item in a parent that addresses a child carries that child's own maximum key. This is why
/// a right-edge insert has to rewrite separators on the way down (see [`BTree::insert`]) and why
/// splitting a node requires fixing up every separator that used to point at it (see
/// [`BTree::insert_father`]).
pub struct BTree<C: Comparator, const DEGREE: usize> {
    arena: Arena<DEGREE>,
    root_loc: Location,
    comparator: C,
    assertions_enabled: bool,
}

impl<C: Comparator, const DEGREE: usize> BTree<C, DEGREE> {
    pub fn new(comparator: C) -> Self {
        Self::with_config(comparator, Config::default())
    }

    pub fn with_config(comparator: C, config: Config) -> Self {
        assert!(DEGREE >= 3, "degree must be at least 3, got {}", DEGREE);
        BTree {
            arena: Arena::new(config.block_size),
            root_loc: Location::NULL,
            comparator,
            assertions_enabled: config.assertions_enabled,
        }
    }

    /// Inserts `key` with an optional value. A `None` value still occupies a slot (it is not the
    /// same as absence): a subsequent `find` reports the key as present with a null value.
    ///
    /// Re-inserting an existing key overwrites its value in place; the tree's shape is
    /// unaffected.
    pub fn insert(&mut self, key: Key, value: Option<&[u8]>) {
        let value_loc = match value {
            Some(bytes) => self.arena.alloc_value(bytes),
            None => Location::NULL,
        };
        let item = Item::new(key, value_loc);

        if self.root_loc.is_null() {
            self.root_loc = self
                .arena
                .alloc_node_with(|self_loc| Node::new_leaf_root(self_loc, item));
            self.maybe_validate();
            return;
        }

        let leaf_loc = self.descend_mut(&key);
        let inserted = self.arena.node_mut(leaf_loc).try_insert(&self.comparator, item);
        if !inserted {
            self.split_and_insert(leaf_loc, item);
        }
        self.maybe_validate();
    }

    /// Looks up `key`. The first element of the result is whether the key is present at all; the
    /// second is its value, or `None` if the key is present with a null value (or absent).
    pub fn find(&self, key: Key) -> (bool, Option<&[u8]>) {
        if self.root_loc.is_null() {
            return (false, None);
        }
        let leaf_loc = self.descend_immut(&key);
        let leaf = self.arena.node(leaf_loc);
        match leaf.find(&self.comparator, &key) {
            Some(idx) => {
                let value_loc = leaf.item(idx).value_loc;
                if value_loc.is_null() {
                    (true, None)
                } else {
                    (true, Some(self.arena.value(value_loc)))
                }
            }
            None => (false, None),
        }
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> Vec<Key> {
        self.iter_keys().collect()
    }

    /// An iterator over all keys in ascending order, walking the leaf chain left to right.
    pub fn iter_keys(&self) -> Keys<'_, C, DEGREE> {
        let loc = if self.root_loc.is_null() {
            Location::NULL
        } else {
            self.descend_immut(&Key::NULL)
        };
        Keys {
            tree: self,
            loc,
            index: 0,
        }
    }

    /// Renders the whole tree breadth-first, one line per level, in the format:
    /// `[(mode)key1,key2,...]->[(mode)key3,...]\n[(mode)key4:val4,...]`, with leaves additionally
    /// showing `key:value` pairs (`nil` for a null key or value). Returns `"empty"` for an empty
    /// tree.
    pub fn print<KF, VF>(&self, key_fmt: KF, val_fmt: VF) -> String
    where
        KF: Fn(&Key) -> String,
        VF: Fn(&[u8]) -> String,
    {
        if self.root_loc.is_null() {
            return "empty".to_string();
        }

        let mut out = String::new();
        let mut queue = VecDeque::new();
        queue.push_back(self.root_loc);
        while let Some(loc) = queue.pop_front() {
            let node = self.arena.node(loc);
            out.push('[');
            out.push_str(&mode_str(node.mode()));
            let count = node.item_count();
            for i in 0..count {
                let item = node.item(i);
                if item.key.is_null() {
                    out.push_str("nil");
                } else {
                    out.push_str(&key_fmt(&item.key));
                }
                if node.is_leaf(self.assertions_enabled) {
                    out.push(':');
                    if item.value_loc.is_null() {
                        out.push_str("nil");
                    } else {
                        out.push_str(&val_fmt(self.arena.value(item.value_loc)));
                    }
                } else {
                    queue.push_back(item.value_loc);
                }
                if i + 1 < count {
                    out.push(',');
                }
            }
            out.push(']');
            if node.has_next() {
                out.push_str("->");
            } else {
                out.push('\n');
            }
        }
        if out.ends_with('\n') {
            out.pop();
        }
        out
    }

    /// Descends from the root to the leaf that would hold `key`, rewriting the right-edge
    /// separator at every level it passes through the last item of (see spec §4.2, *Descent*).
    /// Never called by [`BTree::find`], which must not mutate the tree.
    fn descend_mut(&mut self, key: &Key) -> Location {
        let mut loc = self.root_loc;
        loop {
            let is_leaf = self.arena.node(loc).is_leaf(self.assertions_enabled);
            if is_leaf {
                return loc;
            }
            let (pos, is_last) = self.arena.node(loc).descend_pos(&self.comparator, key);
            if is_last {
                self.arena.node_mut(loc).rewrite_key(pos, *key);
            }
            loc = self.arena.node(loc).item(pos).value_loc;
        }
    }

    fn descend_immut(&self, key: &Key) -> Location {
        let mut loc = self.root_loc;
        loop {
            let node = self.arena.node(loc);
            if node.is_leaf(self.assertions_enabled) {
                return loc;
            }
            let (pos, _is_last) = node.descend_pos(&self.comparator, key);
            loc = node.item(pos).value_loc;
        }
    }

    /// Splits the full node at `loc` in half, places `item` into whichever half it belongs in,
    /// and repairs the parent chain (possibly all the way up to a new root). Returns the new
    /// sibling's location and the location that ended up absorbing `item`, for callers that are
    /// themselves mid-recursion (see [`BTree::insert_father`]).
    fn split_and_insert(&mut self, loc: Location, item: Item) -> (Location, Location) {
        let mode = self.arena.node(loc).mode();
        let next_loc = self.arena.node(loc).next_loc;
        let father_loc = self.arena.node(loc).father_loc;

        let new_loc = self.arena.alloc_node_with(|self_loc| Node::new_empty(self_loc, mode));
        let upper = self.arena.node_mut(loc).split_off_upper_half();
        {
            let new_node = self.arena.node_mut(new_loc);
            new_node.adopt_items(upper);
            new_node.next_loc = next_loc;
            new_node.father_loc = father_loc;
        }
        self.arena.node_mut(loc).next_loc = new_loc;

        if !self.arena.node(new_loc).is_leaf(self.assertions_enabled) {
            let children: Vec<Location> = self
                .arena
                .node(new_loc)
                .items()
                .iter()
                .map(|it| it.value_loc)
                .collect();
            for child_loc in children {
                self.arena.node_mut(child_loc).father_loc = new_loc;
            }
        }

        let new_first_key = self.arena.node(new_loc).item(0).key;
        let insert_loc = if compare_keys(&self.comparator, &item.key, &new_first_key).is_gt() {
            new_loc
        } else {
            loc
        };
        let ok = self.arena.node_mut(insert_loc).try_insert(&self.comparator, item);
        assert!(ok, "node still full immediately after split");

        self.insert_father(loc, new_loc);
        (new_loc, insert_loc)
    }

    /// Repairs the separator structure above a just-split pair of siblings `left`/`right` (`left`
    /// keeps the original location, `right` is the freshly-allocated one). Either grows a new
    /// root over them, slots a new separator into their existing parent, or (if that parent is
    /// itself full) recursively splits the parent first.
    fn insert_father(&mut self, left_loc: Location, right_loc: Location) {
        if self.arena.node(left_loc).is_root(self.assertions_enabled) {
            let left_max = self.arena.node(left_loc).max_key();
            let new_root_loc = self.arena.alloc_node_with(|self_loc| {
                let mut root = Node::new_empty(self_loc, node::ROOT);
                let ok = root.try_insert(&self.comparator, Item::new(left_max, left_loc));
                assert!(ok, "fresh root cannot hold even one item");
                root
            });
            let right_max = self.arena.node(right_loc).max_key();
            let ok = self
                .arena
                .node_mut(new_root_loc)
                .try_insert(&self.comparator, Item::new(right_max, right_loc));
            assert!(ok, "fresh root cannot hold both split halves");

            self.arena.node_mut(left_loc).clear_root();
            self.arena.node_mut(right_loc).clear_root();
            if !self.arena.node(left_loc).is_leaf(self.assertions_enabled) {
                self.arena.node_mut(left_loc).set_mode(node::MID);
                self.arena.node_mut(right_loc).set_mode(node::MID);
            }
            self.arena.node_mut(left_loc).father_loc = new_root_loc;
            self.arena.node_mut(right_loc).father_loc = new_root_loc;
            self.root_loc = new_root_loc;
            return;
        }

        let father_loc = self.arena.node(left_loc).father_loc;
        let left_max = self.arena.node(left_loc).max_key();
        let has_room = self
            .arena
            .node_mut(father_loc)
            .try_insert(&self.comparator, Item::new(left_max, left_loc));

        if has_room {
            let right_max = self.arena.node(right_loc).max_key();
            let ok = self
                .arena
                .node_mut(father_loc)
                .update_value_loc(&self.comparator, &right_max, right_loc);
            assert!(ok, "father accepted left's separator but is missing right's");
            return;
        }

        let (another_father_loc, left_father_loc) =
            self.split_and_insert(father_loc, Item::new(left_max, left_loc));
        self.arena.node_mut(father_loc).set_mode(node::MID);
        self.arena.node_mut(another_father_loc).set_mode(node::MID);
        self.arena.node_mut(left_loc).father_loc = left_father_loc;

        let right_max = self.arena.node(right_loc).max_key();
        let right_father_loc = self.find_father(right_max, father_loc, another_father_loc);
        self.arena.node_mut(right_loc).father_loc = right_father_loc;
        let ok = self
            .arena
            .node_mut(right_father_loc)
            .update_value_loc(&self.comparator, &right_max, right_loc);
        assert!(ok, "neither half of the split parent holds right's separator");
    }

    /// After a parent has itself been split into `f1`/`f2`, finds which of the two now holds the
    /// separator for `max_key`, by direct lookup rather than by re-deriving it from the split.
    fn find_father(&self, max_key: Key, f1: Location, f2: Location) -> Location {
        if self.arena.node(f1).find(&self.comparator, &max_key).is_some() {
            return f1;
        }
        if self.arena.node(f2).find(&self.comparator, &max_key).is_some() {
            return f2;
        }
        panic!("separator {:?} landed in neither half of the split parent", max_key);
    }

    fn maybe_validate(&self) {
        if self.assertions_enabled || cfg!(debug_assertions) {
            self.validate();
        }
    }

    /// Walks the whole tree checking: every node is internally sorted and non-overflowing
    /// ([`Node::validate`]); every parent's separator equals its child's own max key and every
    /// child's `father_loc` points back at its parent; and the leaf chain is strictly increasing
    /// and visits every leaf exactly once.
    fn validate(&self) {
        if self.root_loc.is_null() {
            return;
        }

        let mut queue = VecDeque::new();
        queue.push_back(self.root_loc);
        let mut leaf_count = 0usize;
        while let Some(loc) = queue.pop_front() {
            let node = self.arena.node(loc);
            node.validate(&self.comparator);
            if node.is_leaf(self.assertions_enabled) {
                leaf_count += 1;
            } else {
                for item in node.items() {
                    let child = self.arena.node(item.value_loc);
                    assert_eq!(
                        child.father_loc, loc,
                        "child at {:?} does not point back at its parent {:?}",
                        item.value_loc, loc
                    );
                    assert!(
                        compare_keys(&self.comparator, &child.max_key(), &item.key).is_eq(),
                        "separator at {:?} does not match child {:?}'s own max key",
                        loc,
                        item.value_loc
                    );
                    queue.push_back(item.value_loc);
                }
            }
        }

        let mut loc = self.descend_immut(&Key::NULL);
        let mut visited = 0usize;
        let mut prev_key: Option<Key> = None;
        loop {
            let node = self.arena.node(loc);
            assert!(
                node.is_leaf(self.assertions_enabled),
                "leftmost descent did not land on a leaf"
            );
            for item in node.items() {
                if let Some(prev) = prev_key {
                    assert!(
                        compare_keys(&self.comparator, &prev, &item.key).is_lt(),
                        "leaf chain is not strictly increasing"
                    );
                }
                prev_key = Some(item.key);
            }
            visited += 1;
            if node.has_next() {
                loc = node.next_loc;
            } else {
                break;
            }
        }
        assert_eq!(visited, leaf_count, "leaf chain skips or repeats a leaf");
    }
}

fn mode_str(mode: u8) -> String {
    let mut s = String::from("(");
    if mode & node::ROOT == node::ROOT {
        s.push('R');
    }
    if mode & node::MID == node::MID {
        s.push('M');
    }
    if mode & node::LEAF == node::LEAF {
        s.push('E');
    }
    s.push(')');
    s
}

/// Ascending iterator over a [`BTree`]'s keys, produced by [`BTree::iter_keys`].
pub struct Keys<'a, C: Comparator, const DEGREE: usize> {
    tree: &'a BTree<C, DEGREE>,
    loc: Location,
    index: usize,
}

impl<'a, C: Comparator, const DEGREE: usize> Iterator for Keys<'a, C, DEGREE> {
    type Item = Key;

    fn next(&mut self) -> Option<Key> {
        loop {
            if self.loc.is_null() {
                return None;
            }
            let node = self.tree.arena.node(self.loc);
            if self.index < node.item_count() {
                let key = node.item(self.index).key;
                self.index += 1;
                return Some(key);
            } else if node.has_next() {
                self.loc = node.next_loc;
                self.index = 0;
            } else {
                self.loc = Location::NULL;
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::I64Comparator;

    fn keys_as_i64<C: Comparator, const DEGREE: usize>(tree: &BTree<C, DEGREE>) -> Vec<i64> {
        tree.keys().iter().map(|k| k.to_i64()).collect()
    }

    #[test]
    fn single_insert_and_find() {
        let mut tree: BTree<I64Comparator, 4> = BTree::new(I64Comparator);
        tree.insert(Key::from_i64(42), Some(b"hello"));
        let (exists, value) = tree.find(Key::from_i64(42));
        assert!(exists);
        assert_eq!(value, Some(b"hello".as_slice()));

        let (exists, _) = tree.find(Key::from_i64(7));
        assert!(!exists);
    }

    #[test]
    fn null_value_is_present_but_empty() {
        let mut tree: BTree<I64Comparator, 4> = BTree::new(I64Comparator);
        tree.insert(Key::from_i64(1), None);
        let (exists, value) = tree.find(Key::from_i64(1));
        assert!(exists);
        assert_eq!(value, None);
    }

    #[test]
    fn reinsert_overwrites_value_without_growing() {
        let mut tree: BTree<I64Comparator, 4> = BTree::new(I64Comparator);
        tree.insert(Key::from_i64(1), Some(b"a"));
        tree.insert(Key::from_i64(1), Some(b"b"));
        assert_eq!(tree.keys().len(), 1);
        assert_eq!(tree.find(Key::from_i64(1)).1, Some(b"b".as_slice()));
    }

    #[test]
    fn ascending_inserts_drive_repeated_splits_and_stay_sorted() {
        let mut tree: BTree<I64Comparator, 4> = BTree::new(I64Comparator);
        for k in 0..500i64 {
            tree.insert(Key::from_i64(k), Some(&k.to_le_bytes()));
        }
        assert_eq!(keys_as_i64(&tree), (0..500).collect::<Vec<_>>());
        for k in 0..500i64 {
            let (exists, value) = tree.find(Key::from_i64(k));
            assert!(exists);
            assert_eq!(value, Some(k.to_le_bytes().as_slice()));
        }
    }

    #[test]
    fn descending_inserts_stay_sorted() {
        let mut tree: BTree<I64Comparator, 3> = BTree::new(I64Comparator);
        for k in (0..300i64).rev() {
            tree.insert(Key::from_i64(k), None);
        }
        assert_eq!(keys_as_i64(&tree), (0..300).collect::<Vec<_>>());
    }

    #[test]
    fn shuffled_inserts_stay_sorted() {
        let mut tree: BTree<I64Comparator, 5> = BTree::new(I64Comparator);
        let mut keys: Vec<i64> = (0..1000).collect();
        // deterministic shuffle, no `rand` needed for this unit test
        keys.sort_by_key(|k| (k * 2654435761i64) ^ 0x5bd1e995);
        for k in &keys {
            tree.insert(Key::from_i64(*k), None);
        }
        assert_eq!(keys_as_i64(&tree), (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn print_empty_tree() {
        let tree: BTree<I64Comparator, 4> = BTree::new(I64Comparator);
        assert_eq!(tree.print(|k| k.to_i64().to_string(), |v| format!("{:?}", v)), "empty");
    }

    #[test]
    fn print_single_leaf_root() {
        let mut tree: BTree<I64Comparator, 4> = BTree::new(I64Comparator);
        tree.insert(Key::from_i64(1), Some(b"x"));
        tree.insert(Key::from_i64(2), None);
        let rendered = tree.print(
            |k| k.to_i64().to_string(),
            |v| String::from_utf8_lossy(v).to_string(),
        );
        assert_eq!(rendered, "[(RE)1:x,2:nil]");
    }
}
