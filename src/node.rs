use arrayvec::ArrayVec;

use crate::comparator::{compare_keys, Comparator};
use crate::item::{Item, Key};
use crate::Location;

/// Bit in [`Node::mode`] meaning "this node has no children; its items' `value_loc`s point at
/// value payloads".
pub const LEAF: u8 = 1 << 0;
/// Bit in [`Node::mode`] meaning "this node is the tree's root; its `father_loc` is null".
pub const ROOT: u8 = 1 << 1;
/// Bit in [`Node::mode`] meaning "this node is neither the root nor a leaf".
pub const MID: u8 = 1 << 2;

const ALL_MODE_BITS: u8 = LEAF | ROOT | MID;

/// A B+tree node: a fixed-capacity array of items plus the three `Location`s that link it to its
/// parent, its right sibling, and (indirectly, via its own address) its children.
///
/// Both leaves and internal nodes share this one layout: for an internal node, every item's
/// `value_loc` addresses a child [`Node`]; for a leaf, every item's `value_loc` addresses a value
/// payload in the arena (or is [`Location::NULL`], meaning "value is null"). There is no separate
/// `Leaf`/`Internal` type because the physical shape never differs — only `mode` does.
#[derive(Clone, Debug)]
pub struct Node<const DEGREE: usize> {
    mode: u8,
    items: ArrayVec<Item, DEGREE>,
    pub self_loc: Location,
    pub father_loc: Location,
    pub next_loc: Location,
}

impl<const DEGREE: usize> Node<DEGREE> {
    /// Builds the very first node of a tree: a lone leaf-root holding one item.
    pub fn new_leaf_root(self_loc: Location, item: Item) -> Self {
        let mut items = ArrayVec::new();
        items.push(item);
        Node {
            mode: LEAF | ROOT,
            items,
            self_loc,
            father_loc: Location::NULL,
            next_loc: Location::NULL,
        }
    }

    /// Builds an empty node carrying the given mode, to be populated by the caller. Used when a
    /// node's own [`Location`] must be known (via [`crate::arena::Arena::alloc_node_with`])
    /// before its item list can be filled in, e.g. the right half of a split.
    pub fn new_empty(self_loc: Location, mode: u8) -> Self {
        Node {
            mode,
            items: ArrayVec::new(),
            self_loc,
            father_loc: Location::NULL,
            next_loc: Location::NULL,
        }
    }

    #[inline]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    #[inline]
    pub fn item(&self, i: usize) -> &Item {
        &self.items[i]
    }

    #[inline]
    pub fn mode(&self) -> u8 {
        self.mode
    }

    /// Checks the mode bitset is one of the well-formed subsets of `{Leaf, Root, Mid}`. Always a
    /// real `assert!` when `assertions_enabled` is `true` (so a release build constructed with
    /// that config flag set actually pays for the check on every node access, per spec.md §6),
    /// and a `debug_assert!` otherwise so debug builds still catch it for free.
    #[inline]
    fn check_mode_bitset(&self, assertions_enabled: bool) {
        if assertions_enabled {
            assert_eq!(self.mode & !ALL_MODE_BITS, 0, "invalid mode bitset {}", self.mode);
        } else {
            debug_assert_eq!(self.mode & !ALL_MODE_BITS, 0, "invalid mode bitset {}", self.mode);
        }
    }

    #[inline]
    pub fn is_leaf(&self, assertions_enabled: bool) -> bool {
        self.check_mode_bitset(assertions_enabled);
        self.mode & LEAF == LEAF
    }

    #[inline]
    pub fn is_root(&self, assertions_enabled: bool) -> bool {
        self.check_mode_bitset(assertions_enabled);
        self.mode & ROOT == ROOT
    }

    #[inline]
    #[allow(dead_code)]
    pub fn is_mid(&self, assertions_enabled: bool) -> bool {
        self.check_mode_bitset(assertions_enabled);
        self.mode & MID == MID
    }

    #[inline]
    pub fn has_next(&self) -> bool {
        !self.next_loc.is_null()
    }

    /// Clears the root bit, e.g. when this node becomes a non-root half of a split.
    #[inline]
    pub fn clear_root(&mut self) {
        self.mode &= !ROOT;
    }

    #[inline]
    pub fn set_mode(&mut self, mode: u8) {
        self.mode = mode;
    }

    /// The maximum key among this node's items, i.e. the key that should appear as this node's
    /// own separator in its parent.
    ///
    /// Panics if the node has no items; per invariant 3, a live node always holds at least one.
    #[inline]
    pub fn max_key(&self) -> Key {
        self.items
            .last()
            .unwrap_or_else(|| panic!("node {:?} has no items", self.self_loc))
            .key
    }

    /// Finds the first item whose key is `>=` the given key (null-key treated as the minimum),
    /// via the linear scan the spec calls for.
    fn find_insertion_pos<C: Comparator>(&self, cmp: &C, key: &Key) -> usize {
        let mut pos = 0;
        while pos < self.items.len() && compare_keys(cmp, &self.items[pos].key, key).is_lt() {
            pos += 1;
        }
        pos
    }

    /// Finds the child to descend into for `key`. Returns the item's index and whether that item
    /// was the last one in the node (i.e. `key` is greater than every separator here).
    pub fn descend_pos<C: Comparator>(&self, cmp: &C, key: &Key) -> (usize, bool) {
        let pos = self.find_insertion_pos(cmp, key);
        if pos == self.items.len() {
            (self.items.len() - 1, true)
        } else {
            (pos, false)
        }
    }

    /// Rewrites the key of the item at `index` in place, used to extend the right-edge separator
    /// during an insert descent (see spec §4.2, *Descent*).
    pub fn rewrite_key(&mut self, index: usize, key: Key) {
        self.items[index].key = key;
    }

    /// Attempts to place `item` in this node: updates in place on an exact key match, otherwise
    /// inserts in sorted position if there is room. Returns `false` (refusing the insert) only
    /// when the node is full and the key is not already present — the caller must split.
    pub fn try_insert<C: Comparator>(&mut self, cmp: &C, item: Item) -> bool {
        let pos = self.find_insertion_pos(cmp, &item.key);
        if pos < self.items.len() && compare_keys(cmp, &self.items[pos].key, &item.key).is_eq() {
            self.items[pos].value_loc = item.value_loc;
            return true;
        }
        if self.items.len() == DEGREE {
            return false;
        }
        self.items.insert(pos, item);
        true
    }

    /// Overwrites the `value_loc` of the item whose key equals `key`, used to repoint a parent's
    /// separator at a node's new half after a split. Returns `false` if no such item exists.
    pub fn update_value_loc<C: Comparator>(&mut self, cmp: &C, key: &Key, value_loc: Location) -> bool {
        for item in self.items.iter_mut() {
            if compare_keys(cmp, &item.key, key).is_eq() {
                item.value_loc = value_loc;
                return true;
            }
        }
        false
    }

    /// Locates the offset of the item matching `key`, if any.
    pub fn find<C: Comparator>(&self, cmp: &C, key: &Key) -> Option<usize> {
        self.items
            .iter()
            .position(|item| compare_keys(cmp, &item.key, key).is_eq())
    }

    /// Removes and returns this node's upper half (`items[item_count/2..]`), leaving the lower
    /// half in place. Paired with [`Node::adopt_items`] on a freshly-allocated sibling node to
    /// perform a split without ever needing two nodes borrowed from the arena at once.
    pub fn split_off_upper_half(&mut self) -> ArrayVec<Item, DEGREE> {
        assert_eq!(self.items.len(), DEGREE, "split called on a non-full node");
        let mid = self.items.len() / 2;
        let mut upper = ArrayVec::new();
        while self.items.len() > mid {
            upper.push(self.items.remove(mid));
        }
        upper
    }

    /// Installs items taken from [`Node::split_off_upper_half`] into this (freshly-allocated,
    /// empty) node.
    pub fn adopt_items(&mut self, items: ArrayVec<Item, DEGREE>) {
        debug_assert!(self.items.is_empty(), "adopt_items called on a non-empty node");
        self.items = items;
    }

    /// Structural check: mode-bitset well-formedness, sortedness, and that the node isn't
    /// over/under-occupied. Always compiled as real `assert!`s (not `debug_assertions`-gated) —
    /// the caller ([`crate::tree::BTree`]'s `maybe_validate`) only invokes this when
    /// `assertions_enabled` is set or the build is already a debug build, so by the time this
    /// runs the decision to pay for it has already been made.
    pub fn validate<C: Comparator>(&self, cmp: &C) {
        assert_eq!(self.mode & !ALL_MODE_BITS, 0, "invalid mode bitset {}", self.mode);
        assert!(!self.items.is_empty(), "live node {:?} has no items", self.self_loc);
        assert!(self.items.len() <= DEGREE, "node {:?} overflowed", self.self_loc);
        for pair in self.items.windows(2) {
            assert!(
                compare_keys(cmp, &pair[0].key, &pair[1].key).is_lt(),
                "node {:?} items are not strictly sorted",
                self.self_loc
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::I64Comparator;

    fn item(k: i64) -> Item {
        Item::new(Key::from_i64(k), Location::new(0, k as u32))
    }

    #[test]
    fn insert_keeps_sorted_order() {
        let mut node: Node<8> = Node::new_leaf_root(Location::new(0, 0), item(5));
        let cmp = I64Comparator;
        assert!(node.try_insert(&cmp, item(1)));
        assert!(node.try_insert(&cmp, item(9)));
        assert!(node.try_insert(&cmp, item(3)));
        let keys: Vec<i64> = node.items().iter().map(|it| it.key.to_i64()).collect();
        assert_eq!(keys, vec![1, 3, 5, 9]);
    }

    #[test]
    fn insert_on_existing_key_updates_value_only() {
        let mut node: Node<8> = Node::new_leaf_root(Location::new(0, 0), item(5));
        let cmp = I64Comparator;
        assert!(node.try_insert(&cmp, Item::new(Key::from_i64(5), Location::new(9, 9))));
        assert_eq!(node.item_count(), 1);
        assert_eq!(node.item(0).value_loc, Location::new(9, 9));
    }

    #[test]
    fn full_node_refuses_new_key_but_accepts_update() {
        let cmp = I64Comparator;
        let mut node: Node<2> = Node::new_leaf_root(Location::new(0, 0), item(1));
        assert!(node.try_insert(&cmp, item(2)));
        assert!(!node.try_insert(&cmp, item(3)));
        assert!(node.try_insert(&cmp, Item::new(Key::from_i64(1), Location::new(1, 1))));
    }

    #[test]
    fn split_moves_upper_half_out() {
        let cmp = I64Comparator;
        let mut node: Node<4> = Node::new_leaf_root(Location::new(0, 0), item(1));
        for k in [2, 3, 4] {
            assert!(node.try_insert(&cmp, item(k)));
        }
        let upper = node.split_off_upper_half();
        let mut right: Node<4> = Node::new_empty(Location::new(0, 1), node.mode());
        right.adopt_items(upper);
        let left_keys: Vec<i64> = node.items().iter().map(|it| it.key.to_i64()).collect();
        let right_keys: Vec<i64> = right.items().iter().map(|it| it.key.to_i64()).collect();
        assert_eq!(left_keys, vec![1, 2]);
        assert_eq!(right_keys, vec![3, 4]);
    }
}
