#![doc = include_str!("../README.md")]

/// Append-only, block-based storage for nodes and value payloads.
pub mod arena;
/// The user-supplied key ordering, plus the null-key wrapping around it.
pub mod comparator;
/// The fixed-width key and the key/value-location item stored inside a node.
pub mod item;
/// The `(block_id, offset)` reference every inter-node link is made of.
pub mod location;
/// The node type shared by leaves and internal nodes.
pub mod node;
/// The B+tree itself: `insert`, `find`, `keys`, `print`.
pub mod tree;

pub use comparator::{Comparator, F64Comparator, I64Comparator};
pub use item::{Item, Key, KEY_SIZE};
pub use location::Location;
pub use tree::{BTree, Config};

/// A [`BTree`] at the crate's default `DEGREE` (64), for callers who don't need to tune it.
pub type DefaultBTree<C> = BTree<C, 64>;
