use std::mem::size_of;

use crate::node::Node;
use crate::Location;

/// Append-only, block-based storage for a tree's nodes and value payloads.
///
/// The arena never frees: every [`Location`] it hands out stays valid, and dereferencing it, for
/// the lifetime of the arena, always yields the same node or bytes. It is split into two
/// independently block-addressed regions — one typed (`Node<DEGREE>`), one raw bytes — because
/// nodes and values have unrelated shapes; both regions use the same `block_size` budget and the
/// same bump-allocation discipline described in the spec's Block Arena contract.
///
/// Each region's blocks are pre-sized `Vec`s that are never grown past their initial capacity
/// (a new block is appended instead), so a `Vec`'s backing buffer — and therefore every
/// reference handed out through it — never moves for the arena's lifetime, even though the outer
/// `Vec` of blocks may reallocate.
pub struct Arena<const DEGREE: usize> {
    nodes: NodeArena<DEGREE>,
    values: ValueArena,
}

impl<const DEGREE: usize> Arena<DEGREE> {
    pub fn new(block_size: u32) -> Self {
        let node_size = size_of::<Node<DEGREE>>();
        assert!(
            block_size as usize >= node_size,
            "block_size {} is smaller than sizeof(Node) {}",
            block_size,
            node_size
        );
        let nodes_per_block = (block_size as usize / node_size).max(1);
        Arena {
            nodes: NodeArena::new(nodes_per_block),
            values: ValueArena::new(block_size),
        }
    }

    /// Allocates a node slot and constructs the node with its own `self_loc` already known, so
    /// a freshly-built [`Node`] never has to be patched with its own address after the fact.
    #[inline]
    pub fn alloc_node_with(&mut self, build: impl FnOnce(Location) -> Node<DEGREE>) -> Location {
        self.nodes.alloc_with(build)
    }

    #[inline]
    pub fn node(&self, loc: Location) -> &Node<DEGREE> {
        assert!(!loc.is_null(), "attempted to read a node through a null location");
        self.nodes.get(loc)
    }

    #[inline]
    pub fn node_mut(&mut self, loc: Location) -> &mut Node<DEGREE> {
        assert!(!loc.is_null(), "attempted to read a node through a null location");
        self.nodes.get_mut(loc)
    }

    /// Allocates and copies `data` into the value region. Fails (aborts) when `data` cannot fit
    /// within a single block, per the spec's arena-too-small failure kind.
    #[inline]
    pub fn alloc_value(&mut self, data: &[u8]) -> Location {
        self.values.allocate(data)
    }

    #[inline]
    pub fn value(&self, loc: Location) -> &[u8] {
        assert!(!loc.is_null(), "attempted to read a value through a null location");
        self.values.get(loc)
    }
}

struct NodeArena<const DEGREE: usize> {
    blocks: Vec<Vec<Node<DEGREE>>>,
    nodes_per_block: usize,
}

impl<const DEGREE: usize> NodeArena<DEGREE> {
    fn new(nodes_per_block: usize) -> Self {
        NodeArena {
            blocks: vec![Vec::with_capacity(nodes_per_block)],
            nodes_per_block,
        }
    }

    fn alloc_with(&mut self, build: impl FnOnce(Location) -> Node<DEGREE>) -> Location {
        let mut block_id = self.blocks.len() - 1;
        if self.blocks[block_id].len() == self.nodes_per_block {
            self.blocks.push(Vec::with_capacity(self.nodes_per_block));
            block_id += 1;
        }
        let offset = self.blocks[block_id].len() as u32;
        let loc = Location::new(block_id as u32, offset);
        self.blocks[block_id].push(build(loc));
        loc
    }

    fn get(&self, loc: Location) -> &Node<DEGREE> {
        &self.blocks[loc.block_id as usize][loc.offset as usize]
    }

    fn get_mut(&mut self, loc: Location) -> &mut Node<DEGREE> {
        &mut self.blocks[loc.block_id as usize][loc.offset as usize]
    }
}

/// Length-prefixed (`u32` little-endian) byte storage: the prefix lets [`ValueArena::get`] return
/// a properly bounded `&[u8]` without the caller having to re-supply the value's length, which
/// the tree itself never stores (see spec §1: value serialization/length-tracking is the
/// caller's concern at the `insert`/`find` boundary, not the arena's).
struct ValueArena {
    blocks: Vec<Vec<u8>>,
    block_size: u32,
}

const LEN_PREFIX: usize = size_of::<u32>();

impl ValueArena {
    fn new(block_size: u32) -> Self {
        ValueArena {
            blocks: vec![Vec::with_capacity(block_size as usize)],
            block_size,
        }
    }

    fn allocate(&mut self, data: &[u8]) -> Location {
        let total = LEN_PREFIX + data.len();
        if total > self.block_size as usize {
            panic!(
                "value of {} bytes (+{} byte length prefix) exceeds block_size {}",
                data.len(),
                LEN_PREFIX,
                self.block_size
            );
        }

        let mut block_id = self.blocks.len() - 1;
        if self.block_size as usize - self.blocks[block_id].len() < total {
            self.blocks.push(Vec::with_capacity(self.block_size as usize));
            block_id += 1;
        }

        let block = &mut self.blocks[block_id];
        let offset = block.len() as u32;
        block.extend_from_slice(&(data.len() as u32).to_le_bytes());
        block.extend_from_slice(data);
        Location::new(block_id as u32, offset)
    }

    fn get(&self, loc: Location) -> &[u8] {
        let block = &self.blocks[loc.block_id as usize];
        let offset = loc.offset as usize;
        let len = u32::from_le_bytes(block[offset..offset + LEN_PREFIX].try_into().unwrap()) as usize;
        &block[offset + LEN_PREFIX..offset + LEN_PREFIX + len]
    }
}
