use agora_core::{hash_blake3, hash_pair, Hash};
use serde::{Deserialize, Serialize};

/// Deepest tree accepted by `validate`, enough for 2^32 shards
const MAX_DEPTH: usize = 32;

/// Inclusion proof for one shard
///
/// Both vectors hold one entry per tree level, leaf first. A `None` sibling
/// marks a level where the node was the odd one out and was promoted
/// unchanged; its index bit is always `false`. A `true` bit means the node
/// is the right child at that level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePath {
    pub siblings: Vec<Option<Hash>>,
    pub index_bits: Vec<bool>,
}

/// Binary hash tree over erasure-coded shards
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// `levels[0]` holds the leaf hashes, the last level holds the root
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    pub fn build<T: AsRef<[u8]>>(shards: &[T]) -> Self {
        let leaves: Vec<Hash> = shards.iter().map(|s| hash_blake3(s.as_ref())).collect();
        let mut levels = vec![leaves];

        while levels[levels.len() - 1].len() > 1 {
            let next_level: Vec<Hash> = levels[levels.len() - 1]
                .chunks(2)
                .map(|chunk| match chunk {
                    [left, right] => hash_pair(left, right),
                    // Odd number: promote the last node as is
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next_level);
        }

        MerkleTree { levels }
    }

    /// Root hash, or `Hash::ZERO` for a tree without leaves
    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(Hash::ZERO)
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Root bound to the payload length, as carried in requests
    pub fn commitment(&self, content_length: u64) -> Hash {
        commit(&self.root(), content_length)
    }

    /// Proof for the shard at `index`
    ///
    /// Looked up by position rather than content, since identical shards
    /// (all-zero padding, for instance) would otherwise share one slot.
    pub fn path(&self, index: usize) -> Option<MerklePath> {
        if index >= self.leaf_count() {
            return None;
        }

        let depth = self.levels.len() - 1;
        let mut siblings = Vec::with_capacity(depth);
        let mut index_bits = Vec::with_capacity(depth);
        let mut position = index;

        for level in &self.levels[..depth] {
            siblings.push(level.get(position ^ 1).copied());
            index_bits.push(position & 1 == 1);
            position /= 2;
        }

        Some(MerklePath {
            siblings,
            index_bits,
        })
    }
}

/// Check that `shard` is leaf `order_of_leaf(path)` of a `leaf_count` tree
/// rooted at `root`
pub fn validate(shard: &[u8], root: &Hash, path: &MerklePath, leaf_count: usize) -> bool {
    root_from_path(shard, path, leaf_count).is_some_and(|computed| computed == *root)
}

/// Fold `path` up from `shard`, accepting only the exact shape of a
/// `leaf_count` tree
///
/// The path length must equal the tree depth and a sibling may be absent
/// only where the node is the odd one out. Otherwise the concatenation of
/// two interior hashes could pose as a leaf one level up.
pub fn root_from_path(shard: &[u8], path: &MerklePath, leaf_count: usize) -> Option<Hash> {
    let depth = tree_depth(leaf_count)?;
    if path.siblings.len() != depth || path.index_bits.len() != depth {
        return None;
    }
    let index = order_of_leaf(&path.index_bits);
    if index >= leaf_count {
        return None;
    }

    let mut current = hash_blake3(shard);
    let mut position = index;
    let mut width = leaf_count;
    for (sibling, is_right) in path.siblings.iter().zip(&path.index_bits) {
        let has_sibling = (position ^ 1) < width;
        current = match (sibling, is_right) {
            (Some(_), _) if !has_sibling => return None,
            (Some(sibling), true) => hash_pair(sibling, &current),
            (Some(sibling), false) => hash_pair(&current, sibling),
            (None, false) if !has_sibling => current,
            (None, _) => return None,
        };
        position /= 2;
        width = width.div_ceil(2);
    }

    Some(current)
}

/// Commitment to a shard tree and the length of the payload it encodes
///
/// Binding the length means every member that validates a shard agrees on
/// how much padding to strip.
pub fn commit(tree_root: &Hash, content_length: u64) -> Hash {
    hash_pair(tree_root, &hash_blake3(&content_length.to_le_bytes()))
}

/// Levels above the leaves, `None` for an empty or oversized tree
fn tree_depth(leaf_count: usize) -> Option<usize> {
    if leaf_count == 0 {
        return None;
    }
    let depth = leaf_count.next_power_of_two().trailing_zeros() as usize;
    (depth <= MAX_DEPTH).then_some(depth)
}

/// Shard position encoded by a proof's index bits
pub fn order_of_leaf(index_bits: &[bool]) -> usize {
    index_bits
        .iter()
        .enumerate()
        .filter(|(_, bit)| **bit)
        .map(|(level, _)| 1usize.checked_shl(level as u32).unwrap_or(0))
        .sum()
}
