use crate::{hash::hash_pair, hash::EMPTY_ROOTS, tree::Error, TREE_DEPTH};
use borsh::{BorshDeserialize, BorshSerialize};
use primitives::CryptoHash;
use serde::{Deserialize, Serialize};

/// The `O(depth)` insertion state of an append-only tree.
///
/// `filled[level]` is the hash of the completed left sibling subtree at that
/// level along the current insertion path. Together with `next_index` this
/// fully determines the root, and appending a leaf only touches one node per
/// level.
///
/// A frontier is deliberately a plain value: a proof request carries one so
/// the prover can check it reproduces `old_root` and then derive the
/// post-insertion root without seeing the whole tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frontier {
    filled: [CryptoHash; TREE_DEPTH],
    next_index: u64,
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontier {
    pub fn new() -> Self {
        let mut filled = [CryptoHash::zero(); TREE_DEPTH];
        for (level, slot) in filled.iter_mut().enumerate() {
            *slot = EMPTY_ROOTS[level];
        }
        Self {
            filled,
            next_index: 0,
        }
    }

    /// The index the next appended leaf will occupy.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    pub fn is_full(&self) -> bool {
        self.next_index >= 1u64 << TREE_DEPTH
    }

    /// Append a leaf, returning its index.
    pub fn append(&mut self, leaf: CryptoHash) -> Result<u64, Error> {
        if self.is_full() {
            return Err(Error::TreeFull);
        }

        let index = self.next_index;
        let mut current = leaf;
        let mut position = index;

        for level in 0..TREE_DEPTH {
            if position % 2 == 0 {
                // Left child: this node is the new frontier at this level
                self.filled[level] = current;
                current = hash_pair(current, EMPTY_ROOTS[level]);
            } else {
                // Right child: combine with the completed left sibling
                current = hash_pair(self.filled[level], current);
            }
            position /= 2;
        }

        self.next_index += 1;
        Ok(index)
    }

    /// Recompute the root from the frontier alone.
    ///
    /// Walks the insertion path of the next empty slot: at every level the
    /// left side is either a completed subtree from `filled` or all-empty.
    pub fn root(&self) -> CryptoHash {
        let mut current = EMPTY_ROOTS[0];
        let mut position = self.next_index;

        for level in 0..TREE_DEPTH {
            if position % 2 == 1 {
                current = hash_pair(self.filled[level], current);
            } else {
                current = hash_pair(current, EMPTY_ROOTS[level]);
            }
            position /= 2;
        }

        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frontier_root_is_empty_tree_root() {
        assert_eq!(Frontier::new().root(), EMPTY_ROOTS[TREE_DEPTH]);
    }

    #[test]
    fn append_assigns_sequential_indices() {
        let mut frontier = Frontier::new();
        for i in 0..10u64 {
            let index = frontier.append(CryptoHash::new([i as u8 + 1; 32])).unwrap();
            assert_eq!(index, i);
        }
        assert_eq!(frontier.next_index(), 10);
    }

    #[test]
    fn root_changes_per_append() {
        let mut frontier = Frontier::new();
        let mut last = frontier.root();

        for i in 0..8u8 {
            frontier.append(CryptoHash::new([i + 1; 32])).unwrap();
            let root = frontier.root();
            assert_ne!(root, last);
            last = root;
        }
    }

    #[test]
    fn two_leaf_root_matches_manual_hashing() {
        let a = CryptoHash::new([1; 32]);
        let b = CryptoHash::new([2; 32]);

        let mut frontier = Frontier::new();
        frontier.append(a).unwrap();
        frontier.append(b).unwrap();

        let mut expected = hash_pair(a, b);
        for level in 1..TREE_DEPTH {
            expected = hash_pair(expected, EMPTY_ROOTS[level]);
        }
        assert_eq!(frontier.root(), expected);
    }
}
