use super::{Error, Tree};
use crate::{hash::hash_pair, hash::EMPTY_ROOTS, TREE_DEPTH};
use borsh::{BorshDeserialize, BorshSerialize};
use primitives::CryptoHash;
use serde::{Deserialize, Serialize};

/// An inclusion path for the leaf at `index`.
///
/// Exactly [`TREE_DEPTH`] siblings, deepest first, so the shape is fixed for
/// the proving circuit regardless of how full the tree is.
///
/// Paths are stable: generating a path for a leaf after later insertions
/// yields a path that verifies against the then-current root — growth never
/// invalidates a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[serde(rename_all = "camelCase")]
pub struct Path {
    pub index: u64,
    pub siblings: Vec<CryptoHash>,
}

impl Path {
    pub fn new(index: u64, siblings: Vec<CryptoHash>) -> Self {
        Self { index, siblings }
    }

    /// Fold the leaf up the tree with this path's siblings.
    #[must_use]
    pub fn compute_root(&self, leaf: CryptoHash) -> CryptoHash {
        let mut current = leaf;
        let mut position = self.index;

        for sibling in &self.siblings {
            current = if position % 2 == 0 {
                hash_pair(current, *sibling)
            } else {
                hash_pair(*sibling, current)
            };
            position /= 2;
        }

        current
    }

    /// Whether this path proves `leaf` is present under `root`.
    #[must_use]
    pub fn proves(&self, leaf: CryptoHash, root: CryptoHash) -> bool {
        self.siblings.len() == TREE_DEPTH && self.compute_root(leaf) == root
    }
}

impl Tree {
    /// Generate the inclusion path for the leaf at `index`.
    ///
    /// `O(n)` per level in the current implementation; the engine only calls
    /// this for the handful of inputs per transfer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfBounds`] for an unoccupied index.
    pub fn path(&self, index: u64) -> Result<Path, Error> {
        let len = self.leaf_count();
        if index >= len {
            return Err(Error::IndexOutOfBounds { index, len });
        }

        let mut siblings = Vec::with_capacity(TREE_DEPTH);
        let mut level_nodes = self.leaves().to_vec();
        let mut position = index as usize;

        for level in 0..TREE_DEPTH {
            let sibling_index = if position % 2 == 0 {
                position + 1
            } else {
                position - 1
            };

            let sibling = level_nodes
                .get(sibling_index)
                .copied()
                .unwrap_or(EMPTY_ROOTS[level]);
            siblings.push(sibling);

            // Collapse to the next level up
            level_nodes = level_nodes
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(*left, *right),
                    [left] => hash_pair(*left, EMPTY_ROOTS[level]),
                    _ => unreachable!(),
                })
                .collect();
            position /= 2;
        }

        Ok(Path::new(index, siblings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tree_with(n: u8) -> Tree {
        let mut tree = Tree::new();
        for i in 0..n {
            tree.insert(CryptoHash::new([i + 1; 32])).unwrap();
        }
        tree
    }

    #[test]
    fn paths_verify_for_every_leaf() {
        let tree = tree_with(7);
        let root = tree.root();

        for index in 0..7u64 {
            let path = tree.path(index).unwrap();
            let leaf = tree.leaf(index).unwrap();
            assert!(path.proves(leaf, root), "leaf {index}");
        }
    }

    #[test]
    fn path_has_fixed_depth() {
        let tree = tree_with(1);
        let path = tree.path(0).unwrap();
        assert_eq!(path.siblings.len(), TREE_DEPTH);
    }

    #[test]
    fn wrong_leaf_fails() {
        let tree = tree_with(2);
        let path = tree.path(0).unwrap();
        assert!(!path.proves(CryptoHash::new([99; 32]), tree.root()));
    }

    #[test]
    fn forged_siblings_fail() {
        let tree = tree_with(2);
        let leaf = tree.leaf(0).unwrap();

        let forged = Path::new(0, vec![CryptoHash::zero(); TREE_DEPTH]);
        assert!(!forged.proves(leaf, tree.root()));
    }

    #[test]
    fn corrupted_sibling_fails() {
        let tree = tree_with(4);
        let leaf = tree.leaf(1).unwrap();
        let mut path = tree.path(1).unwrap();

        assert!(path.proves(leaf, tree.root()));
        path.siblings[0].0[0] ^= 0x01;
        assert!(!path.proves(leaf, tree.root()));
    }

    #[test]
    fn wrong_index_fails() {
        let tree = tree_with(2);
        let leaf = tree.leaf(0).unwrap();
        let mut path = tree.path(0).unwrap();

        path.index = 1;
        assert!(!path.proves(leaf, tree.root()));
    }

    #[test]
    fn out_of_bounds_is_an_error() {
        let tree = Tree::new();
        assert_eq!(
            tree.path(0),
            Err(Error::IndexOutOfBounds { index: 0, len: 0 })
        );
    }

    proptest! {
        /// A path generated at insertion time stays valid when regenerated
        /// after any number of later insertions, and the original still
        /// verifies against the root captured at generation time.
        #[test]
        fn paths_are_stable_under_growth(extra in 1usize..24) {
            let mut tree = Tree::new();
            let leaf = CryptoHash::new([0xab; 32]);
            let index = tree.insert(leaf).unwrap();

            let early_path = tree.path(index).unwrap();
            let early_root = tree.root();
            prop_assert!(early_path.proves(leaf, early_root));

            for i in 0..extra {
                tree.insert(CryptoHash::new([i as u8 + 1; 32])).unwrap();
            }

            // the old path still matches the root it was generated under
            prop_assert!(early_path.proves(leaf, early_root));

            // a fresh path for the same position matches the current root
            let late_path = tree.path(index).unwrap();
            prop_assert_eq!(late_path.index, index);
            prop_assert!(late_path.proves(leaf, tree.root()));
        }
    }
}
