use super::{Error, Tree};
use primitives::CryptoHash;

impl Tree {
    /// Append a leaf at the next free index and return that index.
    ///
    /// Recomputes the path to the root incrementally, `O(depth)` hashes.
    ///
    /// ```rust
    /// # use accumulator::*;
    /// # use primitives::CryptoHash;
    /// let mut tree = Tree::new();
    ///
    /// assert_eq!(tree.insert(CryptoHash::new([1; 32])).unwrap(), 0);
    /// assert_eq!(tree.insert(CryptoHash::new([2; 32])).unwrap(), 1);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::TreeFull`] once all `2^TREE_DEPTH` slots are taken.
    pub fn insert(&mut self, leaf: CryptoHash) -> Result<u64, Error> {
        let index = self.frontier.append(leaf)?;
        self.leaves.push(leaf);
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_strictly_increase() {
        let mut tree = Tree::new();

        let a = tree.insert(CryptoHash::new([1; 32])).unwrap();
        let b = tree.insert(CryptoHash::new([2; 32])).unwrap();
        let c = tree.insert(CryptoHash::new([1; 32])).unwrap();

        assert_eq!((a, b, c), (0, 1, 2));
    }

    #[test]
    fn duplicate_leaves_are_distinct_positions() {
        // Commitments are unique in practice (fresh blinding), but the tree
        // itself is position-addressed and must not deduplicate
        let mut tree = Tree::new();
        let leaf = CryptoHash::new([7; 32]);

        tree.insert(leaf).unwrap();
        let root_one = tree.root();
        tree.insert(leaf).unwrap();

        assert_ne!(tree.root(), root_one);
        assert_eq!(tree.leaf_count(), 2);
    }
}
