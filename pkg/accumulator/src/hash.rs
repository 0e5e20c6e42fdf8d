use crate::TREE_DEPTH;
use primitives::CryptoHash;
use sha3::{Digest, Keccak256};

lazy_static::lazy_static! {
    /// Root hashes of all-empty subtrees, one per level.
    ///
    /// `EMPTY_ROOTS[0]` is the empty leaf, `EMPTY_ROOTS[i]` is
    /// `hash_pair(EMPTY_ROOTS[i-1], EMPTY_ROOTS[i-1])`, and
    /// `EMPTY_ROOTS[TREE_DEPTH]` is the root of an empty tree.
    pub static ref EMPTY_ROOTS: [CryptoHash; TREE_DEPTH + 1] = {
        let mut roots = [CryptoHash::zero(); TREE_DEPTH + 1];
        for i in 1..=TREE_DEPTH {
            roots[i] = hash_pair(roots[i - 1], roots[i - 1]);
        }
        roots
    };
}

/// Hash two sibling nodes: `keccak256(left || right)`.
///
/// Matches the verifier contract's `keccak256(abi.encodePacked(left, right))`.
pub fn hash_pair(left: CryptoHash, right: CryptoHash) -> CryptoHash {
    let mut hasher = Keccak256::new();
    hasher.update(left.inner());
    hasher.update(right.inner());
    CryptoHash::new(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_roots_chain() {
        assert_eq!(EMPTY_ROOTS[0], CryptoHash::zero());
        for i in 1..=TREE_DEPTH {
            assert_eq!(EMPTY_ROOTS[i], hash_pair(EMPTY_ROOTS[i - 1], EMPTY_ROOTS[i - 1]));
        }
    }

    #[test]
    fn hash_pair_is_order_dependent() {
        let left = CryptoHash::new([0x11; 32]);
        let right = CryptoHash::new([0x22; 32]);

        assert_ne!(hash_pair(left, right), hash_pair(right, left));
        assert_eq!(hash_pair(left, right), hash_pair(left, right));
    }

    /// `keccak256(0x00 * 64)`, checkable with `cast keccak`.
    #[test]
    fn keccak_matches_evm_packed_encoding() {
        let zeros = hash_pair(CryptoHash::zero(), CryptoHash::zero());
        assert_eq!(
            zeros.to_hex(),
            "ad3228b676f7d3cd4284a5443f17f1962b36e491b30a40b2405849e597ba5fb5"
        );
    }
}
