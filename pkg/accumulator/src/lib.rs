//! # Accumulator
//!
//! An append-only commitment [`Tree`]: a fixed-depth binary Merkle tree over
//! Keccak-256, the local realization of the ledger's global commitment set.
//!
//! Leaves are 32-byte note commitments, addressed by insertion index.
//! Indices strictly increase and are never reused, so a leaf's position is a
//! stable public fact about it.
//!
//! ```rust
//! # use accumulator::*;
//! # use primitives::CryptoHash;
//! let mut tree = Tree::new();
//!
//! let index = tree.insert(CryptoHash::new([1u8; 32])).unwrap();
//! assert_eq!(index, 0);
//!
//! let path = tree.path(index).unwrap();
//! assert!(path.proves(CryptoHash::new([1u8; 32]), tree.root()));
//! ```
//!
//! ## Incremental maintenance
//!
//! Rather than rehashing the whole tree per insert, the tree keeps a
//! [`Frontier`]: for every level, the hash of the left sibling subtree along
//! the current insertion path. Inserting and recomputing the root are both
//! `O(depth)`. The frontier is a value type on purpose — it is the exact
//! `O(depth)` witness an external prover needs to recompute the pre-state
//! root and derive the post-insertion root inside a proof request.
//!
//! ## Proof stability
//!
//! A [`Path`] for leaf `i` verifies against the root at the moment it was
//! generated, and regenerating a path for `i` after any number of later
//! insertions verifies against the then-current root. Growth never
//! invalidates a leaf's position.
//!
//! Hashing is `keccak256(left || right)`, byte-compatible with the on-chain
//! verifier's `abi.encodePacked` hashing.

mod frontier;
mod hash;
mod tree;

pub use frontier::Frontier;
pub use hash::{hash_pair, EMPTY_ROOTS};
pub use tree::{Error, Path, Tree};

/// Depth of the commitment tree: up to `2^32` leaves.
pub const TREE_DEPTH: usize = 32;
