use crate::Note;
use borsh::{BorshDeserialize, BorshSerialize};
use primitives::CryptoHash;
use serde::{Deserialize, Serialize};

/// A note held by a wallet, together with the position its commitment
/// occupies in the global accumulator.
///
/// Indices are assigned in insertion order, are globally unique and are never
/// reused; the index is the claim a spend proof is checked against.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct Utxo {
    pub note: Note,
    pub index: u64,
}

impl Utxo {
    pub fn new(note: Note, index: u64) -> Self {
        Self { note, index }
    }

    pub fn amount(&self) -> u64 {
        self.note.amount
    }

    pub fn commitment(&self) -> CryptoHash {
        self.note.commitment()
    }
}
