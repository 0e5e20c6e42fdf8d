use borsh::{BorshDeserialize, BorshSerialize};
use primitives::{CryptoHash, Signature};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Domain separator for note commitments.
///
/// Shared bit-for-bit with the proving circuit and the ledger verifier.
pub const NOTE_COMMITMENT_DOMAIN: &[u8] = b"NOTE_COMMITMENT_v1";

/// Domain separator for nullifier derivation.
pub const NULLIFIER_DOMAIN: &[u8] = b"NULLIFIER_v1";

/// Domain separator for the transaction-binding digest.
pub const TX_BINDING_DOMAIN: &[u8] = b"TX_BINDING_v1";

/// A confidential value record.
///
/// `owner_pubkey` is the x coordinate of the owner's secp256k1 public key;
/// only the holder of the matching secret key can authorize a spend.
/// `blinding` is fresh randomness per note, so that two notes with the same
/// amount and owner still commit to different values.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub amount: u64,
    #[serde(with = "hex::serde")]
    pub owner_pubkey: [u8; 32],
    #[serde(with = "hex::serde")]
    pub blinding: [u8; 32],
}

impl Note {
    pub fn new(amount: u64, owner_pubkey: [u8; 32], blinding: [u8; 32]) -> Self {
        Self {
            amount,
            owner_pubkey,
            blinding,
        }
    }

    /// A note for `amount`/`owner` with fresh random blinding.
    pub fn with_fresh_blinding(amount: u64, owner_pubkey: [u8; 32]) -> Self {
        let blinding: [u8; 32] = rand::random();
        Self::new(amount, owner_pubkey, blinding)
    }

    pub fn commitment(&self) -> CryptoHash {
        commit(self)
    }
}

/// The hiding, binding commitment for a note.
///
/// Layout: `blake3(domain || amount as 8-byte little-endian || owner || blinding)`.
/// This exact layout is what the external circuit recomputes in-proof and
/// what the ledger stores as a leaf; any divergence here is a
/// security-critical regression, not a cosmetic one.
pub fn commit(note: &Note) -> CryptoHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(NOTE_COMMITMENT_DOMAIN);
    hasher.update(&note.amount.to_le_bytes());
    hasher.update(&note.owner_pubkey);
    hasher.update(&note.blinding);
    CryptoHash::new(*hasher.finalize().as_bytes())
}

/// Derive the spend marker from an authorization signature.
///
/// The signature covers [`nullifier_message`] of the note's commitment and is
/// deterministic (RFC 6979), so the nullifier is stable for a given note and
/// key while remaining unlinkable to the commitment for anyone without the
/// signature.
pub fn nullifier(signature: &Signature) -> CryptoHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(NULLIFIER_DOMAIN);
    hasher.update(signature.inner());
    CryptoHash::new(*hasher.finalize().as_bytes())
}

/// The digest a nullifier authorization signature covers:
/// `keccak256(commitment)`, later wrapped in the signer's personal-message
/// prefix.
pub fn nullifier_message(commitment: &CryptoHash) -> CryptoHash {
    CryptoHash::new(Keccak256::digest(commitment.inner()).into())
}

/// The digest a transaction-binding signature covers:
/// `blake3(domain || nullifier || cm_1 || cm_2 || ...)`.
///
/// Binding the authorized nullifier to the full output set prevents an
/// intermediary from swapping outputs after the owner has signed.
pub fn tx_binding_digest(nullifier: &CryptoHash, output_commitments: &[CryptoHash]) -> CryptoHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(TX_BINDING_DOMAIN);
    hasher.update(nullifier.inner());
    for commitment in output_commitments {
        hasher.update(commitment.inner());
    }
    CryptoHash::new(*hasher.finalize().as_bytes())
}
