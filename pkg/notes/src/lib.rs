//! Confidential value records and their commitment scheme.
//!
//! A [`Note`] is the private payload of a shielded UTXO: an amount, the
//! owner's (x-only) public key, and a random blinding factor. Only the note's
//! [`commit`]ment ever reaches the ledger; the blinding makes equal
//! amount/owner pairs indistinguishable.
//!
//! Spending is marked with a [`nullifier`]: a digest of the authorization
//! signature over the commitment. Observers can tell "some note was spent"
//! without being able to link the nullifier back to its commitment.
//!
//! The byte layouts in this crate are a wire contract shared with the
//! external proving circuit and the on-chain verifier. Changing a domain tag
//! or field order here silently breaks proof binding, so the golden vectors
//! in the tests must never be regenerated without coordinating all three
//! components.

mod note;
mod sealed;
mod utxo;

pub use note::{
    commit, nullifier, nullifier_message, tx_binding_digest, Note, NOTE_COMMITMENT_DOMAIN,
    NULLIFIER_DOMAIN, TX_BINDING_DOMAIN,
};
pub use sealed::{NoteSealer, SealedNote, SimSealer};
pub use utxo::Utxo;
