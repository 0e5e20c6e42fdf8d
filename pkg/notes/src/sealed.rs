use crate::Note;
use serde::{Deserialize, Serialize};

/// An off-proof output artifact addressed to a recipient.
///
/// The ledger stores these alongside a transaction so recipients can recover
/// their new notes; nothing in the proof depends on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedNote {
    #[serde(with = "hex::serde")]
    pub recipient_pubkey: [u8; 32],
    #[serde(with = "hex::serde")]
    pub payload: Vec<u8>,
}

/// Capability for producing [`SealedNote`]s.
///
/// The encryption scheme lives outside this system; the engine only needs
/// the ability to address a payload to a recipient key.
pub trait NoteSealer: Send + Sync {
    fn seal(&self, note: &Note, recipient_pubkey: [u8; 32]) -> SealedNote;
}

/// Simulation stand-in: the payload is the borsh encoding of the note,
/// unencrypted. Never use against a real ledger.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimSealer;

impl NoteSealer for SimSealer {
    fn seal(&self, note: &Note, recipient_pubkey: [u8; 32]) -> SealedNote {
        #[allow(clippy::expect_used)]
        let payload = borsh::to_vec(note).expect("note serialization is infallible");
        SealedNote {
            recipient_pubkey,
            payload,
        }
    }
}

impl SimSealer {
    /// Recover the note from a simulation-sealed payload.
    pub fn open(sealed: &SealedNote) -> Option<Note> {
        borsh::from_slice(&sealed.payload).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_seal_round_trip() {
        let note = Note::new(42, [1; 32], [2; 32]);
        let sealed = SimSealer.seal(&note, [9; 32]);

        assert_eq!(sealed.recipient_pubkey, [9; 32]);
        assert_eq!(SimSealer::open(&sealed), Some(note));
    }
}
