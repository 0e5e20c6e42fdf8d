use crate::config::VerifyMode;
use crate::error::SecurityViolation;
use crate::Result;
use ledger::Ledger;
use notes::{commit, Note};
use primitives::CryptoHash;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Gates every transfer before it may enter the proof queue.
///
/// Two attacks are closed here. Fabricated inputs — notes with no ledger
/// backing — would otherwise let a prover mint value out of nothing, since a
/// proof over a fabricated input is indistinguishable from a legitimate one.
/// Misindexed inputs — real commitments claimed at the wrong position —
/// corrupt witnesses and open a double-spend path.
///
/// The check recomputes each input's commitment and compares it against the
/// authoritative commitment→index map, rebuilt by replaying the ledger's
/// emission log from its deployment point.
pub struct SecurityVerifier {
    ledger: Arc<dyn Ledger>,
    mode: VerifyMode,
}

impl SecurityVerifier {
    pub fn new(ledger: Arc<dyn Ledger>, mode: VerifyMode) -> Self {
        Self { ledger, mode }
    }

    /// Verify that every input note exists on the ledger at exactly its
    /// claimed index.
    ///
    /// # Errors
    ///
    /// A fatal [`SecurityViolation`] for the first unbacked or misindexed
    /// input; ledger errors pass through.
    pub async fn verify(&self, input_notes: &[Note], claimed_indices: &[u64]) -> Result<()> {
        if self.mode == VerifyMode::TrustLocal {
            warn!("input verification bypassed (local simulation only)");
            return Ok(());
        }

        let authoritative: HashMap<CryptoHash, u64> = self
            .ledger
            .commitment_log()
            .await?
            .into_iter()
            .map(|entry| (entry.commitment, entry.index))
            .collect();

        for (note, claimed) in input_notes.iter().zip(claimed_indices) {
            let commitment = commit(note);

            let recorded = *authoritative.get(&commitment).ok_or(
                SecurityViolation::UnknownCommitment { commitment },
            )?;

            if recorded != *claimed {
                return Err(SecurityViolation::IndexMismatch {
                    commitment,
                    recorded,
                    claimed: *claimed,
                }
                .into());
            }
        }

        debug!(inputs = input_notes.len(), "inputs verified against commitment log");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use ledger::SimLedger;
    use notes::Note;

    fn backed_note(ledger: &SimLedger, amount: u64) -> (Note, u64) {
        let note = Note::with_fresh_blinding(amount, [1; 32]);
        let index = ledger.mint(note.commitment()).unwrap();
        (note, index)
    }

    #[tokio::test]
    async fn accepts_backed_inputs_at_correct_indices() {
        let ledger = SimLedger::new();
        let (a, idx_a) = backed_note(&ledger, 10);
        let (b, idx_b) = backed_note(&ledger, 20);

        let verifier = SecurityVerifier::new(Arc::new(ledger), VerifyMode::Enforce);
        verifier.verify(&[a, b], &[idx_a, idx_b]).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_unbacked_input() {
        let ledger = SimLedger::new();
        backed_note(&ledger, 10);

        let forged = Note::with_fresh_blinding(1_000_000, [1; 32]);
        let verifier = SecurityVerifier::new(Arc::new(ledger), VerifyMode::Enforce);

        let err = verifier.verify(&[forged], &[0]).await.unwrap_err();
        assert!(
            matches!(err, Error::Security(SecurityViolation::UnknownCommitment { .. })),
            "{err}"
        );
    }

    #[tokio::test]
    async fn rejects_misindexed_input() {
        let ledger = SimLedger::new();
        let (note, index) = backed_note(&ledger, 10);
        backed_note(&ledger, 20);

        let verifier = SecurityVerifier::new(Arc::new(ledger), VerifyMode::Enforce);

        let err = verifier.verify(&[note], &[index + 1]).await.unwrap_err();
        let Error::Security(SecurityViolation::IndexMismatch { recorded, claimed, .. }) = err
        else {
            panic!("expected index mismatch, got {err}");
        };
        assert_eq!(recorded, index);
        assert_eq!(claimed, index + 1);
    }

    #[tokio::test]
    async fn bypass_skips_the_ledger() {
        let ledger = SimLedger::new();
        let forged = Note::with_fresh_blinding(1_000_000, [1; 32]);

        let verifier = SecurityVerifier::new(Arc::new(ledger), VerifyMode::TrustLocal);
        verifier.verify(&[forged], &[0]).await.unwrap();
    }
}
