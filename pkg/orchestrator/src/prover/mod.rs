//! The proving capability.
//!
//! The actual proof system is an external collaborator: the engine hands a
//! [`ProofRequest`] to a [`Prover`] and polls the returned handle until a
//! terminal [`ProverStatus`]. How the computation happens — a subprocess, a
//! proving network, an in-process simulation — is hidden behind the trait.

mod local;
mod subprocess;

pub use local::LocalProver;
pub use subprocess::SubprocessProver;

use crate::{Error, Result};
use accumulator::{Frontier, Path, TREE_DEPTH};
use async_trait::async_trait;
use ledger::PublicOutputs;
use notes::Note;
use primitives::{CryptoHash, Signature};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Everything the external circuit needs to prove one transfer.
///
/// This is the prover wire format: camelCase JSON with hex byte strings.
/// The arrays are positionally aligned — signature `i`, index `i` and proof
/// `i` all belong to input note `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProofRequest {
    /// Input notes being spent (full note data)
    pub input_notes: Vec<Note>,
    /// Output notes being created
    pub output_notes: Vec<Note>,
    /// Per-input authorization signatures; the nullifiers derive from these
    pub nullifier_signatures: Vec<Signature>,
    /// Per-input signatures binding the authorized spend to the output set
    pub tx_signatures: Vec<Signature>,
    /// Claimed tree positions of the input notes
    pub input_indices: Vec<u64>,
    /// Inclusion paths for the input notes
    pub input_proofs: Vec<Path>,
    /// Accumulator root the paths were generated against
    pub old_root: CryptoHash,
    /// Insertion frontier at `old_root`; lets the prover derive the
    /// post-insertion root it commits as `new_root`
    pub frontier: Frontier,
}

impl ProofRequest {
    /// Structural validation, run before a request may enter the queue.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] naming the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::Validation(msg));

        if self.input_notes.is_empty() && self.output_notes.is_empty() {
            return invalid("transaction has no inputs and no outputs".into());
        }

        let inputs = self.input_notes.len();
        for (name, len) in [
            ("nullifierSignatures", self.nullifier_signatures.len()),
            ("txSignatures", self.tx_signatures.len()),
            ("inputIndices", self.input_indices.len()),
            ("inputProofs", self.input_proofs.len()),
        ] {
            if len != inputs {
                return invalid(format!("{name} has {len} entries for {inputs} input notes"));
            }
        }

        for (i, (proof, index)) in self.input_proofs.iter().zip(&self.input_indices).enumerate() {
            if proof.index != *index {
                return invalid(format!(
                    "inputProofs[{i}] is for index {}, inputIndices[{i}] claims {index}",
                    proof.index
                ));
            }
            if proof.siblings.len() != TREE_DEPTH {
                return invalid(format!(
                    "inputProofs[{i}] has {} siblings, expected {TREE_DEPTH}",
                    proof.siblings.len()
                ));
            }
        }

        let input_total: u64 = self.input_notes.iter().map(|note| note.amount).sum();
        let output_total: u64 = self.output_notes.iter().map(|note| note.amount).sum();
        if output_total > input_total {
            return invalid(format!(
                "outputs ({output_total}) exceed inputs ({input_total})"
            ));
        }

        Ok(())
    }

    pub fn output_commitments(&self) -> Vec<CryptoHash> {
        self.output_notes.iter().map(Note::commitment).collect()
    }
}

/// Reporting stages of an in-flight proof computation.
///
/// Stage signals are advisory progress information only; correctness never
/// depends on them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ProverStage {
    Preparing,
    Computing,
    Proving,
    Submitting,
}

/// Terminal result of a successful proof computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofResponse {
    /// Opaque proof artifact
    #[serde(with = "hex::serde")]
    pub proof: Vec<u8>,
    /// Raw public values, exactly as committed — the ledger verifier decodes
    /// these bytes, so they are never re-encoded
    #[serde(with = "hex::serde")]
    pub public_values: Vec<u8>,
    /// Decoded form of `public_values`
    pub public_outputs: PublicOutputs,
    pub vkey_hash: CryptoHash,
}

/// One event on a prover's structured progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ProverEvent {
    Stage {
        stage: ProverStage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress: Option<f32>,
    },
    Complete {
        response: Box<ProofResponse>,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        reason: String,
        #[serde(default)]
        diagnostic_tail: Vec<String>,
    },
}

/// Snapshot of one submitted computation.
#[derive(Debug, Clone, PartialEq)]
pub enum ProverStatus {
    Running {
        stage: ProverStage,
        /// Best-effort completion estimate in `0.0..=1.0`
        progress: f32,
    },
    Complete(Box<ProofResponse>),
    Failed {
        reason: String,
        diagnostic_tail: Vec<String>,
    },
}

/// Opaque reference to a submitted computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProverHandle(uuid::Uuid);

impl ProverHandle {
    fn fresh() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Display for ProverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External proof computation, behind a submit/poll capability.
#[async_trait]
pub trait Prover: Send + Sync {
    /// Start a computation. Returns immediately.
    async fn submit(&self, request: ProofRequest) -> Result<ProverHandle>;

    /// Snapshot the computation's progress or terminal result.
    async fn poll(&self, handle: &ProverHandle) -> Result<ProverStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_request() -> ProofRequest {
        ProofRequest {
            input_notes: vec![],
            output_notes: vec![Note::new(5, [1; 32], [2; 32])],
            nullifier_signatures: vec![],
            tx_signatures: vec![],
            input_indices: vec![],
            input_proofs: vec![],
            old_root: CryptoHash::zero(),
            frontier: Frontier::new(),
        }
    }

    #[test]
    fn empty_transaction_rejected() {
        let mut request = minimal_request();
        request.output_notes.clear();
        assert!(matches!(request.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn mismatched_signature_count_rejected() {
        let mut request = minimal_request();
        request.input_notes.push(Note::new(10, [1; 32], [3; 32]));
        request.input_indices.push(0);

        let err = request.validate().unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err}");
    }

    #[test]
    fn value_inflation_rejected() {
        let mut request = minimal_request();
        request.output_notes[0].amount = u64::MAX;

        let err = request.validate().unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err}");
    }

    #[test]
    fn event_stream_wire_format() {
        let event: ProverEvent =
            serde_json::from_str(r#"{"event":"stage","stage":"computing","progress":0.25}"#)
                .unwrap();
        assert_eq!(
            event,
            ProverEvent::Stage {
                stage: ProverStage::Computing,
                progress: Some(0.25)
            }
        );

        let failed: ProverEvent =
            serde_json::from_str(r#"{"event":"failed","reason":"nonzero-exit:1"}"#).unwrap();
        assert!(matches!(failed, ProverEvent::Failed { .. }));
    }

    #[test]
    fn request_wire_format_is_camel_case() {
        let request = minimal_request();
        let json = serde_json::to_value(&request).unwrap();

        assert!(json.get("inputNotes").is_some());
        assert!(json.get("oldRoot").is_some());
        assert!(json.get("frontier").is_some());
        assert!(json.get("input_notes").is_none());
    }
}
