use super::{
    ProofRequest, ProofResponse, Prover, ProverHandle, ProverStage, ProverStatus,
};
use crate::{Error, Result};
use async_trait::async_trait;
use ledger::PublicOutputs;
use notes::{commit, nullifier, nullifier_message};
use parking_lot::Mutex;
use primitives::CryptoHash;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Deterministic in-process prover.
///
/// Performs the same checks the external circuit enforces — frontier/root
/// consistency, per-input inclusion, input ownership, value conservation —
/// and derives the public outputs directly instead of proving them. Used by
/// the local simulation mode and by tests; the artifact it emits is a digest
/// of the request, not a real proof.
pub struct LocalProver {
    vkey_hash: CryptoHash,
    /// Artificial delay per reported stage, to exercise queue behavior
    stage_delay: Duration,
    jobs: Mutex<HashMap<ProverHandle, Arc<Mutex<ProverStatus>>>>,
}

impl Default for LocalProver {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalProver {
    pub fn new() -> Self {
        Self {
            vkey_hash: CryptoHash::from_vec_hash(b"local-prover-vkey".to_vec()),
            stage_delay: Duration::ZERO,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_stage_delay(mut self, delay: Duration) -> Self {
        self.stage_delay = delay;
        self
    }

    /// The circuit's checks, minus the proving.
    fn execute(request: &ProofRequest, vkey_hash: CryptoHash) -> Result<ProofResponse, String> {
        if request.frontier.root() != request.old_root {
            return Err(format!(
                "frontier root {} does not reproduce old root {}",
                request.frontier.root().prefix(),
                request.old_root.prefix()
            ));
        }

        let mut nullifiers = Vec::with_capacity(request.input_notes.len());
        for (i, note) in request.input_notes.iter().enumerate() {
            let commitment = commit(note);

            // Inclusion under the claimed position
            let proof = &request.input_proofs[i];
            if !proof.proves(commitment, request.old_root) {
                return Err(format!(
                    "input {i}: commitment {} is not in the tree at old root",
                    commitment.prefix()
                ));
            }

            // Ownership: the authorization signature must recover the note's
            // owner key
            let signature = &request.nullifier_signatures[i];
            let recovered = signature.recover_pubkey_x(&nullifier_message(&commitment));
            if recovered != Some(note.owner_pubkey) {
                return Err(format!("input {i}: authorization signature does not match owner"));
            }

            nullifiers.push(nullifier(signature));
        }

        let input_total: u64 = request.input_notes.iter().map(|note| note.amount).sum();
        let output_total: u64 = request.output_notes.iter().map(|note| note.amount).sum();
        if output_total > input_total {
            return Err(format!(
                "value conservation violated: {output_total} out of {input_total}"
            ));
        }

        let output_commitments = request.output_commitments();

        let mut frontier = request.frontier.clone();
        for commitment in &output_commitments {
            frontier
                .append(*commitment)
                .map_err(|err| format!("appending outputs: {err}"))?;
        }

        let public_outputs = PublicOutputs {
            old_root: request.old_root,
            new_root: frontier.root(),
            nullifiers,
            output_commitments,
        };
        let public_values = public_outputs
            .encode()
            .map_err(|err| format!("encoding public values: {err}"))?;

        Ok(ProofResponse {
            // Stands in for the proof artifact; deterministic per request
            proof: CryptoHash::from_vec_hash(public_values.clone()).to_vec(),
            public_values,
            public_outputs,
            vkey_hash,
        })
    }
}

#[async_trait]
impl Prover for LocalProver {
    async fn submit(&self, request: ProofRequest) -> Result<ProverHandle> {
        let handle = ProverHandle::fresh();
        let status = Arc::new(Mutex::new(ProverStatus::Running {
            stage: ProverStage::Preparing,
            progress: 0.0,
        }));
        self.jobs.lock().insert(handle, Arc::clone(&status));

        let stage_delay = self.stage_delay;
        let vkey_hash = self.vkey_hash;
        tokio::spawn(async move {
            let stages = [
                ProverStage::Preparing,
                ProverStage::Computing,
                ProverStage::Proving,
                ProverStage::Submitting,
            ];
            for (i, stage) in stages.into_iter().enumerate() {
                *status.lock() = ProverStatus::Running {
                    stage,
                    progress: i as f32 / stages.len() as f32,
                };
                tokio::time::sleep(stage_delay).await;
            }

            let terminal = match Self::execute(&request, vkey_hash) {
                Ok(response) => ProverStatus::Complete(Box::new(response)),
                Err(reason) => {
                    debug!(%reason, "local proof computation failed");
                    // The external prover would assert and die with a
                    // nonzero exit; mirror its error surface
                    ProverStatus::Failed {
                        reason: "nonzero-exit:1".into(),
                        diagnostic_tail: vec![reason],
                    }
                }
            };
            *status.lock() = terminal;
        });

        Ok(handle)
    }

    async fn poll(&self, handle: &ProverHandle) -> Result<ProverStatus> {
        let status = self
            .jobs
            .lock()
            .get(handle)
            .cloned()
            .ok_or_else(|| Error::Validation(format!("unknown prover handle {handle}")))?;

        let status = status.lock().clone();
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accumulator::Tree;
    use notes::Note;
    use primitives::{SecpSigner, Signer};

    async fn poll_to_terminal(prover: &LocalProver, handle: &ProverHandle) -> ProverStatus {
        loop {
            match prover.poll(handle).await.unwrap() {
                ProverStatus::Running { .. } => tokio::time::sleep(Duration::from_millis(5)).await,
                terminal => return terminal,
            }
        }
    }

    fn valid_request(signer: &SecpSigner) -> (Tree, ProofRequest) {
        let input = Note::new(100, signer.public_key_x(), [7; 32]);
        let mut tree = Tree::new();
        let index = tree.insert(input.commitment()).unwrap();

        let output = Note::new(60, [9; 32], [8; 32]);
        let change = Note::new(40, signer.public_key_x(), [6; 32]);

        let nullifier_sig = signer.sign(&nullifier_message(&input.commitment()));

        let request = ProofRequest {
            input_proofs: vec![tree.path(index).unwrap()],
            input_indices: vec![index],
            tx_signatures: vec![nullifier_sig.clone()],
            nullifier_signatures: vec![nullifier_sig],
            input_notes: vec![input],
            output_notes: vec![output, change],
            old_root: tree.root(),
            frontier: tree.frontier(),
        };
        (tree, request)
    }

    #[tokio::test]
    async fn proves_valid_transfer() {
        let signer = SecpSigner::random();
        let (mut tree, request) = valid_request(&signer);
        let expected_commitments = request.output_commitments();

        let prover = LocalProver::new();
        let handle = prover.submit(request).await.unwrap();

        let ProverStatus::Complete(response) = poll_to_terminal(&prover, &handle).await else {
            panic!("expected success");
        };

        assert_eq!(response.public_outputs.output_commitments, expected_commitments);
        assert_eq!(response.public_outputs.old_root, tree.root());

        // the reported new root is the tree after appending both outputs
        for commitment in &expected_commitments {
            tree.insert(*commitment).unwrap();
        }
        assert_eq!(response.public_outputs.new_root, tree.root());

        // raw bytes decode to the same outputs
        let decoded = PublicOutputs::decode(&response.public_values).unwrap();
        assert_eq!(decoded, response.public_outputs);
    }

    #[tokio::test]
    async fn rejects_unincluded_input() {
        let signer = SecpSigner::random();
        let (_, mut request) = valid_request(&signer);

        // claim a different amount than the committed note
        request.input_notes[0].amount += 1;

        let prover = LocalProver::new();
        let handle = prover.submit(request).await.unwrap();

        let ProverStatus::Failed { reason, diagnostic_tail } =
            poll_to_terminal(&prover, &handle).await
        else {
            panic!("expected failure");
        };
        assert_eq!(reason, "nonzero-exit:1");
        assert!(diagnostic_tail[0].contains("not in the tree"), "{diagnostic_tail:?}");
    }

    #[tokio::test]
    async fn rejects_foreign_signature() {
        let signer = SecpSigner::random();
        let intruder = SecpSigner::random();
        let (_, mut request) = valid_request(&signer);

        let commitment = request.input_notes[0].commitment();
        request.nullifier_signatures[0] = intruder.sign(&nullifier_message(&commitment));

        let prover = LocalProver::new();
        let handle = prover.submit(request).await.unwrap();

        let ProverStatus::Failed { diagnostic_tail, .. } =
            poll_to_terminal(&prover, &handle).await
        else {
            panic!("expected failure");
        };
        assert!(diagnostic_tail[0].contains("does not match owner"), "{diagnostic_tail:?}");
    }

    #[tokio::test]
    async fn rejects_stale_frontier() {
        let signer = SecpSigner::random();
        let (_, mut request) = valid_request(&signer);
        request.old_root = CryptoHash::new([0xee; 32]);

        let prover = LocalProver::new();
        let handle = prover.submit(request).await.unwrap();

        let ProverStatus::Failed { diagnostic_tail, .. } =
            poll_to_terminal(&prover, &handle).await
        else {
            panic!("expected failure");
        };
        assert!(diagnostic_tail[0].contains("old root"), "{diagnostic_tail:?}");
    }
}
