use crate::prover::ProofRequest;
use crate::wallet::Wallet;
use crate::Result;
use accumulator::Tree;
use notes::{nullifier, nullifier_message, tx_binding_digest, Note, NoteSealer, SealedNote};
use primitives::CryptoHash;
use tracing::debug;

/// A fully assembled transfer, ready to prove.
#[derive(Debug, Clone)]
pub struct BuiltTransfer {
    pub request: ProofRequest,
    /// Off-proof encrypted outputs, positionally matching the output notes
    pub sealed_outputs: Vec<SealedNote>,
    pub recipient_note: Note,
    pub change_note: Option<Note>,
    /// Tree positions of the inputs this transfer consumes
    pub spent_indices: Vec<u64>,
}

/// Assembles proof requests from wallet UTXO state.
pub struct TransactionBuilder<'a> {
    sealer: &'a dyn NoteSealer,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(sealer: &'a dyn NoteSealer) -> Self {
        Self { sealer }
    }

    /// Build a transfer of `amount` from `sender` to `recipient_pubkey`.
    ///
    /// Selects a covering input subset, creates the recipient output plus a
    /// change output when the selection overshoots, authorizes every input
    /// (nullifier signature over the input's commitment, binding signature
    /// over `nullifier || outputs`) and captures the inclusion paths plus
    /// the `old_root`/frontier snapshot from `tree`.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`](crate::Error::Validation) when the sender
    /// cannot cover `amount`;
    /// [`Error::Accumulator`](crate::Error::Accumulator) when a claimed
    /// input position is absent from `tree`.
    pub fn build(
        &self,
        sender: &Wallet,
        recipient_pubkey: [u8; 32],
        amount: u64,
        tree: &Tree,
    ) -> Result<BuiltTransfer> {
        let inputs = sender.select_inputs(amount)?;
        let selected: u64 = inputs.iter().map(|utxo| utxo.amount()).sum();
        let change = selected - amount;

        let recipient_note = Note::with_fresh_blinding(amount, recipient_pubkey);
        let change_note =
            (change > 0).then(|| Note::with_fresh_blinding(change, sender.pubkey()));

        let mut output_notes = vec![recipient_note.clone()];
        output_notes.extend(change_note.clone());
        let output_commitments: Vec<CryptoHash> =
            output_notes.iter().map(Note::commitment).collect();

        let mut input_notes = Vec::with_capacity(inputs.len());
        let mut nullifier_signatures = Vec::with_capacity(inputs.len());
        let mut tx_signatures = Vec::with_capacity(inputs.len());
        let mut input_indices = Vec::with_capacity(inputs.len());
        let mut input_proofs = Vec::with_capacity(inputs.len());

        for utxo in &inputs {
            let commitment = utxo.commitment();

            let nullifier_signature = sender.sign(&nullifier_message(&commitment));

            // Bind the authorized spend to this exact output set, so outputs
            // cannot be substituted after signing
            let binding = tx_binding_digest(&nullifier(&nullifier_signature), &output_commitments);
            tx_signatures.push(sender.sign(&binding));

            input_proofs.push(tree.path(utxo.index)?);
            input_indices.push(utxo.index);
            nullifier_signatures.push(nullifier_signature);
            input_notes.push(utxo.note.clone());
        }

        let request = ProofRequest {
            input_notes,
            output_notes,
            nullifier_signatures,
            tx_signatures,
            input_indices,
            input_proofs,
            old_root: tree.root(),
            frontier: tree.frontier(),
        };
        request.validate()?;

        let mut sealed_outputs = vec![self.sealer.seal(&recipient_note, recipient_pubkey)];
        if let Some(change_note) = &change_note {
            sealed_outputs.push(self.sealer.seal(change_note, sender.pubkey()));
        }

        debug!(
            sender = %sender.address().prefix(),
            amount,
            inputs = inputs.len(),
            change,
            "built transfer"
        );

        Ok(BuiltTransfer {
            request,
            sealed_outputs,
            recipient_note,
            change_note,
            spent_indices: inputs.iter().map(|utxo| utxo.index).collect(),
        })
    }
}
