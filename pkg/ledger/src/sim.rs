use crate::{
    CommitmentEntry, Error, Ledger, PublicOutputs, Result, TransactionPayload,
};
use accumulator::Tree;
use async_trait::async_trait;
use parking_lot::Mutex;
use primitives::CryptoHash;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// An in-process canonical ledger.
///
/// Enforces the same rules the deployed verifier contract does — the
/// submitted `old_root` must be the current root, nullifiers are single-use,
/// and the proof-reported `new_root` must equal the root after appending the
/// output commitments — without verifying the proof artifact itself.
#[derive(Clone, Default)]
pub struct SimLedger {
    inner: Arc<Mutex<SimLedgerInner>>,
}

#[derive(Default)]
struct SimLedgerInner {
    tree: Tree,
    log: Vec<CommitmentEntry>,
    nullifiers: HashSet<CryptoHash>,
    transactions: Vec<(CryptoHash, TransactionPayload)>,
}

impl SimLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a commitment directly, outside any transfer, and return its
    /// index. This is the deposit path: how wallets get funded before the
    /// first shielded transfer.
    pub fn mint(&self, commitment: CryptoHash) -> Result<u64> {
        let mut inner = self.inner.lock();
        let index = inner.tree.insert(commitment)?;
        inner.log.push(CommitmentEntry { commitment, index });

        debug!(commitment = %commitment.prefix(), index, "minted commitment");
        Ok(index)
    }

    /// Number of leaves in the canonical tree.
    pub fn leaf_count(&self) -> u64 {
        self.inner.lock().tree.leaf_count()
    }

    /// Number of accepted transactions.
    pub fn transaction_count(&self) -> usize {
        self.inner.lock().transactions.len()
    }

    fn reject<T>(reason: impl Into<String>) -> Result<T> {
        Err(Error::Rejected {
            reason: reason.into(),
        })
    }
}

#[async_trait]
impl Ledger for SimLedger {
    async fn current_root(&self) -> Result<CryptoHash> {
        Ok(self.inner.lock().tree.root())
    }

    async fn commitment_log(&self) -> Result<Vec<CommitmentEntry>> {
        Ok(self.inner.lock().log.clone())
    }

    async fn is_nullifier_spent(&self, nullifier: &CryptoHash) -> Result<bool> {
        Ok(self.inner.lock().nullifiers.contains(nullifier))
    }

    async fn submit_transaction(&self, tx: TransactionPayload) -> Result<CryptoHash> {
        let outputs = PublicOutputs::decode(&tx.public_values)?;

        let mut inner = self.inner.lock();

        if outputs.old_root != inner.tree.root() {
            return Self::reject(format!(
                "stale old root {} (current {})",
                outputs.old_root.prefix(),
                inner.tree.root().prefix()
            ));
        }

        for nullifier in &outputs.nullifiers {
            if inner.nullifiers.contains(nullifier) {
                return Self::reject(format!("nullifier {} already spent", nullifier.prefix()));
            }
        }

        // Check the reported new root before touching canonical state
        let mut staged = inner.tree.clone();
        for commitment in &outputs.output_commitments {
            staged.insert(*commitment)?;
        }
        if staged.root() != outputs.new_root {
            return Self::reject(format!(
                "reported new root {} does not match recomputed root {}",
                outputs.new_root.prefix(),
                staged.root().prefix()
            ));
        }

        let first_index = inner.tree.leaf_count();
        inner.tree = staged;
        for (offset, commitment) in outputs.output_commitments.iter().enumerate() {
            inner.log.push(CommitmentEntry {
                commitment: *commitment,
                index: first_index + offset as u64,
            });
        }
        inner.nullifiers.extend(outputs.nullifiers.iter().copied());

        let mut preimage = tx.proof.clone();
        preimage.extend_from_slice(&tx.public_values);
        let tx_hash = CryptoHash::from_vec_hash(preimage);
        inner.transactions.push((tx_hash, tx));

        debug!(
            tx = %tx_hash.prefix(),
            outputs = outputs.output_commitments.len(),
            nullifiers = outputs.nullifiers.len(),
            "accepted transaction"
        );
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(outputs: &PublicOutputs) -> TransactionPayload {
        TransactionPayload {
            sealed_outputs: vec![],
            proof: vec![0xde, 0xad],
            public_values: outputs.encode().unwrap(),
        }
    }

    #[tokio::test]
    async fn accepts_consistent_transaction() {
        let ledger = SimLedger::new();
        ledger.mint(CryptoHash::new([1; 32])).unwrap();

        let old_root = ledger.current_root().await.unwrap();
        let mut staged = Tree::new();
        staged.insert(CryptoHash::new([1; 32])).unwrap();
        staged.insert(CryptoHash::new([2; 32])).unwrap();

        let outputs = PublicOutputs {
            old_root,
            new_root: staged.root(),
            nullifiers: vec![CryptoHash::new([9; 32])],
            output_commitments: vec![CryptoHash::new([2; 32])],
        };

        ledger.submit_transaction(payload(&outputs)).await.unwrap();

        assert_eq!(ledger.leaf_count(), 2);
        assert_eq!(ledger.current_root().await.unwrap(), staged.root());
        assert!(ledger
            .is_nullifier_spent(&CryptoHash::new([9; 32]))
            .await
            .unwrap());

        let log = ledger.commitment_log().await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].index, 1);
    }

    #[tokio::test]
    async fn rejects_stale_root() {
        let ledger = SimLedger::new();
        ledger.mint(CryptoHash::new([1; 32])).unwrap();

        let outputs = PublicOutputs {
            old_root: CryptoHash::new([0xbd; 32]),
            new_root: CryptoHash::new([0xbe; 32]),
            nullifiers: vec![],
            output_commitments: vec![],
        };

        let err = ledger.submit_transaction(payload(&outputs)).await.unwrap_err();
        assert!(matches!(err, Error::Rejected { .. }), "{err}");
        assert_eq!(ledger.transaction_count(), 0);
    }

    #[tokio::test]
    async fn rejects_double_spend() {
        let ledger = SimLedger::new();
        let nullifier = CryptoHash::new([7; 32]);

        let first = PublicOutputs {
            old_root: ledger.current_root().await.unwrap(),
            new_root: ledger.current_root().await.unwrap(),
            nullifiers: vec![nullifier],
            output_commitments: vec![],
        };
        ledger.submit_transaction(payload(&first)).await.unwrap();

        let second = PublicOutputs {
            old_root: ledger.current_root().await.unwrap(),
            new_root: ledger.current_root().await.unwrap(),
            nullifiers: vec![nullifier],
            output_commitments: vec![],
        };
        let err = ledger.submit_transaction(payload(&second)).await.unwrap_err();
        assert!(matches!(err, Error::Rejected { .. }), "{err}");
    }

    #[tokio::test]
    async fn rejects_wrong_new_root() {
        let ledger = SimLedger::new();

        let outputs = PublicOutputs {
            old_root: ledger.current_root().await.unwrap(),
            new_root: CryptoHash::new([0xef; 32]),
            nullifiers: vec![],
            output_commitments: vec![CryptoHash::new([2; 32])],
        };

        let err = ledger.submit_transaction(payload(&outputs)).await.unwrap_err();
        assert!(matches!(err, Error::Rejected { .. }), "{err}");
        assert_eq!(ledger.leaf_count(), 0);
    }
}
