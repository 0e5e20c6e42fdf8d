//! The canonical ledger, seen from the engine's side.
//!
//! Everything the orchestration engine needs from the chain fits behind the
//! [`Ledger`] capability: the current accumulator root, the ordered
//! commitment-emission log, nullifier spend status, and transaction
//! submission. Two realizations share the contract:
//!
//! - [`SimLedger`]: an in-process ledger that enforces the verifier rules
//!   (root match, unused nullifiers, consistent post-root) without a chain.
//! - [`PoolContract`]: the deployed shielded-pool contract over JSON-RPC.
//!
//! [`ShadowTree`] mirrors the on-chain accumulator locally by replaying the
//! commitment log, refusing to proceed when the recomputed root does not
//! match the ledger-reported one.

mod client;
mod contract;
mod error;
mod outputs;
mod shadow;
mod sim;
pub mod util;

pub use client::Client;
pub use contract::PoolContract;
pub use error::{Error, Result};
pub use outputs::PublicOutputs;
pub use shadow::ShadowTree;
pub use sim::SimLedger;

use async_trait::async_trait;
use notes::SealedNote;
use primitives::CryptoHash;
use serde::{Deserialize, Serialize};

/// One entry of the ledger's commitment-emission log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentEntry {
    pub commitment: CryptoHash,
    pub index: u64,
}

/// A fully-assembled shielded transaction, ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    /// Off-proof encrypted outputs, one per output note
    pub sealed_outputs: Vec<SealedNote>,
    /// Opaque proof artifact
    #[serde(with = "hex::serde")]
    pub proof: Vec<u8>,
    /// Raw public values, exactly as committed by the prover; the verifier
    /// decodes these itself, re-encoding would break proof binding
    #[serde(with = "hex::serde")]
    pub public_values: Vec<u8>,
}

/// What the engine requires of the canonical ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// The ledger's current accumulator root.
    async fn current_root(&self) -> Result<CryptoHash>;

    /// Replay the full commitment-emission log, from the deployment point to
    /// latest, in emission order.
    async fn commitment_log(&self) -> Result<Vec<CommitmentEntry>>;

    async fn is_nullifier_spent(&self, nullifier: &CryptoHash) -> Result<bool>;

    /// Submit a transaction; returns its hash on acceptance.
    async fn submit_transaction(&self, tx: TransactionPayload) -> Result<CryptoHash>;
}
