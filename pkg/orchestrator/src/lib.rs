//! Proof orchestration for a shielded UTXO ledger.
//!
//! This crate drives many concurrent confidential transfers over a
//! dependency graph, serializing their proof computation against a shared,
//! monotonically-growing commitment accumulator:
//!
//! - [`ProofJobQueue`]: bounded-concurrency FIFO serialization of external
//!   proof computation, behind the [`Prover`] capability.
//! - [`TransactionBuilder`]: assembles a [`ProofRequest`] from wallet UTXO
//!   state — input selection, change, authorization and binding signatures,
//!   inclusion paths.
//! - [`SecurityVerifier`]: rejects forged or misindexed inputs before any
//!   proof computation, by replaying the ledger's commitment log.
//! - [`TopologyScheduler`]: drives transfer edges through
//!   build → prove → submit → confirm, mutating the accumulator and wallet
//!   state as a single writer.
//! - [`BalanceVerifier`]: cross-checks tracked balances against UTXO sets,
//!   per edge and at the end of a run.

mod balance;
mod builder;
mod config;
mod error;
mod metrics;
pub mod prover;
mod queue;
mod scheduler;
mod security;
mod topology;
mod wallet;

pub use balance::{BalanceReport, BalanceVerifier, Violation, ViolationClass, WalletBalance};
pub use builder::{BuiltTransfer, TransactionBuilder};
pub use config::{LedgerMode, OrchestratorConfig, VerifyMode};
pub use error::{Error, Result, SecurityViolation};
pub use metrics::{MetricEvent, MetricsSink, QueueDepthPoller, TracingSink};
pub use prover::{
    LocalProver, ProofRequest, ProofResponse, Prover, ProverEvent, ProverHandle, ProverStage,
    ProverStatus, SubprocessProver,
};
pub use queue::{JobError, JobId, JobStage, JobStatus, ProofJobQueue, QueueDepth};
pub use scheduler::{EdgeOutcome, RunReport, TopologyScheduler};
pub use security::SecurityVerifier;
pub use topology::{Edge, EdgeId, EdgeState, Topology};
pub use wallet::Wallet;
