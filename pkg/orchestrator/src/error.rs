use crate::queue::JobId;
use primitives::CryptoHash;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or inconsistent request, rejected before anything is
    /// enqueued
    #[error("invalid request: {0}")]
    Validation(String),

    /// Forged or misindexed input, rejected before any proof computation
    #[error(transparent)]
    Security(#[from] SecurityViolation),

    /// The external proof computation terminated unsuccessfully
    #[error("prover failed: {reason}")]
    Prover {
        reason: String,
        /// Bounded tail of the prover's diagnostic output
        diagnostic_tail: Vec<String>,
    },

    /// The ledger rejected a submission
    #[error("ledger rejected submission: {0}")]
    Relayer(ledger::Error),

    #[error("unknown job: {0}")]
    QueueLookup(JobId),

    #[error("proof job for edge {edge} exceeded the {seconds}s proof timeout")]
    Timeout { edge: usize, seconds: u64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("ledger error")]
    Ledger(#[from] ledger::Error),

    #[error("accumulator error")]
    Accumulator(#[from] accumulator::Error),
}

/// A claimed input that the canonical ledger does not back.
///
/// Raised before any proof computation: a proof generated over fabricated or
/// misindexed inputs is indistinguishable from a legitimate one, so these
/// must never reach the queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityViolation {
    /// The commitment does not appear in the ledger's emission log at all —
    /// accepting it would allow minting value out of nothing
    #[error("input commitment {commitment} has no ledger backing")]
    UnknownCommitment { commitment: CryptoHash },

    /// The commitment exists but not at the claimed position — accepting it
    /// would corrupt witnesses and open a double-spend path
    #[error(
        "input commitment {commitment} is recorded at index {recorded}, claimed index {claimed}"
    )]
    IndexMismatch {
        commitment: CryptoHash,
        recorded: u64,
        claimed: u64,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
