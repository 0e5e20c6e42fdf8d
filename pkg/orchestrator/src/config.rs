use crate::{Error, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which accumulator the engine runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerMode {
    /// Locally-simulated ledger and tree
    Local,
    /// Canonical on-chain ledger, mirrored via commitment-log sync
    OnChain,
}

/// Whether claimed inputs are checked against the ledger's commitment log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyMode {
    /// Replay the commitment log and require exact backing for every input
    Enforce,
    /// Skip input verification. Only valid against a local simulation;
    /// configuration load rejects this mode for an on-chain ledger
    TrustLocal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Proof jobs executing at once. The default of 1 fully serializes proof
    /// computation: every request embeds an `old_root` snapshot, and running
    /// two root-dependent proofs concurrently risks building on state the
    /// other is about to advance
    pub max_concurrent_jobs: usize,

    /// Edges mid-flight at once; independent of the job-level bound
    pub max_concurrent_edges: usize,

    /// Scheduler main-loop poll interval, in milliseconds
    pub poll_interval_ms: u64,

    /// Queue-depth metrics poll interval, in milliseconds
    pub metrics_interval_ms: u64,

    /// Caller-side patience per proof job, in seconds. The owning edge fails
    /// once exceeded; the external computation itself is never cancelled
    pub proof_timeout_secs: u64,

    /// How long completed job records stay pollable, in seconds
    pub job_retention_secs: u64,

    pub input_verification: VerifyMode,

    pub ledger_mode: LedgerMode,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            max_concurrent_edges: 4,
            poll_interval_ms: 500,
            metrics_interval_ms: 1_000,
            proof_timeout_secs: 600,
            job_retention_secs: 600,
            input_verification: VerifyMode::Enforce,
            ledger_mode: LedgerMode::Local,
        }
    }
}

impl OrchestratorConfig {
    /// Load from `Orchestrator.toml` (if present) and `ORCHESTRATOR_*`
    /// environment variables, over the defaults.
    pub fn load() -> Result<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("Orchestrator.toml"))
            .merge(Env::prefixed("ORCHESTRATOR_"))
            .extract()
            .map_err(|err| Error::Config(err.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(Error::Config("max_concurrent_jobs must be at least 1".into()));
        }
        if self.max_concurrent_edges == 0 {
            return Err(Error::Config("max_concurrent_edges must be at least 1".into()));
        }

        // The bypass must never be reachable against a real ledger
        if self.input_verification == VerifyMode::TrustLocal
            && self.ledger_mode == LedgerMode::OnChain
        {
            return Err(Error::Config(
                "input_verification = trust_local is only valid with ledger_mode = local".into(),
            ));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }

    pub fn proof_timeout(&self) -> Duration {
        Duration::from_secs(self.proof_timeout_secs)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }
}
