//! Shared fixtures for engine tests: funded wallets over a simulated
//! ledger, a recording metrics sink, tracing init.

use ledger::SimLedger;
use notes::{Note, SimSealer, Utxo};
use orchestrator::{
    LocalProver, MetricEvent, MetricsSink, OrchestratorConfig, Prover, Topology,
    TopologyScheduler, Wallet,
};
use parking_lot::Mutex;
use std::sync::{Arc, Once};

/// Initialize test logging once; `RUST_LOG` controls the filter.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Seed a wallet with a deposited note of `amount` and return its index.
pub fn fund_wallet(ledger: &SimLedger, wallet: &mut Wallet, amount: u64) -> eyre::Result<u64> {
    let note = Note::with_fresh_blinding(amount, wallet.pubkey());
    let index = ledger.mint(note.commitment())?;
    wallet.receive(Utxo::new(note, index));
    Ok(index)
}

/// A wallet funded with a single note of `amount`.
pub fn funded_wallet(ledger: &SimLedger, amount: u64) -> eyre::Result<Wallet> {
    let mut wallet = Wallet::random();
    fund_wallet(ledger, &mut wallet, amount)?;
    Ok(wallet)
}

/// Metrics sink that records every event for later assertions.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<MetricEvent>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().clone()
    }
}

impl MetricsSink for MemorySink {
    fn record(&self, event: MetricEvent) {
        self.events.lock().push(event);
    }
}

/// A scheduler over the simulated ledger and in-process prover.
pub async fn sim_scheduler(
    config: OrchestratorConfig,
    ledger: SimLedger,
    wallets: Vec<Wallet>,
    topology: Topology,
    sink: Arc<dyn MetricsSink>,
) -> orchestrator::Result<TopologyScheduler> {
    sim_scheduler_with_prover(
        config,
        ledger,
        Arc::new(LocalProver::new()),
        wallets,
        topology,
        sink,
    )
    .await
}

/// Same, with a custom prover (e.g. one with artificial stage delays).
pub async fn sim_scheduler_with_prover(
    config: OrchestratorConfig,
    ledger: SimLedger,
    prover: Arc<dyn Prover>,
    wallets: Vec<Wallet>,
    topology: Topology,
    sink: Arc<dyn MetricsSink>,
) -> orchestrator::Result<TopologyScheduler> {
    TopologyScheduler::new(
        config,
        Arc::new(ledger),
        prover,
        Arc::new(SimSealer),
        sink,
        wallets,
        topology,
    )
    .await
}
