use crate::balance::{BalanceReport, BalanceVerifier, Violation};
use crate::builder::{BuiltTransfer, TransactionBuilder};
use crate::config::{LedgerMode, OrchestratorConfig};
use crate::metrics::{MetricEvent, MetricsSink, QueueDepthPoller};
use crate::prover::{ProofResponse, Prover};
use crate::queue::{JobId, ProofJobQueue, QueueDepth};
use crate::security::SecurityVerifier;
use crate::topology::{Edge, EdgeId, EdgeState, Topology};
use crate::wallet::Wallet;
use crate::{Error, Result};
use accumulator::Tree;
use chrono::{DateTime, Utc};
use ledger::{Ledger, ShadowTree, TransactionPayload};
use notes::{NoteSealer, SealedNote, Note, Utxo};
use parking_lot::Mutex;
use primitives::worker::PollWorker;
use primitives::{Address, CryptoHash};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a confirmed edge needs beyond the proof response.
struct PendingTransfer {
    sealed_outputs: Vec<SealedNote>,
    recipient_note: Note,
    change_note: Option<Note>,
    spent_indices: Vec<u64>,
}

/// The scheduler's single-writer state: the accumulator, every wallet's
/// UTXO set and the edge graph are mutated only behind this lock, and only
/// from the scheduler's own loop. Edge proving runs concurrently; state
/// mutation does not.
struct SchedulerState {
    wallets: HashMap<Address, Wallet>,
    tree: Tree,
    topology: Topology,
    pending: HashMap<EdgeId, PendingTransfer>,
    violations: Vec<Violation>,
    soft_warnings: Vec<String>,
}

/// Final account of one edge.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeOutcome {
    pub id: EdgeId,
    pub from: Address,
    pub to: Address,
    pub amount: u64,
    pub state: EdgeState,
    pub job: Option<JobId>,
    pub tx_hash: Option<CryptoHash>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub proof_completed_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<&Edge> for EdgeOutcome {
    fn from(edge: &Edge) -> Self {
        Self {
            id: edge.id,
            from: edge.from,
            to: edge.to,
            amount: edge.amount,
            state: edge.state,
            job: edge.job,
            tx_hash: edge.tx_hash,
            error: edge.error.clone(),
            started_at: edge.started_at,
            proof_completed_at: edge.proof_completed_at,
            ended_at: edge.ended_at,
        }
    }
}

/// End-of-run summary: edge outcomes, recorded diagnostics and the final
/// balance check.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub edges: Vec<EdgeOutcome>,
    pub violations: Vec<Violation>,
    /// Soft-consistency findings that did not alter any edge outcome
    pub soft_warnings: Vec<String>,
    pub balances: BalanceReport,
}

impl RunReport {
    pub fn all_confirmed(&self) -> bool {
        self.edges
            .iter()
            .all(|edge| edge.state == EdgeState::Confirmed)
    }

    pub fn confirmed(&self) -> usize {
        self.edges
            .iter()
            .filter(|edge| edge.state == EdgeState::Confirmed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.edges
            .iter()
            .filter(|edge| edge.state == EdgeState::Failed)
            .count()
    }

    pub fn edge(&self, id: EdgeId) -> Option<&EdgeOutcome> {
        self.edges.iter().find(|edge| edge.id == id)
    }
}

/// Drives a dependency graph of transfer edges through
/// build → prove → submit → confirm against a shared accumulator.
///
/// Main loop, repeated until every edge is terminal: start ready edges
/// (dependencies confirmed) within the edge-level budget, poll proving
/// edges, sleep a fixed interval. The edge budget is independent of the
/// proof queue's own bound — edges beyond the queue's concurrency simply
/// wait in line.
///
/// Root-dependent requests are not serialized by the queue; they are
/// serialized here, implicitly, through topology dependencies: a dependent
/// edge builds only after its dependency has confirmed and advanced the
/// tree.
pub struct TopologyScheduler {
    config: OrchestratorConfig,
    ledger: Arc<dyn Ledger>,
    queue: ProofJobQueue,
    security: SecurityVerifier,
    sealer: Arc<dyn NoteSealer>,
    sink: Arc<dyn MetricsSink>,
    state: Mutex<SchedulerState>,
}

impl TopologyScheduler {
    /// Validate the configuration and topology, sync the local tree from
    /// the ledger (refusing to start on root divergence) and stand up the
    /// proof queue.
    pub async fn new(
        config: OrchestratorConfig,
        ledger: Arc<dyn Ledger>,
        prover: Arc<dyn Prover>,
        sealer: Arc<dyn NoteSealer>,
        sink: Arc<dyn MetricsSink>,
        wallets: Vec<Wallet>,
        topology: Topology,
    ) -> Result<Self> {
        config.validate()?;
        topology.validate()?;

        let wallets: HashMap<Address, Wallet> = wallets
            .into_iter()
            .map(|wallet| (wallet.address(), wallet))
            .collect();

        for edge in topology.edges() {
            for address in [edge.from, edge.to] {
                if !wallets.contains_key(&address) {
                    return Err(Error::Validation(format!(
                        "edge {} references unknown wallet {}",
                        edge.id,
                        address.prefix()
                    )));
                }
            }
        }

        let tree = ShadowTree::sync(ledger.as_ref()).await?.into_tree();
        info!(
            leaves = tree.leaf_count(),
            root = %tree.root().prefix(),
            edges = topology.edges().len(),
            "scheduler initialized"
        );

        let queue = ProofJobQueue::new(prover, config.max_concurrent_jobs, config.job_retention());
        let security = SecurityVerifier::new(Arc::clone(&ledger), config.input_verification);

        Ok(Self {
            config,
            ledger,
            queue,
            security,
            sealer,
            sink,
            state: Mutex::new(SchedulerState {
                wallets,
                tree,
                topology,
                pending: HashMap::new(),
                violations: Vec::new(),
                soft_warnings: Vec::new(),
            }),
        })
    }

    /// Drive every edge to a terminal state and report.
    ///
    /// # Errors
    ///
    /// A [`SecurityViolation`](crate::SecurityViolation) aborts the run
    /// before the offending request reaches the queue. Prover and relayer
    /// failures do NOT abort — they fail the owning edge only.
    pub async fn run(&self) -> Result<RunReport> {
        // Queue metrics on their own timer; stopped when this guard drops
        let metrics_worker = PollWorker::spawn(
            QueueDepthPoller::new(self.queue.clone(), Arc::clone(&self.sink)),
            self.config.metrics_interval(),
        );

        loop {
            self.start_ready_edges().await?;
            self.poll_proving_edges().await;

            if self.state.lock().topology.is_complete() {
                break;
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }

        metrics_worker.stop();
        Ok(self.build_report())
    }

    /// Aggregate queue occupancy.
    pub fn queue_depth(&self) -> QueueDepth {
        self.queue.queue_depth()
    }

    /// The scheduler's current view of the accumulator root.
    pub fn current_root(&self) -> CryptoHash {
        self.state.lock().tree.root()
    }

    pub fn wallet(&self, address: Address) -> Option<Wallet> {
        self.state.lock().wallets.get(&address).cloned()
    }

    /// Start ready edges, up to the edge-level concurrency budget.
    async fn start_ready_edges(&self) -> Result<()> {
        let candidates: Vec<EdgeId> = {
            let state = self.state.lock();
            let budget = self
                .config
                .max_concurrent_edges
                .saturating_sub(state.topology.in_flight());
            state.topology.ready_edges().into_iter().take(budget).collect()
        };

        for id in candidates {
            let built = {
                let state = self.state.lock();
                let Some(edge) = state.topology.edge(id) else {
                    continue;
                };
                let (Some(sender), Some(recipient)) =
                    (state.wallets.get(&edge.from), state.wallets.get(&edge.to))
                else {
                    continue;
                };

                TransactionBuilder::new(self.sealer.as_ref()).build(
                    sender,
                    recipient.pubkey(),
                    edge.amount,
                    &state.tree,
                )
            };

            let built = match built {
                Ok(built) => built,
                Err(err) => {
                    self.fail_edge(id, err.to_string());
                    continue;
                }
            };

            // Fatal gate: nothing with unbacked or misindexed inputs may
            // reach the queue
            self.security
                .verify(&built.request.input_notes, &built.request.input_indices)
                .await?;

            let BuiltTransfer {
                request,
                sealed_outputs,
                recipient_note,
                change_note,
                spent_indices,
            } = built;

            match self.queue.submit(request) {
                Ok((job, queue_position)) => {
                    {
                        let mut state = self.state.lock();
                        state.pending.insert(
                            id,
                            PendingTransfer {
                                sealed_outputs,
                                recipient_note,
                                change_note,
                                spent_indices,
                            },
                        );
                        if let Some(edge) = state.topology.edge_mut(id) {
                            edge.transition(EdgeState::Proving)?;
                            edge.job = Some(job);
                            edge.queue_position = Some(queue_position);
                            edge.started_at = Some(Utc::now());
                        }
                    }

                    debug!(edge = %id, %job, queue_position, "edge proving");
                    self.sink.record(MetricEvent::EdgeSubmitted {
                        edge: id,
                        job,
                        queue_position,
                    });
                }
                Err(err) => self.fail_edge(id, err.to_string()),
            }
        }

        Ok(())
    }

    /// Poll every proving edge's job; confirmed proofs go straight to the
    /// ledger.
    async fn poll_proving_edges(&self) {
        let proving: Vec<(EdgeId, JobId, Option<DateTime<Utc>>)> = {
            let state = self.state.lock();
            state
                .topology
                .edges()
                .iter()
                .filter(|edge| edge.state == EdgeState::Proving)
                .filter_map(|edge| edge.job.map(|job| (edge.id, job, edge.started_at)))
                .collect()
        };

        for (id, job, started_at) in proving {
            let status = match self.queue.status(job) {
                Ok(status) => status,
                Err(err) => {
                    self.fail_edge(id, err.to_string());
                    continue;
                }
            };

            if let Some(response) = status.response {
                let now = Utc::now();
                {
                    let mut state = self.state.lock();
                    if let Some(edge) = state.topology.edge_mut(id) {
                        if edge.transition(EdgeState::Submitted).is_err() {
                            continue;
                        }
                        edge.proof_completed_at = Some(now);
                    }
                }

                let elapsed_ms = started_at
                    .map(|start| (now - start).num_milliseconds().max(0) as u64)
                    .unwrap_or(0);
                self.sink.record(MetricEvent::EdgeProofCompleted {
                    edge: id,
                    elapsed_ms,
                });

                self.submit_to_ledger(id, *response).await;
            } else if let Some(error) = status.error {
                let prover_error = Error::Prover {
                    reason: error.reason,
                    diagnostic_tail: error.diagnostic_tail,
                };
                self.fail_edge(id, prover_error.to_string());
            } else if let Some(started) = started_at {
                let timeout = self.config.proof_timeout();
                if (Utc::now() - started).to_std().unwrap_or_default() > timeout {
                    // Caller-side enforcement only: the edge fails, the
                    // external computation runs on to its own terminal state
                    let timeout_error = Error::Timeout {
                        edge: id.0,
                        seconds: self.config.proof_timeout_secs,
                    };
                    self.fail_edge(id, timeout_error.to_string());
                }
            }
        }
    }

    /// Build the ledger payload for a proven edge and submit it.
    async fn submit_to_ledger(&self, id: EdgeId, response: ProofResponse) {
        let sealed_outputs = {
            let state = self.state.lock();
            match state.pending.get(&id) {
                Some(pending) => pending.sealed_outputs.clone(),
                None => {
                    drop(state);
                    self.fail_edge(id, format!("no pending transfer for edge {id}"));
                    return;
                }
            }
        };

        let payload = TransactionPayload {
            sealed_outputs,
            proof: response.proof.clone(),
            public_values: response.public_values.clone(),
        };

        match self.ledger.submit_transaction(payload).await {
            Ok(tx_hash) => self.apply_confirmation(id, &response, tx_hash),
            Err(err) => self.fail_edge(id, Error::Relayer(err).to_string()),
        }
    }

    /// Apply a confirmed edge's state updates: spend inputs, insert outputs
    /// at fresh indices, advance the root, cross-check balances.
    ///
    /// This is the only place tree and wallet state change, and it runs
    /// under the state lock — at most one in-flight mutation at a time.
    fn apply_confirmation(&self, id: EdgeId, response: &ProofResponse, tx_hash: CryptoHash) {
        let mut state = self.state.lock();

        let Some(pending) = state.pending.remove(&id) else {
            drop(state);
            self.fail_edge(id, format!("no pending transfer for edge {id}"));
            return;
        };
        let Some(edge) = state.topology.edge(id) else {
            return;
        };
        let (from, to, amount) = (edge.from, edge.to, edge.amount);

        if let Some(sender) = state.wallets.get_mut(&from) {
            sender.mark_spent(&pending.spent_indices);
            sender.debit(amount);
        }

        // Outputs enter the tree in the order the builder (and so the
        // proof) emitted them: recipient first, then change
        let recipient_index = match state.tree.insert(pending.recipient_note.commitment()) {
            Ok(index) => index,
            Err(err) => {
                drop(state);
                self.fail_edge(id, err.to_string());
                return;
            }
        };
        if let Some(receiver) = state.wallets.get_mut(&to) {
            receiver.receive(Utxo::new(pending.recipient_note.clone(), recipient_index));
        }

        if let Some(change_note) = &pending.change_note {
            let change_index = match state.tree.insert(change_note.commitment()) {
                Ok(index) => index,
                Err(err) => {
                    drop(state);
                    self.fail_edge(id, err.to_string());
                    return;
                }
            };
            if let Some(sender) = state.wallets.get_mut(&from) {
                // The balance was already debited by the transfer amount;
                // change only re-enters the UTXO set
                sender.receive_untracked(Utxo::new(change_note.clone(), change_index));
            }
        }

        // The local root advanced by insertion; the proof reported where it
        // should have landed
        let local_root = state.tree.root();
        let reported_root = response.public_outputs.new_root;
        if self.config.ledger_mode == LedgerMode::OnChain && local_root != reported_root {
            let warning = format!(
                "edge {id}: shadow root {} diverges from proof-reported root {} after update",
                local_root.prefix(),
                reported_root.prefix()
            );
            warn!("{warning}");
            state.soft_warnings.push(warning);
        }

        if let (Some(sender), Some(receiver)) =
            (state.wallets.get(&from), state.wallets.get(&to))
        {
            let violations = BalanceVerifier::check_edge(sender, receiver, amount);
            state.violations.extend(violations);
        }

        if let Some(edge) = state.topology.edge_mut(id) {
            if edge.transition(EdgeState::Confirmed).is_ok() {
                edge.tx_hash = Some(tx_hash);
                edge.ended_at = Some(Utc::now());
            }
        }
        drop(state);

        info!(edge = %id, tx = %tx_hash.prefix(), "edge confirmed");
        self.sink.record(MetricEvent::EdgeConfirmed { edge: id, tx_hash });
    }

    fn fail_edge(&self, id: EdgeId, reason: String) {
        {
            let mut state = self.state.lock();
            state.pending.remove(&id);
            if let Some(edge) = state.topology.edge_mut(id) {
                if edge.transition(EdgeState::Failed).is_ok() {
                    edge.error = Some(reason.clone());
                    edge.ended_at = Some(Utc::now());
                }
            }
        }

        warn!(edge = %id, %reason, "edge failed");
        self.sink.record(MetricEvent::EdgeFailed { edge: id, reason });
    }

    fn build_report(&self) -> RunReport {
        let state = self.state.lock();
        RunReport {
            edges: state.topology.edges().iter().map(EdgeOutcome::from).collect(),
            violations: state.violations.clone(),
            soft_warnings: state.soft_warnings.clone(),
            balances: BalanceVerifier::final_report(state.wallets.values()),
        }
    }
}
