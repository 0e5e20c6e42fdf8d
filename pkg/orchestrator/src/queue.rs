use crate::prover::{ProofRequest, ProofResponse, Prover, ProverStage, ProverStatus};
use crate::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How often the worker re-checks for admittable jobs and expired records.
const WORKER_TICK: Duration = Duration::from_millis(100);

/// How often a running job's prover handle is polled.
const JOB_POLL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(uuid::Uuid);

impl JobId {
    fn fresh() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of one proof job.
///
/// `Queued → Preparing → Computing → Proving → Submitting → Success | Error`.
/// The middle stages mirror the prover's advisory progress events; only
/// admission and the terminal states are queue-authoritative.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStage {
    Queued,
    Preparing,
    Computing,
    Proving,
    Submitting,
    Success,
    Error,
}

impl JobStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStage::Success | JobStage::Error)
    }

    /// Whether the job occupies a concurrency slot.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            JobStage::Preparing | JobStage::Computing | JobStage::Proving | JobStage::Submitting
        )
    }
}

impl From<ProverStage> for JobStage {
    fn from(stage: ProverStage) -> Self {
        match stage {
            ProverStage::Preparing => JobStage::Preparing,
            ProverStage::Computing => JobStage::Computing,
            ProverStage::Proving => JobStage::Proving,
            ProverStage::Submitting => JobStage::Submitting,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobError {
    /// `nonzero-exit:<code>` | `parse-error:<detail>` | `process-error:<detail>`
    pub reason: String,
    pub diagnostic_tail: Vec<String>,
}

/// Poll result for one job.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub id: JobId,
    pub stage: JobStage,
    pub progress: f32,
    /// Jobs ahead of this one, while still queued
    pub queue_position: Option<usize>,
    pub response: Option<Box<ProofResponse>>,
    pub error: Option<JobError>,
}

/// Aggregate queue occupancy, for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueDepth {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
}

struct Job {
    /// Present until the job is admitted
    request: Option<ProofRequest>,
    stage: JobStage,
    progress: f32,
    outcome: Option<Result<Box<ProofResponse>, JobError>>,
    completed_at: Option<Instant>,
}

struct QueueState {
    queued: VecDeque<JobId>,
    jobs: HashMap<JobId, Job>,
    /// Jobs currently occupying a concurrency slot
    running: usize,
}

struct QueueInner {
    prover: Arc<dyn Prover>,
    state: Mutex<QueueState>,
    wakeup: Notify,
    shutdown: AtomicBool,
    max_concurrent: usize,
    retention: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// FIFO proof-job queue with a hard concurrency bound.
///
/// `submit` never blocks: it validates the request, records the job and
/// returns its id and queue position. A background worker admits up to
/// `max_concurrent` jobs at a time (default 1 — each request embeds an
/// `old_root` snapshot, and serialization keeps later jobs from proving
/// against a root an earlier one is about to advance) and drives each
/// admitted job against the [`Prover`] until terminal. Completed records are
/// evicted after the retention window; callers must poll before then.
#[derive(Clone)]
pub struct ProofJobQueue {
    inner: Arc<QueueInner>,
}

impl ProofJobQueue {
    pub fn new(prover: Arc<dyn Prover>, max_concurrent: usize, retention: Duration) -> Self {
        let inner = Arc::new(QueueInner {
            prover,
            state: Mutex::new(QueueState {
                queued: VecDeque::new(),
                jobs: HashMap::new(),
                running: 0,
            }),
            wakeup: Notify::new(),
            shutdown: AtomicBool::new(false),
            max_concurrent: max_concurrent.max(1),
            retention,
            worker: Mutex::new(None),
        });

        // The worker holds a Weak reference: it must not keep the queue
        // state alive after the last handle is gone
        let worker = tokio::spawn(worker_loop(Arc::downgrade(&inner)));
        *inner.worker.lock() = Some(worker);

        Self { inner }
    }

    /// Enqueue a request. Returns the job id and the number of jobs ahead of
    /// it, immediately.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for a structurally invalid request; nothing is
    /// recorded in that case.
    pub fn submit(&self, request: ProofRequest) -> Result<(JobId, usize)> {
        request.validate()?;

        let id = JobId::fresh();
        let position = {
            let mut state = self.inner.state.lock();
            let position = state.running + state.queued.len();

            state.jobs.insert(
                id,
                Job {
                    request: Some(request),
                    stage: JobStage::Queued,
                    progress: 0.0,
                    outcome: None,
                    completed_at: None,
                },
            );
            state.queued.push_back(id);
            position
        };

        self.inner.wakeup.notify_one();
        debug!(job = %id, position, "queued proof job");
        Ok((id, position))
    }

    /// Snapshot a job's stage and terminal payload.
    ///
    /// # Errors
    ///
    /// [`Error::QueueLookup`] for an unknown or already-evicted id.
    pub fn status(&self, id: JobId) -> Result<JobStatus> {
        let state = self.inner.state.lock();
        let job = state.jobs.get(&id).ok_or(Error::QueueLookup(id))?;

        let queue_position = match job.stage {
            JobStage::Queued => state
                .queued
                .iter()
                .position(|queued| *queued == id)
                .map(|index| state.running + index),
            _ => None,
        };

        let (response, error) = match &job.outcome {
            Some(Ok(response)) => (Some(response.clone()), None),
            Some(Err(error)) => (None, Some(error.clone())),
            None => (None, None),
        };

        Ok(JobStatus {
            id,
            stage: job.stage,
            progress: job.progress,
            queue_position,
            response,
            error,
        })
    }

    pub fn queue_depth(&self) -> QueueDepth {
        let state = self.inner.state.lock();
        QueueDepth {
            queued: state.queued.len(),
            running: state.running,
            completed: state
                .jobs
                .values()
                .filter(|job| job.stage.is_terminal())
                .count(),
        }
    }

    /// Stop the admission worker. Already-admitted jobs run to completion on
    /// their own tasks; nothing new is admitted.
    pub fn stop(&self) {
        self.inner.shutdown.store(true, Relaxed);
        self.inner.wakeup.notify_one();
        if let Some(worker) = self.inner.worker.lock().take() {
            worker.abort();
        }
    }
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }
}

async fn worker_loop(inner: std::sync::Weak<QueueInner>) {
    loop {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if inner.shutdown.load(Relaxed) {
            return;
        }

        let admitted = {
            let mut state = inner.state.lock();
            evict_expired(&mut state, inner.retention);

            let mut admitted = Vec::new();
            while state.running < inner.max_concurrent {
                let Some(id) = state.queued.pop_front() else {
                    break;
                };
                let Some(job) = state.jobs.get_mut(&id) else {
                    continue;
                };
                let Some(request) = job.request.take() else {
                    continue;
                };
                job.stage = JobStage::Preparing;
                state.running += 1;
                admitted.push((id, request));
            }
            admitted
        };

        for (id, request) in admitted {
            tokio::spawn(drive_job(Arc::clone(&inner), id, request));
        }

        tokio::select! {
            _ = tokio::time::sleep(WORKER_TICK) => {}
            _ = inner.wakeup.notified() => {}
        }
    }
}

fn evict_expired(state: &mut QueueState, retention: Duration) {
    state.jobs.retain(|id, job| {
        let expired = job
            .completed_at
            .is_some_and(|completed| completed.elapsed() >= retention);
        if expired {
            debug!(job = %id, "evicting completed job record");
        }
        !expired
    });
}

async fn drive_job(inner: Arc<QueueInner>, id: JobId, request: ProofRequest) {
    let outcome = match inner.prover.submit(request).await {
        Err(Error::Prover {
            reason,
            diagnostic_tail,
        }) => Err(JobError {
            reason,
            diagnostic_tail,
        }),
        Err(err) => Err(JobError {
            reason: format!("process-error:{err}"),
            diagnostic_tail: vec![],
        }),
        Ok(handle) => loop {
            match inner.prover.poll(&handle).await {
                Ok(ProverStatus::Running { stage, progress }) => {
                    let mut state = inner.state.lock();
                    if let Some(job) = state.jobs.get_mut(&id) {
                        job.stage = stage.into();
                        job.progress = progress;
                    }
                }
                Ok(ProverStatus::Complete(response)) => break Ok(response),
                Ok(ProverStatus::Failed {
                    reason,
                    diagnostic_tail,
                }) => {
                    break Err(JobError {
                        reason,
                        diagnostic_tail,
                    })
                }
                Err(err) => {
                    break Err(JobError {
                        reason: format!("process-error:{err}"),
                        diagnostic_tail: vec![],
                    })
                }
            }

            tokio::time::sleep(JOB_POLL).await;
        },
    };

    let mut state = inner.state.lock();
    if let Some(job) = state.jobs.get_mut(&id) {
        match &outcome {
            Ok(_) => job.stage = JobStage::Success,
            Err(error) => {
                warn!(job = %id, reason = %error.reason, "proof job failed");
                job.stage = JobStage::Error;
            }
        }
        job.progress = 1.0;
        job.outcome = Some(outcome);
        job.completed_at = Some(Instant::now());
    }
    state.running = state.running.saturating_sub(1);
    drop(state);

    inner.wakeup.notify_one();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prover::LocalProver;
    use accumulator::Frontier;
    use notes::Note;
    use primitives::CryptoHash;

    // Zero-value output so conservation holds with no inputs; the seed keeps
    // requests distinct
    fn request(seed: u8) -> ProofRequest {
        ProofRequest {
            input_notes: vec![],
            output_notes: vec![Note::new(0, [1; 32], [seed; 32])],
            nullifier_signatures: vec![],
            tx_signatures: vec![],
            input_indices: vec![],
            input_proofs: vec![],
            old_root: Frontier::new().root(),
            frontier: Frontier::new(),
        }
    }

    fn queue(max_concurrent: usize, delay: Duration) -> ProofJobQueue {
        ProofJobQueue::new(
            Arc::new(LocalProver::new().with_stage_delay(delay)),
            max_concurrent,
            Duration::from_secs(600),
        )
    }

    async fn wait_terminal(queue: &ProofJobQueue, id: JobId) -> JobStatus {
        for _ in 0..400 {
            let status = queue.status(id).unwrap();
            if status.stage.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never finished");
    }

    #[tokio::test]
    async fn submit_returns_immediately_with_position() {
        let queue = queue(1, Duration::from_millis(50));

        let (a, pos_a) = queue.submit(request(1)).unwrap();
        let (b, pos_b) = queue.submit(request(2)).unwrap();
        let (c, pos_c) = queue.submit(request(3)).unwrap();

        assert_eq!(pos_a, 0);
        assert_eq!(pos_b, 1);
        assert_eq!(pos_c, 2);

        for id in [a, b, c] {
            let status = wait_terminal(&queue, id).await;
            assert_eq!(status.stage, JobStage::Success, "{status:?}");
        }
    }

    #[tokio::test]
    async fn concurrency_bound_is_never_exceeded() {
        let queue = queue(1, Duration::from_millis(30));

        let ids: Vec<JobId> = (0..3)
            .map(|i| queue.submit(request(i + 1)).unwrap().0)
            .collect();

        // Sample while the jobs drain: at most one active at any instant,
        // and a later job may only become active once every earlier one is
        // terminal
        loop {
            let statuses: Vec<JobStatus> =
                ids.iter().map(|id| queue.status(*id).unwrap()).collect();

            let active = statuses.iter().filter(|s| s.stage.is_active()).count();
            assert!(active <= 1, "{statuses:?}");

            for (i, status) in statuses.iter().enumerate() {
                if status.stage.is_active() {
                    for earlier in &statuses[..i] {
                        assert!(earlier.stage.is_terminal(), "{statuses:?}");
                    }
                }
            }

            if statuses.iter().all(|s| s.stage.is_terminal()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_pre_enqueue() {
        let queue = queue(1, Duration::ZERO);

        let mut bad = request(1);
        bad.output_notes.clear();

        let err = queue.submit(bad).unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err}");
        assert_eq!(queue.queue_depth(), QueueDepth::default());
    }

    #[tokio::test]
    async fn unknown_job_lookup_fails() {
        let queue = queue(1, Duration::ZERO);
        let err = queue.status(JobId::fresh()).unwrap_err();
        assert!(matches!(err, Error::QueueLookup(_)), "{err}");
    }

    #[tokio::test]
    async fn completed_records_are_evicted_after_retention() {
        let queue = ProofJobQueue::new(
            Arc::new(LocalProver::new()),
            1,
            Duration::from_millis(50),
        );

        let (id, _) = queue.submit(request(1)).unwrap();
        wait_terminal(&queue, id).await;

        tokio::time::sleep(Duration::from_millis(250)).await;
        let err = queue.status(id).unwrap_err();
        assert!(matches!(err, Error::QueueLookup(_)), "{err}");
    }

    #[tokio::test]
    async fn success_carries_proof_and_outputs() {
        let queue = queue(1, Duration::ZERO);

        let (id, _) = queue.submit(request(7)).unwrap();
        let status = wait_terminal(&queue, id).await;

        let response = status.response.unwrap();
        assert!(!response.proof.is_empty());
        assert_eq!(response.public_outputs.output_commitments.len(), 1);
        assert_eq!(
            response.public_outputs.old_root,
            Frontier::new().root()
        );
    }
}
