use crate::queue::{JobId, ProofJobQueue, QueueDepth};
use crate::topology::EdgeId;
use async_trait::async_trait;
use primitives::worker::Poll;
use primitives::CryptoHash;
use std::sync::Arc;
use tracing::info;

/// Lifecycle events handed to the external metrics collector.
///
/// Storage and presentation live outside this system; the engine only emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricEvent {
    EdgeSubmitted {
        edge: EdgeId,
        job: JobId,
        queue_position: usize,
    },
    EdgeProofCompleted {
        edge: EdgeId,
        elapsed_ms: u64,
    },
    EdgeConfirmed {
        edge: EdgeId,
        tx_hash: CryptoHash,
    },
    EdgeFailed {
        edge: EdgeId,
        reason: String,
    },
    QueueDepth(QueueDepth),
}

pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricEvent);
}

/// Emits every event as a structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(&self, event: MetricEvent) {
        match event {
            MetricEvent::EdgeSubmitted {
                edge,
                job,
                queue_position,
            } => info!(%edge, %job, queue_position, "edge submitted"),
            MetricEvent::EdgeProofCompleted { edge, elapsed_ms } => {
                info!(%edge, elapsed_ms, "edge proof completed");
            }
            MetricEvent::EdgeConfirmed { edge, tx_hash } => {
                info!(%edge, tx = %tx_hash.prefix(), "edge confirmed");
            }
            MetricEvent::EdgeFailed { edge, reason } => info!(%edge, %reason, "edge failed"),
            MetricEvent::QueueDepth(depth) => info!(
                queued = depth.queued,
                running = depth.running,
                completed = depth.completed,
                "queue depth"
            ),
        }
    }
}

/// Periodic queue-status sampler, run on its own timer decoupled from the
/// scheduler loop.
pub struct QueueDepthPoller {
    queue: ProofJobQueue,
    sink: Arc<dyn MetricsSink>,
}

impl QueueDepthPoller {
    pub fn new(queue: ProofJobQueue, sink: Arc<dyn MetricsSink>) -> Self {
        Self { queue, sink }
    }
}

#[async_trait]
impl Poll for QueueDepthPoller {
    async fn poll(&self) {
        self.sink.record(MetricEvent::QueueDepth(self.queue.queue_depth()));
    }
}
