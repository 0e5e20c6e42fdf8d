use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicBool, Ordering::Relaxed},
    Arc,
};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Something that can be polled on a fixed period.
#[async_trait]
pub trait Poll: Send + Sync + 'static {
    async fn poll(&self);
}

/// Background worker that polls on a fixed period until stopped.
///
/// The worker is stopped when dropped, or explicitly via [`PollWorker::stop`].
/// A poll can be forced ahead of schedule with [`PollWorker::kick`].
pub struct PollWorker {
    shared: Arc<PollWorkerShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

struct PollWorkerShared {
    shutdown: AtomicBool,
    wakeup: Notify,
}

impl PollWorker {
    pub fn spawn<P: Poll>(poller: P, period: Duration) -> Self {
        let shared = Arc::new(PollWorkerShared {
            shutdown: AtomicBool::new(false),
            wakeup: Notify::new(),
        });

        let handle = tokio::spawn(poll_loop(Arc::clone(&shared), poller, period));

        PollWorker {
            shared,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Manually forces a poll to occur
    pub fn kick(&self) {
        self.shared.wakeup.notify_one();
    }

    pub fn stop(&self) {
        // Mark as shutdown
        self.shared.shutdown.store(true, Relaxed);

        // Notify the worker, so it wakes up and exits immediately
        self.shared.wakeup.notify_one();

        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for PollWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop<P: Poll>(shared: Arc<PollWorkerShared>, poller: P, period: Duration) {
    // If the shutdown flag is set, then the task should exit.
    while !shared.shutdown.load(Relaxed) {
        poller.poll().await;

        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = shared.wakeup.notified() => {}
        }
    }
}
