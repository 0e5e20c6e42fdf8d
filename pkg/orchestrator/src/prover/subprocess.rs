use super::{ProofRequest, Prover, ProverEvent, ProverHandle, ProverStage, ProverStatus};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Lines of diagnostic output retained per job.
const DIAGNOSTIC_TAIL_LINES: usize = 32;

/// A prover that delegates to an external binary.
///
/// Handshake: one JSON [`ProofRequest`] line on stdin; a stream of JSON
/// [`ProverEvent`] lines on stdout, ending with a `complete` or `failed`
/// event. Stage events are advisory. stderr is retained as a bounded
/// diagnostic tail. A nonzero exit, or a clean exit without a terminal
/// event, maps onto the `nonzero-exit:` / `parse-error:` /
/// `process-error:` error taxonomy.
pub struct SubprocessProver {
    program: PathBuf,
    args: Vec<String>,
    jobs: Mutex<HashMap<ProverHandle, Arc<Mutex<JobState>>>>,
}

struct JobState {
    status: ProverStatus,
    tail: VecDeque<String>,
}

impl JobState {
    fn push_tail(&mut self, line: String) {
        if self.tail.len() == DIAGNOSTIC_TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line);
    }

    fn tail(&self) -> Vec<String> {
        self.tail.iter().cloned().collect()
    }
}

impl SubprocessProver {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            jobs: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Prover for SubprocessProver {
    async fn submit(&self, request: ProofRequest) -> Result<ProverHandle> {
        let request_line = serde_json::to_string(&request)
            .map_err(|err| Error::Validation(format!("unserializable request: {err}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| Error::Prover {
                reason: format!("process-error:{err}"),
                diagnostic_tail: vec![],
            })?;

        let handle = ProverHandle::fresh();
        let state = Arc::new(Mutex::new(JobState {
            status: ProverStatus::Running {
                stage: ProverStage::Preparing,
                progress: 0.0,
            },
            tail: VecDeque::new(),
        }));
        self.jobs.lock().insert(handle, Arc::clone(&state));

        let mut stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // stderr is diagnostics only
        let stderr_state = Arc::clone(&state);
        tokio::spawn(async move {
            let Some(stderr) = stderr else { return };
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                stderr_state.lock().push_tail(line);
            }
        });

        tokio::spawn(async move {
            if let Some(stdin) = stdin.as_mut() {
                // A child that exits before reading its stdin surfaces
                // through the exit status, not through this write
                let _ = stdin.write_all(request_line.as_bytes()).await;
                let _ = stdin.write_all(b"\n").await;
                let _ = stdin.shutdown().await;
            }
            drop(stdin);

            let mut saw_terminal = false;
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    match serde_json::from_str::<ProverEvent>(&line) {
                        Ok(ProverEvent::Stage { stage, progress }) => {
                            let mut state = state.lock();
                            if !saw_terminal {
                                state.status = ProverStatus::Running {
                                    stage,
                                    progress: progress.unwrap_or(0.0),
                                };
                            }
                        }
                        Ok(ProverEvent::Complete { response }) => {
                            saw_terminal = true;
                            state.lock().status = ProverStatus::Complete(response);
                        }
                        Ok(ProverEvent::Failed {
                            reason,
                            diagnostic_tail,
                        }) => {
                            saw_terminal = true;
                            let mut state = state.lock();
                            for line in diagnostic_tail {
                                state.push_tail(line);
                            }
                            let tail = state.tail();
                            state.status = ProverStatus::Failed {
                                reason,
                                diagnostic_tail: tail,
                            };
                        }
                        Err(err) => {
                            debug!(%err, line, "ignoring unparseable prover output line");
                            state.lock().push_tail(line);
                        }
                    }
                }
            }

            let exit = child.wait().await;
            if saw_terminal {
                return;
            }

            // The stream ended without a terminal event
            let reason = match exit {
                Ok(status) if status.success() => "parse-error:missing terminal event".to_string(),
                Ok(status) => match status.code() {
                    Some(code) => format!("nonzero-exit:{code}"),
                    None => "process-error:killed by signal".to_string(),
                },
                Err(err) => format!("process-error:{err}"),
            };
            warn!(%reason, "external prover ended without a terminal event");

            let mut state = state.lock();
            let tail = state.tail();
            state.status = ProverStatus::Failed {
                reason,
                diagnostic_tail: tail,
            };
        });

        Ok(handle)
    }

    async fn poll(&self, handle: &ProverHandle) -> Result<ProverStatus> {
        let state = self
            .jobs
            .lock()
            .get(handle)
            .cloned()
            .ok_or_else(|| Error::Validation(format!("unknown prover handle {handle}")))?;

        let status = state.lock().status.clone();
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accumulator::Frontier;
    use notes::Note;
    use primitives::CryptoHash;
    use std::time::Duration;

    fn request() -> ProofRequest {
        ProofRequest {
            input_notes: vec![],
            output_notes: vec![Note::new(1, [1; 32], [2; 32])],
            nullifier_signatures: vec![],
            tx_signatures: vec![],
            input_indices: vec![],
            input_proofs: vec![],
            old_root: CryptoHash::zero(),
            frontier: Frontier::new(),
        }
    }

    fn shell_prover(script: &str) -> SubprocessProver {
        SubprocessProver::new("sh", vec!["-c".into(), script.into()])
    }

    async fn poll_to_terminal(prover: &SubprocessProver, handle: &ProverHandle) -> ProverStatus {
        for _ in 0..200 {
            match prover.poll(handle).await.unwrap() {
                ProverStatus::Running { .. } => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                terminal => return terminal,
            }
        }
        panic!("prover never reached a terminal state");
    }

    #[tokio::test]
    async fn structured_failure_event() {
        let prover = shell_prover(
            r#"read _req
echo '{"event":"stage","stage":"computing","progress":0.5}'
echo 'diagnostic line' >&2
echo '{"event":"failed","reason":"nonzero-exit:1","diagnosticTail":["assertion failed"]}'"#,
        );

        let handle = prover.submit(request()).await.unwrap();
        let ProverStatus::Failed { reason, diagnostic_tail } =
            poll_to_terminal(&prover, &handle).await
        else {
            panic!("expected failure");
        };

        assert_eq!(reason, "nonzero-exit:1");
        assert!(diagnostic_tail.contains(&"assertion failed".to_string()), "{diagnostic_tail:?}");
    }

    #[tokio::test]
    async fn nonzero_exit_without_terminal_event() {
        let prover = shell_prover("read _req; echo 'boom' >&2; exit 3");

        let handle = prover.submit(request()).await.unwrap();
        let ProverStatus::Failed { reason, .. } = poll_to_terminal(&prover, &handle).await else {
            panic!("expected failure");
        };

        assert_eq!(reason, "nonzero-exit:3");
    }

    #[tokio::test]
    async fn clean_exit_without_terminal_event_is_parse_error() {
        let prover = shell_prover("read _req; echo 'not json'");

        let handle = prover.submit(request()).await.unwrap();
        let ProverStatus::Failed { reason, diagnostic_tail } =
            poll_to_terminal(&prover, &handle).await
        else {
            panic!("expected failure");
        };

        assert!(reason.starts_with("parse-error:"), "{reason}");
        assert!(diagnostic_tail.contains(&"not json".to_string()));
    }

    #[tokio::test]
    async fn missing_binary_is_process_error() {
        let prover = SubprocessProver::new("/nonexistent/prover-binary", vec![]);

        let err = prover.submit(request()).await.unwrap_err();
        let Error::Prover { reason, .. } = err else {
            panic!("expected prover error");
        };
        assert!(reason.starts_with("process-error:"), "{reason}");
    }
}
