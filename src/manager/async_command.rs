//! Handles for commands started with `execute_async`.
//!
//! # Architecture
//!
//! - [`RunningCommand`]: caller-side handle. Exposes status, partial output,
//!   cancellation and a `wait()` that resolves to the final [`RawOutput`].
//! - [`CommandSink`]: producer side, owned by the task that drives the remote
//!   channel. Dropping it while still `Running` makes `wait()` fail.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use crate::manager::error::{Error, Result};
use crate::manager::types::{AsyncCommandStatus, RawOutput};

/// Output buffer for collecting command output
#[derive(Debug, Default)]
pub struct OutputBuffer {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl OutputBuffer {
    /// Create a new output buffer with pre-allocated capacity.
    pub fn with_capacity(stdout_cap: usize, stderr_cap: usize) -> Self {
        Self {
            stdout: Vec::with_capacity(stdout_cap),
            stderr: Vec::with_capacity(stderr_cap),
        }
    }
}

/// State for a command running in the background on a remote session.
pub struct RunningCommand {
    pub command_id: String,
    pub command: String,
    /// RFC3339 start timestamp
    pub started_at: String,
    cancel_token: CancellationToken,
    status_rx: watch::Receiver<AsyncCommandStatus>,
    output: Arc<Mutex<OutputBuffer>>,
    exit_code: Arc<Mutex<Option<i32>>>,
    error: Arc<Mutex<Option<String>>>,
    timed_out: Arc<AtomicBool>,
}

/// Producer half of a [`RunningCommand`].
pub struct CommandSink {
    pub output: Arc<Mutex<OutputBuffer>>,
    pub cancel_token: CancellationToken,
    pub timed_out: Arc<AtomicBool>,
    status_tx: watch::Sender<AsyncCommandStatus>,
    exit_code: Arc<Mutex<Option<i32>>>,
    error: Arc<Mutex<Option<String>>>,
}

impl RunningCommand {
    /// Create a handle in the `Running` state together with its producer half.
    pub fn start(command: impl Into<String>) -> (Self, CommandSink) {
        let (status_tx, status_rx) = watch::channel(AsyncCommandStatus::Running);
        let output = Arc::new(Mutex::new(OutputBuffer::with_capacity(4096, 1024)));
        let exit_code = Arc::new(Mutex::new(None));
        let error = Arc::new(Mutex::new(None));
        let timed_out = Arc::new(AtomicBool::new(false));
        let cancel_token = CancellationToken::new();

        let handle = Self {
            command_id: uuid::Uuid::new_v4().to_string(),
            command: command.into(),
            started_at: chrono::Utc::now().to_rfc3339(),
            cancel_token: cancel_token.clone(),
            status_rx,
            output: output.clone(),
            exit_code: exit_code.clone(),
            error: error.clone(),
            timed_out: timed_out.clone(),
        };
        let sink = CommandSink {
            output,
            cancel_token,
            timed_out,
            status_tx,
            exit_code,
            error,
        };
        (handle, sink)
    }

    pub fn status(&self) -> AsyncCommandStatus {
        *self.status_rx.borrow()
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }

    /// Ask the producing task to stop. Output collected so far stays readable.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Output collected so far; exit code is `-1` until the command finishes.
    pub async fn snapshot(&self) -> RawOutput {
        let exit_code = self.exit_code.lock().await.unwrap_or(-1);
        let buf = self.output.lock().await;
        RawOutput::from_bytes(exit_code, &buf.stdout, &buf.stderr)
    }

    /// Wait for the command to leave the `Running` state.
    pub async fn wait(&mut self) -> Result<RawOutput> {
        let status = match self
            .status_rx
            .wait_for(|s| *s != AsyncCommandStatus::Running)
            .await
        {
            Ok(status) => *status,
            Err(_) => {
                return Err(Error::connection(format!(
                    "Async command {} ended without reporting a status",
                    self.command_id
                )));
            }
        };

        if status == AsyncCommandStatus::Failed {
            let message = self
                .error
                .lock()
                .await
                .clone()
                .unwrap_or_else(|| "unknown failure".to_string());
            return Err(Error::connection(message));
        }

        Ok(self.snapshot().await)
    }
}

impl CommandSink {
    pub async fn set_exit_code(&self, code: Option<i32>) {
        *self.exit_code.lock().await = code;
    }

    /// Report a terminal status.
    pub fn finish(&self, status: AsyncCommandStatus) {
        let _ = self.status_tx.send(status);
    }

    /// Record a start-up failure and mark the command `Failed`.
    pub async fn fail(&self, message: impl Into<String>) {
        *self.error.lock().await = Some(message.into());
        self.finish(AsyncCommandStatus::Failed);
    }

    /// Store a complete result in one step.
    pub async fn complete(&self, exit_code: i32, stdout: &[u8], stderr: &[u8]) {
        {
            let mut buf = self.output.lock().await;
            buf.stdout.extend_from_slice(stdout);
            buf.stderr.extend_from_slice(stderr);
        }
        self.set_exit_code(Some(exit_code)).await;
        self.finish(AsyncCommandStatus::Completed);
    }
}
