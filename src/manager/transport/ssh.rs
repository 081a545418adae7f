//! russh-backed implementation of the transport traits.
//!
//! ## Connection Lifecycle
//!
//! 1. **Client Configuration**: inactivity timeout, keepalive and compression.
//! 2. **Connection Establishment**: TCP connect bounded by the connect timeout.
//! 3. **Authentication**: password first, then every private key, through an
//!    [`AuthChain`]. A server that allows none of the offered methods yields
//!    [`Error::AuthMethodRejected`]; a wrong credential for an allowed method
//!    yields [`Error::Authentication`].
//! 4. **Command Execution**: one channel per command; privileged sessions wrap
//!    the command with `sudo`.
//! 5. **File Operations**: an SFTP subsystem channel per call.
//!
//! ## Retry Strategy
//!
//! Connection attempts use exponential backoff with jitter via `backon`,
//! starting at the configured retry delay and capped at [`MAX_RETRY_DELAY`].
//! Only errors classified as transient are retried.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use russh::{ChannelMsg, client};
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{FileAttributes, OpenFlags};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::manager::async_command::{CommandSink, RunningCommand};
use crate::manager::auth::{AuthChain, AuthOutcome, AuthStrategy};
use crate::manager::config::{MAX_RETRY_DELAY, ManagerSettings};
use crate::manager::elevation::{quote_path, wrap_sudo_command};
use crate::manager::error::{Error, Result};
use crate::manager::types::{AsyncCommandStatus, RawOutput};

use super::handler::SshClientHandler;
use super::traits::{Connector, OpenMode, RemoteFile, RemoteSession, SessionConfig};

type SshHandle = client::Handle<SshClientHandler>;

/// Build russh client configuration.
///
/// Inactivity timeout is the connect timeout; keepalive every 30 seconds with
/// at most 3 unanswered probes; zlib preferred when `compress` is set.
pub(crate) fn build_client_config(timeout: Duration, compress: bool) -> Arc<client::Config> {
    let compression = if compress {
        (&[russh::compression::ZLIB, russh::compression::NONE][..]).into()
    } else {
        (&[russh::compression::NONE][..]).into()
    };

    let preferred = russh::Preferred {
        compression,
        ..Default::default()
    };

    Arc::new(client::Config {
        inactivity_timeout: Some(timeout),
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        preferred,
        ..Default::default()
    })
}

/// Connect with exponential backoff, retrying only transient failures.
pub(crate) async fn connect_to_ssh_with_retry(
    config: &SessionConfig,
    settings: &ManagerSettings,
) -> Result<SshHandle> {
    let attempt_counter = AtomicU32::new(0);

    let backoff = ExponentialBuilder::default()
        .with_min_delay(settings.retry_delay)
        .with_max_delay(MAX_RETRY_DELAY)
        .with_max_times(settings.max_retries as usize)
        .with_jitter();

    let result = (|| async {
        let current_attempt = attempt_counter.fetch_add(1, Ordering::SeqCst);

        if current_attempt > 0 {
            warn!(
                "SSH connection retry attempt {} to {}@{}:{}",
                current_attempt, config.username, config.host, config.port
            );
        }

        connect_to_ssh(config, settings).await
    })
    .retry(backoff)
    .when(|e: &Error| {
        let retryable = e.is_retryable();
        if !retryable {
            warn!(
                "SSH connection to {}@{}:{} failed with non-retryable error: {}",
                config.username, config.host, config.port, e
            );
        }
        retryable
    })
    .notify(|err: &Error, dur: Duration| {
        warn!("SSH connection failed: {}. Retrying in {:?}", err, dur);
    })
    .await;

    let total_attempts = attempt_counter.load(Ordering::SeqCst);
    let retry_count = total_attempts.saturating_sub(1);

    match result {
        Ok(handle) => {
            if retry_count > 0 {
                info!(
                    "SSH connection to {}@{}:{} succeeded after {} retry attempt(s)",
                    config.username, config.host, config.port, retry_count
                );
            }
            Ok(handle)
        }
        Err(e) => {
            error!(
                "SSH connection to {}@{}:{} failed after {} attempt(s). Last error: {}",
                config.username, config.host, config.port, total_attempts, e
            );
            Err(e)
        }
    }
}

/// Establish one SSH connection and authenticate it.
async fn connect_to_ssh(config: &SessionConfig, settings: &ManagerSettings) -> Result<SshHandle> {
    let client_config = build_client_config(settings.connect_timeout, settings.compression);

    let connect_future = client::connect(
        client_config,
        (config.host.as_str(), config.port),
        SshClientHandler,
    );

    let mut handle = tokio::time::timeout(settings.connect_timeout, connect_future)
        .await
        .map_err(|_| {
            Error::connection(format!(
                "Connection timed out after {:?}",
                settings.connect_timeout
            ))
        })?
        .map_err(|e| Error::connection(format!("Failed to connect: {}", e)))?;

    let auth_chain = AuthChain::for_session(config);
    if auth_chain.is_empty() {
        return Err(Error::auth(
            "No authentication method available (require password or private key)",
        ));
    }

    let outcome = auth_chain.authenticate(&mut handle, &config.username).await?;
    match outcome {
        AuthOutcome::Accepted => {
            debug!(
                "Authenticated {}@{}:{}",
                config.username, config.host, config.port
            );
            Ok(handle)
        }
        rejected => Err(auth_failure(config, rejected)),
    }
}

/// Error for a login the server refused. Only a refusal of every offered
/// method maps to [`Error::AuthMethodRejected`].
fn auth_failure(config: &SessionConfig, outcome: AuthOutcome) -> Error {
    match outcome {
        AuthOutcome::MethodRejected => Error::AuthMethodRejected {
            host: config.host.clone(),
            username: config.username.clone(),
        },
        _ => Error::auth(format!(
            "credentials for {}@{}:{} were refused",
            config.username, config.host, config.port
        )),
    }
}

/// Apply privilege elevation if the session requires it.
fn prepare_command(config: &SessionConfig, command: &str) -> String {
    if config.elevate_privileges {
        wrap_sudo_command(command, config.password.as_deref())
    } else {
        command.to_string()
    }
}

/// Execute a command and collect its output.
///
/// If no exit status arrives within `timeout`, the partial output is returned
/// with exit code `-1`.
pub(crate) async fn execute_ssh_command(
    handle: &SshHandle,
    command: &str,
    timeout: Duration,
) -> Result<RawOutput> {
    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(|e| Error::connection(format!("Failed to open channel: {}", e)))?;

    channel
        .exec(true, command)
        .await
        .map_err(|e| Error::connection(format!("Failed to execute command: {}", e)))?;

    let mut stdout = Vec::with_capacity(4096);
    let mut stderr = Vec::with_capacity(1024);
    let mut exit_code: Option<u32> = None;

    let result = tokio::time::timeout(timeout, async {
        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    // ext == 1 is stderr in SSH protocol
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = Some(exit_status);
                }
                Some(ChannelMsg::Eof) => {
                    if exit_code.is_some() {
                        break;
                    }
                }
                Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            }
        }
    })
    .await;

    if result.is_err() {
        warn!(
            "Command timed out after {:?}, returning partial output ({} bytes stdout, {} bytes stderr)",
            timeout,
            stdout.len(),
            stderr.len()
        );
    }

    let _ = channel.close().await;

    let exit_code = exit_code.map(|c| c as i32).unwrap_or(-1);
    Ok(RawOutput::from_bytes(exit_code, &stdout, &stderr))
}

/// Drive an async command to completion, cancellation or timeout.
async fn execute_ssh_command_async(
    handle: Arc<SshHandle>,
    command: String,
    timeout: Duration,
    sink: CommandSink,
) {
    let mut channel = match handle.channel_open_session().await {
        Ok(ch) => ch,
        Err(e) => {
            sink.fail(format!("Failed to open channel: {}", e)).await;
            return;
        }
    };

    if let Err(e) = channel.exec(true, command.as_str()).await {
        sink.fail(format!("Failed to execute command: {}", e)).await;
        return;
    }

    let cancel_token = sink.cancel_token.clone();

    tokio::select! {
        biased;

        _ = cancel_token.cancelled() => {
            warn!("Async command cancelled: {}", command);
            let _ = channel.close().await;
            sink.finish(AsyncCommandStatus::Cancelled);
        }

        _ = tokio::time::sleep(timeout) => {
            warn!("Async command timed out after {:?}: {}", timeout, command);
            sink.timed_out.store(true, Ordering::SeqCst);
            let _ = channel.close().await;
            sink.finish(AsyncCommandStatus::Completed);
        }

        code = collect_async_output(&mut channel, &sink) => {
            sink.set_exit_code(code).await;
            sink.finish(AsyncCommandStatus::Completed);
        }
    }
}

/// Flush threshold for batched output (8KB)
const FLUSH_THRESHOLD: usize = 8192;

/// Collect channel output into the sink's shared buffer, batching writes.
///
/// Returns the exit code when the channel closes.
async fn collect_async_output(
    channel: &mut russh::Channel<client::Msg>,
    sink: &CommandSink,
) -> Option<i32> {
    let mut exit_code: Option<i32> = None;

    let mut local_stdout = Vec::with_capacity(4096);
    let mut local_stderr = Vec::with_capacity(1024);

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => {
                local_stdout.extend_from_slice(&data);
                if local_stdout.len() >= FLUSH_THRESHOLD {
                    sink.output.lock().await.stdout.append(&mut local_stdout);
                }
            }
            Some(ChannelMsg::ExtendedData { data, ext }) => {
                if ext == 1 {
                    local_stderr.extend_from_slice(&data);
                    if local_stderr.len() >= FLUSH_THRESHOLD {
                        sink.output.lock().await.stderr.append(&mut local_stderr);
                    }
                }
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                exit_code = Some(exit_status as i32);
            }
            Some(ChannelMsg::Eof) => {
                if exit_code.is_some() {
                    break;
                }
            }
            Some(ChannelMsg::Close) | None => break,
            Some(_) => {}
        }
    }

    if !local_stdout.is_empty() || !local_stderr.is_empty() {
        let mut buf = sink.output.lock().await;
        buf.stdout.append(&mut local_stdout);
        buf.stderr.append(&mut local_stderr);
    }

    let _ = channel.close().await;

    exit_code
}

fn sftp_error(context: &str, e: impl std::fmt::Display) -> Error {
    Error::sftp(format!("{}: {}", context, e))
}

/// A session backed by a russh client handle.
pub struct RusshSession {
    config: SessionConfig,
    settings: ManagerSettings,
    handle: RwLock<Option<Arc<SshHandle>>>,
}

impl RusshSession {
    /// Connect and authenticate a new session.
    pub async fn connect(config: SessionConfig, settings: ManagerSettings) -> Result<Self> {
        let handle = connect_to_ssh_with_retry(&config, &settings).await?;
        Ok(Self {
            config,
            settings,
            handle: RwLock::new(Some(Arc::new(handle))),
        })
    }

    async fn current_handle(&self) -> Result<Arc<SshHandle>> {
        self.handle.read().await.clone().ok_or_else(|| {
            Error::connection(format!(
                "Session to {}:{} is closed",
                self.config.host, self.config.port
            ))
        })
    }

    async fn sftp(&self) -> Result<SftpSession> {
        let handle = self.current_handle().await?;

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| sftp_error("Failed to open channel", e))?;

        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| sftp_error("Failed to request SFTP subsystem", e))?;

        SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| sftp_error("Failed to initialize SFTP session", e))
    }

    async fn stat(&self, path: &str) -> Result<Option<FileAttributes>> {
        let sftp = self.sftp().await?;
        let exists = sftp
            .try_exists(path)
            .await
            .map_err(|e| sftp_error(&format!("Failed to stat {}", path), e))?;
        if !exists {
            return Ok(None);
        }
        sftp.metadata(path)
            .await
            .map(Some)
            .map_err(|e| sftp_error(&format!("Failed to stat {}", path), e))
    }

    /// Run a shell helper and fail unless it exits 0.
    async fn run_checked(&self, command: String) -> Result<()> {
        let output = self.execute(&command).await?;
        if output.exit_code != 0 {
            return Err(Error::UnexpectedExitCode {
                command,
                exit_code: output.exit_code,
                expected: vec![0],
                stdout: output.stdout.concat().trim().to_string(),
                stderr: output.stderr.concat().trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteSession for RusshSession {
    fn config(&self) -> &SessionConfig {
        &self.config
    }

    async fn execute(&self, command: &str) -> Result<RawOutput> {
        let handle = self.current_handle().await?;
        let command = prepare_command(&self.config, command);
        execute_ssh_command(&handle, &command, self.settings.command_timeout).await
    }

    async fn execute_async(&self, command: &str) -> Result<RunningCommand> {
        let handle = self.current_handle().await?;
        let (running, sink) = RunningCommand::start(command);
        tokio::spawn(execute_ssh_command_async(
            handle,
            prepare_command(&self.config, command),
            self.settings.command_timeout,
            sink,
        ));
        Ok(running)
    }

    async fn reconnect(&self) -> Result<()> {
        info!(
            "Reconnecting {}@{}:{}",
            self.config.username, self.config.host, self.config.port
        );
        let fresh = connect_to_ssh_with_retry(&self.config, &self.settings).await?;
        let previous = self.handle.write().await.replace(Arc::new(fresh));
        if let Some(old) = previous {
            let _ = old
                .disconnect(russh::Disconnect::ByApplication, "", "")
                .await;
        }
        Ok(())
    }

    async fn close(&self) {
        if let Some(handle) = self.handle.write().await.take() {
            let _ = handle
                .disconnect(russh::Disconnect::ByApplication, "", "")
                .await;
            debug!("Closed session to {}:{}", self.config.host, self.config.port);
        }
    }

    async fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn RemoteFile>> {
        let sftp = self.sftp().await?;
        let file = match mode {
            OpenMode::Read => sftp.open(path).await,
            OpenMode::Write => sftp.create(path).await,
            OpenMode::Append => {
                sftp.open_with_flags(
                    path,
                    OpenFlags::CREATE | OpenFlags::APPEND | OpenFlags::WRITE,
                )
                .await
            }
        }
        .map_err(|e| sftp_error(&format!("Failed to open {}", path), e))?;
        Ok(Box::new(file))
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        let data = tokio::fs::read(local).await?;
        let sftp = self.sftp().await?;
        let mut file = sftp
            .create(remote)
            .await
            .map_err(|e| sftp_error(&format!("Failed to create {}", remote), e))?;
        file.write_all(&data).await?;
        file.shutdown().await?;
        debug!(
            "Uploaded {} ({} bytes) to {}:{}",
            local.display(),
            data.len(),
            self.config.host,
            remote
        );
        Ok(())
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<()> {
        let sftp = self.sftp().await?;
        let mut file = sftp
            .open(remote)
            .await
            .map_err(|e| sftp_error(&format!("Failed to open {}", remote), e))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).await?;
        tokio::fs::write(local, &data).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.stat(path).await?.is_some())
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        Ok(self.stat(path).await?.is_some_and(|attrs| attrs.is_dir()))
    }

    async fn is_file(&self, path: &str) -> Result<bool> {
        Ok(self
            .stat(path)
            .await?
            .is_some_and(|attrs| attrs.is_regular()))
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        self.run_checked(format!("mkdir -p {}", quote_path(path)))
            .await
    }

    async fn rm_rf(&self, path: &str) -> Result<()> {
        self.run_checked(format!("rm -rf {}", quote_path(path)))
            .await
    }
}

/// Opens [`RusshSession`]s with shared settings.
pub struct RusshConnector {
    settings: ManagerSettings,
}

impl RusshConnector {
    pub fn new(settings: ManagerSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Connector for RusshConnector {
    async fn connect(&self, config: SessionConfig) -> Result<Arc<dyn RemoteSession>> {
        let session = RusshSession::connect(config, self.settings.clone()).await?;
        Ok(Arc::new(session))
    }
}
