//! Transport trait definitions.
//!
//! The connection cache only talks to remote hosts through these traits, so the
//! russh implementation can be swapped for an in-memory one in tests.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use russh::keys::PrivateKey;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::manager::async_command::RunningCommand;
use crate::manager::error::Result;
use crate::manager::types::{HostKey, RawOutput};

/// Everything needed to open (and later re-open) one authenticated session.
#[derive(Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub private_keys: Vec<Arc<PrivateKey>>,
    /// Wrap every executed command with `sudo`.
    pub elevate_privileges: bool,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: None,
            private_keys: Vec::new(),
            elevate_privileges: false,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_keys(mut self, keys: Vec<Arc<PrivateKey>>) -> Self {
        self.private_keys = keys;
        self
    }

    pub fn with_elevation(mut self, elevate: bool) -> Self {
        self.elevate_privileges = elevate;
        self
    }

    pub fn key(&self) -> HostKey {
        HostKey::new(self.host.clone(), self.port)
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_keys", &self.private_keys.len())
            .field("elevate_privileges", &self.elevate_privileges)
            .finish()
    }
}

/// How a remote file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Create or truncate.
    Write,
    /// Create if missing, write at the end.
    Append,
}

/// File-like handle returned by [`RemoteSession::open`].
pub trait RemoteFile: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> RemoteFile for T {}

/// One authenticated remote shell session.
///
/// Implementations must be thread-safe (`Send + Sync`): the cache hands the
/// same session to every caller targeting its `(address, port)`.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Configuration the session was opened with; `reconnect` reuses it.
    fn config(&self) -> &SessionConfig;

    /// Run a command to completion.
    async fn execute(&self, command: &str) -> Result<RawOutput>;

    /// Start a command and return immediately with a live handle.
    async fn execute_async(&self, command: &str) -> Result<RunningCommand>;

    /// Tear down and re-establish the session with the stored configuration.
    async fn reconnect(&self) -> Result<()>;

    /// Close the session. Calling it on a closed session is a no-op.
    async fn close(&self);

    async fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn RemoteFile>>;

    async fn upload(&self, local: &Path, remote: &str) -> Result<()>;

    async fn download(&self, remote: &str, local: &Path) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;

    async fn is_dir(&self, path: &str) -> Result<bool>;

    async fn is_file(&self, path: &str) -> Result<bool>;

    /// Create a directory and any missing parents.
    async fn mkdir(&self, path: &str) -> Result<()>;

    async fn rm_rf(&self, path: &str) -> Result<()>;
}

impl fmt::Debug for dyn RemoteSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RemoteSession").field(self.config()).finish()
    }
}

/// Opens new sessions.
///
/// Must report a server refusing the offered login methods as
/// [`Error::AuthMethodRejected`](crate::manager::error::Error::AuthMethodRejected)
/// so the authentication policy can tell it apart from other failures.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: SessionConfig) -> Result<Arc<dyn RemoteSession>>;
}
