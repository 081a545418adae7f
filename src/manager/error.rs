//! Error types and retry classification for the SSH manager.
//!
//! All fallible operations return [`Error`]. Connection establishment additionally
//! consults [`is_retryable_error`] to decide whether a failure is transient and
//! worth retrying versus permanent and worth surfacing immediately.
//!
//! # Classification Strategy
//!
//! 1. **Authentication Failures (NOT retryable)**: wrong passwords, invalid keys,
//!    denied access. Retrying only risks account lockouts.
//!
//! 2. **Connection Errors (retryable)**: connection refused, timeouts, temporary
//!    DNS failures.
//!
//! 3. **Unknown Errors**: retried unless they look like SSH protocol errors that
//!    carry no timeout/connect hint.
//!
//! Authentication patterns take precedence over connection patterns.

use thiserror::Error;

/// Main error type for the SSH manager.
#[derive(Debug, Error)]
pub enum Error {
    /// A connection was requested before [`initialize`](crate::manager::SshManager::initialize).
    #[error("SSH manager is not initialized: call initialize() before requesting connections")]
    NotInitialized,

    /// `initialize` was called a second time.
    #[error("SSH manager is already initialized")]
    AlreadyInitialized,

    /// Transport-level failure (TCP, handshake, channel, closed session).
    #[error("SSH connection error: {0}")]
    Connection(String),

    /// The remote refused every authentication method offered for this login.
    #[error("Authentication method rejected for {username}@{host}")]
    AuthMethodRejected { host: String, username: String },

    /// Authentication failed for a reason other than method rejection.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Key material could not be read or parsed.
    #[error("SSH key error: {0}")]
    SshKey(String),

    /// A command finished with an exit code outside the expected set.
    #[error(
        "Command '{command}' returned unexpected exit code {exit_code}, while expected {codes}\n\tSTDOUT:\n{stdout}\n\tSTDERR:\n{stderr}",
        codes = format_codes(.expected)
    )]
    UnexpectedExitCode {
        command: String,
        exit_code: i32,
        expected: Vec<i32>,
        stdout: String,
        stderr: String,
    },

    /// Caller supplied a combination of arguments that cannot be honoured.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML deserialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid upload pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("SFTP error: {0}")]
    Sftp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Local directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a connection error from a string
    pub fn connection(msg: impl Into<String>) -> Self {
        Error::Connection(msg.into())
    }

    /// Create an authentication error from a string
    pub fn auth(msg: impl Into<String>) -> Self {
        Error::Authentication(msg.into())
    }

    /// Create an invalid argument error from a string
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create an SFTP error from a string
    pub fn sftp(msg: impl Into<String>) -> Self {
        Error::Sftp(msg.into())
    }

    /// Whether a failed connection attempt should be retried.
    ///
    /// Only plain connection errors are candidates; their message is then
    /// classified by [`is_retryable_error`].
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Connection(msg) => is_retryable_error(msg),
            _ => false,
        }
    }
}

pub(crate) fn format_codes(codes: &[i32]) -> String {
    codes
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Authentication error patterns that indicate permanent failures.
const AUTH_ERRORS: &[&str] = &[
    "authentication failed",
    "authentication method rejected",
    "password authentication failed",
    "key authentication failed",
    "permission denied",
    "publickey",
    "auth fail",
    "no authentication",
    "all authentication methods failed",
];

/// Connection error patterns that indicate transient failures.
const RETRYABLE_ERRORS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection timed out",
    "timeout",
    "network is unreachable",
    "no route to host",
    "host is down",
    "temporary failure",
    "resource temporarily unavailable",
    "handshake failed",
    "failed to connect",
    "broken pipe",
    "would block",
];

/// Determines if an error message describes a transient failure.
///
/// # Classification Rules
///
/// 1. Messages matching an authentication pattern are never retryable.
/// 2. Messages matching a connection pattern are retryable.
/// 3. Anything else is retryable unless it mentions "ssh" without also
///    mentioning "timeout" or "connect".
pub(crate) fn is_retryable_error(error: &str) -> bool {
    let error_lower = error.to_lowercase();

    for auth_err in AUTH_ERRORS {
        if error_lower.contains(auth_err) {
            return false;
        }
    }

    for retryable_err in RETRYABLE_ERRORS {
        if error_lower.contains(retryable_err) {
            return true;
        }
    }

    !error_lower.contains("ssh")
        || error_lower.contains("timeout")
        || error_lower.contains("connect")
}
