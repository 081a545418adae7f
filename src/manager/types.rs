//! Data types shared by the cache, executor and transport layers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Cache key: one session per `(address, port)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostKey {
    pub address: String,
    pub port: u16,
}

impl HostKey {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Unprocessed command result as reported by the transport.
///
/// Output lines keep their line terminators, so concatenating them restores the
/// original stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOutput {
    pub exit_code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl RawOutput {
    pub fn new(exit_code: i32, stdout: Vec<String>, stderr: Vec<String>) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
        }
    }

    /// Build from raw channel bytes, splitting each stream into lines.
    pub fn from_bytes(exit_code: i32, stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            exit_code,
            stdout: split_lines(stdout),
            stderr: split_lines(stderr),
        }
    }
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .split_inclusive('\n')
        .map(str::to_string)
        .collect()
}

/// Structured value decoded from a command's stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", content = "value", rename_all = "snake_case")]
pub enum DecodedOutput {
    Json(serde_json::Value),
    Yaml(serde_yaml::Value),
}

impl DecodedOutput {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            DecodedOutput::Json(v) => Some(v),
            DecodedOutput::Yaml(_) => None,
        }
    }

    pub fn as_yaml(&self) -> Option<&serde_yaml::Value> {
        match self {
            DecodedOutput::Yaml(v) => Some(v),
            DecodedOutput::Json(_) => None,
        }
    }
}

/// Normalized result of [`execute_checked`](crate::manager::SshManager::execute_checked).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    /// Concatenated and trimmed stdout.
    pub stdout_str: String,
    pub stdout_len: usize,
    /// Concatenated and trimmed stderr.
    pub stderr_str: String,
    pub stderr_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded: Option<DecodedOutput>,
}

impl From<RawOutput> for ExecutionResult {
    fn from(raw: RawOutput) -> Self {
        let stdout_str = raw.stdout.concat().trim().to_string();
        let stderr_str = raw.stderr.concat().trim().to_string();
        Self {
            exit_code: raw.exit_code,
            stdout_len: raw.stdout.len(),
            stderr_len: raw.stderr.len(),
            stdout: raw.stdout,
            stderr: raw.stderr,
            stdout_str,
            stderr_str,
            decoded: None,
        }
    }
}

/// Status of an async command execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsyncCommandStatus {
    /// Command is currently running
    Running,
    /// Command has completed (check exit_code)
    Completed,
    /// Command was cancelled by the caller
    Cancelled,
    /// Command failed to start (check error field)
    Failed,
}

impl fmt::Display for AsyncCommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsyncCommandStatus::Running => write!(f, "running"),
            AsyncCommandStatus::Completed => write!(f, "completed"),
            AsyncCommandStatus::Cancelled => write!(f, "cancelled"),
            AsyncCommandStatus::Failed => write!(f, "failed"),
        }
    }
}
