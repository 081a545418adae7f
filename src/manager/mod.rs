//! Connection-pooling SSH manager.
//!
//! This module is organized into the following submodules:
//!
//! - `config`: Tunables with environment variable support
//! - `credentials`: Admin/slave credential pairs and the process-wide context
//! - `error`: Error type and retry classification
//! - `transport`: Session traits and the russh/SFTP implementation
//! - `auth`: Authentication strategies and the admin/slave policy
//! - `storage`: Per-key session slots
//! - `cache`: Session lookup, liveness checks and replacement
//! - `executor`: Exit-code contract and stdout decoding
//! - `transfer`: Pattern-filtered uploads
//! - `service`: `SshManager`, the surface callers use

pub mod async_command;
pub mod auth;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod elevation;
pub mod error;
pub mod executor;
pub mod service;
pub mod storage;
#[cfg(test)]
pub(crate) mod testing;
pub(crate) mod transfer;
pub mod transport;
pub mod types;

pub use async_command::RunningCommand;
pub use config::ManagerSettings;
pub use credentials::{CredentialPair, Credentials};
pub use error::{Error, Result};
pub use executor::{ExecOptions, OutputDecoding};
pub use service::SshManager;
pub use transport::{OpenMode, RemoteSession, SessionConfig};
pub use types::{DecodedOutput, ExecutionResult, HostKey, RawOutput};
