//! Remote session transport.
//!
//! - `traits`: the [`RemoteSession`] / [`Connector`] contract the cache relies on
//! - `handler`: russh client handler
//! - `ssh`: russh + SFTP implementation of the contract

mod handler;
mod ssh;
mod traits;

pub use handler::SshClientHandler;
pub use ssh::{RusshConnector, RusshSession};
pub use traits::{Connector, OpenMode, RemoteFile, RemoteSession, SessionConfig};
