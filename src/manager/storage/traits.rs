//! Storage trait definition for the connection cache.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::manager::transport::RemoteSession;
use crate::manager::types::HostKey;

/// Shared reference to a cached session.
pub type SessionHandle = Arc<dyn RemoteSession>;

/// Per-key slot. Holding its lock serializes creation, replacement and
/// teardown for that key only; other keys stay available, which lets a slave
/// session be created while the admin session is resolved.
pub type SessionSlot = Arc<Mutex<Option<SessionHandle>>>;

/// Trait for connection storage operations.
///
/// Implementations must be thread-safe (`Send + Sync`) and must return the
/// same slot for the same key for as long as the storage lives.
pub trait ConnectionStorage: Send + Sync {
    /// Slot for `key`, created empty on first request.
    fn slot(&self, key: &HostKey) -> SessionSlot;

    /// Every slot with its key, sorted by key.
    fn slots(&self) -> Vec<(HostKey, SessionSlot)>;
}
