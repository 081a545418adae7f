//! Connection cache keyed by `(address, port)`.
//!
//! Each key owns a slot guarded by its own async mutex. Looking up or creating
//! a session holds that slot for the whole operation, so two concurrent first
//! accesses to one key open a single session. Creating a slave session needs
//! the admin session, which lives behind a different slot, so the nested
//! lookup never waits on the lock its caller holds.

use std::sync::Arc;

use backon::{ConstantBuilder, Retryable};
use futures::future::{BoxFuture, join_all};
use once_cell::sync::OnceCell;
use russh::keys::PrivateKey;
use tracing::{debug, info, warn};

use crate::manager::auth::AuthPolicy;
use crate::manager::config::ManagerSettings;
use crate::manager::credentials::CredentialContext;
use crate::manager::error::{Error, Result};
use crate::manager::storage::{ConnectionStorage, DashMapConnectionStorage, SessionHandle};
use crate::manager::transport::{Connector, RemoteSession, SessionConfig};
use crate::manager::types::HostKey;

/// Side-effect free command used to check a cached session.
pub(crate) const LIVENESS_PROBE: &str = "cd ~";

pub struct ConnectionCache {
    storage: Box<dyn ConnectionStorage>,
    connector: Arc<dyn Connector>,
    settings: ManagerSettings,
    context: OnceCell<CredentialContext>,
}

impl ConnectionCache {
    pub fn new(connector: Arc<dyn Connector>, settings: ManagerSettings) -> Self {
        Self::with_storage(Box::new(DashMapConnectionStorage::new()), connector, settings)
    }

    pub fn with_storage(
        storage: Box<dyn ConnectionStorage>,
        connector: Arc<dyn Connector>,
        settings: ManagerSettings,
    ) -> Self {
        Self {
            storage,
            connector,
            settings,
            context: OnceCell::new(),
        }
    }

    /// Install the credential context. Allowed exactly once.
    pub fn initialize(&self, context: CredentialContext) -> Result<()> {
        self.context
            .set(context)
            .map_err(|_| Error::AlreadyInitialized)
    }

    pub fn context(&self) -> Result<&CredentialContext> {
        self.context.get().ok_or(Error::NotInitialized)
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Return a verified session for `address:port`, creating it on first use.
    ///
    /// Boxed because creating a slave session resolves the admin session
    /// through this same method.
    pub fn get_connection<'a>(
        &'a self,
        address: &'a str,
        port: u16,
    ) -> BoxFuture<'a, Result<SessionHandle>> {
        Box::pin(async move {
            let context = self.context()?;
            let key = HostKey::new(address, port);
            let slot = self.storage.slot(&key);
            let mut guard = slot.lock().await;

            let cached = guard.clone();
            let session = match cached {
                Some(session) => {
                    debug!("Return existing connection for {}", key);
                    session
                }
                None => {
                    debug!("Create new connection for {}", key);
                    let session = AuthPolicy::new(context, self.connector.as_ref())
                        .create_session(self, &key)
                        .await?;
                    info!(
                        "Connection for {} established as '{}'",
                        key,
                        session.config().username
                    );
                    *guard = Some(session.clone());
                    session
                }
            };

            self.ensure_alive(&key, session.as_ref()).await;
            Ok(session)
        })
    }

    /// Probe `session`; reconnect it if no probe succeeds within the liveness
    /// timeout. Only a non-zero probe exit is polled again; a transport error
    /// means the session is gone and goes straight to reconnect. A failed
    /// reconnect is only logged and surfaces on the next real command.
    async fn ensure_alive(&self, key: &HostKey, session: &dyn RemoteSession) {
        let probe = || async move {
            let output = session.execute(LIVENESS_PROBE).await?;
            if output.exit_code == 0 {
                Ok(())
            } else {
                Err(Error::UnexpectedExitCode {
                    command: LIVENESS_PROBE.to_string(),
                    exit_code: output.exit_code,
                    expected: vec![0],
                    stdout: output.stdout.concat(),
                    stderr: output.stderr.concat(),
                })
            }
        };
        let backoff = ConstantBuilder::default()
            .with_delay(self.settings.liveness_interval)
            .with_max_times(self.settings.liveness_attempts());
        let polling = probe
            .retry(backoff)
            .when(|e: &Error| matches!(e, Error::UnexpectedExitCode { .. }));

        let failure = match tokio::time::timeout(self.settings.liveness_timeout, polling).await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "no successful probe within {:?}",
                self.settings.liveness_timeout
            ),
        };

        info!("Check for current connection to {} fails. Try to reconnect", key);
        debug!("Liveness failure for {}: {}", key, failure);

        if let Err(e) = session.reconnect().await {
            warn!("Reconnect to {} failed: {}", key, e);
        }
    }

    /// Replace the session for `address:port` with one opened from the given
    /// credentials, closing the current one first. The authentication policy
    /// is not consulted.
    pub async fn update_connection(
        &self,
        address: &str,
        port: u16,
        login: &str,
        password: Option<&str>,
        keys: Option<Vec<Arc<PrivateKey>>>,
    ) -> Result<()> {
        let key = HostKey::new(address, port);
        let slot = self.storage.slot(&key);
        let mut guard = slot.lock().await;

        if let Some(previous) = guard.take() {
            info!("Close connection for {}", key);
            previous.close().await;
        }

        let mut config = SessionConfig::new(address, port, login).with_keys(keys.unwrap_or_default());
        if let Some(password) = password {
            config = config.with_password(password);
        }

        info!("Create new connection for {} as '{}'", key, login);
        let session = self.connector.connect(config).await?;
        *guard = Some(session);
        Ok(())
    }

    /// Close every cached session. Entries stay keyed; the next lookup of a
    /// closed entry fails its liveness probe and reconnects.
    pub async fn close_all(&self) {
        let closing = self.storage.slots().into_iter().map(|(key, slot)| async move {
            let guard = slot.lock().await;
            if let Some(session) = guard.as_ref() {
                session.close().await;
                info!("Close connection for {}", key);
            }
        });
        join_all(closing).await;
    }

    /// Keys that currently hold a session.
    pub async fn connection_keys(&self) -> Vec<HostKey> {
        let mut keys = Vec::new();
        for (key, slot) in self.storage.slots() {
            if slot.lock().await.is_some() {
                keys.push(key);
            }
        }
        keys
    }
}
