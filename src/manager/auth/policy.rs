//! Credential selection for new sessions.
//!
//! The admin node is reached with the admin password only. Every other node
//! ("slave") is reached with the slave password plus the private key stored on
//! the admin node; if the server rejects the slave login outright, the fixed
//! fallback login is tried once with the same material. Slave sessions always
//! run commands through `sudo`.

use std::sync::Arc;

use russh::keys::PrivateKey;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::manager::cache::ConnectionCache;
use crate::manager::credentials::CredentialContext;
use crate::manager::error::{Error, Result};
use crate::manager::storage::SessionHandle;
use crate::manager::transport::{Connector, OpenMode, SessionConfig};
use crate::manager::types::HostKey;

use super::key::parse_private_key;

/// Private key read from the admin node for slave authentication.
pub const ADMIN_KEY_PATH: &str = "/root/.ssh/id_rsa";

/// Decides which credentials open a session for a given host.
///
/// Runs once per cache entry; reconnects reuse the resolved [`SessionConfig`].
pub struct AuthPolicy<'a> {
    context: &'a CredentialContext,
    connector: &'a dyn Connector,
}

impl<'a> AuthPolicy<'a> {
    pub fn new(context: &'a CredentialContext, connector: &'a dyn Connector) -> Self {
        Self { context, connector }
    }

    /// Open an authenticated session for `key`.
    ///
    /// For slave hosts this resolves the admin session through `cache`, so the
    /// caller must not hold the admin slot while calling it.
    pub async fn create_session(
        &self,
        cache: &ConnectionCache,
        key: &HostKey,
    ) -> Result<SessionHandle> {
        if self.context.is_admin(&key.address) {
            let config = SessionConfig::new(
                key.address.clone(),
                key.port,
                self.context.admin.login.clone(),
            )
            .with_password(self.context.admin.password.clone());
            return self.connector.connect(config).await;
        }

        let keys = self.fetch_keys(cache).await?;
        let primary = SessionConfig::new(
            key.address.clone(),
            key.port,
            self.context.slave.login.clone(),
        )
        .with_password(self.context.slave.password.clone())
        .with_keys(keys)
        .with_elevation(true);

        match self.connector.connect(primary.clone()).await {
            Err(Error::AuthMethodRejected { username, .. }) => {
                info!(
                    "Login '{}' rejected by {}, retrying as '{}'",
                    username, key, self.context.slave_fallback_login
                );
                let fallback = SessionConfig {
                    username: self.context.slave_fallback_login.clone(),
                    ..primary
                };
                self.connector.connect(fallback).await
            }
            other => other,
        }
    }

    async fn fetch_keys(&self, cache: &ConnectionCache) -> Result<Vec<Arc<PrivateKey>>> {
        let admin = cache
            .get_connection(&self.context.admin_ip, self.context.admin_port)
            .await?;

        debug!(
            "Reading {} from admin node {}",
            ADMIN_KEY_PATH, self.context.admin_ip
        );
        let mut file = admin.open(ADMIN_KEY_PATH, OpenMode::Read).await?;
        let mut text = String::new();
        file.read_to_string(&mut text)
            .await
            .map_err(|e| Error::SshKey(format!("Failed to read {}: {}", ADMIN_KEY_PATH, e)))?;

        Ok(vec![parse_private_key(&text)?])
    }
}
