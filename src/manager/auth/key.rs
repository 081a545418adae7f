//! Private key SSH authentication.

use std::sync::Arc;

use async_trait::async_trait;
use russh::{MethodKind, client, keys};
use tracing::debug;

use crate::manager::error::{Error, Result};
use crate::manager::transport::SshClientHandler;

use super::traits::{AuthOutcome, AuthStrategy};

/// Parse OpenSSH/PEM private key text (passphrase-less) into key material.
pub fn parse_private_key(text: &str) -> Result<Arc<keys::PrivateKey>> {
    keys::decode_secret_key(text, None)
        .map(Arc::new)
        .map_err(|e| Error::SshKey(format!("Failed to parse private key: {}", e)))
}

/// Public key authentication with an in-memory private key.
pub struct KeyAuth {
    key: Arc<keys::PrivateKey>,
}

impl KeyAuth {
    pub fn new(key: Arc<keys::PrivateKey>) -> Self {
        Self { key }
    }
}

#[async_trait]
impl AuthStrategy for KeyAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<AuthOutcome> {
        // For RSA keys, use the best supported hash algorithm
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        debug!("Using RSA hash algorithm for key auth: {:?}", hash_alg);

        let key_with_hash = keys::PrivateKeyWithHashAlg::new(self.key.clone(), hash_alg);

        let reply = handle
            .authenticate_publickey(username, key_with_hash)
            .await
            .map_err(|e| Error::connection(format!("Key authentication error: {}", e)))?;

        Ok(AuthOutcome::classify(&reply, MethodKind::PublicKey))
    }

    fn name(&self) -> &'static str {
        "key"
    }
}
