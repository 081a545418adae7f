//! Authentication chain for trying multiple strategies.

use std::sync::Arc;

use async_trait::async_trait;
use russh::{client, keys};
use tracing::debug;

use crate::manager::error::{Error, Result};
use crate::manager::transport::{SessionConfig, SshClientHandler};

use super::traits::{AuthOutcome, AuthStrategy};
use super::{KeyAuth, PasswordAuth};

/// Authentication chain that tries multiple strategies in order.
///
/// The first success stops the chain. Otherwise the answers are folded with
/// [`AuthOutcome::combine`]; if any strategy hit a transport error and none
/// succeeded, the last error is returned instead.
pub struct AuthChain {
    strategies: Vec<Box<dyn AuthStrategy>>,
}

impl AuthChain {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Chain for a session config: the password first, then every key.
    pub fn for_session(config: &SessionConfig) -> Self {
        let mut chain = Self::new();
        if let Some(password) = &config.password {
            chain = chain.with_password(password.clone());
        }
        for key in &config.private_keys {
            chain = chain.with_key(key.clone());
        }
        chain
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.strategies.push(Box::new(PasswordAuth::new(password)));
        self
    }

    pub fn with_key(mut self, key: Arc<keys::PrivateKey>) -> Self {
        self.strategies.push(Box::new(KeyAuth::new(key)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }
}

impl Default for AuthChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthStrategy for AuthChain {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<AuthOutcome> {
        if self.strategies.is_empty() {
            return Err(Error::auth("No authentication strategies configured"));
        }

        let mut last_error = None;
        let mut outcomes = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            debug!("Trying authentication strategy: {}", strategy.name());

            match strategy.authenticate(handle, username).await {
                Ok(AuthOutcome::Accepted) => {
                    debug!(
                        "Authentication succeeded with strategy: {}",
                        strategy.name()
                    );
                    return Ok(AuthOutcome::Accepted);
                }
                Ok(outcome) => {
                    debug!(
                        "Authentication with strategy {} ended as {:?}",
                        strategy.name(),
                        outcome
                    );
                    outcomes.push(outcome);
                }
                Err(e) => {
                    debug!(
                        "Authentication error with strategy {}: {}",
                        strategy.name(),
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(AuthOutcome::combine(&outcomes)),
        }
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}
