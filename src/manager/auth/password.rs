//! Password login.
//!
//! A refused password only counts as a rejected *method* when the server's
//! reply no longer lists `password`; otherwise the password was simply wrong.

use async_trait::async_trait;
use russh::{MethodKind, client};
use tracing::debug;

use crate::manager::error::{Error, Result};
use crate::manager::transport::SshClientHandler;

use super::traits::{AuthOutcome, AuthStrategy};

pub struct PasswordAuth {
    password: String,
}

impl PasswordAuth {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

#[async_trait]
impl AuthStrategy for PasswordAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<AuthOutcome> {
        let reply = handle
            .authenticate_password(username, &self.password)
            .await
            .map_err(|e| Error::connection(format!("Password authentication error: {}", e)))?;

        let outcome = AuthOutcome::classify(&reply, MethodKind::Password);
        if outcome == AuthOutcome::MethodRejected {
            debug!("Server does not accept password logins for '{}'", username);
        }
        Ok(outcome)
    }

    fn name(&self) -> &'static str {
        "password"
    }
}
