//! Authentication strategy trait definition.

use async_trait::async_trait;
use russh::MethodKind;
use russh::client::{self, AuthResult};

use crate::manager::error::Result;
use crate::manager::transport::SshClientHandler;

/// How the server answered one authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Accepted,
    /// The method is allowed for this login but the credential was wrong.
    Denied,
    /// The server does not allow this method for this login at all.
    MethodRejected,
}

impl AuthOutcome {
    /// Classify a server reply to an attempt made with `method`.
    ///
    /// A failure only counts as a method rejection when the server leaves
    /// `method` out of the methods it still accepts.
    pub fn classify(result: &AuthResult, method: MethodKind) -> Self {
        match result {
            AuthResult::Success => AuthOutcome::Accepted,
            AuthResult::Failure {
                remaining_methods, ..
            } if remaining_methods.contains(&method) => AuthOutcome::Denied,
            AuthResult::Failure { .. } => AuthOutcome::MethodRejected,
        }
    }

    /// Fold the outcomes of a chain of attempts for one login.
    ///
    /// Any acceptance wins; any wrong credential on an allowed method makes
    /// the whole login denied; only a chain where every method was refused
    /// outright is a method rejection.
    pub fn combine(outcomes: &[AuthOutcome]) -> Self {
        if outcomes.contains(&AuthOutcome::Accepted) {
            AuthOutcome::Accepted
        } else if outcomes.contains(&AuthOutcome::Denied) {
            AuthOutcome::Denied
        } else {
            AuthOutcome::MethodRejected
        }
    }
}

/// Trait for SSH authentication strategies.
///
/// Each strategy represents one method (password, a single private key, ...)
/// offered to the server for a given username.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Attempt to authenticate with the SSH server.
    ///
    /// Transport errors during the attempt come back as `Err(_)`.
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<AuthOutcome>;

    /// Name used for logging.
    fn name(&self) -> &'static str;
}
