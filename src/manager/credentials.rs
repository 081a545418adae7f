//! Process-wide credential context.
//!
//! Captured once by [`SshManager::initialize`](crate::manager::SshManager::initialize)
//! and immutable afterwards. Default credential pairs come from the environment:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `SSH_ADMIN_LOGIN` | root |
//! | `SSH_ADMIN_PASSWORD` | r00tme |
//! | `SSH_SLAVE_LOGIN` | root |
//! | `SSH_SLAVE_PASSWORD` | r00tme |

use std::env;
use std::fmt;

/// Port every admin connection uses.
pub const ADMIN_PORT: u16 = 22;

/// Login tried on slave hosts after the configured slave login is rejected.
pub const SLAVE_FALLBACK_LOGIN: &str = "root";

pub(crate) const ADMIN_LOGIN_ENV_VAR: &str = "SSH_ADMIN_LOGIN";
pub(crate) const ADMIN_PASSWORD_ENV_VAR: &str = "SSH_ADMIN_PASSWORD";
pub(crate) const SLAVE_LOGIN_ENV_VAR: &str = "SSH_SLAVE_LOGIN";
pub(crate) const SLAVE_PASSWORD_ENV_VAR: &str = "SSH_SLAVE_PASSWORD";

const DEFAULT_LOGIN: &str = "root";
const DEFAULT_PASSWORD: &str = "r00tme";

/// A login/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub login: String,
    pub password: String,
}

impl CredentialPair {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    fn from_env(login_var: &str, password_var: &str) -> Self {
        Self {
            login: env::var(login_var).unwrap_or_else(|_| DEFAULT_LOGIN.to_string()),
            password: env::var(password_var).unwrap_or_else(|_| DEFAULT_PASSWORD.to_string()),
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Admin and slave credential pairs supplied to `initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub admin: CredentialPair,
    pub slave: CredentialPair,
}

impl Credentials {
    pub fn new(admin: CredentialPair, slave: CredentialPair) -> Self {
        Self { admin, slave }
    }

    /// Resolve both pairs from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            admin: CredentialPair::from_env(ADMIN_LOGIN_ENV_VAR, ADMIN_PASSWORD_ENV_VAR),
            slave: CredentialPair::from_env(SLAVE_LOGIN_ENV_VAR, SLAVE_PASSWORD_ENV_VAR),
        }
    }
}

/// Everything the authentication policy needs to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialContext {
    pub admin_ip: String,
    pub admin_port: u16,
    pub admin: CredentialPair,
    pub slave: CredentialPair,
    pub slave_fallback_login: String,
}

impl CredentialContext {
    pub fn new(admin_ip: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            admin_ip: admin_ip.into(),
            admin_port: ADMIN_PORT,
            admin: credentials.admin,
            slave: credentials.slave,
            slave_fallback_login: SLAVE_FALLBACK_LOGIN.to_string(),
        }
    }

    pub fn is_admin(&self, address: &str) -> bool {
        self.admin_ip == address
    }
}
