//! Authentication for new SSH sessions.
//!
//! Two layers live here:
//!
//! - Per-connection strategies ([`PasswordAuth`], [`KeyAuth`]) combined by an
//!   [`AuthChain`], used by the russh transport while opening a session.
//! - The [`AuthPolicy`], which decides *which* login, password and key
//!   material a new cache entry gets (admin vs. slave, with a fallback login).

mod chain;
mod key;
mod password;
mod policy;
mod traits;

pub use chain::AuthChain;
pub use key::{KeyAuth, parse_private_key};
pub use password::PasswordAuth;
pub use policy::{ADMIN_KEY_PATH, AuthPolicy};
pub use traits::{AuthOutcome, AuthStrategy};
