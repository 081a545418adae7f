//! Cached, self-healing SSH sessions for test harnesses that drive one admin
//! node and many slave nodes.
//!
//! ```no_run
//! use ssh_manager::manager::{Credentials, ExecOptions, ManagerSettings, SshManager};
//!
//! # async fn run() -> ssh_manager::manager::Result<()> {
//! let manager = SshManager::russh(ManagerSettings::from_env());
//! manager.initialize("10.109.0.2", Credentials::from_env())?;
//!
//! let result = manager
//!     .execute_checked("10.109.0.3", "fuel2 env list -f json", 22, &ExecOptions::new().json())
//!     .await?;
//! println!("{:?}", result.decoded);
//! # Ok(())
//! # }
//! ```

pub mod manager;
