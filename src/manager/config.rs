//! Configuration resolution for the SSH manager.
//!
//! Every tunable follows a three-tier priority system:
//!
//! 1. **Parameter** - Explicitly provided value (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SSH_CONNECT_TIMEOUT` | 30s | Connection timeout in seconds |
//! | `SSH_COMMAND_TIMEOUT` | 180s | Command execution timeout in seconds |
//! | `SSH_MAX_RETRIES` | 3 | Maximum connection retry attempts |
//! | `SSH_RETRY_DELAY_MS` | 1000ms | Initial retry delay in milliseconds |
//! | `SSH_COMPRESSION` | true | Enable zlib compression |
//! | `SSH_LIVENESS_TIMEOUT` | 20s | Ceiling for the reuse liveness probe |
//! | `SSH_LIVENESS_INTERVAL_MS` | 1000ms | Delay between liveness probe attempts |

use std::env;
use std::time::Duration;

/// Default SSH connection timeout in seconds
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default SSH command execution timeout in seconds
pub(crate) const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 180;

/// Default maximum retry attempts for SSH connection
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default retry delay in milliseconds
pub(crate) const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Default ceiling for the liveness probe run before reusing a cached session
pub(crate) const DEFAULT_LIVENESS_TIMEOUT_SECS: u64 = 20;

/// Default pause between liveness probe attempts in milliseconds
pub(crate) const DEFAULT_LIVENESS_INTERVAL_MS: u64 = 1000;

/// Maximum retry delay cap
pub(crate) const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "SSH_CONNECT_TIMEOUT";
pub(crate) const COMMAND_TIMEOUT_ENV_VAR: &str = "SSH_COMMAND_TIMEOUT";
pub(crate) const MAX_RETRIES_ENV_VAR: &str = "SSH_MAX_RETRIES";
pub(crate) const RETRY_DELAY_MS_ENV_VAR: &str = "SSH_RETRY_DELAY_MS";
pub(crate) const COMPRESSION_ENV_VAR: &str = "SSH_COMPRESSION";
pub(crate) const LIVENESS_TIMEOUT_ENV_VAR: &str = "SSH_LIVENESS_TIMEOUT";
pub(crate) const LIVENESS_INTERVAL_MS_ENV_VAR: &str = "SSH_LIVENESS_INTERVAL_MS";

/// Parse an environment variable, ignoring unset or malformed values.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

/// Resolve the connection timeout value with priority: parameter -> env var -> default
pub(crate) fn resolve_connect_timeout(timeout_param: Option<u64>) -> u64 {
    timeout_param
        .or_else(|| env_parse(CONNECT_TIMEOUT_ENV_VAR))
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
}

/// Resolve the command execution timeout value with priority: parameter -> env var -> default
pub(crate) fn resolve_command_timeout(timeout_param: Option<u64>) -> u64 {
    timeout_param
        .or_else(|| env_parse(COMMAND_TIMEOUT_ENV_VAR))
        .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS)
}

/// Resolve the max retries value with priority: parameter -> env var -> default
pub(crate) fn resolve_max_retries(max_retries_param: Option<u32>) -> u32 {
    max_retries_param
        .or_else(|| env_parse(MAX_RETRIES_ENV_VAR))
        .unwrap_or(DEFAULT_MAX_RETRIES)
}

/// Resolve the retry delay value with priority: parameter -> env var -> default
pub(crate) fn resolve_retry_delay_ms(retry_delay_param: Option<u64>) -> u64 {
    retry_delay_param
        .or_else(|| env_parse(RETRY_DELAY_MS_ENV_VAR))
        .unwrap_or(DEFAULT_RETRY_DELAY_MS)
}

/// Resolve the compression setting with priority: parameter -> env var -> default (true)
pub(crate) fn resolve_compression(compress_param: Option<bool>) -> bool {
    if let Some(compress) = compress_param {
        return compress;
    }

    if let Ok(env_compress) = env::var(COMPRESSION_ENV_VAR) {
        return env_compress.eq_ignore_ascii_case("true") || env_compress == "1";
    }

    true
}

/// Resolve the liveness probe ceiling with priority: parameter -> env var -> default
pub(crate) fn resolve_liveness_timeout(timeout_param: Option<u64>) -> u64 {
    timeout_param
        .or_else(|| env_parse(LIVENESS_TIMEOUT_ENV_VAR))
        .unwrap_or(DEFAULT_LIVENESS_TIMEOUT_SECS)
}

/// Resolve the liveness probe interval with priority: parameter -> env var -> default
pub(crate) fn resolve_liveness_interval_ms(interval_param: Option<u64>) -> u64 {
    interval_param
        .or_else(|| env_parse(LIVENESS_INTERVAL_MS_ENV_VAR))
        .unwrap_or(DEFAULT_LIVENESS_INTERVAL_MS)
}

/// Resolved tunables shared by the connection cache and the russh transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub compression: bool,
    /// Wall-clock ceiling for the probe run before a cached session is reused.
    pub liveness_timeout: Duration,
    pub liveness_interval: Duration,
}

impl ManagerSettings {
    /// Resolve every setting from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            connect_timeout: Duration::from_secs(resolve_connect_timeout(None)),
            command_timeout: Duration::from_secs(resolve_command_timeout(None)),
            max_retries: resolve_max_retries(None),
            retry_delay: Duration::from_millis(resolve_retry_delay_ms(None)),
            compression: resolve_compression(None),
            liveness_timeout: Duration::from_secs(resolve_liveness_timeout(None)),
            liveness_interval: Duration::from_millis(resolve_liveness_interval_ms(None)),
        }
    }

    pub fn with_liveness(mut self, timeout: Duration, interval: Duration) -> Self {
        self.liveness_timeout = timeout;
        self.liveness_interval = interval;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Number of probe attempts that fit inside the liveness ceiling.
    pub(crate) fn liveness_attempts(&self) -> usize {
        let interval = self.liveness_interval.as_millis().max(1);
        (self.liveness_timeout.as_millis() / interval).max(1) as usize
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            compression: true,
            liveness_timeout: Duration::from_secs(DEFAULT_LIVENESS_TIMEOUT_SECS),
            liveness_interval: Duration::from_millis(DEFAULT_LIVENESS_INTERVAL_MS),
        }
    }
}
