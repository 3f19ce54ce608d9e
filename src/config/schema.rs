//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Dial timeout used when `lfs.dialtimeout` is unset or non-positive.
pub const DEFAULT_DIAL_TIMEOUT_SECS: u64 = 30;
/// TCP keepalive used when `lfs.keepalive` is unset or non-positive.
pub const DEFAULT_KEEPALIVE_SECS: u64 = 1800;
/// TLS handshake timeout used when `lfs.tlstimeout` is unset or non-positive.
pub const DEFAULT_TLS_TIMEOUT_SECS: u64 = 30;

/// Settings resolved from the OS-level and git-level environments.
///
/// Numeric fields keep the raw configured value; 0 means "use the default".
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// `lfs.dialtimeout`, in seconds.
    pub dial_timeout: i64,

    /// `lfs.keepalive`, in seconds.
    pub keepalive_timeout: i64,

    /// `lfs.tlstimeout`, in seconds.
    pub tls_timeout: i64,

    /// `lfs.concurrenttransfers`.
    pub concurrent_transfers: i64,

    pub https_proxy: String,
    pub http_proxy: String,
    pub no_proxy: String,

    /// Accept invalid certificates.
    pub skip_ssl_verify: bool,

    /// `GIT_CURL_VERBOSE`.
    pub verbose: bool,

    /// `LFS_DEBUG_HTTP`.
    pub debugging_verbose: bool,

    /// `GIT_LOG_STATS`.
    pub logging_stats: bool,

    /// Credential helper must not prompt on the terminal.
    pub skip_prompt: bool,
}

impl ClientConfig {
    pub fn dial_timeout(&self) -> Duration {
        or_default(self.dial_timeout, DEFAULT_DIAL_TIMEOUT_SECS)
    }

    pub fn keepalive(&self) -> Duration {
        or_default(self.keepalive_timeout, DEFAULT_KEEPALIVE_SECS)
    }

    pub fn tls_timeout(&self) -> Duration {
        or_default(self.tls_timeout, DEFAULT_TLS_TIMEOUT_SECS)
    }
}

fn or_default(secs: i64, default: u64) -> Duration {
    match u64::try_from(secs) {
        Ok(s) if s > 0 => Duration::from_secs(s),
        _ => Duration::from_secs(default),
    }
}
