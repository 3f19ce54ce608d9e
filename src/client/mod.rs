//! The LFS API client.
//!
//! # Responsibilities
//! - Resolve configuration from the OS-level and git-level environments
//! - Own the per-host HTTP client and NTLM session caches
//! - Own the transfer tracker
//! - Execute authenticated requests (see `request.rs`)
//!
//! # Data Flow
//! ```text
//! Client::new(os_env, git_env)
//!     → Netrc::load (only failure path)
//!     → resolve_config
//!
//! Client::execute(request)
//!     → http_client(url)        (built once per host)
//!     → auth (basic / NTLM via ntlm_session(url))
//!     → Response
//!
//! caller → track_response(bucket, &res) … release_transfer(id)
//! ```

mod request;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use url::Url;

use crate::auth::{CommandCredentialHelper, CredentialHelper, Creds, Netrc, NetrcFinder, NtlmSession};
use crate::config::{resolve_config, ClientConfig};
use crate::endpoint::{EndpointFinder, GitEndpointFinder};
use crate::env::{Env, MapEnv};
use crate::error::Result;
use crate::http::{host_key, HostCache, HttpTransfer, Response, ResponseId, TransferTracker, TransportBuilder};

/// Per-host authenticated HTTP client manager.
pub struct Client {
    endpoints: Arc<dyn EndpointFinder>,
    credentials: Arc<dyn CredentialHelper>,
    netrc: Arc<dyn NetrcFinder>,

    config: ClientConfig,

    host_clients: HostCache<reqwest::Client>,
    ntlm_sessions: HostCache<NtlmSession>,
    transfers: TransferTracker<HttpTransfer>,

    os_env: Arc<dyn Env>,
    git_env: Arc<dyn Env>,
}

impl Client {
    /// Build a client from the two environment sources.
    ///
    /// A missing source is replaced with an empty one. Fails only when the
    /// netrc file exists and is malformed.
    pub fn new(os_env: Option<Arc<dyn Env>>, git_env: Option<Arc<dyn Env>>) -> Result<Self> {
        let os_env = os_env.unwrap_or_else(|| Arc::new(MapEnv::new()));
        let git_env = git_env.unwrap_or_else(|| Arc::new(MapEnv::new()));

        let netrc = Netrc::load(os_env.as_ref())?;
        let config = resolve_config(os_env.as_ref(), git_env.as_ref());

        Ok(Self {
            endpoints: Arc::new(GitEndpointFinder::new(git_env.as_ref())),
            credentials: Arc::new(CommandCredentialHelper::new(config.skip_prompt)),
            netrc: Arc::new(netrc),
            config,
            host_clients: HostCache::new("http_clients"),
            ntlm_sessions: HostCache::new("ntlm_sessions"),
            transfers: TransferTracker::new(),
            os_env,
            git_env,
        })
    }

    /// Replace the credential helper.
    pub fn with_credentials(mut self, helper: Arc<dyn CredentialHelper>) -> Self {
        self.credentials = helper;
        self
    }

    /// Replace the netrc lookup.
    pub fn with_netrc(mut self, netrc: Arc<dyn NetrcFinder>) -> Self {
        self.netrc = netrc;
        self
    }

    /// Replace the endpoint finder.
    pub fn with_endpoints(mut self, endpoints: Arc<dyn EndpointFinder>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &dyn EndpointFinder {
        self.endpoints.as_ref()
    }

    pub fn os_env(&self) -> &dyn Env {
        self.os_env.as_ref()
    }

    pub fn git_env(&self) -> &dyn Env {
        self.git_env.as_ref()
    }

    /// The configured HTTP client for the host of `url`, built on first use.
    pub fn http_client(&self, url: &Url) -> Result<Arc<reqwest::Client>> {
        self.host_clients.get_or_try_insert_with(&host_key(url), || {
            TransportBuilder {
                config: &self.config,
                os_env: self.os_env.as_ref(),
                git_env: self.git_env.as_ref(),
            }
            .build(url)
        })
    }

    /// The NTLM session for the host of `url`, created from `creds` on first use.
    ///
    /// Later calls return the existing session and ignore `creds`.
    pub fn ntlm_session(&self, url: &Url, creds: &Creds) -> Arc<NtlmSession> {
        self.ntlm_sessions.get_or_insert_with(&host_key(url), || {
            NtlmSession::new(
                creds.username().unwrap_or_default(),
                creds.password().unwrap_or_default(),
            )
        })
    }

    /// Existing NTLM session for the host of `url`.
    pub fn cached_ntlm_session(&self, url: &Url) -> Option<Arc<NtlmSession>> {
        self.ntlm_sessions.get(&host_key(url))
    }

    /// The transfer tracker.
    pub fn transfers(&self) -> &TransferTracker<HttpTransfer> {
        &self.transfers
    }

    /// Register `res` in `bucket`. Returns the handle used to release it.
    pub fn track_response(
        &self,
        bucket: &str,
        res: &Response,
        started: Instant,
        request_size: Option<u64>,
    ) -> ResponseId {
        let id = ResponseId::new();
        self.transfers
            .track(bucket, id, HttpTransfer::from_response(res, started, request_size));
        id
    }

    /// Transfer registered for `id`.
    pub fn transfer(&self, id: ResponseId) -> Option<Arc<HttpTransfer>> {
        self.transfers.get(id)
    }

    /// Release a tracked response; logs its stats when `GIT_LOG_STATS` is on.
    pub fn release_transfer(&self, id: ResponseId) -> Option<Arc<HttpTransfer>> {
        let transfer = self.transfers.release(id)?;
        if self.config.logging_stats {
            tracing::info!(
                id = %id,
                method = %transfer.method,
                url = %transfer.url,
                status = transfer.status,
                request_bytes = transfer.request_size.unwrap_or(0),
                response_bytes = transfer.response_size.unwrap_or(0),
                duration_ms = transfer.duration().as_millis() as u64,
                "Transfer complete"
            );
        }
        Some(transfer)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("host_clients", &self.host_clients.len())
            .field("ntlm_sessions", &self.ntlm_sessions.len())
            .field("transfers", &self.transfers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Arc<dyn Env> {
        Arc::new(pairs.iter().map(|(k, v)| (*k, *v)).collect::<MapEnv>())
    }

    #[test]
    fn test_new_without_sources() {
        let client = Client::new(None, None).unwrap();
        assert_eq!(client.config(), &ClientConfig::default());
        assert!(client.os_env().all().is_empty());
        assert!(client.git_env().all().is_empty());
    }

    #[test]
    fn test_new_reads_both_sources() {
        let os = env(&[("GIT_TERMINAL_PROMPT", "false"), ("HTTPS_PROXY", "https://p")]);
        let git = env(&[("lfs.concurrenttransfers", "5"), ("http.sslverify", "false")]);
        let client = Client::new(Some(os), Some(git)).unwrap();

        assert_eq!(client.config().concurrent_transfers, 5);
        assert!(client.config().skip_ssl_verify);
        assert!(client.config().skip_prompt);
        assert_eq!(client.config().https_proxy, "https://p");
    }

    #[test]
    fn test_new_fails_on_malformed_netrc() {
        let dir = tempfile::tempdir().unwrap();
        let name = if cfg!(windows) { "_netrc" } else { ".netrc" };
        let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
        writeln!(f, "machine example.com password").unwrap();

        let os = env(&[("HOME", dir.path().to_str().unwrap())]);
        let err = Client::new(Some(os), None).unwrap_err();
        assert!(matches!(err, Error::Netrc { .. }));
    }

    #[test]
    fn test_http_client_cached_per_host() {
        let client = Client::new(None, None).unwrap();
        let a = client.http_client(&Url::parse("https://Example.com/a").unwrap()).unwrap();
        let b = client.http_client(&Url::parse("https://example.com/b?x=1").unwrap()).unwrap();
        let c = client.http_client(&Url::parse("https://other.com/").unwrap()).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_ntlm_session_created_once() {
        let client = Client::new(None, None).unwrap();
        let url = Url::parse("https://ntlm.example.com/repo").unwrap();
        assert!(client.cached_ntlm_session(&url).is_none());

        let first = client.ntlm_session(&url, &Creds::default().with_user("CORP\\alice", "pw"));
        let second = client.ntlm_session(&url, &Creds::default().with_user("bob", "other"));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.username(), "alice");
        assert!(client.cached_ntlm_session(&url).is_some());
    }

    #[test]
    fn test_host_client_shared_across_schemes_uses_host_bundle() {
        let git = env(&[("http.https://h.test/.sslcainfo", "/definitely/missing.pem")]);
        let client = Client::new(None, Some(git)).unwrap();

        let http = Url::parse("http://h.test/info/lfs").unwrap();
        let https = Url::parse("https://h.test/info/lfs").unwrap();
        assert!(matches!(client.http_client(&http), Err(Error::Io(_))));
        assert!(matches!(client.http_client(&https), Err(Error::Io(_))));
        assert!(client.host_clients.is_empty());
    }
}
