//! Configuration resolution from the two environment sources.

use crate::config::proxy::ProxyServers;
use crate::config::schema::ClientConfig;
use crate::env::Env;

/// Resolve every client setting.
///
/// Numeric settings come from git-level keys. SSL verification is skipped
/// when git's `http.sslverify` is explicitly false or the OS-level
/// `GIT_SSL_NO_VERIFY` is true. Verbosity flags are OS-level only.
pub fn resolve_config(os_env: &dyn Env, git_env: &dyn Env) -> ClientConfig {
    let proxies = ProxyServers::from_envs(os_env, git_env);

    let config = ClientConfig {
        dial_timeout: git_env.int("lfs.dialtimeout", 0),
        keepalive_timeout: git_env.int("lfs.keepalive", 0),
        tls_timeout: git_env.int("lfs.tlstimeout", 0),
        concurrent_transfers: git_env.int("lfs.concurrenttransfers", 0),
        https_proxy: proxies.https,
        http_proxy: proxies.http,
        no_proxy: proxies.no_proxy,
        skip_ssl_verify: !git_env.bool("http.sslverify", true)
            || os_env.bool("GIT_SSL_NO_VERIFY", false),
        verbose: os_env.bool("GIT_CURL_VERBOSE", false),
        debugging_verbose: os_env.bool("LFS_DEBUG_HTTP", false),
        logging_stats: os_env.bool("GIT_LOG_STATS", false),
        skip_prompt: !os_env.bool("GIT_TERMINAL_PROMPT", true),
    };

    tracing::debug!(
        concurrent_transfers = config.concurrent_transfers,
        skip_ssl_verify = config.skip_ssl_verify,
        has_https_proxy = !config.https_proxy.is_empty(),
        has_http_proxy = !config.http_proxy.is_empty(),
        "Client configuration resolved"
    );

    config
}
