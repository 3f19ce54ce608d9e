//! Per-host HTTP client construction.
//!
//! # Responsibilities
//! - Apply proxy selection (respecting the no-proxy list)
//! - Add per-host CA bundles from git or OS configuration
//! - Apply SSL verification and the dial/keepalive/TLS timeouts

use std::io::BufReader;
use std::path::{Path, PathBuf};

use reqwest::{Certificate, Client, Proxy};
use url::Url;

use crate::config::{ClientConfig, ProxyServers};
use crate::env::Env;
use crate::error::{Error, Result};
use crate::http::cache::host_key;

/// Everything needed to build a client for one host.
pub struct TransportBuilder<'a> {
    pub config: &'a ClientConfig,
    pub os_env: &'a dyn Env,
    pub git_env: &'a dyn Env,
}

impl TransportBuilder<'_> {
    /// Build a configured client for the host of `url`.
    pub fn build(&self, url: &Url) -> Result<Client> {
        let config = self.config;

        // The connect timeout covers the TCP dial and the TLS handshake.
        let mut builder = Client::builder()
            .connect_timeout(config.dial_timeout() + config.tls_timeout())
            .tcp_keepalive(config.keepalive())
            .danger_accept_invalid_certs(config.skip_ssl_verify)
            .connection_verbose(config.verbose || config.debugging_verbose);

        // One client serves every scheme and port on its host, so the proxy
        // is chosen per request.
        let proxies = ProxyServers {
            https: config.https_proxy.clone(),
            http: config.http_proxy.clone(),
            no_proxy: config.no_proxy.clone(),
        };
        if proxies.https.is_empty() && proxies.http.is_empty() {
            builder = builder.no_proxy();
        } else {
            tracing::debug!(host = ?url.host_str(), "Resolving proxy per request");
            builder = builder.proxy(Proxy::custom(move |target| proxies.proxy_for(target)));
        }

        if let Some(path) = self.ca_bundle_for(url) {
            for cert in load_ca_bundle(&path, url)? {
                builder = builder.add_root_certificate(cert);
            }
        }

        Ok(builder.build()?)
    }

    /// Git `http.https://<host>/.sslcainfo`, then `http.sslcainfo`, then
    /// OS `GIT_SSL_CAINFO`. The lookup ignores the scheme of `url` so every
    /// URL sharing a cached client resolves the same bundle.
    fn ca_bundle_for(&self, url: &Url) -> Option<PathBuf> {
        let authority = host_key(url);
        if authority.is_empty() {
            return None;
        }
        let per_host = format!("http.https://{}/.sslcainfo", authority);

        self.git_env
            .get(&per_host)
            .or_else(|| self.git_env.get("http.sslcainfo"))
            .or_else(|| self.os_env.get("GIT_SSL_CAINFO"))
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

fn load_ca_bundle(path: &Path, url: &Url) -> Result<Vec<Certificate>> {
    let host = url.host_str().unwrap_or_default().to_string();
    let file = std::fs::File::open(path)?;

    let mut certs = Vec::new();
    for der in rustls_pemfile::certs(&mut BufReader::new(file)) {
        let der = der?;
        let cert = Certificate::from_der(&der).map_err(|e| Error::Certificate {
            host: host.clone(),
            message: e.to_string(),
        })?;
        certs.push(cert);
    }

    if certs.is_empty() {
        return Err(Error::Certificate {
            host,
            message: format!("no certificates in {}", path.display()),
        });
    }
    tracing::debug!(host = %host, count = certs.len(), "Loaded custom CA bundle");
    Ok(certs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;

    fn env(pairs: &[(&str, &str)]) -> MapEnv {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_ca_bundle_precedence() {
        let config = ClientConfig::default();
        let os = env(&[("GIT_SSL_CAINFO", "/os/ca.pem")]);
        let git = env(&[
            ("http.https://git.example.com/.sslcainfo", "/host/ca.pem"),
            ("http.sslcainfo", "/global/ca.pem"),
        ]);
        let builder = TransportBuilder {
            config: &config,
            os_env: &os,
            git_env: &git,
        };

        let host = Url::parse("https://git.example.com/repo").unwrap();
        let other = Url::parse("https://other.example.com/repo").unwrap();
        assert_eq!(builder.ca_bundle_for(&host), Some(PathBuf::from("/host/ca.pem")));
        assert_eq!(builder.ca_bundle_for(&other), Some(PathBuf::from("/global/ca.pem")));

        let empty = MapEnv::new();
        let os_only = TransportBuilder {
            config: &config,
            os_env: &os,
            git_env: &empty,
        };
        assert_eq!(os_only.ca_bundle_for(&other), Some(PathBuf::from("/os/ca.pem")));
    }

    #[test]
    fn test_build_plain_client() {
        let config = ClientConfig {
            http_proxy: "proxy.local:3128".into(),
            skip_ssl_verify: true,
            ..Default::default()
        };
        let empty = MapEnv::new();
        let builder = TransportBuilder {
            config: &config,
            os_env: &empty,
            git_env: &empty,
        };
        let url = Url::parse("https://example.com/").unwrap();
        assert!(builder.build(&url).is_ok());
    }

    #[test]
    fn test_missing_ca_bundle_fails() {
        let config = ClientConfig::default();
        let empty = MapEnv::new();
        let git = env(&[("http.sslcainfo", "/definitely/not/here.pem")]);
        let builder = TransportBuilder {
            config: &config,
            os_env: &empty,
            git_env: &git,
        };
        let url = Url::parse("https://example.com/").unwrap();
        assert!(matches!(builder.build(&url), Err(Error::Io(_))));
    }

    #[test]
    fn test_empty_ca_bundle_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pem");
        std::fs::write(&path, "not a certificate\n").unwrap();

        let config = ClientConfig::default();
        let empty = MapEnv::new();
        let git = env(&[("http.sslcainfo", path.to_str().unwrap())]);
        let builder = TransportBuilder {
            config: &config,
            os_env: &empty,
            git_env: &git,
        };
        let url = Url::parse("https://example.com/").unwrap();
        assert!(matches!(builder.build(&url), Err(Error::Certificate { .. })));
    }

    #[test]
    fn test_ca_bundle_ignores_url_scheme() {
        let config = ClientConfig::default();
        let empty = MapEnv::new();
        let git = env(&[("http.https://git.example.com:8443/.sslcainfo", "/host/ca.pem")]);
        let builder = TransportBuilder {
            config: &config,
            os_env: &empty,
            git_env: &git,
        };

        let http = Url::parse("http://git.example.com:8443/repo").unwrap();
        let https = Url::parse("https://git.example.com:8443/repo").unwrap();
        assert_eq!(builder.ca_bundle_for(&http), Some(PathBuf::from("/host/ca.pem")));
        assert_eq!(builder.ca_bundle_for(&https), Some(PathBuf::from("/host/ca.pem")));
        assert!(matches!(builder.build(&http), Err(Error::Io(_))));
    }

    #[test]
    fn test_build_with_both_proxies() {
        let config = ClientConfig {
            https_proxy: "https://secure-proxy.local:8443".into(),
            http_proxy: "proxy.local:3128".into(),
            no_proxy: "internal.example.com".into(),
            ..Default::default()
        };
        let empty = MapEnv::new();
        let builder = TransportBuilder {
            config: &config,
            os_env: &empty,
            git_env: &empty,
        };
        let url = Url::parse("http://internal.example.com/").unwrap();
        assert!(builder.build(&url).is_ok());
    }
}
