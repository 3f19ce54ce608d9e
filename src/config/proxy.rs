//! Proxy server resolution and no-proxy matching.

use url::Url;

use crate::env::Env;

/// Proxy settings derived from both environments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyServers {
    pub https: String,
    pub http: String,
    pub no_proxy: String,
}

impl ProxyServers {
    /// Git-level `http.proxy` first, then the conventional OS variables
    /// (upper case before lower case).
    pub fn from_envs(os_env: &dyn Env, git_env: &dyn Env) -> Self {
        let git_proxy = git_env.get("http.proxy").unwrap_or_default();

        let mut https = if git_proxy.starts_with("https://") {
            git_proxy.clone()
        } else {
            String::new()
        };
        if https.is_empty() {
            https = first_set(os_env, &["HTTPS_PROXY", "https_proxy"]);
        }

        let mut http = git_proxy;
        if http.is_empty() {
            http = first_set(os_env, &["HTTP_PROXY", "http_proxy"]);
        }

        let no_proxy = first_set(os_env, &["NO_PROXY", "no_proxy"]);

        Self { https, http, no_proxy }
    }

    /// The proxy to use for `url`, or `None` for a direct connection.
    pub fn proxy_for(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?;
        if NoProxy::parse(&self.no_proxy).matches(host, url.port_or_known_default()) {
            return None;
        }

        let proxy = match url.scheme() {
            "https" if !self.https.is_empty() => &self.https,
            "https" | "http" if !self.http.is_empty() => &self.http,
            _ => return None,
        };

        Some(with_scheme(proxy))
    }
}

fn first_set(env: &dyn Env, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| env.get(k))
        .find(|v| !v.is_empty())
        .unwrap_or_default()
}

fn with_scheme(proxy: &str) -> String {
    if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{}", proxy)
    }
}

/// Parsed `NO_PROXY` list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoProxy {
    all: bool,
    entries: Vec<(String, Option<u16>)>,
}

impl NoProxy {
    /// Parse a comma and/or whitespace separated list.
    pub fn parse(raw: &str) -> Self {
        let mut list = Self::default();
        for token in raw.split(|c: char| c == ',' || c.is_whitespace()) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if token == "*" {
                list.all = true;
                continue;
            }

            let token = token.trim_start_matches('.').to_lowercase();
            let entry = match token.rsplit_once(':') {
                Some((host, port)) => match port.parse() {
                    Ok(p) => (host.to_string(), Some(p)),
                    Err(_) => (token.clone(), None),
                },
                None => (token, None),
            };
            list.entries.push(entry);
        }
        list
    }

    /// Exact or domain-suffix match; an entry with a port must match it too.
    pub fn matches(&self, host: &str, port: Option<u16>) -> bool {
        if self.all {
            return true;
        }

        let host = host.to_lowercase();
        self.entries.iter().any(|(name, entry_port)| {
            if entry_port.is_some() && *entry_port != port {
                return false;
            }
            host == *name || host.ends_with(&format!(".{}", name))
        })
    }
}
