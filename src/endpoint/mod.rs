//! Endpoint discovery and access modes.
//!
//! # Responsibilities
//! - Resolve a remote name to the LFS API URL
//! - Report which authentication mode an endpoint uses
//! - Remember access upgrades (e.g. a server demanding NTLM) for the process

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::env::Env;

/// How requests to an endpoint authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    #[default]
    None,
    Basic,
    Ntlm,
}

impl Access {
    /// Parse a `lfs.<url>.access` value. Unknown values mean `None`.
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "basic" | "private" => Access::Basic,
            "ntlm" => Access::Ntlm,
            _ => Access::None,
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::None => write!(f, "none"),
            Access::Basic => write!(f, "basic"),
            Access::Ntlm => write!(f, "ntlm"),
        }
    }
}

/// A resolved LFS API location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub url: String,
}

/// Resolves remotes to endpoints and tracks access modes.
pub trait EndpointFinder: Send + Sync {
    /// Endpoint for `operation` ("upload"/"download") against `remote`.
    fn endpoint(&self, operation: &str, remote: &str) -> Endpoint;

    /// Access mode for an endpoint URL.
    fn access_for(&self, url: &str) -> Access;

    /// Record an access mode for the lifetime of the process.
    fn set_access(&self, url: &str, access: Access);
}

/// Endpoint finder backed by git configuration.
#[derive(Debug)]
pub struct GitEndpointFinder {
    urls: HashMap<String, String>,
    access: Mutex<HashMap<String, Access>>,
}

impl GitEndpointFinder {
    /// Snapshot the relevant keys of `git_env`.
    pub fn new(git_env: &dyn Env) -> Self {
        let mut urls = HashMap::new();
        let mut access = HashMap::new();

        for (key, value) in git_env.all() {
            if key == "lfs.url" || key.starts_with("remote.") {
                urls.insert(key, value);
            } else if let Some(url) = key
                .strip_prefix("lfs.")
                .and_then(|k| k.strip_suffix(".access"))
            {
                access.insert(url.trim_end_matches('/').to_string(), Access::parse(&value));
            }
        }

        Self {
            urls,
            access: Mutex::new(access),
        }
    }
}

impl EndpointFinder for GitEndpointFinder {
    fn endpoint(&self, operation: &str, remote: &str) -> Endpoint {
        // `lfs.<operation>url` lets push and fetch target different servers.
        let op_key = format!("remote.{}.lfs{}url", remote, operation);
        let url = self
            .urls
            .get("lfs.url")
            .or_else(|| self.urls.get(&op_key))
            .or_else(|| self.urls.get(&format!("remote.{}.lfsurl", remote)))
            .cloned()
            .or_else(|| {
                self.urls
                    .get(&format!("remote.{}.url", remote))
                    .map(|u| lfs_url_from_git_url(u))
            })
            .unwrap_or_default();

        Endpoint { url }
    }

    /// Longest configured URL that prefixes `url` wins.
    fn access_for(&self, url: &str) -> Access {
        let url = url.trim_end_matches('/');
        let Ok(modes) = self.access.lock() else {
            return Access::None;
        };
        modes
            .iter()
            .filter(|(prefix, _)| {
                url.strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, access)| *access)
            .unwrap_or_default()
    }

    fn set_access(&self, url: &str, access: Access) {
        if let Ok(mut m) = self.access.lock() {
            tracing::debug!(%access, "Recording endpoint access mode");
            m.insert(url.trim_end_matches('/').to_string(), access);
        }
    }
}

/// Derive the LFS API URL from a git remote URL.
pub fn lfs_url_from_git_url(raw: &str) -> String {
    let https = if raw.contains("://") {
        match raw.strip_prefix("ssh://") {
            Some(rest) => format!("https://{}", strip_user(rest)),
            None => raw.to_string(),
        }
    } else if let Some((host, path)) = raw.split_once(':') {
        // scp-style `user@host:path`
        format!("https://{}/{}", strip_user(host), path.trim_start_matches('/'))
    } else {
        raw.to_string()
    };

    let trimmed = https.trim_end_matches('/');
    if trimmed.ends_with(".git") {
        format!("{}/info/lfs", trimmed)
    } else {
        format!("{}.git/info/lfs", trimmed)
    }
}

fn strip_user(s: &str) -> &str {
    match s.split_once('@') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => s,
    }
}
