//! Credential helpers.
//!
//! # Responsibilities
//! - Describe a credential request/response (`Creds`)
//! - Fetch credentials from `git credential` or a fixed table
//! - Report back whether fetched credentials worked

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::process::{Command, Stdio};

use url::Url;

use crate::error::{Error, Result};

/// Credential attributes in the `git credential` line protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Creds(BTreeMap<String, String>);

impl Creds {
    /// Request describing `url`: protocol, host (with port) and path.
    pub fn for_url(url: &Url) -> Self {
        let mut creds = Self::default();
        creds.set("protocol", url.scheme());
        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{}:{}", h, p),
            (Some(h), None) => h.to_string(),
            _ => String::new(),
        };
        creds.set("host", host);
        let path = url.path().trim_start_matches('/');
        if !path.is_empty() {
            creds.set("path", path);
        }
        creds
    }

    pub fn with_user(mut self, username: &str, password: &str) -> Self {
        self.set("username", username);
        self.set("password", password);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn username(&self) -> Option<&str> {
        self.get("username")
    }

    pub fn password(&self) -> Option<&str> {
        self.get("password")
    }

    /// Both username and password are present.
    pub fn is_complete(&self) -> bool {
        self.username().is_some() && self.password().is_some()
    }

    /// `key=value` lines terminated by a blank line.
    pub fn to_protocol(&self) -> String {
        let mut out = String::new();
        for (k, v) in &self.0 {
            out.push_str(k);
            out.push('=');
            out.push_str(v);
            out.push('\n');
        }
        out.push('\n');
        out
    }

    /// Parse helper output; unknown lines are ignored.
    pub fn from_protocol(raw: &str) -> Self {
        let mut creds = Self::default();
        for line in raw.lines() {
            if line.is_empty() {
                break;
            }
            if let Some((k, v)) = line.split_once('=') {
                creds.set(k, v);
            }
        }
        creds
    }
}

/// Source of credentials for a URL.
pub trait CredentialHelper: Send + Sync {
    /// Complete `request` with a username and password.
    fn fill(&self, request: &Creds) -> Result<Creds>;

    /// The credentials worked.
    fn approve(&self, creds: &Creds) -> Result<()>;

    /// The credentials were refused.
    fn reject(&self, creds: &Creds) -> Result<()>;
}

/// Runs `git credential <op>`.
#[derive(Debug, Clone, Default)]
pub struct CommandCredentialHelper {
    /// Do not let git prompt on the terminal.
    pub skip_prompt: bool,
}

impl CommandCredentialHelper {
    pub fn new(skip_prompt: bool) -> Self {
        Self { skip_prompt }
    }

    fn exec(&self, op: &str, input: &Creds) -> Result<String> {
        let mut cmd = Command::new("git");
        cmd.args(["credential", op])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if self.skip_prompt {
            cmd.env("GIT_TERMINAL_PROMPT", "0");
        }

        let mut child = cmd.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.to_protocol().as_bytes())?;
        }
        let output = child.wait_with_output()?;

        if !output.status.success() {
            return Err(Error::Credentials(format!(
                "git credential {} failed: {}",
                op, output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl CredentialHelper for CommandCredentialHelper {
    fn fill(&self, request: &Creds) -> Result<Creds> {
        let creds = Creds::from_protocol(&self.exec("fill", request)?);
        if !creds.is_complete() {
            return Err(Error::Credentials(format!(
                "no credentials for {}",
                request.get("host").unwrap_or_default()
            )));
        }
        Ok(creds)
    }

    fn approve(&self, creds: &Creds) -> Result<()> {
        self.exec("approve", creds).map(|_| ())
    }

    fn reject(&self, creds: &Creds) -> Result<()> {
        self.exec("reject", creds).map(|_| ())
    }
}

/// Fixed credentials keyed by host. Approve/reject are no-ops.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialHelper {
    by_host: HashMap<String, (String, String)>,
}

impl StaticCredentialHelper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, host: &str, username: &str, password: &str) -> Self {
        self.by_host.insert(
            host.to_lowercase(),
            (username.to_string(), password.to_string()),
        );
        self
    }
}

impl CredentialHelper for StaticCredentialHelper {
    fn fill(&self, request: &Creds) -> Result<Creds> {
        let host = request.get("host").unwrap_or_default().to_lowercase();
        match self.by_host.get(&host) {
            Some((user, pass)) => Ok(request.clone().with_user(user, pass)),
            None => Err(Error::Credentials(format!("no credentials for {}", host))),
        }
    }

    fn approve(&self, _creds: &Creds) -> Result<()> {
        Ok(())
    }

    fn reject(&self, _creds: &Creds) -> Result<()> {
        Ok(())
    }
}
