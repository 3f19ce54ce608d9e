//! Netrc credential file.

use std::path::{Path, PathBuf};

use crate::env::Env;
use crate::error::{Error, Result};

/// Lookup of stored credentials by host.
pub trait NetrcFinder: Send + Sync {
    /// Entry for `host` (no port), falling back to the `default` entry.
    fn find_machine(&self, host: &str) -> Option<&Machine>;
}

/// One `machine` (or `default`) entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Machine {
    /// `None` for the `default` entry.
    pub name: Option<String>,
    pub login: String,
    pub password: String,
    pub account: String,
}

/// Parsed netrc file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Netrc {
    machines: Vec<Machine>,
}

impl Netrc {
    /// Load the netrc file from the OS-level environment's `HOME`.
    ///
    /// Missing `HOME` or a missing file yields an empty netrc.
    pub fn load(os_env: &dyn Env) -> Result<Self> {
        let home = match os_env.get("HOME") {
            Some(h) if !h.is_empty() => h,
            _ => return Ok(Self::default()),
        };

        let name = if cfg!(windows) { "_netrc" } else { ".netrc" };
        Self::from_file(&Path::new(&home).join(name))
    }

    /// Parse `path`, or return an empty netrc when it does not exist.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
        };

        let netrc = Self::parse(&content).map_err(|(line, message)| Error::Netrc {
            path: PathBuf::from(path),
            line,
            message,
        })?;
        tracing::debug!(path = %path.display(), machines = netrc.machines.len(), "Loaded netrc");
        Ok(netrc)
    }

    /// Parse netrc text. Errors carry the 1-based line number.
    pub fn parse(content: &str) -> std::result::Result<Self, (usize, String)> {
        let mut machines: Vec<Machine> = Vec::new();
        let mut in_macdef = false;

        let mut tokens = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if in_macdef {
                if line.trim().is_empty() {
                    in_macdef = false;
                }
                continue;
            }

            let line_no = idx + 1;
            let line = match line.find('#') {
                Some(pos) => &line[..pos],
                None => line,
            };
            let words: Vec<&str> = line.split_whitespace().collect();
            // macdef consumes its name, then the rest of the paragraph.
            if let Some(pos) = words.iter().position(|w| *w == "macdef") {
                for w in &words[..pos] {
                    tokens.push((line_no, w.to_string()));
                }
                if words.get(pos + 1).is_none() {
                    return Err((line_no, "missing value for macdef".to_string()));
                }
                in_macdef = true;
                continue;
            }
            tokens.extend(words.into_iter().map(|w| (line_no, w.to_string())));
        }

        let mut iter = tokens.into_iter();
        while let Some((line, token)) = iter.next() {
            match token.as_str() {
                "machine" => {
                    let (_, name) = iter
                        .next()
                        .ok_or((line, "missing value for machine".to_string()))?;
                    machines.push(Machine {
                        name: Some(name.to_lowercase()),
                        ..Default::default()
                    });
                }
                "default" => machines.push(Machine::default()),
                "login" | "password" | "account" => {
                    let current = machines
                        .last_mut()
                        .ok_or((line, format!("{} outside of a machine entry", token)))?;
                    let (_, value) = iter
                        .next()
                        .ok_or((line, format!("missing value for {}", token)))?;
                    match token.as_str() {
                        "login" => current.login = value,
                        "password" => current.password = value,
                        _ => current.account = value,
                    }
                }
                other => return Err((line, format!("unexpected token {:?}", other))),
            }
        }

        Ok(Self { machines })
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }
}

impl NetrcFinder for Netrc {
    fn find_machine(&self, host: &str) -> Option<&Machine> {
        let host = host.to_lowercase();
        self.machines
            .iter()
            .find(|m| m.name.as_deref() == Some(host.as_str()))
            .or_else(|| self.machines.iter().find(|m| m.name.is_none()))
    }
}
