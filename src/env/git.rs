//! Git-level configuration loaded from `git config`.

use std::process::Command;

use crate::env::source::MapEnv;

/// Load the effective git configuration for the current directory.
///
/// A missing `git` binary or a failing command yields an empty environment.
pub fn load_git_env() -> MapEnv {
    let output = match Command::new("git").args(["config", "-l", "-z"]).output() {
        Ok(out) if out.status.success() => out.stdout,
        Ok(out) => {
            tracing::debug!(status = %out.status, "git config exited unsuccessfully");
            return MapEnv::new();
        }
        Err(e) => {
            tracing::debug!(error = %e, "git config unavailable");
            return MapEnv::new();
        }
    };

    parse_config_z(&String::from_utf8_lossy(&output))
}

/// Parse `git config -l -z` output: NUL-terminated entries, key and value
/// separated by the first newline. Later entries override earlier ones.
pub fn parse_config_z(raw: &str) -> MapEnv {
    raw.split('\0')
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('\n') {
            Some((key, value)) => (normalize_key(key), value.to_string()),
            // A bare key is a boolean set to true.
            None => (normalize_key(entry), "true".to_string()),
        })
        .collect()
}

/// Section and variable names are case-insensitive; subsections are not.
fn normalize_key(key: &str) -> String {
    let first = key.find('.');
    let last = key.rfind('.');
    match (first, last) {
        (Some(f), Some(l)) if f != l => format!(
            "{}{}{}",
            key[..f].to_lowercase(),
            &key[f..l],
            key[l..].to_lowercase()
        ),
        _ => key.to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Env;

    #[test]
    fn test_parse_config_z() {
        let raw = "http.sslVerify\nfalse\0lfs.ConcurrentTransfers\n8\0remote.Origin.url\nhttps://example.com/Repo.git\0core.bare\0";
        let env = parse_config_z(raw);

        assert!(!env.bool("http.sslverify", true));
        assert_eq!(env.int("lfs.concurrenttransfers", 0), 8);
        assert_eq!(
            env.get("remote.Origin.url").as_deref(),
            Some("https://example.com/Repo.git")
        );
        assert!(env.bool("core.bare", false));
    }

    #[test]
    fn test_later_entries_override() {
        let env = parse_config_z("lfs.url\nhttps://a\0lfs.url\nhttps://b\0");
        assert_eq!(env.get("lfs.url").as_deref(), Some("https://b"));
    }

    #[test]
    fn test_value_with_newlines_kept() {
        let env = parse_config_z("alias.x\nline1\nline2\0");
        assert_eq!(env.get("alias.x").as_deref(), Some("line1\nline2"));
    }
}
