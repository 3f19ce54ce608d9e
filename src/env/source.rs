//! Typed read-only view over key/value configuration.

use std::collections::HashMap;

/// Key/value configuration source.
///
/// Only [`Env::get`] and [`Env::all`] must be provided; the typed accessors
/// share one parsing policy across every implementation.
pub trait Env: Send + Sync {
    /// Raw lookup. `None` when the key is absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Every key/value pair in the source.
    fn all(&self) -> HashMap<String, String>;

    /// Integer lookup. Absent, empty or unparseable values yield `default`.
    fn int(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(s) if !s.is_empty() => s.parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Boolean lookup.
    ///
    /// Absent or empty values yield `default`. Any non-empty value outside
    /// the recognized literals yields `false`, not `default`.
    fn bool(&self, key: &str, default: bool) -> bool {
        let s = match self.get(key) {
            Some(s) if !s.is_empty() => s,
            _ => return default,
        };

        match s.to_lowercase().as_str() {
            "true" | "1" | "on" | "yes" | "t" => true,
            "false" | "0" | "off" | "no" | "f" => false,
            _ => false,
        }
    }
}

/// In-memory environment. Also the stand-in when no source is supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapEnv {
    values: HashMap<String, String>,
}

impl MapEnv {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment.
    pub fn from_process() -> Self {
        std::env::vars().collect()
    }

    /// Set a value, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Env for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn all(&self) -> HashMap<String, String> {
        self.values.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> MapEnv {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_get() {
        let e = env(&[("a", "1")]);
        assert_eq!(e.get("a").as_deref(), Some("1"));
        assert_eq!(e.get("b"), None);
    }

    #[test]
    fn test_int_defaults() {
        let e = env(&[("k", "abc"), ("empty", ""), ("n", "42"), ("neg", "-3")]);
        assert_eq!(e.int("k", 7), 7);
        assert_eq!(e.int("missing", 7), 7);
        assert_eq!(e.int("empty", 7), 7);
        assert_eq!(e.int("n", 7), 42);
        assert_eq!(e.int("neg", 7), -3);
    }

    #[test]
    fn test_bool_literals() {
        for v in ["true", "1", "on", "yes", "t", "TRUE", "Yes"] {
            assert!(env(&[("k", v)]).bool("k", false), "{v} should be true");
        }
        for v in ["false", "0", "off", "no", "f", "OFF"] {
            assert!(!env(&[("k", v)]).bool("k", true), "{v} should be false");
        }
    }

    #[test]
    fn test_bool_unrecognized_is_false_not_default() {
        let e = env(&[("k", "maybe"), ("empty", "")]);
        assert!(!e.bool("k", true));
        assert!(e.bool("empty", true));
        assert!(e.bool("missing", true));
        assert!(!e.bool("missing", false));
    }

    #[test]
    fn test_all_and_set() {
        let mut e = MapEnv::new();
        assert!(e.is_empty());
        e.set("x", "1");
        e.set("x", "2");
        assert_eq!(e.len(), 1);
        assert_eq!(e.all().get("x").map(String::as_str), Some("2"));
    }
}
