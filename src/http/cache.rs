//! Host-keyed resource caches.
//!
//! # Responsibilities
//! - Map a host identifier to exactly one shared resource
//! - Build the resource at most once per host, even under contention
//! - Never expose the underlying map
//!
//! # Design Decisions
//! - Construction runs while the host's shard is write-locked, so the loser
//!   of a race observes the winner's value
//! - Hosts on other shards are not blocked; the lock is released before the
//!   resource is used
//! - The size gauge reads a counter, never `DashMap::len`, which would wait
//!   on every shard including one mid-construction

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

use crate::observability::metrics;

/// Normalized cache key for `url`: lower-cased host plus explicit port.
pub fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    }
}

/// Exactly-once-per-host cache.
#[derive(Debug)]
pub struct HostCache<V> {
    name: &'static str,
    entries: DashMap<String, Arc<V>>,
    created: AtomicUsize,
}

impl<V> HostCache<V> {
    /// Create an empty cache; `name` labels its metrics.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            created: AtomicUsize::new(0),
        }
    }

    /// Return the resource for `host`, building it with `build` on first use.
    ///
    /// A failed build caches nothing; the next caller retries.
    pub fn get_or_try_insert_with<E>(
        &self,
        host: &str,
        build: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        let key = host.to_lowercase();
        let mut created = false;

        let value = {
            let entry = self.entries.entry(key).or_try_insert_with(|| {
                created = true;
                build().map(Arc::new)
            })?;
            Arc::clone(entry.value())
        };

        if created {
            tracing::debug!(cache = self.name, host = %host, "Cached new host resource");
            let size = self.created.fetch_add(1, Ordering::Relaxed) + 1;
            metrics::record_cache_size(self.name, size);
        }
        Ok(value)
    }

    /// Infallible variant of [`HostCache::get_or_try_insert_with`].
    pub fn get_or_insert_with(&self, host: &str, build: impl FnOnce() -> V) -> Arc<V> {
        match self.get_or_try_insert_with::<std::convert::Infallible>(host, || Ok(build())) {
            Ok(v) => v,
            Err(never) => match never {},
        }
    }

    /// Cached resource for `host`, if any.
    pub fn get(&self, host: &str) -> Option<Arc<V>> {
        self.entries
            .get(&host.to_lowercase())
            .map(|r| Arc::clone(r.value()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
