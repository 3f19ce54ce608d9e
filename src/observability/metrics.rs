//! Metrics collection.
//!
//! # Metrics
//! - `lfs_cache_entries{cache}` (gauge): resources cached per host cache
//! - `lfs_transfers_in_flight{bucket}` (gauge): tracked responses per bucket
//! - `lfs_transfers_released_total{bucket}` (counter): released transfers
//!
//! Recording is a no-op until the embedding application installs a recorder.

use metrics::{counter, gauge};

pub fn record_cache_size(cache: &'static str, size: usize) {
    gauge!("lfs_cache_entries", "cache" => cache).set(size as f64);
}

pub fn record_transfers_in_flight(bucket: &str, count: usize) {
    gauge!("lfs_transfers_in_flight", "bucket" => bucket.to_string()).set(count as f64);
}

pub fn record_transfer_released(bucket: &str) {
    counter!("lfs_transfers_released_total", "bucket" => bucket.to_string()).increment(1);
}
