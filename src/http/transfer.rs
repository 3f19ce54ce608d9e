//! In-flight transfer bookkeeping.
//!
//! # Responsibilities
//! - Associate a response with its transfer object
//! - Group responses into caller-defined buckets (e.g. "upload")
//! - Report bucket sizes for concurrency accounting
//!
//! # Design Decisions
//! - Bookkeeping only; no limit is enforced here
//! - Two locks, always taken buckets-then-transfers
//! - Release preserves the order of the remaining bucket entries

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::http::response::{sanitize_url, Response};
use crate::observability::metrics;

/// Identity of a response handle inside the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseId(Uuid);

impl ResponseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResponseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Protocol-level record of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpTransfer {
    pub method: String,
    /// Sanitized; safe to log.
    pub url: String,
    pub status: u16,
    pub started: Instant,
    pub request_size: Option<u64>,
    pub response_size: Option<u64>,
}

impl HttpTransfer {
    /// Describe `res`, started at `started`.
    pub fn from_response(res: &Response, started: Instant, request_size: Option<u64>) -> Self {
        Self {
            method: res.method().to_string(),
            url: sanitize_url(res.url()),
            status: res.status().as_u16(),
            started,
            request_size,
            response_size: res.content_length(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.started.elapsed()
    }
}

impl fmt::Display for HttpTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} status={} request_bytes={} response_bytes={} duration_ms={}",
            self.method,
            self.url,
            self.status,
            self.request_size.unwrap_or(0),
            self.response_size.unwrap_or(0),
            self.duration().as_millis()
        )
    }
}

/// Responses grouped by bucket, each mapped to its transfer.
#[derive(Debug)]
pub struct TransferTracker<T> {
    buckets: Mutex<HashMap<String, Vec<ResponseId>>>,
    transfers: Mutex<HashMap<ResponseId, (String, Arc<T>)>>,
}

impl<T> Default for TransferTracker<T> {
    fn default() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            transfers: Mutex::new(HashMap::new()),
        }
    }
}

fn lock<V>(m: &Mutex<V>) -> MutexGuard<'_, V> {
    // Every critical section leaves both maps consistent.
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> TransferTracker<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `transfer` for `response` in `bucket`.
    ///
    /// A response already tracked is moved to `bucket` and its transfer replaced.
    pub fn track(&self, bucket: &str, response: ResponseId, transfer: T) -> Arc<T> {
        let transfer = Arc::new(transfer);
        let mut buckets = lock(&self.buckets);
        let mut transfers = lock(&self.transfers);

        if let Some((old_bucket, _)) = transfers.remove(&response) {
            remove_from_bucket(&mut buckets, &old_bucket, response);
        }

        let entries = buckets.entry(bucket.to_string()).or_default();
        entries.push(response);
        metrics::record_transfers_in_flight(bucket, entries.len());

        transfers.insert(response, (bucket.to_string(), Arc::clone(&transfer)));
        transfer
    }

    /// Transfer registered for `response`.
    pub fn get(&self, response: ResponseId) -> Option<Arc<T>> {
        lock(&self.transfers)
            .get(&response)
            .map(|(_, t)| Arc::clone(t))
    }

    /// Forget `response`, returning its transfer.
    pub fn release(&self, response: ResponseId) -> Option<Arc<T>> {
        let mut buckets = lock(&self.buckets);
        let mut transfers = lock(&self.transfers);

        let (bucket, transfer) = transfers.remove(&response)?;
        remove_from_bucket(&mut buckets, &bucket, response);
        metrics::record_transfer_released(&bucket);
        Some(transfer)
    }

    /// Responses currently in `bucket`, oldest first.
    pub fn bucket(&self, bucket: &str) -> Vec<ResponseId> {
        lock(&self.buckets).get(bucket).cloned().unwrap_or_default()
    }

    pub fn bucket_len(&self, bucket: &str) -> usize {
        lock(&self.buckets).get(bucket).map_or(0, Vec::len)
    }

    /// Total tracked responses.
    pub fn len(&self) -> usize {
        lock(&self.transfers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn remove_from_bucket(
    buckets: &mut HashMap<String, Vec<ResponseId>>,
    bucket: &str,
    response: ResponseId,
) {
    if let Some(entries) = buckets.get_mut(bucket) {
        entries.retain(|id| *id != response);
        metrics::record_transfers_in_flight(bucket, entries.len());
        if entries.is_empty() {
            buckets.remove(bucket);
        }
    }
}
