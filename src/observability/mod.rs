//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! caches, auth, transfer tracker
//!     → tracing events (debug/trace; the library installs no subscriber)
//!     → metrics.rs (gauges/counters through the `metrics` facade)
//!
//! Binary:
//!     → logging.rs (fmt subscriber + EnvFilter)
//! ```
//!
//! # Design Decisions
//! - The library only emits; exporters and subscribers belong to the caller
//! - Passwords and query strings never reach an event (URLs are sanitized)

pub mod logging;
pub mod metrics;
