//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! OS-level Env ──┐
//!                ├─▶ loader.rs (per-setting precedence)
//! git-level Env ─┘       → proxy.rs (proxy servers, no-proxy matching)
//!                        → ClientConfig (immutable once resolved)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once resolved; the Client never re-reads its sources
//! - Every field has a "use system default" value so empty sources are valid
//! - Sources are never merged; each setting names which source wins

pub mod loader;
pub mod proxy;
pub mod schema;

pub use loader::resolve_config;
pub use proxy::{NoProxy, ProxyServers};
pub use schema::ClientConfig;
