//! HTTP client subsystem.
//!
//! # Data Flow
//! ```text
//! request URL
//!     → cache.rs (host key → cached client, built once per host)
//!     → transport.rs (proxy, CA bundle, TLS verify, timeouts)
//!     → [request sent by the Client, auth applied]
//!     → response.rs (method + response; JSON decode; sanitized URLs)
//!     → transfer.rs (bucketed bookkeeping until release)
//! ```

pub mod cache;
pub mod response;
pub mod transfer;
pub mod transport;

pub use cache::{host_key, HostCache};
pub use response::{decode_json, is_json_media_type, sanitize_url, Response};
pub use transfer::{HttpTransfer, ResponseId, TransferTracker};
pub use transport::TransportBuilder;
