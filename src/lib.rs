//! Per-host authenticated HTTP client manager for Git LFS API calls.
//!
//! The [`Client`] owns one configured HTTP client and one NTLM session per
//! remote host, resolves credentials (URL, netrc, credential helper), tracks
//! in-flight responses as transfers, and decodes JSON responses with
//! content-type validation.

pub mod auth;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod env;
pub mod error;
pub mod http;
pub mod observability;

pub use client::Client;
pub use config::ClientConfig;
pub use env::{Env, MapEnv};
pub use error::{is_decode_type_error, Error, Result};
pub use http::{decode_json, sanitize_url, HttpTransfer, Response, ResponseId};
