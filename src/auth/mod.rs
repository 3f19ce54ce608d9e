//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! 401 from server
//!     → userinfo in URL?          (used as-is)
//!     → netrc.rs (machine/default lookup)
//!     → credentials.rs (external helper: fill, then approve/reject)
//!
//! 401 with `WWW-Authenticate: NTLM`
//!     → ntlm.rs (per-host session: negotiate → challenge → authenticate)
//! ```
//!
//! # Security Constraints
//! - Passwords are never logged; URLs are sanitized before display
//! - Helper prompts are suppressed when the terminal prompt is disabled

pub mod credentials;
pub mod netrc;
pub mod ntlm;

pub use credentials::{CommandCredentialHelper, CredentialHelper, Creds, StaticCredentialHelper};
pub use netrc::{Machine, Netrc, NetrcFinder};
pub use ntlm::NtlmSession;
