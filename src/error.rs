//! Error definitions shared by every subsystem.

use std::path::PathBuf;
use thiserror::Error;

use crate::http::response::Response;

/// Errors that can occur while configuring the client or talking to a server.
#[derive(Debug, Error)]
pub enum Error {
    /// The netrc file exists but could not be parsed.
    #[error("netrc parse error in {}:{line}: {message}", .path.display())]
    Netrc {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The server answered with something that is not JSON. The response is
    /// handed back unread.
    #[error("Expected json type, got: {content_type:?}")]
    DecodeType {
        content_type: String,
        response: Box<Response>,
    },

    /// The server claimed JSON but the body did not parse.
    #[error("Unable to parse HTTP response for {method} {url}: {source}")]
    Decode {
        method: String,
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The server accepted the request but its body could not be read.
    #[error("Unable to read HTTP response for {method} {url}: {source}")]
    Body {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Credentials could not be obtained or were rejected.
    #[error("Credential error: {0}")]
    Credentials(String),

    /// NTLM handshake failure.
    #[error("NTLM error: {0}")]
    Ntlm(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A CA bundle was readable but held no usable certificate.
    #[error("Certificate error for {host}: {message}")]
    Certificate { host: String, message: String },
}

impl Error {
    /// True when the server answered with a non-JSON content type.
    pub fn is_decode_type(&self) -> bool {
        matches!(self, Error::DecodeType { .. })
    }

    /// Recover the unread response from a content-type mismatch.
    pub fn into_response(self) -> Option<Response> {
        match self {
            Error::DecodeType { response, .. } => Some(*response),
            _ => None,
        }
    }
}

/// Distinguish "wrong content type" from "malformed JSON".
pub fn is_decode_type_error(err: &Error) -> bool {
    err.is_decode_type()
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_netrc_error_message() {
        let err = Error::Netrc {
            path: PathBuf::from("/home/me/.netrc"),
            line: 3,
            message: "missing value for login".into(),
        };
        assert!(!is_decode_type_error(&err));
        assert_eq!(
            err.to_string(),
            "netrc parse error in /home/me/.netrc:3: missing value for login"
        );
    }

    #[test]
    fn test_decode_error_is_not_type_error() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::Decode {
            method: "POST".into(),
            url: "https://example.com/objects/batch".into(),
            source,
        };
        assert!(!err.is_decode_type());
        assert!(err
            .to_string()
            .starts_with("Unable to parse HTTP response for POST https://example.com/objects/batch"));
        assert!(err.into_response().is_none());
    }
}
