//! Response handling and JSON decoding.
//!
//! # Responsibilities
//! - Keep the originating method next to the response for diagnostics
//! - Accept only JSON-family content types before touching the body
//! - Always consume (and so release) the body once decoding starts
//! - Produce display-safe URLs
//!
//! # Design Decisions
//! - A content-type mismatch hands the unread response back in the error
//! - Parse failures name the method and the sanitized URL

use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};

const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";
const JSON_MEDIA_TYPE: &str = "application/json";

/// A server response paired with the method that produced it.
#[derive(Debug)]
pub struct Response {
    method: Method,
    inner: reqwest::Response,
}

impl Response {
    pub fn new(method: Method, inner: reqwest::Response) -> Self {
        Self { method, inner }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        self.inner.url()
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// The `Content-Type` header, or `""` when absent or not ASCII.
    pub fn content_type(&self) -> &str {
        self.headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    /// Declared `Content-Length`, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }

    /// Read the whole body as text.
    pub async fn text(self) -> Result<String> {
        Ok(self.inner.text().await?)
    }

    pub fn into_inner(self) -> reqwest::Response {
        self.inner
    }

    /// See [`decode_json`].
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        decode_json(self).await
    }
}

/// `application/vnd.git-lfs+json` or `application/json`, each optionally
/// followed by `;` parameters.
pub fn is_json_media_type(content_type: &str) -> bool {
    [LFS_MEDIA_TYPE, JSON_MEDIA_TYPE].iter().any(|media| {
        content_type
            .strip_prefix(media)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(';'))
    })
}

/// Decode a JSON response body into `T`.
///
/// Non-JSON content types fail with [`Error::DecodeType`] without reading
/// the body. Otherwise the body is read to the end whether or not it parses.
pub async fn decode_json<T: DeserializeOwned>(res: Response) -> Result<T> {
    let content_type = res.content_type().to_string();
    if !is_json_media_type(&content_type) {
        return Err(Error::DecodeType {
            content_type,
            response: Box::new(res),
        });
    }

    let method = res.method.to_string();
    let url = sanitize_url(res.url());
    let body = match res.inner.bytes().await {
        Ok(body) => body,
        Err(e) => {
            return Err(Error::Body {
                method,
                url,
                source: e.without_url(),
            })
        }
    };

    serde_json::from_slice(&body).map_err(|source| Error::Decode { method, url, source })
}

/// Copy of `url` without its query string or password. Display only.
pub fn sanitize_url(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    if clean.password().is_some() {
        // Only fails for URLs that cannot carry credentials at all.
        let _ = clean.set_password(None);
    }
    clean.to_string()
}
