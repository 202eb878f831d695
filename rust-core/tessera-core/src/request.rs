//! # HTTP Request
//!
//! Owned request snapshot handed to handler chains. The body is collected
//! once up front (bounded by the configured limit) and the query string is
//! decoded eagerly.

use crate::error::{Error, Result};
use http_body_util::BodyExt;
use hyper::body::Bytes;
use std::collections::HashMap;

/// HTTP request as seen by handlers
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method as received, upper case for standard methods
    pub method: String,
    /// Request path (without query string)
    pub path: String,
    query_string: Option<String>,
    query_params: HashMap<String, String>,
    headers: hyper::HeaderMap,
    body: Option<Bytes>,
}

impl Request {
    /// Create a request manually (tests, internal dispatch)
    ///
    /// A `?query` suffix on `path` is split off and decoded.
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        headers_map: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        let path = path.into();
        let (path, query_string) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path, None),
        };

        let query_params = parse_query_string(query_string.as_deref());

        let mut headers = hyper::HeaderMap::new();
        for (k, v) in headers_map {
            if let (Ok(n), Ok(v)) = (
                hyper::header::HeaderName::from_bytes(k.as_bytes()),
                hyper::header::HeaderValue::from_str(&v),
            ) {
                headers.insert(n, v);
            }
        }

        Self {
            method: method.into(),
            path,
            query_string,
            query_params,
            headers,
            body,
        }
    }

    /// Create from a hyper request, rejecting bodies above `max_body_size`
    ///
    /// # Errors
    ///
    /// Returns `Error::PayloadTooLarge` if the declared or actual body size
    /// exceeds the limit, `Error::Http` if the body cannot be read.
    pub async fn from_hyper_with_limit(
        req: hyper::Request<hyper::body::Incoming>,
        max_body_size: usize,
    ) -> Result<Self> {
        let method = req.method().as_str().to_string();
        let uri = req.uri();
        let path = uri.path().to_string();
        let query_string = uri.query().map(String::from);
        let query_params = parse_query_string(query_string.as_deref());
        let headers = req.headers().clone();

        let declared = headers
            .get(hyper::header::CONTENT_LENGTH)
            .and_then(|len| len.to_str().ok())
            .and_then(|len| len.parse::<usize>().ok());
        if let Some(actual) = declared.filter(|len| *len > max_body_size) {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual,
            });
        }

        let bytes = BodyExt::collect(req.into_body()).await?.to_bytes();
        if bytes.len() > max_body_size {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            method,
            path,
            query_string,
            query_params,
            headers,
            body: (!bytes.is_empty()).then_some(bytes),
        })
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            hyper::header::HeaderName::from_bytes(name.as_bytes()),
            hyper::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
    }

    /// Get a decoded query parameter
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    /// Get query parameters as a HashMap
    #[must_use]
    pub fn query_map(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Get raw query string
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Get the request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Get the request body as string (UTF-8)
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        self.body_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }
}

/// Parse query string into HashMap
///
/// Handles URL decoding and duplicate keys (last value wins).
fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| {
            q.split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| {
                    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                    (url_decode(key), url_decode(value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Percent-decoding over bytes, so multi-byte UTF-8 sequences survive
fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    char::from(byte).to_digit(16).and_then(|d| u8::try_from(d).ok())
}
