//! Transport-neutral request and response types
//!
//! The embedding server owns sockets, routing and URL decoding; it hands the
//! engine a decoded path, query pairs and headers, and writes back the
//! status, headers and body it receives.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use xreg_core::{ExErrorKind, RegistryError};

pub const CONTENT_TYPE: &str = "Content-Type";
pub const LOCATION: &str = "Location";
pub const REQUEST_ID: &str = "X-Request-Id";
pub const JSON_TYPE: &str = "application/json";
const TEXT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Patch,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "POST" => Ok(Method::Post),
            "DELETE" => Ok(Method::Delete),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Decoded path without the query string
    pub path: String,
    /// Decoded query pairs in request order; repeated keys are kept
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_json(self, body: &Value) -> Self {
        self.with_body(body.to_string())
            .with_header(CONTENT_TYPE, JSON_TYPE)
    }

    /// First header named `name`, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    pub fn json(status: u16, body: Vec<u8>) -> Self {
        Self::new(status)
            .with_header(CONTENT_TYPE, JSON_TYPE)
            .with_body(body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Error response: mapped status, display text plus newline
    pub fn from_error(err: &RegistryError) -> Self {
        Self::new(status_for(err.kind()))
            .with_header(CONTENT_TYPE, TEXT_TYPE)
            .with_body(format!("{}\n", err).into_bytes())
    }
}

/// HTTP status for an error kind
pub fn status_for(kind: ExErrorKind) -> u16 {
    match kind {
        ExErrorKind::NotFound => 404,
        ExErrorKind::MethodNotAllowed => 405,
        ExErrorKind::Timeout => 504,
        ExErrorKind::Persistence | ExErrorKind::Serialization | ExErrorKind::Internal => 500,
        ExErrorKind::Conflict
        | ExErrorKind::InvalidId
        | ExErrorKind::InvalidFilter
        | ExErrorKind::InvalidInline
        | ExErrorKind::InvalidState
        | ExErrorKind::ReadOnly
        | ExErrorKind::InvalidExtension
        | ExErrorKind::InvalidData => 400,
    }
}
