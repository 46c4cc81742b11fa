//! The HTTP seam between the request layer and a concrete client.
//!
//! [`Transport`] only moves bytes: it never inspects status codes. Status
//! handling, authentication and parameter merging live in [`crate::Api`].

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::Result;

/// HTTP verbs used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A local file streamed as the request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBody {
    /// File to read.
    pub path: PathBuf,
    /// Emit progress lines at `debug` instead of `info`.
    pub quiet: bool,
}

/// Request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    /// JSON document, sent with `Content-Type: application/json`.
    Json(serde_json::Value),
    /// Raw file bytes; the caller sets the content type.
    File(FileBody),
}

/// A fully prepared request: parameters and headers are already merged.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    /// Returns the value of a query parameter, if present.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value of a header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw status and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// An HTTP client able to execute prepared requests.
///
/// Implementations report network failures as
/// [`crate::error::TransportError`]; any HTTP status, good or bad, is a
/// successful [`Response`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a request and buffer the response body.
    async fn send(&self, request: Request) -> Result<Response>;

    /// Execute a request and stream a 2xx body into `dest`.
    ///
    /// On success the returned body is empty. On any other status nothing
    /// is written and the error body is returned in full.
    async fn download(&self, request: Request, dest: &Path) -> Result<Response>;
}
