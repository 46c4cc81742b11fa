//! Personal access token handling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A personal access token issued by the repository.
///
/// # Security
///
/// - Never logged or displayed in Debug output
/// - Treat as opaque; do not parse or inspect
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Create a new access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token value.
    ///
    /// # Security
    ///
    /// Use only when constructing the authorization header or query parameter.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `Authorization` header value.
    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

// Hide token value in Debug output
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

/// Where the access token is attached to outgoing requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPlacement {
    /// `Authorization: Bearer <token>` header.
    #[default]
    Header,
    /// `access_token=<token>` query parameter.
    Query,
    /// Both the header and the query parameter.
    Both,
}

impl TokenPlacement {
    pub(crate) fn header(self) -> bool {
        matches!(self, TokenPlacement::Header | TokenPlacement::Both)
    }

    pub(crate) fn query(self) -> bool {
        matches!(self, TokenPlacement::Query | TokenPlacement::Both)
    }
}
