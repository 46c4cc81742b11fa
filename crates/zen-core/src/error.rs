//! Error types for the zen libraries.
//!
//! This module provides a unified error type with explicit variants for
//! transport, API status, upload, and input validation errors.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

/// The unified error type for zen operations.
///
/// Callers can match on the variant to tell a rejected request (`Api`)
/// from a local mistake (`InvalidInput`) or an exhausted upload (`Upload`).
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (connection, timeout, client failures).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with a bad status code.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Input validation errors, raised before any request is sent.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// Upload workflow errors.
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    /// A successful response whose body does not have the expected shape.
    #[error("unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// A successful response that lacks a link the next step needs.
    #[error("response from {url} has no '{link}' link")]
    MissingLink { url: String, link: &'static str },

    /// Local filesystem errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Local JSON (de)serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the API error if this is a bad-status response.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out: {message}")]
    Timeout { message: String },

    /// Generic HTTP client error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Status codes the API documents as failures, with a short name and the
/// description used when the response body carries no usable message.
pub const BAD_STATUS_CODES: &[(u16, &str, &str)] = &[
    (400, "Bad Request", "Request failed."),
    (
        401,
        "Unauthorized",
        "Request failed, due to an invalid access token.",
    ),
    (
        403,
        "Forbidden",
        "Request failed, due to missing authorization (e.g. deleting an already submitted \
         upload or missing scopes for your access token).",
    ),
    (
        404,
        "Not Found",
        "Request failed, due to the resource not being found.",
    ),
    (
        405,
        "Method Not Allowed",
        "Request failed, due to unsupported HTTP method.",
    ),
    (
        409,
        "Conflict",
        "Request failed, due to the current state of the resource (e.g. edit a deposition \
         which is not fully integrated).",
    ),
    (
        415,
        "Unsupported Media Type",
        "Request failed, due to missing or invalid request header Content-Type.",
    ),
    (
        422,
        "Unprocessable Entity",
        "Resumption tokens are only valid for 2 minutes.",
    ),
    (
        429,
        "Too Many Requests",
        "Request failed, due to rate limiting.",
    ),
    (
        500,
        "Internal Server Error",
        "Request failed, due to an internal server error.",
    ),
];

/// Looks up the fixed name and fallback description for a documented status.
pub fn bad_status(status: u16) -> Option<(&'static str, &'static str)> {
    BAD_STATUS_CODES
        .iter()
        .find(|(code, _, _)| *code == status)
        .map(|(_, name, description)| (*name, *description))
}

/// A field-level validation message returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldError {
    /// The offending field, e.g. `metadata.title`.
    pub field: String,
    /// The message attached to that field.
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    field: Option<String>,
    #[serde(default)]
    message: Option<serde_json::Value>,
    #[serde(default)]
    messages: Vec<String>,
}

impl ErrorEntry {
    /// The entry as a field error, if it names both a field and a message.
    fn to_field_error(&self) -> Option<FieldError> {
        let field = self.field.clone()?;
        let message = match &self.message {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None if !self.messages.is_empty() => {
                self.messages.join(" ")
            }
            Some(serde_json::Value::Null) | None => return None,
            Some(other) => other.to_string(),
        };
        Some(FieldError { field, message })
    }
}

/// A bad-status response from the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code.
    pub status: u16,
    /// Short status name, e.g. `Not Found`.
    pub name: String,
    /// Best-effort description: server message when present, fixed text otherwise.
    pub description: String,
    /// Field errors reported by the server, if any.
    pub errors: Vec<FieldError>,
}

impl ApiError {
    /// Build an error from a status code and the raw response body.
    ///
    /// The body is parsed as `{"message": ..., "errors": [{"field": ..., "message": ...}]}`.
    /// When that fails, the description falls back to the static text for the status.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let (name, fallback) = match bad_status(status) {
            Some((name, description)) => (name.to_string(), description),
            None => (format!("HTTP {}", status), "Request failed."),
        };

        let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) else {
            return Self {
                status,
                name,
                description: fallback.to_string(),
                errors: Vec::new(),
            };
        };

        // only the leading entry shapes the description
        let description = match parsed.errors.first().and_then(ErrorEntry::to_field_error) {
            Some(first) => format!(
                "{} Field '{}'. {}",
                parsed.message, first.field, first.message
            ),
            None => parsed.message.clone(),
        };

        let errors = parsed
            .errors
            .iter()
            .filter_map(ErrorEntry::to_field_error)
            .collect();

        Self {
            status,
            name,
            description,
            errors,
        }
    }

    /// Returns true for statuses worth retrying at a higher layer (429 and 5xx).
    pub fn is_retryable(&self) -> bool {
        self.status == 429 || self.status >= 500
    }

    /// Returns true if the access token was rejected.
    pub fn is_auth_error(&self) -> bool {
        self.status == 401 || self.status == 403
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status code {} ({}): {}",
            self.status, self.name, self.description
        )
    }
}

impl std::error::Error for ApiError {}

/// Upload workflow errors.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Every upload+commit attempt failed.
    #[error("max retries exceeded for '{key}' after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        key: String,
        attempts: u32,
        last_error: String,
    },

    /// The slot creation reply did not list the requested key.
    #[error("file slot '{key}' was not created")]
    SlotNotCreated { key: String },

    /// The server did not return a link the workflow needs.
    #[error("file slot '{key}' has no '{link}' link")]
    MissingLink { key: String, link: &'static str },
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid base URL.
    #[error("invalid base URL '{value}': {reason}")]
    BaseUrl { value: String, reason: String },

    /// A value outside its allow-list.
    #[error("invalid `{name}` value '{value}', expected one of: {allowed}")]
    Option {
        name: &'static str,
        value: String,
        allowed: String,
    },

    /// Invalid upload source.
    #[error("invalid source '{value}': {reason}")]
    Source { value: String, reason: String },

    /// Invalid upload options.
    #[error("invalid upload options: {reason}")]
    UploadOptions { reason: String },

    /// Invalid persisted state file.
    #[error("invalid state file '{}': {reason}", path.display())]
    StateFile { path: PathBuf, reason: String },

    /// A record field that is missing or malformed.
    #[error("invalid field `{name}`: {reason}")]
    Field { name: String, reason: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_description_for_every_bad_status() {
        for (status, name, description) in BAD_STATUS_CODES {
            let err = ApiError::from_response(*status, b"<html>oops</html>");
            assert_eq!(err.status, *status);
            assert_eq!(err.name, *name);
            assert_eq!(err.description, *description);
            assert!(err.errors.is_empty());
        }
    }

    #[test]
    fn empty_body_uses_fallback() {
        let err = ApiError::from_response(404, b"");
        assert_eq!(
            err.description,
            "Request failed, due to the resource not being found."
        );
    }

    #[test]
    fn message_only_body() {
        let err = ApiError::from_response(403, br#"{"message": "Permission denied."}"#);
        assert_eq!(err.name, "Forbidden");
        assert_eq!(err.description, "Permission denied.");
    }

    #[test]
    fn message_with_field_errors() {
        let body = br#"{
            "message": "A validation error occurred.",
            "errors": [{"field": "metadata.title", "message": "Missing data for required field."}]
        }"#;
        let err = ApiError::from_response(400, body);
        assert_eq!(
            err.description,
            "A validation error occurred. Field 'metadata.title'. Missing data for required field."
        );
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].field, "metadata.title");
    }

    #[test]
    fn invenio_style_messages_list() {
        let body = br#"{
            "message": "A validation error occurred.",
            "errors": [{"field": "metadata.creators", "messages": ["Missing data for required field."]}]
        }"#;
        let err = ApiError::from_response(400, body);
        assert_eq!(err.errors[0].message, "Missing data for required field.");
    }

    #[test]
    fn only_leading_error_entry_is_described() {
        let body = br#"{
            "message": "A validation error occurred.",
            "errors": [
                {"message": "Unknown field."},
                {"field": "metadata.title", "message": "Missing data for required field."}
            ]
        }"#;
        let err = ApiError::from_response(400, body);
        assert_eq!(err.description, "A validation error occurred.");
        assert_eq!(err.errors.len(), 1);
    }

    #[test]
    fn leading_entry_without_message_falls_back_to_message() {
        let body = br#"{
            "message": "A validation error occurred.",
            "errors": [{"field": "metadata.title"}]
        }"#;
        let err = ApiError::from_response(400, body);
        assert_eq!(err.description, "A validation error occurred.");
        assert!(err.errors.is_empty());
    }

    #[test]
    fn json_without_message_falls_back() {
        let err = ApiError::from_response(429, br#"{"status": 429}"#);
        assert_eq!(err.description, "Request failed, due to rate limiting.");
        assert!(err.is_retryable());
    }

    #[test]
    fn unknown_status_gets_generic_name() {
        let err = ApiError::from_response(502, b"");
        assert_eq!(err.name, "HTTP 502");
        assert_eq!(err.description, "Request failed.");
        assert!(err.is_retryable());
    }

    #[test]
    fn display_includes_status_and_name() {
        let err = ApiError::from_response(401, b"");
        assert_eq!(
            err.to_string(),
            "status code 401 (Unauthorized): Request failed, due to an invalid access token."
        );
        assert!(err.is_auth_error());
    }
}
