//! Record access policies.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Visibility of a record or of its files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Public,
    Restricted,
}

/// An access restriction that lifts on a given date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embargo {
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Embargo {
    /// No embargo.
    pub fn inactive() -> Self {
        Self::default()
    }

    /// An active embargo lifting on `until`.
    pub fn until(until: NaiveDate, reason: Option<String>) -> Self {
        Self {
            active: true,
            until: Some(until),
            reason,
        }
    }
}

/// The `access` object of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Access {
    pub record: AccessLevel,
    pub files: AccessLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embargo: Option<Embargo>,
    /// Server-computed fields such as `status`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Access {
    /// Public record and files. Returns a fresh value on every call.
    pub fn public() -> Self {
        Self {
            record: AccessLevel::Public,
            files: AccessLevel::Public,
            embargo: None,
            extra: Map::new(),
        }
    }

    /// Restricted record and files with the given embargo.
    pub fn restricted(embargo: Embargo) -> Self {
        Self {
            record: AccessLevel::Restricted,
            files: AccessLevel::Restricted,
            embargo: Some(embargo),
            extra: Map::new(),
        }
    }

    pub fn is_public(&self) -> bool {
        self.record == AccessLevel::Public && self.files == AccessLevel::Public
    }
}
