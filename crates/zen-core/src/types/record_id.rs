//! Record identifier type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidInputError};

/// An opaque record, draft or deposition identifier.
///
/// InvenioRDM uses strings such as `"abcd-1234"`, the legacy deposition
/// API uses integers. Both decode into a `RecordId`; it always serializes
/// back as a string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    /// Create a new identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is empty or contains a `/`.
    pub fn new(s: impl Into<String>) -> Result<Self, Error> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(InvalidInputError::Field {
                name: "id".to_string(),
                reason: "cannot be empty".to_string(),
            }
            .into());
        }
        if s.contains('/') {
            return Err(InvalidInputError::Field {
                name: "id".to_string(),
                reason: format!("'{}' contains '/'", s),
            }
            .into());
        }
        Ok(Self(s))
    }

    /// Returns the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl Serialize for RecordId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(RecordId::from(n)),
            Raw::Text(s) => RecordId::new(s).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_string_and_integer() {
        let a: RecordId = serde_json::from_str(r#""abcd-1234""#).unwrap();
        let b: RecordId = serde_json::from_str("1234").unwrap();
        assert_eq!(a.as_str(), "abcd-1234");
        assert_eq!(b.as_str(), "1234");
    }

    #[test]
    fn serializes_as_string() {
        let id = RecordId::from(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""42""#);
    }

    #[test]
    fn rejects_empty_and_slash() {
        assert!(RecordId::new("").is_err());
        assert!(RecordId::new("a/b").is_err());
        assert!(serde_json::from_str::<RecordId>(r#""""#).is_err());
    }
}
