//! SQL identifiers and lookup key checks.
//!
//! Table and column names reach dynamic SQL, so they only ever come from
//! the registry and only as an [`Identifier`], which cannot be built from
//! a string that fails the character rules. Request values travel as
//! bound parameters and never as identifiers.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("Invalid identifier regex")
});

static LOOKUP_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+$").expect("Invalid lookup key regex")
});

/// Longest lookup key accepted anywhere.
pub const MAX_LOOKUP_KEY_LEN: usize = 50;

/// Longest identifier PostgreSQL keeps without truncation.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// A validated SQL identifier, optionally schema-qualified (`schema.table`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// Parse and validate an identifier.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.len() > MAX_IDENTIFIER_LEN * 2 + 1 {
            return Err(ValidationError::InvalidIdentifier {
                value,
                reason: "too long".to_string(),
            });
        }
        if !IDENTIFIER_RE.is_match(&value) {
            return Err(ValidationError::InvalidIdentifier {
                value,
                reason: "must be letters, digits and underscores, optionally schema-qualified"
                    .to_string(),
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Identifier::parse(raw).map_err(serde::de::Error::custom)
    }
}

/// Check a lookup key supplied by a caller: non-empty, at most `max_len`
/// characters, ASCII letters, digits and underscores only.
pub fn validate_lookup_key(key: &str, max_len: usize) -> Result<(), ValidationError> {
    let reason = if key.is_empty() {
        Some("must not be empty".to_string())
    } else if key.chars().count() > max_len {
        Some(format!("must be at most {max_len} characters"))
    } else if !LOOKUP_KEY_RE.is_match(key) {
        Some("contains invalid characters".to_string())
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ValidationError::InvalidLookupKey {
            key: key.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
