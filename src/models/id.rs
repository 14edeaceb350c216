use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid id {value:?}: ids must be non-empty and contain no whitespace")]
pub struct IdError {
    value: String,
}

/// Opaque identifier for assets and transactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Id {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Parse user input (e.g. a CLI argument) into an id.
    pub fn parse(value: &str) -> Result<Self, IdError> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(IdError {
                value: value.to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(Id::new(), Id::new());
    }

    #[test]
    fn parse_trims_input() {
        let id = Id::parse("  asset-1 ").unwrap();
        assert_eq!(id.as_str(), "asset-1");
    }

    #[test]
    fn parse_rejects_blank_and_spaced_values() {
        assert!(Id::parse("").is_err());
        assert!(Id::parse("   ").is_err());
        assert!(Id::parse("two words").is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Id::from("tx-9")).unwrap();
        assert_eq!(json, r#""tx-9""#);
    }
}
