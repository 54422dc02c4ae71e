//! User identity newtype.
//!
//! Identities are minted by the (external) auth layer; the messaging core
//! treats them as opaque, immutable keys. Validation happens once, at
//! construction, so every `UserId` in the system is well-formed by
//! construction and the routing paths never re-check.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Maximum accepted identity length in bytes.
const MAX_LEN: usize = 128;

/// An opaque, validated user identity.
///
/// Well-formed identities are non-empty, at most 128 bytes, and contain
/// no whitespace or control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Validate and wrap a raw identity string.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentityError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(IdentityError::Empty);
        }
        if raw.len() > MAX_LEN {
            return Err(IdentityError::TooLong(raw.len()));
        }
        if let Some(c) = raw.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(IdentityError::InvalidCharacter(c));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = IdentityError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl std::str::FromStr for UserId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_identities() {
        for raw in ["42", "alice", "user@example.com", "a-b_c.d"] {
            assert_eq!(UserId::new(raw).unwrap().as_str(), raw);
        }
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(UserId::new(""), Err(IdentityError::Empty)));
    }

    #[test]
    fn rejects_whitespace_and_control() {
        assert!(matches!(
            UserId::new("al ice"),
            Err(IdentityError::InvalidCharacter(' '))
        ));
        assert!(matches!(
            UserId::new("a\nb"),
            Err(IdentityError::InvalidCharacter('\n'))
        ));
    }

    #[test]
    fn rejects_overlong() {
        let raw = "x".repeat(129);
        assert!(matches!(UserId::new(raw), Err(IdentityError::TooLong(129))));
    }

    #[test]
    fn serde_round_trip() {
        let id = UserId::new("alice").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"alice\"");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn serde_rejects_malformed() {
        let result: Result<UserId, _> = serde_json::from_str("\"has space\"");
        assert!(result.is_err());
    }
}
