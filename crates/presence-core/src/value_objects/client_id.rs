//! Client ID - opaque identifier handed out by the identity provider
//!
//! The id doubles as the last segment of the client's presence key, so it
//! must be non-empty and must not contain the key separator.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Maximum accepted id length (identity providers issue far shorter ids)
const MAX_LEN: usize = 128;

/// Identifier of one client (one authenticated identity)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Parse and validate a client id
    pub fn parse(s: &str) -> Result<Self, ClientIdParseError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ClientIdParseError::Empty);
        }
        if trimmed.len() > MAX_LEN {
            return Err(ClientIdParseError::TooLong { max: MAX_LEN });
        }
        if let Some(c) = trimmed.chars().find(|c| matches!(c, '/' | '*' | '?' | '[' | ']')) {
            return Err(ClientIdParseError::ReservedCharacter(c));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the id as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Error when parsing a ClientId from string
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClientIdParseError {
    #[error("client id is empty")]
    Empty,

    #[error("client id is longer than {max} characters")]
    TooLong { max: usize },

    #[error("client id contains reserved character '{0}'")]
    ReservedCharacter(char),
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ClientId {
    type Err = ClientIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClientId::parse(s)
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for ClientId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ClientId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        ClientId::parse(&raw).map_err(serde::de::Error::custom)
    }
}
