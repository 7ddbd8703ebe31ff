//! Shared power-on secret.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ProtocolError, Result};

/// Number of characters a credential must have.
pub const CREDENTIAL_LENGTH: usize = 6;

/// A 6-character shared secret that gates the power-on action.
///
/// The value is opaque; any characters are allowed. `Debug` output is
/// redacted so the secret never lands in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Validates and wraps a credential.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let got = value.chars().count();
        if got != CREDENTIAL_LENGTH {
            return Err(ProtocolError::InvalidCredentialLength {
                expected: CREDENTIAL_LENGTH,
                got,
            });
        }
        Ok(Self(value))
    }

    /// Returns the secret as a string slice.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Byte-for-byte comparison against a submitted value.
    pub fn matches(&self, submitted: &str) -> bool {
        self.0.as_bytes() == submitted.as_bytes()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(******)")
    }
}

impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}
