//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering malformed user input and packet decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    // Input validation errors
    /// The string is not a valid EUI-48 hardware address.
    #[error("invalid MAC address {input:?}: {reason}")]
    InvalidMacAddress {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The string is not a valid IPv4 or IPv6 literal.
    #[error("invalid IP address {input:?}: {reason}")]
    InvalidIpAddress {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The credential does not have the required length.
    #[error("password must be exactly {expected} characters, got {got}")]
    InvalidCredentialLength {
        /// Required number of characters.
        expected: usize,
        /// Actual number of characters.
        got: usize,
    },

    // Packet errors
    /// A magic packet has the wrong size.
    #[error("magic packet must be {expected} bytes, got {got}")]
    InvalidPacketLength {
        /// Required packet size.
        expected: usize,
        /// Actual packet size.
        got: usize,
    },

    /// A magic packet does not follow the sync + 16 repetitions layout.
    #[error("malformed magic packet: {0}")]
    MalformedPacket(String),
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
