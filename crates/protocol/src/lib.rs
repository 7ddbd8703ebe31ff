//! # pcwake Protocol Library
//!
//! Value types and wire formats shared by the pcwake daemon and its CLI.
//!
//! ## Overview
//!
//! - **Addresses**: EUI-48 hardware address parsing and IP literal validation
//! - **Credential**: the 6-character shared secret that gates power-on
//! - **Identifiers**: user, channel and message snowflakes from the chat side
//! - **Magic Packet**: the Wake-on-LAN frame (sync stream + 16 × MAC)
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{MacAddress, MagicPacket};
//!
//! let mac: MacAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
//! let bytes = MagicPacket::new(mac).encode();
//! assert_eq!(bytes.len(), protocol::MAGIC_PACKET_SIZE);
//! ```
//!
//! ## Modules
//!
//! - [`address`]: MAC and IP parsing
//! - [`credential`]: shared secret
//! - [`ids`]: snowflake identifiers
//! - [`magic`]: magic packet codec
//! - [`error`]: Error types

pub mod address;
pub mod credential;
pub mod error;
pub mod ids;
pub mod magic;

pub use address::{parse_ip_address, MacAddress, MAC_ADDRESS_LENGTH};
pub use credential::{Credential, CREDENTIAL_LENGTH};
pub use error::{ProtocolError, Result};
pub use ids::{ChannelId, MessageId, UserId};
pub use magic::{MagicPacket, MAC_REPETITIONS, MAGIC_PACKET_SIZE, SYNC_STREAM, WOL_PORT};
