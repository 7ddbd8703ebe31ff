//! Wake-on-LAN magic packet codec.
//!
//! # Packet Format
//!
//! - 6 bytes: synchronization stream, all `0xFF`
//! - 96 bytes: the target MAC address repeated 16 times
//!
//! The packet is usually carried in a UDP datagram to port 9 (discard)
//! or 7 (echo) on the broadcast address of the target's segment.

use crate::address::{MacAddress, MAC_ADDRESS_LENGTH};
use crate::error::{ProtocolError, Result};

/// Synchronization stream that opens every magic packet.
pub const SYNC_STREAM: [u8; 6] = [0xFF; 6];

/// Number of times the MAC address is repeated.
pub const MAC_REPETITIONS: usize = 16;

/// Total magic packet size: 6 + 16 * 6 = 102 bytes.
pub const MAGIC_PACKET_SIZE: usize = SYNC_STREAM.len() + MAC_REPETITIONS * MAC_ADDRESS_LENGTH;

/// Default UDP port for Wake-on-LAN.
pub const WOL_PORT: u16 = 9;

/// A magic packet addressed to one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicPacket {
    target: MacAddress,
}

impl MagicPacket {
    /// Creates a packet that wakes the given hardware address.
    pub fn new(target: MacAddress) -> Self {
        Self { target }
    }

    /// Returns the hardware address this packet wakes.
    pub fn target(&self) -> &MacAddress {
        &self.target
    }

    /// Encodes the packet into its 102-byte wire form.
    pub fn encode(&self) -> [u8; MAGIC_PACKET_SIZE] {
        let mut buf = [0u8; MAGIC_PACKET_SIZE];
        buf[..SYNC_STREAM.len()].copy_from_slice(&SYNC_STREAM);
        for chunk in buf[SYNC_STREAM.len()..].chunks_exact_mut(MAC_ADDRESS_LENGTH) {
            chunk.copy_from_slice(self.target.as_bytes());
        }
        buf
    }

    /// Decodes a packet, checking the sync stream and every repetition.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != MAGIC_PACKET_SIZE {
            return Err(ProtocolError::InvalidPacketLength {
                expected: MAGIC_PACKET_SIZE,
                got: bytes.len(),
            });
        }

        let (sync, body) = bytes.split_at(SYNC_STREAM.len());
        if sync != SYNC_STREAM {
            return Err(ProtocolError::MalformedPacket(
                "missing 0xFF synchronization stream".to_string(),
            ));
        }

        let mut mac = [0u8; MAC_ADDRESS_LENGTH];
        mac.copy_from_slice(&body[..MAC_ADDRESS_LENGTH]);

        if let Some(index) = body
            .chunks_exact(MAC_ADDRESS_LENGTH)
            .position(|chunk| chunk != mac)
        {
            return Err(ProtocolError::MalformedPacket(format!(
                "repetition {} does not match the first address",
                index
            )));
        }

        Ok(Self::new(MacAddress::from_bytes(mac)))
    }
}
