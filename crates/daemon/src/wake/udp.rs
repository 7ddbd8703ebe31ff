//! Magic packet over UDP broadcast.

use std::future::Future;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::pin::Pin;

use protocol::{MacAddress, MagicPacket, MAGIC_PACKET_SIZE};
use tokio::net::UdpSocket;

use super::{WakeError, WakeSender};

/// Broadcasts the magic packet from an ephemeral UDP socket.
#[derive(Debug, Clone)]
pub struct UdpWakeSender {
    destination: SocketAddr,
}

impl UdpWakeSender {
    /// Creates a sender targeting `destination` (usually `255.255.255.255:9`
    /// or the subnet's directed broadcast address).
    pub fn new(destination: SocketAddr) -> Self {
        Self { destination }
    }

    /// Returns the configured destination.
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    async fn send_packet(&self, mac: &MacAddress) -> Result<(), WakeError> {
        let bind_addr: SocketAddr = if self.destination.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr).await?;
        if self.destination.is_ipv4() {
            socket.set_broadcast(true)?;
        }

        let packet = MagicPacket::new(*mac).encode();
        let sent = socket.send_to(&packet, self.destination).await?;
        if sent != MAGIC_PACKET_SIZE {
            return Err(WakeError::ShortSend {
                sent,
                expected: MAGIC_PACKET_SIZE,
            });
        }

        tracing::info!(mac = %mac, destination = %self.destination, "Sent magic packet");
        Ok(())
    }
}

impl WakeSender for UdpWakeSender {
    fn send<'a>(
        &'a self,
        mac: &'a MacAddress,
    ) -> Pin<Box<dyn Future<Output = Result<(), WakeError>> + Send + 'a>> {
        Box::pin(self.send_packet(mac))
    }
}
