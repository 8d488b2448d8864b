//! Async UDP socket for distance-vector updates.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use super::error::TransportResult;
use crate::core::MAX_DATAGRAM_SIZE;
use crate::wire::DvMessage;

/// The shared update channel.
///
/// Owns the receive buffer. Sending goes through cloneable
/// [`UpdateSender`] handles so broadcasts never wait on the receive loop.
#[derive(Debug)]
pub struct UpdateSocket {
    /// The underlying UDP socket.
    socket: Arc<UdpSocket>,
    /// Receive buffer, one datagram at a time.
    recv_buffer: Vec<u8>,
}

impl UpdateSocket {
    /// Bind the update channel.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::from_socket(socket))
    }

    /// Wrap an existing UDP socket.
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket: Arc::new(socket),
            recv_buffer: vec![0u8; MAX_DATAGRAM_SIZE],
        }
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// A send handle sharing this socket.
    pub fn sender(&self) -> UpdateSender {
        UpdateSender {
            socket: Arc::clone(&self.socket),
        }
    }

    /// Receive one datagram and return the sender's address.
    ///
    /// Datagrams longer than the buffer are truncated by the OS and then
    /// fail to decode.
    pub async fn recv_from(&mut self) -> io::Result<(&[u8], SocketAddr)> {
        let (len, addr) = self.socket.recv_from(&mut self.recv_buffer).await?;
        Ok((&self.recv_buffer[..len], addr))
    }
}

/// Cloneable send half of the update channel.
#[derive(Debug, Clone)]
pub struct UpdateSender {
    socket: Arc<UdpSocket>,
}

impl UpdateSender {
    /// Encode `message` and send it as one datagram.
    pub async fn send(&self, message: &DvMessage, dest: SocketAddr) -> TransportResult<usize> {
        let data = message.encode()?;
        Ok(self.socket.send_to(&data, dest).await?)
    }
}
