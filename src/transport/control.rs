//! Framed control channel over TCP.
//!
//! Each [`ControlMessage`] travels as one length-prefixed frame, so one send
//! is always exactly one receivable unit regardless of how the stream splits
//! or coalesces segments.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use super::error::{TransportError, TransportResult};
use crate::wire::{ControlMessage, FRAME_LENGTH_SIZE, decode_frame_length, encode_frame};

/// Write one framed message.
pub async fn write_message<W>(writer: &mut W, message: &ControlMessage) -> TransportResult<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(&message.encode())?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message.
///
/// A clean or mid-frame EOF is [`TransportError::ConnectionClosed`]. A body
/// that fails to decode is consumed in full and reported as a non-fatal
/// [`TransportError::Decode`].
pub async fn read_message<R>(reader: &mut R) -> TransportResult<ControlMessage>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_LENGTH_SIZE];
    read_exact(reader, &mut header).await?;
    let len = decode_frame_length(header)?;

    let mut body = vec![0u8; len];
    read_exact(reader, &mut body).await?;
    Ok(ControlMessage::decode(&body)?)
}

async fn read_exact<R>(reader: &mut R, buf: &mut [u8]) -> TransportResult<()>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            Err(TransportError::ConnectionClosed)
        }
        Err(e) => Err(e.into()),
    }
}

/// A control connection to one peer, before it is split for a session.
#[derive(Debug)]
pub struct ControlChannel {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl ControlChannel {
    /// Connect to a peer's control port.
    pub async fn connect(addr: SocketAddr) -> TransportResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_stream(stream)
    }

    /// Wrap an accepted or connected stream.
    pub fn from_stream(stream: TcpStream) -> TransportResult<Self> {
        let peer_addr = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        Ok(Self { stream, peer_addr })
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Send one message.
    pub async fn send(&mut self, message: &ControlMessage) -> TransportResult<()> {
        write_message(&mut self.stream, message).await
    }

    /// Receive one message.
    pub async fn recv(&mut self) -> TransportResult<ControlMessage> {
        read_message(&mut self.stream).await
    }

    /// Split into independently owned halves for the reader and writer tasks.
    pub fn into_split(self) -> (ControlReader, ControlWriter) {
        let (read, write) = self.stream.into_split();
        (ControlReader { half: read }, ControlWriter { half: write })
    }
}

/// Receive half of a control channel.
#[derive(Debug)]
pub struct ControlReader {
    half: OwnedReadHalf,
}

impl ControlReader {
    /// Receive one message.
    pub async fn recv(&mut self) -> TransportResult<ControlMessage> {
        read_message(&mut self.half).await
    }
}

/// Send half of a control channel.
#[derive(Debug)]
pub struct ControlWriter {
    half: OwnedWriteHalf,
}

impl ControlWriter {
    /// Send one message.
    pub async fn send(&mut self, message: &ControlMessage) -> TransportResult<()> {
        write_message(&mut self.half, message).await
    }
}
