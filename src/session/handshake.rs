//! One round-trip parameter exchange on a fresh control connection.

use std::time::Duration;

use super::state::SessionRole;
use crate::transport::{ControlChannel, TransportError, TransportResult};
use crate::wire::{ControlMessage, HandshakeParams};

/// Exchange handshake parameters with the peer.
///
/// The initiator sends first and the acceptor answers. Any error, an
/// unexpected message kind, or exceeding `timeout` aborts the attempt.
pub async fn handshake(
    channel: &mut ControlChannel,
    role: SessionRole,
    local: &HandshakeParams,
    timeout: Duration,
) -> TransportResult<HandshakeParams> {
    let ours = ControlMessage::Handshake(local.clone());
    let exchange = async {
        match role {
            SessionRole::Initiator => {
                channel.send(&ours).await?;
                expect_handshake(channel.recv().await?)
            }
            SessionRole::Acceptor => {
                let theirs = expect_handshake(channel.recv().await?)?;
                channel.send(&ours).await?;
                Ok(theirs)
            }
        }
    };
    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| TransportError::HandshakeTimeout)?
}

fn expect_handshake(message: ControlMessage) -> TransportResult<HandshakeParams> {
    match message {
        ControlMessage::Handshake(params) => Ok(params),
        other => Err(TransportError::UnexpectedMessage(other.kind())),
    }
}
