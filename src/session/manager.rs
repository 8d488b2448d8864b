//! Accepting, dialing and serving neighbor sessions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::handshake::handshake;
use super::state::{SessionAttempt, SessionPhase};
use crate::context::{RouterContext, SessionLink, now};
use crate::core::{NeighborId, REDIAL_BACKOFF};
use crate::routing::{Neighbor, SessionToken};
use crate::transport::{
    ControlChannel, ControlReader, ControlWriter, TransportError, TransportResult,
};
use crate::wire::{ControlMessage, HandshakeParams};

/// Depth of each session's outbound control queue.
const OUTBOUND_QUEUE: usize = 8;

/// Runs the per-neighbor session state machine.
#[derive(Debug, Clone)]
pub struct SessionManager {
    ctx: Arc<RouterContext>,
}

impl SessionManager {
    /// Create a manager over the shared router context.
    pub fn new(ctx: Arc<RouterContext>) -> Self {
        Self { ctx }
    }

    /// Accept control connections forever, one task per connection.
    pub async fn accept_loop(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let manager = self.clone();
                    tokio::spawn(async move { manager.accept_one(stream, peer).await });
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn accept_one(&self, stream: TcpStream, peer: SocketAddr) {
        let mut attempt = SessionAttempt::inbound(self.ctx.next_token(), peer);
        let config = self.ctx.config();
        let result = async {
            let mut channel = ControlChannel::from_stream(stream)?;
            let params = handshake(
                &mut channel,
                attempt.role(),
                self.ctx.local(),
                config.handshake_timeout,
            )
            .await?;
            Ok::<_, TransportError>((channel, params))
        }
        .await;

        match result.and_then(|(channel, params)| self.start(&mut attempt, channel, params)) {
            Ok(id) => debug!(neighbor = %id, %peer, "accepted session"),
            Err(e) => {
                warn!(%peer, error = %e, "inbound handshake failed");
                transition(&mut attempt, SessionPhase::Removed);
            }
        }
    }

    /// Keep a session with the neighbor at `addr` up, re-dialing with
    /// jittered exponential backoff.
    ///
    /// The loop dials until it learns which neighbor answers at `addr`.
    /// From then on no dial happens while that neighbor is established,
    /// whichever side opened the session.
    pub async fn dial_loop(self, addr: SocketAddr) {
        let config = self.ctx.config().clone();
        tokio::time::sleep(config.initial_dial_delay).await;

        let mut known: Option<NeighborId> = None;
        let mut backoff = config.redial_interval;
        loop {
            if known.as_ref().is_some_and(|id| self.ctx.is_established(id)) {
                tokio::time::sleep(jittered(config.redial_interval)).await;
                continue;
            }

            match self.dial(addr).await {
                Ok(id) => {
                    info!(neighbor = %id, %addr, "dialed session established");
                    known = Some(id);
                    backoff = config.redial_interval;
                    tokio::time::sleep(jittered(config.redial_interval)).await;
                }
                Err(e) => {
                    let delay = jittered(backoff);
                    warn!(%addr, error = %e, retry_in = ?delay, "dial failed");
                    tokio::time::sleep(delay).await;
                    backoff = (backoff * REDIAL_BACKOFF).min(config.max_redial_interval);
                }
            }
        }
    }

    /// One outbound attempt: connect, handshake, establish.
    pub async fn dial(&self, addr: SocketAddr) -> TransportResult<NeighborId> {
        let mut attempt = SessionAttempt::outbound(self.ctx.next_token(), addr);
        let timeout = self.ctx.config().handshake_timeout;

        let result = async {
            let mut channel = match tokio::time::timeout(timeout, ControlChannel::connect(addr)).await
            {
                Ok(channel) => channel?,
                Err(_) => return Err(TransportError::HandshakeTimeout),
            };
            transition(&mut attempt, SessionPhase::Handshaking);
            let params =
                handshake(&mut channel, attempt.role(), self.ctx.local(), timeout).await?;
            self.start(&mut attempt, channel, params)
        }
        .await;

        if result.is_err() {
            transition(&mut attempt, SessionPhase::Removed);
        }
        result
    }

    /// Register a handshaken session and spawn its reader and writer.
    fn start(
        &self,
        attempt: &mut SessionAttempt,
        channel: ControlChannel,
        params: HandshakeParams,
    ) -> TransportResult<NeighborId> {
        if &params.originator == self.ctx.router_id() {
            return Err(TransportError::SelfConnection);
        }
        let id = params.originator;
        let token = attempt.token();
        let neighbor = Neighbor::new(
            id.clone(),
            token,
            channel.peer_addr().ip(),
            params.udp_port,
            now(),
        );
        let (reader, writer) = channel.into_split();

        self.ctx.establish(neighbor, || {
            let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
            let read_task = tokio::spawn(read_loop(
                Arc::clone(&self.ctx),
                id.clone(),
                token,
                reader,
            ));
            let write_task = tokio::spawn(write_loop(
                Arc::clone(&self.ctx),
                id.clone(),
                token,
                writer,
                rx,
            ));
            SessionLink::new(
                token,
                tx,
                vec![read_task.abort_handle(), write_task.abort_handle()],
            )
        });
        transition(attempt, SessionPhase::Established);
        Ok(id)
    }
}

async fn read_loop(
    ctx: Arc<RouterContext>,
    id: NeighborId,
    token: SessionToken,
    mut reader: ControlReader,
) {
    loop {
        match reader.recv().await {
            Ok(ControlMessage::Hello { originator }) if originator == id => {
                ctx.record_hello(&id);
                debug!(neighbor = %id, "hello");
            }
            Ok(ControlMessage::Hello { originator }) => {
                warn!(neighbor = %id, claimed = %originator, "hello with foreign id ignored");
            }
            Ok(other) => {
                debug!(neighbor = %id, kind = other.kind(), "unexpected control message ignored");
            }
            Err(e) if !e.is_fatal() => {
                warn!(neighbor = %id, error = %e, "control message dropped");
            }
            Err(e) => {
                ctx.remove_session(&id, token, &e.to_string());
                return;
            }
        }
    }
}

async fn write_loop(
    ctx: Arc<RouterContext>,
    id: NeighborId,
    token: SessionToken,
    mut writer: ControlWriter,
    mut rx: mpsc::Receiver<ControlMessage>,
) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = writer.send(&message).await {
            ctx.remove_session(&id, token, &e.to_string());
            return;
        }
    }
}

fn transition(attempt: &mut SessionAttempt, next: SessionPhase) {
    if let Err(e) = attempt.advance(next) {
        warn!(session = %attempt.token(), peer = %attempt.peer(), error = %e, "session state");
    }
}

/// `base` plus up to a quarter of it, at random.
fn jittered(base: Duration) -> Duration {
    let spread = base.as_millis() as u64 / 4;
    base + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}
