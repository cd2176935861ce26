use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::ClientConfig;
use crate::error::{Error, Result};
use crate::proto::codec::WireCodec;
use crate::transport::TransportSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Handshake and lifetime of one device session.
pub struct Connection {
    config: ClientConfig,
    codec: Arc<dyn WireCodec>,
    state: ConnectionState,
    session: Option<TransportSession>,
}

impl Connection {
    pub fn new(config: ClientConfig, codec: Arc<dyn WireCodec>) -> Self {
        Self {
            config,
            codec,
            state: ConnectionState::Disconnected,
            session: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Peer of the live session, if any.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.session.as_ref().map(TransportSession::peer)
    }

    /// Handshake with the device at `ip` on the configured port.
    pub fn connect(&mut self, ip: IpAddr) -> Result<()> {
        self.connect_to(SocketAddr::new(ip, self.config.port))
    }

    /// Handshake with an explicit endpoint. Any previous session is closed
    /// first. On failure the state is always back to `Disconnected`.
    pub fn connect_to(&mut self, endpoint: SocketAddr) -> Result<()> {
        self.disconnect();
        self.state = ConnectionState::Connecting;
        match self.handshake(endpoint) {
            Ok(session) => {
                info!(peer = %endpoint, "connected");
                self.session = Some(session);
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                warn!(peer = %endpoint, error = %e, "connect failed");
                self.state = ConnectionState::Disconnected;
                Err(match e {
                    Error::Connection(_) => e,
                    other => Error::Connection(other.to_string()),
                })
            }
        }
    }

    fn handshake(&self, endpoint: SocketAddr) -> Result<TransportSession> {
        let mut session = TransportSession::open(endpoint, self.config.timeout)?;
        let codec = Arc::clone(&self.codec);
        session.exchange_until(&codec.handshake(), self.config.timeout, |reply| {
            if codec.is_handshake_ack(reply) {
                Some(())
            } else {
                debug!(len = reply.len(), "ignoring non-ack handshake reply");
                None
            }
        })?;
        Ok(session)
    }

    /// Close the session. Safe from any state, any number of times.
    pub fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
            info!(peer = %session.peer(), "disconnected");
        }
        self.state = ConnectionState::Disconnected;
    }

    /// The live session, or `NotConnected`.
    pub(crate) fn session_mut(&mut self) -> Result<&mut TransportSession> {
        match (self.state, self.session.as_mut()) {
            (ConnectionState::Connected, Some(s)) => Ok(s),
            _ => Err(Error::NotConnected),
        }
    }
}
