//! Datagram session with a single remote device.
//!
//! [`TransportSession`] owns one connected UDP socket. Exchanges take
//! `&mut self`, so at most one request/response is ever in flight on a
//! session: the protocol has no pipelining and the borrow checker keeps it
//! that way.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Largest datagram we are prepared to receive.
pub const MAX_DATAGRAM: usize = 65_535;

#[derive(Debug)]
pub struct TransportSession {
    peer: SocketAddr,
    socket: Option<UdpSocket>,
}

impl TransportSession {
    /// Bind an ephemeral local port and connect it to `peer`.
    ///
    /// Connecting the socket makes the kernel drop datagrams from any other
    /// source, and surfaces ICMP unreachable errors on the next receive.
    pub fn open(peer: SocketAddr, timeout: Duration) -> Result<Self> {
        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .map_err(|e| Error::Connection(format!("bind {local}: {e}")))?;
        socket
            .connect(peer)
            .map_err(|e| Error::Connection(format!("{peer}: {e}")))?;
        if !timeout.is_zero() {
            socket
                .set_read_timeout(Some(timeout))
                .map_err(|e| Error::Connection(format!("{peer}: {e}")))?;
        }
        debug!(%peer, local = ?socket.local_addr().ok(), "session opened");
        Ok(Self {
            peer,
            socket: Some(socket),
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Send `bytes` and return the first datagram that comes back.
    pub fn exchange(&mut self, bytes: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        self.exchange_until(bytes, timeout, |reply| Some(reply.to_vec()))
    }

    /// Send `bytes`, then feed every reply to `accept` until it yields a
    /// value or `timeout` elapses. Rejected replies are dropped; the
    /// request is never re-sent.
    pub fn exchange_until<T>(
        &mut self,
        bytes: &[u8],
        timeout: Duration,
        mut accept: impl FnMut(&[u8]) -> Option<T>,
    ) -> Result<T> {
        let socket = self.socket.as_ref().ok_or(Error::NotConnected)?;
        drain_stale(socket, self.peer)?;
        socket.send(bytes)?;
        trace!(peer = %self.peer, len = bytes.len(), "sent");

        let deadline = Instant::now() + timeout;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout(timeout));
            }
            socket.set_read_timeout(Some(remaining))?;
            match socket.recv(&mut buf) {
                Ok(n) => {
                    trace!(peer = %self.peer, len = n, "received");
                    if let Some(v) = accept(&buf[..n]) {
                        return Ok(v);
                    }
                    debug!(peer = %self.peer, len = n, "dropping unmatched reply");
                }
                // Re-checked against the deadline at the top of the loop.
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) => return Err(Error::Network(e)),
            }
        }
    }

    /// Release the socket. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!(peer = %self.peer, "session closed");
        }
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Discard datagrams left over from earlier exchanges so they cannot be
/// taken as the reply to the next request.
fn drain_stale(socket: &UdpSocket, peer: SocketAddr) -> Result<()> {
    socket.set_nonblocking(true)?;
    let mut buf = [0u8; 2048];
    let result = loop {
        match socket.recv(&mut buf) {
            Ok(n) => debug!(%peer, len = n, "discarding stale datagram"),
            Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
            // A pending ICMP error belongs to an earlier exchange too.
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => continue,
            Err(e) => break Err(Error::Network(e)),
        }
    };
    socket.set_nonblocking(false)?;
    result
}
