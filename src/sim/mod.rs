//! Simulated device speaking the same datagram contract as the real one.
//!
//! One background thread services one datagram at a time against a
//! [`DeviceStatus`] flight-state machine. `stop()` flags the loop, pokes the
//! bound socket with a wake datagram so a pending receive returns at once,
//! then joins the thread; the socket closes when the loop drops it.

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::proto::codec::{JsonCodec, WireCodec};
use crate::proto::command::{Command, ResponseFrame};
use crate::proto::status::DeviceStatus;
use crate::transport::MAX_DATAGRAM;

/// Altitude the device climbs to on takeoff.
pub const TAKEOFF_ALTITUDE: f64 = 10.0;

// Backstop so a lost wake datagram cannot hang `stop()`.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct Simulator {
    local_addr: SocketAddr,
    status: Arc<Mutex<DeviceStatus>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Simulator {
    /// Bind `bind` and start answering with the JSON codec.
    pub fn start(bind: SocketAddr) -> Result<Self> {
        Self::start_with(bind, Arc::new(JsonCodec), DeviceStatus::powered_on())
    }

    pub fn start_with(
        bind: SocketAddr,
        codec: Arc<dyn WireCodec>,
        initial: DeviceStatus,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(bind)?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        let local_addr = socket.local_addr()?;
        let status = Arc::new(Mutex::new(initial));
        let running = Arc::new(AtomicBool::new(true));

        let worker = {
            let status = Arc::clone(&status);
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name("sim-rx".into())
                .spawn(move || serve(socket, codec.as_ref(), &status, &running))?
        };
        info!(addr = %local_addr, "simulator listening");
        Ok(Self {
            local_addr,
            status,
            running,
            worker: Some(worker),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Snapshot of the current flight state.
    pub fn status(&self) -> DeviceStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Stop the receive loop and release the socket. Idempotent.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.running.store(false, Ordering::SeqCst);
        wake(self.local_addr);
        if worker.join().is_err() {
            warn!("simulator thread panicked");
        }
        info!(addr = %self.local_addr, "simulator stopped");
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve(socket: UdpSocket, codec: &dyn WireCodec, status: &Mutex<DeviceStatus>, running: &AtomicBool) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    while running.load(Ordering::SeqCst) {
        let (n, peer) = match socket.recv_from(&mut buf) {
            Ok(r) => r,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(e) => {
                // e.g. ICMP unreachable from a client that went away
                debug!(error = %e, "receive error");
                continue;
            }
        };
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let reply = {
            let mut state = status.lock().unwrap_or_else(PoisonError::into_inner);
            handle_datagram(codec, &mut state, &buf[..n], peer)
        };
        if let Some(bytes) = reply
            && let Err(e) = socket.send_to(&bytes, peer)
        {
            warn!(%peer, error = %e, "reply failed");
        }
    }
}

/// Apply one incoming datagram to `state` and build the reply, if any.
/// Undecodable input is logged and yields no reply.
pub fn handle_datagram(
    codec: &dyn WireCodec,
    state: &mut DeviceStatus,
    data: &[u8],
    peer: SocketAddr,
) -> Option<Vec<u8>> {
    if codec.is_handshake(data) {
        info!(%peer, "handshake");
        return Some(codec.handshake_ack());
    }

    let req = match codec.decode_request(data) {
        Ok(r) => r,
        Err(e) => {
            warn!(%peer, error = %e, len = data.len(), "skipping undecodable datagram");
            return None;
        }
    };
    debug!(%peer, cmd = req.command.name(), seq = ?req.seq, "command");

    let mut resp = ResponseFrame::ok(req.seq);
    match req.command {
        Command::Takeoff => {
            state.flying = true;
            state.altitude = TAKEOFF_ALTITUDE;
        }
        Command::Land => {
            state.flying = false;
            state.altitude = 0.0;
        }
        Command::EmergencyStop => {
            state.flying = false;
            state.armed = false;
        }
        Command::GetStatus => match serde_json::to_value(*state) {
            Ok(v) => resp = resp.with_payload("status", v),
            Err(e) => {
                warn!(error = %e, "status encode failed");
                return None;
            }
        },
        // Accepted without effect, like the lab device does.
        Command::Move { .. } | Command::Rotate { .. } | Command::Raw { .. } => {}
    }

    match codec.encode_response(&resp) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(error = %e, "reply encode failed");
            None
        }
    }
}

fn wake(addr: SocketAddr) {
    let target = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => SocketAddr::new(Ipv4Addr::LOCALHOST.into(), addr.port()),
        IpAddr::V6(ip) if ip.is_unspecified() => SocketAddr::new(Ipv6Addr::LOCALHOST.into(), addr.port()),
        _ => addr,
    };
    let local: SocketAddr = if target.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    match UdpSocket::bind(local).and_then(|s| s.send_to(&[], target)) {
        Ok(_) => {}
        Err(e) => debug!(error = %e, "wake datagram not sent, relying on poll interval"),
    }
}
