//! Passive capture of UDP traffic on one network interface.
//!
//! Needs a raw socket, so root or `CAP_NET_RAW`. Without it `start` fails
//! with `Error::Permission` and the caller should fall back to an external
//! capture tool (see [`fallback_hint`]).

use std::io::{ErrorKind, Read};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, warn};

use crate::error::{ArchiveError, Error, Result};
use crate::transport::MAX_DATAGRAM;

pub mod archive;
pub mod packet;
pub mod summary;

pub use packet::CapturedPacket;
pub use summary::{CaptureSummary, DEFAULT_TOP_PREFIXES};

pub const DEFAULT_INTERFACE: &str = "wlan0";

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Interface to listen on
    pub interface: String,
    /// Keep only datagrams from or to this address
    pub host: Option<IpAddr>,
    /// Archive written when the capture stops
    pub output: Option<PathBuf>,
    /// Upper bound on how long `stop` waits for a pending receive
    pub read_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_string(),
            host: None,
            output: None,
            read_timeout: Duration::from_millis(200),
        }
    }
}

/// What to do when raw capture is not available.
pub fn fallback_hint(interface: &str) -> String {
    format!(
        "run with root or CAP_NET_RAW, or record with an external tool, e.g. \
         `sudo tcpdump -i {interface} -w drone.pcap udp` or \
         `sudo wireshark -i {interface} -f 'host 192.168.4.1'`"
    )
}

/// A running capture. The background thread is the only writer of the
/// packet log; the log is handed over when the thread is joined.
pub struct CaptureSession {
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    worker: JoinHandle<Vec<CapturedPacket>>,
}

impl CaptureSession {
    pub fn start(config: CaptureConfig) -> Result<Self> {
        let socket = open_raw(&config)?;
        let running = Arc::new(AtomicBool::new(true));
        let worker = {
            let running = Arc::clone(&running);
            let host = config.host;
            std::thread::Builder::new()
                .name("capture".into())
                .spawn(move || collect(&socket, host, &running))?
        };
        info!(interface = %config.interface, host = ?config.host, "capture started");
        Ok(Self {
            config,
            running,
            worker,
        })
    }

    /// End the capture and persist the log if an output is configured.
    ///
    /// The packets come back even when the archive cannot be written; the
    /// write failure is carried in [`StoppedCapture::save_error`].
    pub fn stop(self) -> Result<StoppedCapture> {
        self.running.store(false, Ordering::SeqCst);
        let packets = self
            .worker
            .join()
            .map_err(|_| Error::Network(std::io::Error::other("capture thread panicked")))?;
        info!(interface = %self.config.interface, packets = packets.len(), "capture stopped");
        Ok(finish(packets, self.config.output.as_deref()))
    }
}

/// Result of [`CaptureSession::stop`].
#[derive(Debug)]
pub struct StoppedCapture {
    pub log: CaptureLog,
    pub save_error: Option<ArchiveError>,
}

fn finish(packets: Vec<CapturedPacket>, output: Option<&Path>) -> StoppedCapture {
    let save_error = output.and_then(|path| archive::save(path, &packets).err());
    if let Some(e) = &save_error {
        warn!(error = %e, packets = packets.len(), "archive not written, packets kept in memory");
    }
    StoppedCapture {
        log: CaptureLog { packets },
        save_error,
    }
}

/// Packets recorded by one capture, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureLog {
    pub packets: Vec<CapturedPacket>,
}

impl CaptureLog {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            packets: archive::load(path)?,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        Ok(archive::save(path, &self.packets)?)
    }

    pub fn summary(&self, top: usize) -> CaptureSummary {
        CaptureSummary::new(&self.packets, top)
    }
}

fn open_raw(config: &CaptureConfig) -> Result<Socket> {
    let iface = config.interface.as_str();
    let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::UDP))
        .map_err(|e| classify(iface, e))?;
    #[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
    socket
        .bind_device(Some(iface.as_bytes()))
        .map_err(|e| classify(iface, e))?;
    socket.set_read_timeout(Some(config.read_timeout))?;
    Ok(socket)
}

fn classify(interface: &str, e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::PermissionDenied {
        Error::Permission {
            interface: interface.to_string(),
            source: e,
        }
    } else {
        Error::Network(e)
    }
}

fn collect(socket: &Socket, host: Option<IpAddr>, running: &AtomicBool) -> Vec<CapturedPacket> {
    let mut log = Vec::new();
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut reader = socket;
    while running.load(Ordering::SeqCst) {
        match reader.read(&mut buf) {
            Ok(n) => {
                if let Some(p) = record(&buf[..n], host) {
                    debug!(source = %p.source, len = p.data_length, "packet captured");
                    log.push(p);
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => {
                warn!(error = %e, "capture receive failed, stopping");
                break;
            }
        }
    }
    log
}

/// Turn one raw IPv4 packet into a record, applying the host filter.
fn record(raw: &[u8], host: Option<IpAddr>) -> Option<CapturedPacket> {
    let d = packet::parse_ipv4_udp(raw)?;
    if let Some(h) = host
        && h != IpAddr::V4(d.src)
        && h != IpAddr::V4(d.dst)
    {
        return None;
    }
    Some(CapturedPacket::new(Utc::now(), Some(IpAddr::V4(d.src)), d.payload))
}
