//! Device client: handshake, command dispatch, status polling.
//!
//! A [`DroneClient`] is an explicit session object. Callers own it and may
//! keep several, one per device.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::proto::codec::{JsonCodec, WireCodec};
use crate::proto::command::{Command, CommandResponse};
use crate::proto::status::DeviceStatus;

pub mod connection;
pub mod dispatcher;

pub use connection::{Connection, ConnectionState};
pub use dispatcher::{Dispatcher, StatusReport};

/// Address the device's own access point hands itself.
pub const DEFAULT_DEVICE_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 4, 1));
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Device command port
    pub port: u16,
    /// Bound on every handshake and command exchange
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct DroneClient {
    conn: Connection,
    dispatcher: Dispatcher,
}

impl DroneClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_codec(config, Arc::new(JsonCodec))
    }

    pub fn with_codec(config: ClientConfig, codec: Arc<dyn WireCodec>) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&codec), config.timeout);
        Self {
            conn: Connection::new(config, codec),
            dispatcher,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.conn.peer()
    }

    pub fn connect(&mut self, ip: IpAddr) -> Result<()> {
        self.conn.connect(ip)
    }

    pub fn connect_to(&mut self, endpoint: SocketAddr) -> Result<()> {
        self.conn.connect_to(endpoint)
    }

    pub fn disconnect(&mut self) {
        self.conn.disconnect();
    }

    pub fn send(&mut self, command: Command) -> Result<CommandResponse> {
        self.dispatcher.send(&mut self.conn, command)
    }

    pub fn get_status(&mut self) -> StatusReport {
        self.dispatcher.get_status(&mut self.conn)
    }

    pub fn last_status(&self) -> DeviceStatus {
        self.dispatcher.last_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn send_while_disconnected_fails_fast() {
        let mut client = DroneClient::new(ClientConfig::default());
        let started = std::time::Instant::now();
        let err = client.send(Command::Takeoff).unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn status_while_disconnected_keeps_default() {
        let mut client = DroneClient::new(ClientConfig::default());
        let report = client.get_status();
        assert!(!report.is_fresh());
        assert!(matches!(report.error, Some(Error::NotConnected)));
        assert_eq!(report.status, DeviceStatus::default());
    }
}
