//! Client, simulator and reverse-engineering tools for a Wi-Fi quadcopter
//! that takes commands over UDP.
//!
//! - [`client`]: handshake and request/response commands against a device
//! - [`sim`]: a stand-in device speaking the same contract
//! - [`capture`]: passive recording of UDP traffic into an archive
//! - [`analysis`]: fixed/variable byte inference over labelled samples

pub mod analysis;
pub mod capture;
pub mod client;
pub mod error;
pub mod proto;
pub mod sim;
pub mod transport;

pub use client::{ClientConfig, ConnectionState, DroneClient, StatusReport};
pub use error::{ArchiveError, Error, Result};
pub use proto::command::{Command, CommandResponse, MoveDirection, RotateDirection};
pub use proto::status::DeviceStatus;
pub use sim::Simulator;
