use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::client::connection::Connection;
use crate::error::{Error, Result};
use crate::proto::codec::{CodecError, WireCodec};
use crate::proto::command::{Command, CommandRequest, CommandResponse};
use crate::proto::status::DeviceStatus;

/// Outcome of a status poll. `error` is set when the poll failed and
/// `status` is the last known good value instead of a fresh one.
#[derive(Debug)]
pub struct StatusReport {
    pub status: DeviceStatus,
    pub error: Option<Error>,
}

impl StatusReport {
    pub fn is_fresh(&self) -> bool {
        self.error.is_none()
    }
}

/// Serializes commands, runs one exchange per command, decodes replies.
pub struct Dispatcher {
    codec: Arc<dyn WireCodec>,
    timeout: Duration,
    next_seq: u64,
    last_status: DeviceStatus,
}

impl Dispatcher {
    pub fn new(codec: Arc<dyn WireCodec>, timeout: Duration) -> Self {
        Self {
            codec,
            timeout,
            next_seq: 1,
            last_status: DeviceStatus::default(),
        }
    }

    pub fn last_status(&self) -> DeviceStatus {
        self.last_status
    }

    /// Send one command over `conn` and wait for its reply.
    ///
    /// Fails `NotConnected` before touching the network when `conn` is not
    /// connected, and `InvalidRequest` when the codec refuses the command.
    /// Replies carrying a different `seq`, late handshake acks and
    /// undecodable datagrams are skipped within the same deadline. If only
    /// undecodable replies arrived, the last decode failure is reported as
    /// `MalformedResponse` instead of a bare timeout. Nothing is retried.
    pub fn send(&mut self, conn: &mut Connection, command: Command) -> Result<CommandResponse> {
        let session = conn.session_mut()?;
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        let req = CommandRequest::new(command, Some(seq));
        let bytes = self
            .codec
            .encode_request(&req)
            .map_err(|e| Error::InvalidRequest(format!("{}: {e}", req.command.name())))?;
        debug!(cmd = req.command.name(), seq, "dispatching");

        let codec = Arc::clone(&self.codec);
        let mut rejected: Option<CodecError> = None;
        let result = session.exchange_until(&bytes, self.timeout, |reply| {
            if codec.is_handshake_ack(reply) {
                debug!(expected = seq, "late handshake ack");
                return None;
            }
            match codec.decode_response(reply) {
                Ok(frame) if frame.seq.is_some_and(|s| s != seq) => {
                    debug!(expected = seq, got = ?frame.seq, "stale reply");
                    None
                }
                Ok(frame) => Some(frame),
                Err(e) => {
                    debug!(expected = seq, error = %e, len = reply.len(), "undecodable reply");
                    rejected = Some(e);
                    None
                }
            }
        });
        match result {
            Ok(frame) => Ok(CommandResponse::from(frame)),
            Err(Error::Timeout(window)) => Err(match rejected {
                Some(e) => Error::MalformedResponse(e.to_string()),
                None => Error::Timeout(window),
            }),
            Err(e) => Err(e),
        }
    }

    /// Poll the device status. Never leaves the caller without a status:
    /// on any failure the last known good one comes back with the error.
    pub fn get_status(&mut self, conn: &mut Connection) -> StatusReport {
        match self.fetch_status(conn) {
            Ok(status) => {
                self.last_status = status;
                StatusReport {
                    status,
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "status poll failed, keeping last known status");
                StatusReport {
                    status: self.last_status,
                    error: Some(e),
                }
            }
        }
    }

    fn fetch_status(&mut self, conn: &mut Connection) -> Result<DeviceStatus> {
        let resp = self.send(conn, Command::GetStatus)?;
        if !resp.success {
            return Err(Error::MalformedResponse(format!(
                "device refused get_status: {}",
                resp.error.as_deref().unwrap_or("no reason")
            )));
        }
        let status = resp
            .payload
            .as_ref()
            .and_then(|p| p.get("status"))
            .ok_or_else(|| Error::MalformedResponse("reply has no status".into()))?;
        DeviceStatus::from_value(status).map_err(Error::MalformedResponse)
    }
}
