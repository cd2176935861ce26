// src/proto/codec.rs
//
// The JSON datagram format below is a working guess, not the device's real
// protocol. Everything above the codec talks to `WireCodec`, so a binary
// codec can replace `JsonCodec` once captures pin the format down.
use serde_json::{Map, Value, json};
use thiserror::Error;

use super::command::{Command, CommandRequest, MoveDirection, ResponseFrame, RotateDirection};

pub const HANDSHAKE: &[u8] = b"HELLO";
pub const HANDSHAKE_ACK: &[u8] = b"OK";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("not valid UTF-8")]
    Utf8,
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a json object")]
    NotObject,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid value for {0}: {1}")]
    BadValue(&'static str, String),
    #[error("{0}={1} out of range")]
    OutOfRange(&'static str, u64),
}

/// Byte-level contract shared by the client and the simulator.
pub trait WireCodec: Send + Sync {
    fn handshake(&self) -> Vec<u8> {
        HANDSHAKE.to_vec()
    }
    fn is_handshake(&self, bytes: &[u8]) -> bool {
        bytes == HANDSHAKE
    }
    fn handshake_ack(&self) -> Vec<u8> {
        HANDSHAKE_ACK.to_vec()
    }
    fn is_handshake_ack(&self, bytes: &[u8]) -> bool {
        bytes == HANDSHAKE_ACK
    }

    fn encode_request(&self, req: &CommandRequest) -> Result<Vec<u8>, CodecError>;
    fn decode_request(&self, bytes: &[u8]) -> Result<CommandRequest, CodecError>;
    fn encode_response(&self, resp: &ResponseFrame) -> Result<Vec<u8>, CodecError>;
    fn decode_response(&self, bytes: &[u8]) -> Result<ResponseFrame, CodecError>;
}

/// `{"cmd": <name>, "params": {...}, "seq": n}` requests and
/// `{"success": bool, "seq": n, ...}` replies, one per datagram.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl WireCodec for JsonCodec {
    fn encode_request(&self, req: &CommandRequest) -> Result<Vec<u8>, CodecError> {
        let mut obj = Map::new();
        obj.insert("cmd".into(), Value::String(req.command.name().to_string()));
        obj.insert("params".into(), Value::Object(params_of(&req.command)?));
        if let Some(seq) = req.seq {
            obj.insert("seq".into(), json!(seq));
        }
        Ok(serde_json::to_vec(&Value::Object(obj))?)
    }

    fn decode_request(&self, bytes: &[u8]) -> Result<CommandRequest, CodecError> {
        let mut obj = parse_object(bytes)?;
        let name = match obj.remove("cmd") {
            Some(Value::String(s)) => s,
            Some(other) => return Err(CodecError::BadValue("cmd", other.to_string())),
            None => return Err(CodecError::MissingField("cmd")),
        };
        let params = match obj.remove("params") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(m)) => m,
            Some(other) => return Err(CodecError::BadValue("params", other.to_string())),
        };
        let seq = opt_u64(&obj, "seq")?;
        Ok(CommandRequest::new(command_from(name, params)?, seq))
    }

    fn encode_response(&self, resp: &ResponseFrame) -> Result<Vec<u8>, CodecError> {
        let mut obj = resp.payload.clone().unwrap_or_default();
        obj.insert("success".into(), Value::Bool(resp.success));
        if let Some(seq) = resp.seq {
            obj.insert("seq".into(), json!(seq));
        }
        if let Some(err) = &resp.error {
            obj.insert("error".into(), Value::String(err.clone()));
        }
        Ok(serde_json::to_vec(&Value::Object(obj))?)
    }

    fn decode_response(&self, bytes: &[u8]) -> Result<ResponseFrame, CodecError> {
        let mut obj = parse_object(bytes)?;
        let success = match obj.remove("success") {
            Some(Value::Bool(b)) => b,
            Some(other) => return Err(CodecError::BadValue("success", other.to_string())),
            None => return Err(CodecError::MissingField("success")),
        };
        let seq = opt_u64(&obj, "seq")?;
        obj.remove("seq");
        let error = match obj.remove("error") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        };
        Ok(ResponseFrame {
            seq,
            success,
            error,
            payload: (!obj.is_empty()).then_some(obj),
        })
    }
}

/* ---------- helpers ---------- */

fn parse_object(bytes: &[u8]) -> Result<Map<String, Value>, CodecError> {
    let text = std::str::from_utf8(bytes).map_err(|_| CodecError::Utf8)?;
    match serde_json::from_str::<Value>(text)? {
        Value::Object(m) => Ok(m),
        _ => Err(CodecError::NotObject),
    }
}

fn params_of(cmd: &Command) -> Result<Map<String, Value>, CodecError> {
    let mut p = Map::new();
    match cmd {
        Command::Move { direction, speed } => {
            if *speed > Command::MAX_SPEED {
                return Err(CodecError::OutOfRange("speed", u64::from(*speed)));
            }
            p.insert("direction".into(), json!(direction.as_str()));
            p.insert("speed".into(), json!(speed));
        }
        Command::Rotate { direction, angle } => {
            p.insert("direction".into(), json!(direction.as_str()));
            p.insert("angle".into(), json!(angle));
        }
        Command::Raw { params, .. } => p = params.clone(),
        Command::Takeoff | Command::Land | Command::EmergencyStop | Command::GetStatus => {}
    }
    Ok(p)
}

fn command_from(name: String, params: Map<String, Value>) -> Result<Command, CodecError> {
    Ok(match name.as_str() {
        "takeoff" => Command::Takeoff,
        "land" => Command::Land,
        "emergency_stop" => Command::EmergencyStop,
        "get_status" => Command::GetStatus,
        "move" => {
            let speed = req_u64(&params, "speed")?;
            if speed > u64::from(Command::MAX_SPEED) {
                return Err(CodecError::OutOfRange("speed", speed));
            }
            Command::Move {
                direction: req_enum::<MoveDirection>(&params, "direction")?,
                speed: speed as u8,
            }
        }
        "rotate" => {
            let angle = req_u64(&params, "angle")?;
            Command::Rotate {
                direction: req_enum::<RotateDirection>(&params, "direction")?,
                angle: u16::try_from(angle).map_err(|_| CodecError::OutOfRange("angle", angle))?,
            }
        }
        _ => Command::Raw { name, params },
    })
}

fn req_u64(map: &Map<String, Value>, k: &'static str) -> Result<u64, CodecError> {
    opt_u64(map, k)?.ok_or(CodecError::MissingField(k))
}

fn opt_u64(map: &Map<String, Value>, k: &'static str) -> Result<Option<u64>, CodecError> {
    match map.get(k) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| CodecError::BadValue(k, v.to_string())),
    }
}

fn req_enum<T: std::str::FromStr>(map: &Map<String, Value>, k: &'static str) -> Result<T, CodecError> {
    let v = map.get(k).ok_or(CodecError::MissingField(k))?;
    v.as_str()
        .and_then(|s| s.parse::<T>().ok())
        .ok_or_else(|| CodecError::BadValue(k, v.to_string()))
}

/* ---------- tests ---------- */
