use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // ---- Flight ----
    Takeoff,
    Land,
    EmergencyStop,

    // ---- Motion ----
    Move {
        direction: MoveDirection,
        speed: u8, // 0..=100
    },
    Rotate {
        direction: RotateDirection,
        angle: u16, // degrees
    },

    // ---- Telemetry ----
    GetStatus,

    // ---- Anything the codec does not know ----
    Raw {
        name: String,
        params: Map<String, Value>,
    },
}

impl Command {
    pub const MAX_SPEED: u8 = 100;

    /// Wire name of the command.
    pub fn name(&self) -> &str {
        match self {
            Command::Takeoff => "takeoff",
            Command::Land => "land",
            Command::EmergencyStop => "emergency_stop",
            Command::Move { .. } => "move",
            Command::Rotate { .. } => "rotate",
            Command::GetStatus => "get_status",
            Command::Raw { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateDirection {
    Clockwise,
    CounterClockwise,
}

/// One command as issued by the client or as seen by the device.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub command: Command,
    /// Correlation nonce; `None` when the sender did not attach one.
    pub seq: Option<u64>,
    pub issued_at: DateTime<Utc>,
}

impl CommandRequest {
    pub fn new(command: Command, seq: Option<u64>) -> Self {
        Self {
            command,
            seq,
            issued_at: Utc::now(),
        }
    }
}

/// Reply frame as carried on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFrame {
    pub seq: Option<u64>,
    pub success: bool,
    pub error: Option<String>,
    /// Remaining top-level fields, e.g. `{"status": {...}}`.
    pub payload: Option<Map<String, Value>>,
}

impl ResponseFrame {
    pub fn ok(seq: Option<u64>) -> Self {
        Self {
            seq,
            success: true,
            error: None,
            payload: None,
        }
    }

    pub fn with_payload(mut self, key: &str, value: Value) -> Self {
        self.payload
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
        self
    }
}

/// Result of one dispatched command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    pub success: bool,
    pub payload: Option<Value>,
    pub error: Option<String>,
}

impl From<ResponseFrame> for CommandResponse {
    fn from(frame: ResponseFrame) -> Self {
        Self {
            success: frame.success,
            payload: frame.payload.map(Value::Object),
            error: frame.error,
        }
    }
}

/* ---------- enum string helpers & FromStr impls ---------- */

impl MoveDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            MoveDirection::Forward => "forward",
            MoveDirection::Backward => "backward",
            MoveDirection::Left => "left",
            MoveDirection::Right => "right",
            MoveDirection::Up => "up",
            MoveDirection::Down => "down",
        }
    }
}

impl RotateDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            RotateDirection::Clockwise => "clockwise",
            RotateDirection::CounterClockwise => "counterclockwise",
        }
    }
}

impl FromStr for MoveDirection {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "forward" => Ok(MoveDirection::Forward),
            "backward" => Ok(MoveDirection::Backward),
            "left" => Ok(MoveDirection::Left),
            "right" => Ok(MoveDirection::Right),
            "up" => Ok(MoveDirection::Up),
            "down" => Ok(MoveDirection::Down),
            _ => Err(()),
        }
    }
}

impl FromStr for RotateDirection {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "clockwise" | "cw" => Ok(RotateDirection::Clockwise),
            "counterclockwise" | "ccw" => Ok(RotateDirection::CounterClockwise),
            _ => Err(()),
        }
    }
}

impl fmt::Display for MoveDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RotateDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rotate_accepts_short_aliases() {
        assert_eq!("CW".parse(), Ok(RotateDirection::Clockwise));
        assert_eq!("ccw".parse(), Ok(RotateDirection::CounterClockwise));
        assert!("sideways".parse::<RotateDirection>().is_err());
    }

    #[test]
    fn response_payload_collects_extra_fields() {
        let frame = ResponseFrame::ok(Some(4)).with_payload("status", json!({"battery": 90}));
        let resp = CommandResponse::from(frame);
        assert!(resp.success);
        assert_eq!(resp.payload, Some(json!({"status": {"battery": 90}})));
    }
}
