use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_BATTERY: u8 = 100;
pub const MAX_GPS_SIGNAL: u8 = 5;

/// Telemetry snapshot reported by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DeviceStatus {
    pub battery: u8,
    pub altitude: f64,
    pub speed: f64,
    pub gps_signal: u8,
    pub armed: bool,
    pub flying: bool,
}

impl DeviceStatus {
    /// Values a freshly powered simulator reports.
    pub fn powered_on() -> Self {
        Self {
            battery: MAX_BATTERY,
            gps_signal: MAX_GPS_SIGNAL,
            ..Self::default()
        }
    }

    /// Decode and bounds-check a status object. Out of range values are
    /// rejected, never clamped.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let raw = RawStatus::deserialize(value).map_err(|e| format!("status: {e}"))?;
        let battery = bounded_int("battery", raw.battery, MAX_BATTERY)?;
        let gps_signal = bounded_int("gps_signal", raw.gps_signal, MAX_GPS_SIGNAL)?;
        let altitude = non_negative("altitude", raw.altitude)?;
        let speed = non_negative("speed", raw.speed)?;
        Ok(Self {
            battery,
            altitude,
            speed,
            gps_signal,
            armed: raw.armed,
            flying: raw.flying,
        })
    }
}

#[derive(Deserialize)]
struct RawStatus {
    battery: i64,
    altitude: f64,
    speed: f64,
    gps_signal: i64,
    armed: bool,
    flying: bool,
}

fn bounded_int(field: &str, v: i64, max: u8) -> Result<u8, String> {
    u8::try_from(v)
        .ok()
        .filter(|b| *b <= max)
        .ok_or_else(|| format!("{field}={v} outside 0..={max}"))
}

fn non_negative(field: &str, v: f64) -> Result<f64, String> {
    if v.is_finite() && v >= 0.0 {
        Ok(v)
    } else {
        Err(format!("{field}={v} must be a finite value >= 0"))
    }
}
