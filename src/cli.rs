use clap::{Args, Parser, Subcommand};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use drone_probe::capture::{DEFAULT_INTERFACE, DEFAULT_TOP_PREFIXES};
use drone_probe::client::{DEFAULT_DEVICE_IP, DEFAULT_PORT};
use drone_probe::{Command, MoveDirection, RotateDirection};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "drone-probe",
    version,
    about = "UDP drone client, simulator and protocol capture/analysis"
)]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Record UDP traffic on an interface (needs root or CAP_NET_RAW)
    Capture(CaptureOpts),
    /// Summarize an archive; classify bytes per label when marks are given
    Analyze(AnalyzeOpts),
    /// Run a simulated device until stopped
    Simulate(SimOpts),
    /// Connect to a device and issue one command
    Send(SendOpts),
}

#[derive(Args, Debug, Clone)]
pub struct CaptureOpts {
    /// Network interface
    #[arg(long, default_value = DEFAULT_INTERFACE)]
    pub interface: String,
    /// Archive file written when the capture ends
    #[arg(long, default_value = "packets.json")]
    pub output: PathBuf,
    /// Capture duration in seconds
    #[arg(long, default_value_t = 60)]
    pub duration: u64,
    /// Keep only traffic from or to this address
    #[arg(long)]
    pub host: Option<IpAddr>,
    /// Number of prefixes in the summary
    #[arg(long, default_value_t = DEFAULT_TOP_PREFIXES)]
    pub top: usize,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeOpts {
    /// Archive produced by `capture`
    pub archive: PathBuf,
    /// JSON array of {label, at, window_ms?, source?} action marks
    #[arg(long)]
    pub marks: Option<PathBuf>,
    /// Number of prefixes in the summary
    #[arg(long, default_value_t = DEFAULT_TOP_PREFIXES)]
    pub top: usize,
}

#[derive(Args, Debug, Clone)]
pub struct SimOpts {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,
    /// Stop after this many seconds (runs forever when omitted)
    #[arg(long)]
    pub duration: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct DeviceOpts {
    /// Device address
    #[arg(long, default_value_t = DEFAULT_DEVICE_IP)]
    pub ip: IpAddr,
    /// Device command port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Reply timeout in milliseconds
    #[arg(long, default_value_t = 5_000)]
    pub timeout_ms: u64,
}

impl DeviceOpts {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Args, Debug, Clone)]
pub struct SendOpts {
    #[command(flatten)]
    pub dev: DeviceOpts,
    #[command(subcommand)]
    pub action: Action,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Action {
    Takeoff,
    Land,
    /// forward, backward, left, right, up or down
    Move {
        #[arg(value_parser = parse_move_direction)]
        direction: MoveDirection,
        /// Speed 0..=100
        #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u8).range(0..=100))]
        speed: u8,
    },
    /// clockwise (cw) or counterclockwise (ccw)
    Rotate {
        #[arg(value_parser = parse_rotate_direction)]
        direction: RotateDirection,
        /// Angle in degrees
        #[arg(long, default_value_t = 90)]
        angle: u16,
    },
    EmergencyStop,
    /// Poll telemetry
    Status,
}

impl Action {
    /// Command to dispatch; `None` for the status poll, which has its own
    /// fallback path.
    pub fn command(&self) -> Option<Command> {
        match *self {
            Action::Takeoff => Some(Command::Takeoff),
            Action::Land => Some(Command::Land),
            Action::Move { direction, speed } => Some(Command::Move { direction, speed }),
            Action::Rotate { direction, angle } => Some(Command::Rotate { direction, angle }),
            Action::EmergencyStop => Some(Command::EmergencyStop),
            Action::Status => None,
        }
    }
}

fn parse_move_direction(s: &str) -> Result<MoveDirection, String> {
    s.parse()
        .map_err(|_| format!("unknown direction '{s}' (forward, backward, left, right, up, down)"))
}

fn parse_rotate_direction(s: &str) -> Result<RotateDirection, String> {
    s.parse()
        .map_err(|_| format!("unknown direction '{s}' (clockwise, counterclockwise)"))
}
