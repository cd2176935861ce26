//! Client against the simulator on loopback.
//!
//! Each test starts its own simulator on an OS-chosen port, so tests can
//! run in parallel.

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use drone_probe::{
    ClientConfig, Command, ConnectionState, DeviceStatus, DroneClient, Error, MoveDirection,
    RotateDirection, Simulator,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn start_sim() -> Simulator {
    Simulator::start("127.0.0.1:0".parse().unwrap()).expect("start simulator")
}

fn client(timeout: Duration) -> DroneClient {
    DroneClient::new(ClientConfig {
        timeout,
        ..ClientConfig::default()
    })
}

fn connected(sim: &Simulator) -> DroneClient {
    let mut c = client(Duration::from_secs(2));
    c.connect_to(sim.local_addr()).expect("connect to simulator");
    c
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

#[test]
fn connect_to_simulator() {
    let sim = start_sim();
    let c = connected(&sim);
    assert_eq!(c.state(), ConnectionState::Connected);
    assert_eq!(c.peer(), Some(sim.local_addr()));
}

#[test]
fn silent_peer_fails_after_timeout() {
    // Bound but never answers.
    let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = silent.local_addr().unwrap();

    let timeout = Duration::from_millis(300);
    let mut c = client(timeout);
    let started = Instant::now();
    let err = c.connect_to(addr).unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "{err}");
    assert!(started.elapsed() >= timeout);
    assert_eq!(c.state(), ConnectionState::Disconnected);
}

#[test]
fn no_listener_fails_as_connection_error() {
    let addr: SocketAddr = {
        let s = UdpSocket::bind("127.0.0.1:0").unwrap();
        s.local_addr().unwrap()
    };
    let mut c = client(Duration::from_millis(300));
    let err = c.connect_to(addr).unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "{err}");
    assert_eq!(c.state(), ConnectionState::Disconnected);
}

#[test]
fn disconnect_then_send_is_rejected() {
    let sim = start_sim();
    let mut c = connected(&sim);
    c.disconnect();
    c.disconnect();
    assert_eq!(c.state(), ConnectionState::Disconnected);
    assert!(matches!(c.send(Command::Takeoff), Err(Error::NotConnected)));
    assert!(!sim.status().flying);
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[test]
fn takeoff_land_emergency_stop() {
    let sim = start_sim();
    let mut c = connected(&sim);

    assert!(c.send(Command::Takeoff).unwrap().success);
    let report = c.get_status();
    assert!(report.is_fresh(), "{:?}", report.error);
    assert!(report.status.flying);
    assert_eq!(report.status.altitude, 10.0);

    assert!(c.send(Command::Land).unwrap().success);
    let s = c.get_status().status;
    assert!(!s.flying);
    assert_eq!(s.altitude, 0.0);

    c.send(Command::Takeoff).unwrap();
    c.send(Command::EmergencyStop).unwrap();
    let s = c.get_status().status;
    assert!(!s.flying);
    assert!(!s.armed);
}

#[test]
fn move_is_acknowledged_without_state_change() {
    let sim = start_sim();
    let before = sim.status();
    let mut c = connected(&sim);

    let resp = c
        .send(Command::Move {
            direction: MoveDirection::Forward,
            speed: 50,
        })
        .unwrap();
    assert!(resp.success);
    assert_eq!(resp.error, None);

    let resp = c
        .send(Command::Rotate {
            direction: RotateDirection::Clockwise,
            angle: 90,
        })
        .unwrap();
    assert!(resp.success);
    assert_eq!(sim.status(), before);
}

#[test]
fn status_falls_back_to_last_known_good() {
    let mut sim = start_sim();
    let mut c = client(Duration::from_millis(300));
    c.connect_to(sim.local_addr()).unwrap();

    c.send(Command::Takeoff).unwrap();
    let good = c.get_status();
    assert!(good.is_fresh());

    sim.stop();
    let report = c.get_status();
    assert!(!report.is_fresh());
    assert!(matches!(
        report.error,
        Some(Error::Timeout(_) | Error::Network(_))
    ));
    assert_eq!(report.status, good.status);
    assert_eq!(c.last_status(), good.status);
}

#[test]
fn independent_sessions() {
    let sim_a = start_sim();
    let sim_b = start_sim();
    let mut a = connected(&sim_a);
    let mut b = connected(&sim_b);

    a.send(Command::Takeoff).unwrap();
    assert!(a.get_status().status.flying);
    assert!(!b.get_status().status.flying);
    assert_eq!(sim_b.status(), DeviceStatus::powered_on());
}

#[test]
fn stale_reply_is_not_taken_for_the_current_one() {
    // Fake device: acks the handshake, then answers the first command
    // twice (a duplicated datagram) and the second with its own seq.
    let dev = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = dev.local_addr().unwrap();
    let fake = std::thread::spawn(move || {
        let mut buf = [0u8; 1024];
        let (_, peer) = dev.recv_from(&mut buf).unwrap();
        dev.send_to(b"OK", peer).unwrap();

        let (n, peer) = dev.recv_from(&mut buf).unwrap();
        let req: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        let seq = req["seq"].as_u64().unwrap();
        let reply = format!(r#"{{"success": true, "seq": {seq}}}"#);
        dev.send_to(reply.as_bytes(), peer).unwrap();

        let (n, peer) = dev.recv_from(&mut buf).unwrap();
        let req: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        let seq2 = req["seq"].as_u64().unwrap();
        // late duplicate of the first reply, then the real one
        let stale = format!(r#"{{"success": true, "seq": {seq}, "note": "stale"}}"#);
        dev.send_to(stale.as_bytes(), peer).unwrap();
        let fresh = format!(r#"{{"success": false, "seq": {seq2}, "error": "busy"}}"#);
        dev.send_to(fresh.as_bytes(), peer).unwrap();
    });

    let mut c = client(Duration::from_secs(2));
    c.connect_to(addr).unwrap();
    assert!(c.send(Command::Takeoff).unwrap().success);
    let resp = c.send(Command::Land).unwrap();
    assert!(!resp.success);
    assert_eq!(resp.error.as_deref(), Some("busy"));
    fake.join().unwrap();
}

#[test]
fn late_handshake_ack_does_not_fail_the_command() {
    // Duplicate "OK" from the handshake shows up ahead of the real reply.
    let dev = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = dev.local_addr().unwrap();
    let fake = std::thread::spawn(move || {
        let mut buf = [0u8; 1024];
        let (_, peer) = dev.recv_from(&mut buf).unwrap();
        dev.send_to(b"OK", peer).unwrap();

        let (n, peer) = dev.recv_from(&mut buf).unwrap();
        let req: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        let seq = req["seq"].as_u64().unwrap();
        dev.send_to(b"OK", peer).unwrap();
        let reply = format!(r#"{{"success": true, "seq": {seq}}}"#);
        dev.send_to(reply.as_bytes(), peer).unwrap();
    });

    let mut c = client(Duration::from_secs(2));
    c.connect_to(addr).unwrap();
    let resp = c.send(Command::Takeoff).unwrap();
    assert!(resp.success);
    fake.join().unwrap();
}

#[test]
fn garbage_before_the_reply_is_skipped() {
    let dev = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = dev.local_addr().unwrap();
    let fake = std::thread::spawn(move || {
        let mut buf = [0u8; 1024];
        let (_, peer) = dev.recv_from(&mut buf).unwrap();
        dev.send_to(b"OK", peer).unwrap();

        let (_, peer) = dev.recv_from(&mut buf).unwrap();
        dev.send_to(b"\xcc\x01\x02", peer).unwrap();
        dev.send_to(br#"{"success": true}"#, peer).unwrap();
    });

    let mut c = client(Duration::from_secs(2));
    c.connect_to(addr).unwrap();
    assert!(c.send(Command::Land).unwrap().success);
    fake.join().unwrap();
}

#[test]
fn only_garbage_is_malformed_after_the_deadline() {
    let dev = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = dev.local_addr().unwrap();
    let fake = std::thread::spawn(move || {
        let mut buf = [0u8; 1024];
        let (_, peer) = dev.recv_from(&mut buf).unwrap();
        dev.send_to(b"OK", peer).unwrap();

        let (_, peer) = dev.recv_from(&mut buf).unwrap();
        dev.send_to(b"not json", peer).unwrap();
    });

    let timeout = Duration::from_millis(300);
    let mut c = client(timeout);
    c.connect_to(addr).unwrap();
    let started = Instant::now();
    let err = c.send(Command::Takeoff).unwrap_err();
    assert!(matches!(err, Error::MalformedResponse(_)), "{err}");
    assert!(started.elapsed() >= timeout);
    fake.join().unwrap();
}

#[test]
fn unencodable_command_is_an_invalid_request() {
    let sim = start_sim();
    let mut c = connected(&sim);
    let err = c
        .send(Command::Move {
            direction: MoveDirection::Up,
            speed: 150,
        })
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)), "{err}");
    assert_eq!(err.code(), "invalid_request");
    // the session is still usable
    assert!(c.send(Command::Takeoff).unwrap().success);
}

#[test]
fn malformed_status_is_reported_not_clamped() {
    let dev = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = dev.local_addr().unwrap();
    let fake = std::thread::spawn(move || {
        let mut buf = [0u8; 1024];
        let (_, peer) = dev.recv_from(&mut buf).unwrap();
        dev.send_to(b"OK", peer).unwrap();
        let (_, peer) = dev.recv_from(&mut buf).unwrap();
        let reply = br#"{"success": true, "status": {"battery": 180, "altitude": 0, "speed": 0, "gps_signal": 3, "armed": false, "flying": false}}"#;
        dev.send_to(reply, peer).unwrap();
    });

    let mut c = client(Duration::from_secs(2));
    c.connect_to(addr).unwrap();
    let report = c.get_status();
    assert!(matches!(report.error, Some(Error::MalformedResponse(_))));
    assert_eq!(report.status, DeviceStatus::default());
    fake.join().unwrap();
}
