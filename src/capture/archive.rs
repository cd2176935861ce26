//! Whole-file JSON archive of captured packets.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::capture::packet::{CapturedPacket, to_ascii};
use crate::error::ArchiveError;

/// Write `packets` as a pretty-printed JSON array, replacing `path`.
pub fn save(path: &Path, packets: &[CapturedPacket]) -> Result<(), ArchiveError> {
    let json = serde_json::to_string_pretty(packets).map_err(|source| ArchiveError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), packets = packets.len(), "archive written");
    Ok(())
}

/// Read an archive back. Records whose hex payload does not agree with the
/// recorded length or ASCII view are rejected.
pub fn load(path: &Path) -> Result<Vec<CapturedPacket>, ArchiveError> {
    let text = fs::read_to_string(path).map_err(|source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let packets: Vec<CapturedPacket> =
        serde_json::from_str(&text).map_err(|source| ArchiveError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    for (index, p) in packets.iter().enumerate() {
        check(p).map_err(|reason| ArchiveError::Inconsistent { index, reason })?;
    }
    Ok(packets)
}

fn check(p: &CapturedPacket) -> Result<(), String> {
    let bytes = p.bytes().map_err(|e| format!("data_hex: {e}"))?;
    if p.data_hex.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("data_hex must be lowercase".into());
    }
    if bytes.len() != p.data_length {
        return Err(format!(
            "data_length={} but data_hex holds {} bytes",
            p.data_length,
            bytes.len()
        ));
    }
    if to_ascii(&bytes) != p.data_ascii {
        return Err("data_ascii does not match data_hex".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("drone-probe-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn save_then_load_keeps_every_field() {
        let packets = vec![
            CapturedPacket::new(Utc::now(), Some("192.168.4.1".parse().unwrap()), b"\x66\x14\x80HELLO"),
            CapturedPacket::new(Utc::now(), None, b""),
            CapturedPacket::new(Utc::now(), Some("10.0.0.2".parse().unwrap()), &[0u8, 255, 127, 32]),
        ];
        let path = scratch("roundtrip");
        save(&path, &packets).unwrap();
        let back = load(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(back, packets);
    }

    #[test]
    fn reads_hand_written_archive() {
        let path = scratch("handwritten");
        fs::write(
            &path,
            r#"[{"timestamp": "2025-01-01T10:00:00.123456", "source": "unknown",
                 "data_length": 2, "data_hex": "4f4b", "data_ascii": "OK"}]"#,
        )
        .unwrap();
        let back = load(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].timestamp, "2025-01-01T10:00:00.123456");
    }

    #[test]
    fn inconsistent_record_is_reported() {
        let path = scratch("inconsistent");
        fs::write(
            &path,
            r#"[{"timestamp": "t", "source": "unknown", "data_length": 3, "data_hex": "4f4b", "data_ascii": "OK"}]"#,
        )
        .unwrap();
        let err = load(&path).unwrap_err();
        fs::remove_file(&path).unwrap();
        assert!(matches!(err, ArchiveError::Inconsistent { index: 0, .. }), "{err}");
    }

    #[test]
    fn missing_and_garbled_files() {
        assert!(matches!(
            load(Path::new("/nonexistent/drone-probe.json")),
            Err(ArchiveError::Io { .. })
        ));
        let path = scratch("garbled");
        fs::write(&path, "{not json").unwrap();
        let err = load(&path).unwrap_err();
        fs::remove_file(&path).unwrap();
        assert!(matches!(err, ArchiveError::Parse { .. }));
    }
}
