//! Turn a capture into labelled samples using user action times.
//!
//! While capturing, the operator notes when each action was triggered in
//! the phone app. Every packet inside the window that follows a mark is
//! taken as a sample of that mark's label.

use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::analysis::CommandSampleSet;
use crate::capture::CapturedPacket;
use crate::error::ArchiveError;

pub const DEFAULT_WINDOW_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionMark {
    pub label: String,
    pub at: DateTime<Utc>,
    #[serde(default = "default_window")]
    pub window_ms: u64,
    /// Only take packets from this source, e.g. the phone's address.
    #[serde(default)]
    pub source: Option<String>,
}

fn default_window() -> u64 {
    DEFAULT_WINDOW_MS
}

impl ActionMark {
    fn contains(&self, at: DateTime<Utc>, source: &str) -> bool {
        let window = i64::try_from(self.window_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .unwrap_or(TimeDelta::MAX);
        let end = self.at.checked_add_signed(window);
        at >= self.at
            && end.is_none_or(|end| at < end)
            && self.source.as_deref().is_none_or(|s| s == source)
    }
}

/// Read a JSON array of marks.
pub fn load_marks(path: &Path) -> Result<Vec<ActionMark>, ArchiveError> {
    let text = fs::read_to_string(path).map_err(|source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ArchiveError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Build a sample set from `packets`. A packet inside several windows
/// counts for each of them.
pub fn correlate(packets: &[CapturedPacket], marks: &[ActionMark]) -> CommandSampleSet {
    let mut set = CommandSampleSet::new();
    for p in packets {
        let Some(at) = parse_timestamp(&p.timestamp) else {
            warn!(timestamp = %p.timestamp, "unreadable packet timestamp, skipped");
            continue;
        };
        let Ok(data) = p.bytes() else {
            continue;
        };
        for mark in marks.iter().filter(|m| m.contains(at, &p.source)) {
            debug!(label = %mark.label, len = data.len(), "sample");
            set.add_sample(&mark.label, data.clone());
        }
    }
    set
}

/// RFC 3339, or a zone-less ISO-8601 stamp taken as UTC.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|n| n.and_utc())
        })
}
