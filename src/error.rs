use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

/// Failures surfaced by the client, simulator and capture paths.
#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("not connected")]
    NotConnected,
    #[error("network error: {0}")]
    Network(#[from] io::Error),
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("raw capture on {interface} not permitted: {source}")]
    Permission {
        interface: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

impl Error {
    /// Stable code for adapters that report failures as structured results.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Connection(_) => "connection_error",
            Error::NotConnected => "not_connected",
            Error::Network(_) => "network_error",
            Error::Timeout(_) => "timeout",
            Error::MalformedResponse(_) => "malformed_response",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Permission { .. } => "permission_denied",
            Error::Archive(_) => "archive_error",
        }
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("archive {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("archive record {index}: {reason}")]
    Inconsistent { index: usize, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::NotConnected.code(), "not_connected");
        assert_eq!(Error::InvalidRequest("move".into()).code(), "invalid_request");
        assert_eq!(
            Error::Timeout(Duration::from_secs(5)).code(),
            "timeout"
        );
        let arch = Error::from(ArchiveError::Inconsistent {
            index: 3,
            reason: "odd hex".into(),
        });
        assert_eq!(arch.code(), "archive_error");
        assert_eq!(arch.to_string(), "archive record 3: odd hex");
    }
}
