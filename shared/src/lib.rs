// shared/src/lib.rs

use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("attachment lookup failed: {0}")]
    Attachment(String),
    #[error("download failed: {0}")]
    Download(String),
    #[error("extraction failed: {0}")]
    Extraction(String),
    #[error("artifact store: {0}")]
    Artifact(String),
    #[error("config: {0}")]
    Config(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Pipeline stage the error belongs to, used as a structured log field
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Attachment(_) => "attachment",
            Error::Download(_) => "download",
            Error::Extraction(_) => "extraction",
            Error::Artifact(_) => "artifact",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Time-to-live in milliseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TtlMs(pub u64);

impl TtlMs {
    /// Saturates instead of overflowing on absurd second counts
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.0)
    }
}

pub mod config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_stage() {
        assert_eq!(Error::Download("timeout".into()).stage(), "download");
        assert_eq!(Error::Extraction("empty".into()).stage(), "extraction");
        let io = std::io::Error::other("disk full");
        assert_eq!(Error::from(io).stage(), "io");
    }

    #[test]
    fn test_ttl_conversions() {
        assert_eq!(TtlMs::from_secs(60), TtlMs(60_000));
        assert_eq!(TtlMs(1500).as_duration(), Duration::from_millis(1500));
        assert_eq!(TtlMs::from_secs(u64::MAX), TtlMs(u64::MAX));
    }
}
