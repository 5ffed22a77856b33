use crate::clock::format_utc_time;
use serde::{Deserialize, Deserializer, Serialize};
use shared::TtlMs;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Pipefy object identifier. Pipefy sends ids as strings or integers
/// depending on the payload, so both forms deserialize into the string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PipefyId(String);

impl PipefyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PipefyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PipefyId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for PipefyId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for PipefyId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(text) => PipefyId(text),
            Repr::Unsigned(n) => PipefyId(n.to_string()),
            Repr::Signed(n) => PipefyId(n.to_string()),
        })
    }
}

/// Time-stamped cache record shared by the dedup table and the result table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<T> {
    pub fingerprint: String,
    pub recorded_at_ms: u64,
    pub payload: T,
}

impl<T> CacheEntry<T> {
    pub fn new(fingerprint: impl Into<String>, recorded_at_ms: u64, payload: T) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            recorded_at_ms,
            payload,
        }
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.recorded_at_ms)
    }

    /// An entry whose age has reached the TTL is no longer valid
    pub fn is_expired(&self, now_ms: u64, ttl: TtlMs) -> bool {
        self.age_ms(now_ms) >= ttl.0
    }

    pub fn recorded_at_utc(&self) -> String {
        format_utc_time(self.recorded_at_ms)
    }
}

/// Cache key derived from file content.
///
/// `Unique` is produced when the content could not be read; its key is never
/// reproduced, so lookups with it always miss instead of risking a false hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingerprint {
    Content(String),
    Unique { key: String, reason: String },
}

impl Fingerprint {
    pub fn key(&self) -> &str {
        match self {
            Fingerprint::Content(key) => key,
            Fingerprint::Unique { key, .. } => key,
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(self, Fingerprint::Content(_))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fingerprint::Content(key) => write!(f, "content:{}", key),
            Fingerprint::Unique { key, reason } => write!(f, "unique:{} ({})", key, reason),
        }
    }
}

/// Output of the document extraction service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub markdown: String,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub chunk_type: Option<String>,
    #[serde(default)]
    pub chunk_id: Option<String>,
}

/// A downloaded attachment on local disk. The file is removed when this
/// value is dropped, whichever way the request ends.
#[derive(Debug)]
pub struct DownloadedFile {
    path: TempPath,
    source_url: String,
}

impl DownloadedFile {
    pub fn new(path: TempPath, source_url: impl Into<String>) -> Self {
        Self {
            path,
            source_url: source_url.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Delete the file now and report the outcome
    pub fn cleanup(self) -> std::io::Result<()> {
        self.path.close()
    }
}

/// Where an artifact is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactKey {
    /// Output scoped to the card that triggered the webhook
    Card(PipefyId),
    /// Content-addressed copy owned by the result cache
    Content(String),
}

/// How a webhook delivery was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    Duplicate,
    NoAttachment,
    Cached { artifact: PathBuf },
    Processed { artifact: PathBuf, chunks: usize },
}

impl ProcessingOutcome {
    pub fn artifact(&self) -> Option<&Path> {
        match self {
            ProcessingOutcome::Cached { artifact } | ProcessingOutcome::Processed { artifact, .. } => {
                Some(artifact.as_path())
            }
            ProcessingOutcome::Duplicate | ProcessingOutcome::NoAttachment => None,
        }
    }
}
