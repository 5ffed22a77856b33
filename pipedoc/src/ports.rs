#![deny(clippy::all)]

use crate::domain::{ArtifactKey, CacheEntry, DownloadedFile, ExtractionResult, PipefyId};
use async_trait::async_trait;
use shared::{Result, TtlMs};
use std::path::{Path, PathBuf};

// Ports are the pluggable seams between the processor and its collaborators

/// Fingerprint-keyed table of time-stamped entries.
///
/// Implementations own their TTL and clock. Entries past the TTL are never
/// returned, whether or not a sweep has removed them yet.
pub trait EntryTable<V>: Send + Sync + 'static {
    /// Insert unless a live entry already holds the fingerprint, as one
    /// atomic step. Returns the live entry when one exists.
    fn insert_if_absent(&self, fingerprint: String, payload: V) -> Option<CacheEntry<V>>;

    fn get(&self, fingerprint: &str) -> Option<CacheEntry<V>>;

    /// Insert or overwrite
    fn insert(&self, fingerprint: String, payload: V);

    fn remove(&self, fingerprint: &str) -> bool;

    /// Delete every expired entry, returning how many were removed
    fn sweep(&self) -> usize;

    /// Live entries only; expired entries awaiting a sweep are not counted
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ttl(&self) -> TtlMs;
}

/// Port for finding the document attached to a card
#[async_trait]
pub trait AttachmentResolver: Send + Sync + 'static {
    /// `Ok(None)` when the card has no usable attachment
    async fn resolve(&self, card_id: &PipefyId) -> Result<Option<String>>;
}

/// Port for downloading an attachment to local disk
#[async_trait]
pub trait FileFetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &str, card_id: &PipefyId) -> Result<DownloadedFile>;
}

/// Port for the document-understanding service
#[async_trait]
pub trait ExtractionService: Send + Sync + 'static {
    async fn extract(&self, path: &Path) -> Result<ExtractionResult>;
}

/// Port for persisting markdown artifacts
#[async_trait]
pub trait ArtifactStore: Send + Sync + 'static {
    fn path_for(&self, key: &ArtifactKey) -> PathBuf;

    async fn write(&self, key: &ArtifactKey, markdown: &str) -> Result<PathBuf>;

    /// Copy an existing artifact to `key`'s location, leaving the source intact
    async fn copy_into(&self, source: &Path, key: &ArtifactKey) -> Result<PathBuf>;
}
