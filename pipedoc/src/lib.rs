//! Core of the Pipefy document processor: webhook deduplication, the
//! content-addressed result cache, and the processor composing them with
//! the attachment, download, extraction and artifact collaborators.

pub mod clock;
pub mod dedup;
pub mod domain;
pub mod fingerprint;
pub mod integrations;
pub mod ports;
pub mod processor;
pub mod tables;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dedup::{DocumentResultCache, FlightGuard, WebhookDedupGuard};
pub use domain::{
    ArtifactKey, CacheEntry, Chunk, DownloadedFile, ExtractionResult, Fingerprint, PipefyId,
    ProcessingOutcome,
};
pub use processor::{Collaborators, ProcessorStats, WebhookProcessor};
pub use tables::{MokaTable, SweepTable, TableFactory};
