use super::webhook_guard::short;
use crate::domain::Fingerprint;
use crate::ports::EntryTable;
use dashmap::DashMap;
use shared::TtlMs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

pub const DEFAULT_RESULT_TTL: TtlMs = TtlMs::from_secs(24 * 60 * 60);

type FlightMap = DashMap<String, Arc<Mutex<()>>>;

/// Maps content fingerprints to the artifact produced for that content.
///
/// A hit requires a live entry whose artifact is still on disk. `Unique`
/// fingerprints never hit and are never recorded.
pub struct DocumentResultCache {
    table: Arc<dyn EntryTable<PathBuf>>,
    in_flight: Arc<FlightMap>,
}

impl DocumentResultCache {
    pub fn new(table: Arc<dyn EntryTable<PathBuf>>) -> Self {
        Self {
            table,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Cached artifact for this content, if it is still usable
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Option<PathBuf> {
        let Fingerprint::Content(key) = fingerprint else {
            return None;
        };

        let entry = self.table.get(key)?;
        match tokio::fs::try_exists(&entry.payload).await {
            Ok(true) => {
                debug!(
                    "Result cache hit for {} -> {}",
                    short(key),
                    entry.payload.display()
                );
                Some(entry.payload)
            }
            Ok(false) => {
                debug!(
                    "Cached artifact {} is gone, dropping entry {}",
                    entry.payload.display(),
                    short(key)
                );
                self.table.remove(key);
                None
            }
            Err(e) => {
                warn!(
                    "Could not check cached artifact {}: {}",
                    entry.payload.display(),
                    e
                );
                self.table.remove(key);
                None
            }
        }
    }

    /// Remember the artifact for this content. Returns `false` when the
    /// fingerprint cannot be cached.
    pub fn record(&self, fingerprint: &Fingerprint, artifact: PathBuf) -> bool {
        match fingerprint {
            Fingerprint::Content(key) => {
                debug!("Caching {} -> {}", short(key), artifact.display());
                self.table.insert(key.clone(), artifact);
                true
            }
            Fingerprint::Unique { reason, .. } => {
                debug!("Not caching result for unreadable content: {}", reason);
                false
            }
        }
    }

    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        match fingerprint {
            Fingerprint::Content(key) => self.table.remove(key),
            Fingerprint::Unique { .. } => false,
        }
    }

    /// Wait until no other request is working on this content, then hold
    /// the slot until the returned guard is dropped.
    ///
    /// `Unique` fingerprints match nothing, so they get no guard.
    pub async fn claim(&self, fingerprint: &Fingerprint) -> Option<FlightGuard> {
        let Fingerprint::Content(key) = fingerprint else {
            return None;
        };

        let slot = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = slot.lock_owned().await;

        Some(FlightGuard {
            key: key.clone(),
            guard: Some(guard),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn ttl(&self) -> TtlMs {
        self.table.ttl()
    }

    /// Fingerprints with a request currently holding or waiting on a claim
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

/// Exclusive claim on one content fingerprint
pub struct FlightGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    in_flight: Arc<FlightMap>,
}

impl FlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left means nobody is waiting
        self.in_flight
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

impl std::fmt::Debug for FlightGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightGuard").field("key", &self.key).finish()
    }
}
