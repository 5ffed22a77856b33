use crate::clock::Clock;
use crate::domain::CacheEntry;
use crate::ports::EntryTable;
use crate::tables::schedule::SweepSchedule;
use moka::ops::compute::{CompResult, Op};
use moka::sync::Cache;
use shared::TtlMs;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

// Moka rejects a time-to-live beyond 1000 years
const MAX_MOKA_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Moka-based entry table.
///
/// Moka's own time-to-live bounds memory; liveness is still judged against
/// the injected clock so both backends expire entries identically.
pub struct MokaTable<V>
where
    V: Debug + Clone + Send + Sync + 'static,
{
    name: String,
    cache: Cache<String, CacheEntry<V>>,
    ttl: TtlMs,
    schedule: SweepSchedule,
    clock: Arc<dyn Clock>,
}

impl<V> MokaTable<V>
where
    V: Debug + Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, ttl: TtlMs, clock: Arc<dyn Clock>) -> Self {
        let name = name.into();
        let mut builder = Cache::builder().name(&name);

        if ttl.0 > 0 {
            builder = builder.time_to_live(ttl.as_duration().min(MAX_MOKA_TTL));
        }

        Self {
            name,
            cache: builder.build(),
            ttl,
            schedule: SweepSchedule::new(TtlMs(0)),
            clock,
        }
    }

    pub fn with_sweep_interval(mut self, interval: TtlMs) -> Self {
        self.schedule = SweepSchedule::new(interval);
        self
    }

    fn maybe_sweep(&self, now_ms: u64) {
        if self.schedule.claim(now_ms) {
            self.sweep_at(now_ms);
        }
    }

    fn sweep_at(&self, now_ms: u64) -> usize {
        let expired: Vec<Arc<String>> = self
            .cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(now_ms, self.ttl))
            .map(|(key, _)| key)
            .collect();

        for key in &expired {
            self.cache.invalidate(key.as_str());
        }
        self.cache.run_pending_tasks();

        if !expired.is_empty() {
            debug!("Swept {} expired entries from '{}'", expired.len(), self.name);
        }
        expired.len()
    }
}

impl<V> EntryTable<V> for MokaTable<V>
where
    V: Debug + Clone + Send + Sync + 'static,
{
    fn insert_if_absent(&self, fingerprint: String, payload: V) -> Option<CacheEntry<V>> {
        let now = self.clock.now_ms();
        self.maybe_sweep(now);

        let ttl = self.ttl;
        let fresh = CacheEntry::new(fingerprint.clone(), now, payload);
        let result = self
            .cache
            .entry(fingerprint)
            .and_compute_with(|current| match current {
                Some(current) if !current.value().is_expired(now, ttl) => Op::Nop,
                _ => Op::Put(fresh),
            });

        match result {
            CompResult::Unchanged(current) => Some(current.into_value()),
            _ => None,
        }
    }

    fn get(&self, fingerprint: &str) -> Option<CacheEntry<V>> {
        let now = self.clock.now_ms();
        self.maybe_sweep(now);

        let entry = self.cache.get(fingerprint)?;
        if entry.is_expired(now, self.ttl) {
            self.cache.invalidate(fingerprint);
            return None;
        }
        Some(entry)
    }

    fn insert(&self, fingerprint: String, payload: V) {
        let now = self.clock.now_ms();
        self.maybe_sweep(now);

        let entry = CacheEntry::new(fingerprint.clone(), now, payload);
        self.cache.insert(fingerprint, entry);
    }

    fn remove(&self, fingerprint: &str) -> bool {
        self.cache.remove(fingerprint).is_some()
    }

    fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        self.schedule.mark(now);
        self.sweep_at(now)
    }

    fn len(&self) -> usize {
        let now = self.clock.now_ms();
        self.cache
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now, self.ttl))
            .count()
    }

    fn ttl(&self) -> TtlMs {
        self.ttl
    }
}

impl<V> Debug for MokaTable<V>
where
    V: Debug + Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaTable")
            .field("name", &self.name)
            .field("entry_count", &self.cache.entry_count())
            .field("ttl_ms", &self.ttl.0)
            .finish()
    }
}
