use crate::clock::Clock;
use crate::domain::CacheEntry;
use crate::ports::EntryTable;
use crate::tables::schedule::SweepSchedule;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use shared::TtlMs;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// DashMap-backed entry table with lazy, access-triggered expiry.
///
/// Check-and-insert runs under the key's shard lock, so two concurrent first
/// arrivals for one fingerprint cannot both be admitted.
pub struct SweepTable<V>
where
    V: Debug + Clone + Send + Sync + 'static,
{
    name: String,
    entries: DashMap<String, CacheEntry<V>>,
    ttl: TtlMs,
    schedule: SweepSchedule,
    clock: Arc<dyn Clock>,
}

impl<V> SweepTable<V>
where
    V: Debug + Clone + Send + Sync + 'static,
{
    /// Create a table that sweeps on every access
    pub fn new(name: impl Into<String>, ttl: TtlMs, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
            ttl,
            schedule: SweepSchedule::new(TtlMs(0)),
            clock,
        }
    }

    /// Sweep at most once per `interval`
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
        let ttl = self.ttl;
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now_ms, ttl);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            debug!("Swept {} expired entries from '{}'", removed, self.name);
        }
        removed
    }
}

impl<V> EntryTable<V> for SweepTable<V>
where
    V: Debug + Clone + Send + Sync + 'static,
{
    fn insert_if_absent(&self, fingerprint: String, payload: V) -> Option<CacheEntry<V>> {
        let now = self.clock.now_ms();
        self.maybe_sweep(now);

        match self.entries.entry(fingerprint) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now, self.ttl) {
                    let fingerprint = occupied.key().clone();
                    occupied.insert(CacheEntry::new(fingerprint, now, payload));
                    None
                } else {
                    Some(occupied.get().clone())
                }
            }
            Entry::Vacant(vacant) => {
                let fingerprint = vacant.key().clone();
                vacant.insert(CacheEntry::new(fingerprint, now, payload));
                None
            }
        }
    }

    fn get(&self, fingerprint: &str) -> Option<CacheEntry<V>> {
        let now = self.clock.now_ms();
        self.maybe_sweep(now);

        let entry = self.entries.get(fingerprint).map(|e| e.value().clone())?;
        if entry.is_expired(now, self.ttl) {
            let ttl = self.ttl;
            self.entries
                .remove_if(fingerprint, |_, current| current.is_expired(now, ttl));
            return None;
        }
        Some(entry)
    }

    fn insert(&self, fingerprint: String, payload: V) {
        let now = self.clock.now_ms();
        self.maybe_sweep(now);

        let entry = CacheEntry::new(fingerprint.clone(), now, payload);
        self.entries.insert(fingerprint, entry);
    }

    fn remove(&self, fingerprint: &str) -> bool {
        self.entries.remove(fingerprint).is_some()
    }

    fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        self.schedule.mark(now);
        self.sweep_at(now)
    }

    fn len(&self) -> usize {
        let now = self.clock.now_ms();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now, self.ttl))
            .count()
    }

    fn ttl(&self) -> TtlMs {
        self.ttl
    }
}

impl<V> Debug for SweepTable<V>
where
    V: Debug + Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepTable")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .field("ttl_ms", &self.ttl.0)
            .field("sweep_interval_ms", &self.schedule.interval().0)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn table(clock: &ManualClock, ttl_ms: u64) -> SweepTable<String> {
        SweepTable::new("test", TtlMs(ttl_ms), Arc::new(clock.clone()))
    }

    #[test]
    fn test_insert_if_absent_detects_live_entry() {
        let clock = ManualClock::new(1_000);
        let table = table(&clock, 30_000);

        assert!(table.insert_if_absent("fp".into(), "card-1".into()).is_none());

        clock.advance(Duration::from_secs(5));
        let existing = table
            .insert_if_absent("fp".into(), "card-2".into())
            .expect("entry should still be live");
        assert_eq!(existing.payload, "card-1");
        assert_eq!(existing.recorded_at_ms, 1_000);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_replaced() {
        let clock = ManualClock::new(1_000);
        let table = table(&clock, 30_000);
        table.insert_if_absent("fp".into(), "card-1".into());

        clock.advance(Duration::from_secs(30));
        assert!(table.insert_if_absent("fp".into(), "card-2".into()).is_none());

        let entry = table.get("fp").unwrap();
        assert_eq!(entry.payload, "card-2");
        assert_eq!(entry.recorded_at_ms, 31_000);
    }

    #[test]
    fn test_get_hides_expired_entries_between_sweeps() {
        let clock = ManualClock::new(0);
        // Sweep interval far longer than the test so only the read check applies
        let table = table(&clock, 1_000).with_sweep_interval(TtlMs(3_600_000));
        table.insert("fp".into(), "card".into());
        table.insert("other".into(), "card".into());

        clock.advance(Duration::from_millis(1_500));
        assert!(table.get("fp").is_none());
        // The read removed its own key; the other expired key waits for a sweep
        assert_eq!(table.entries.len(), 1);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_len_ignores_unswept_expired_entries() {
        let clock = ManualClock::new(0);
        let table = table(&clock, 1_000).with_sweep_interval(TtlMs(3_600_000));
        table.insert("old".into(), "card".into());

        clock.advance(Duration::from_millis(700));
        table.insert("new".into(), "card".into());
        clock.advance(Duration::from_millis(500));

        assert_eq!(table.entries.len(), 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_access_triggers_sweep_of_whole_table() {
        let clock = ManualClock::new(0);
        let table = table(&clock, 1_000);
        for i in 0..10 {
            table.insert(format!("old-{i}"), "card".into());
        }

        clock.advance(Duration::from_secs(2));
        table.insert_if_absent("new".into(), "card".into());

        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_explicit_sweep_counts_removed_entries() {
        let clock = ManualClock::new(0);
        let table = table(&clock, 1_000);
        table.insert("a".into(), "card".into());
        table.insert("b".into(), "card".into());

        clock.advance(Duration::from_millis(500));
        table.insert("c".into(), "card".into());

        clock.advance(Duration::from_millis(600));
        assert_eq!(table.sweep(), 2);
        assert!(table.get("c").is_some());
    }

    #[test]
    fn test_remove() {
        let clock = ManualClock::new(0);
        let table = table(&clock, 1_000);
        table.insert("fp".into(), "card".into());

        assert!(table.remove("fp"));
        assert!(!table.remove("fp"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_concurrent_first_arrivals_admit_exactly_one() {
        let clock = ManualClock::new(0);
        let table = Arc::new(table(&clock, 60_000));
        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));
        let admitted = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|scope| {
            for i in 0..threads {
                let table = Arc::clone(&table);
                let barrier = Arc::clone(&barrier);
                let admitted = Arc::clone(&admitted);
                scope.spawn(move || {
                    barrier.wait();
                    if table
                        .insert_if_absent("same".into(), format!("card-{i}"))
                        .is_none()
                    {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), 1);
    }
}
