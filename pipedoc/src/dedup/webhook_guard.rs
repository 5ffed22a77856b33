use crate::domain::PipefyId;
use crate::ports::EntryTable;
use shared::TtlMs;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_DEDUP_TTL: TtlMs = TtlMs::from_secs(60);

/// Rejects redelivered webhook events.
///
/// An event is a duplicate when a live entry holds the same webhook
/// fingerprint. Entries are only removed by expiry.
pub struct WebhookDedupGuard {
    table: Arc<dyn EntryTable<PipefyId>>,
}

impl WebhookDedupGuard {
    pub fn new(table: Arc<dyn EntryTable<PipefyId>>) -> Self {
        Self { table }
    }

    /// Returns `true` when the fingerprint was already seen within the TTL.
    /// A first sighting is registered in the same step.
    pub fn check_and_register(&self, fingerprint: &str, card_id: &PipefyId) -> bool {
        match self
            .table
            .insert_if_absent(fingerprint.to_string(), card_id.clone())
        {
            Some(existing) => {
                info!(
                    card_id = %card_id,
                    first_card_id = %existing.payload,
                    first_seen = %existing.recorded_at_utc(),
                    "Duplicate webhook {} ignored",
                    short(fingerprint)
                );
                true
            }
            None => {
                debug!(card_id = %card_id, "Registered webhook {}", short(fingerprint));
                false
            }
        }
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
}

pub(crate) fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::tables::{MokaTable, SweepTable};
    use std::time::Duration;

    fn guard(clock: &ManualClock) -> WebhookDedupGuard {
        WebhookDedupGuard::new(Arc::new(SweepTable::new(
            "webhook-dedup",
            DEFAULT_DEDUP_TTL,
            Arc::new(clock.clone()),
        )))
    }

    #[test]
    fn test_first_delivery_is_not_a_duplicate() {
        let clock = ManualClock::new(0);
        let guard = guard(&clock);

        assert!(!guard.check_and_register("aaaa", &PipefyId::from("67890")));
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn test_redelivery_within_ttl_is_a_duplicate() {
        let clock = ManualClock::new(0);
        let guard = guard(&clock);
        let card = PipefyId::from("67890");

        assert!(!guard.check_and_register("aaaa", &card));
        clock.advance(Duration::from_secs(59));
        assert!(guard.check_and_register("aaaa", &card));
        // Duplicates do not refresh the entry
        clock.advance(Duration::from_secs(1));
        assert!(!guard.check_and_register("aaaa", &card));
    }

    #[test]
    fn test_different_fingerprints_are_independent() {
        let clock = ManualClock::new(0);
        let guard = guard(&clock);
        let card = PipefyId::from("67890");

        assert!(!guard.check_and_register("aaaa", &card));
        assert!(!guard.check_and_register("bbbb", &card));
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn test_moka_backed_guard() {
        let clock = ManualClock::new(0);
        let guard = WebhookDedupGuard::new(Arc::new(MokaTable::new(
            "webhook-dedup",
            TtlMs::from_secs(5),
            Arc::new(clock.clone()),
        )));
        let card = PipefyId::from(1u64);

        assert!(!guard.check_and_register("cccc", &card));
        assert!(guard.check_and_register("cccc", &card));
        clock.advance(Duration::from_secs(5));
        assert!(!guard.check_and_register("cccc", &card));
    }

    #[test]
    fn test_short_fingerprint() {
        assert_eq!(short("0123456789abcdef"), "0123456789ab");
        assert_eq!(short("abc"), "abc");
    }
}
