mod moka_table;
mod schedule;
mod sweep;

pub use moka_table::MokaTable;
pub use schedule::SweepSchedule;
pub use sweep::SweepTable;

use crate::clock::Clock;
use crate::ports::EntryTable;
use shared::TtlMs;
use shared::config::CacheBackend;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::info;

/// Builds entry tables for the configured backend
#[derive(Clone)]
pub struct TableFactory {
    backend: CacheBackend,
    sweep_interval: TtlMs,
    clock: Arc<dyn Clock>,
}

impl TableFactory {
    pub fn new(backend: CacheBackend, sweep_interval: TtlMs, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            sweep_interval,
            clock,
        }
    }

    pub fn backend(&self) -> CacheBackend {
        self.backend
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn build<V>(&self, name: &str, ttl: TtlMs) -> Arc<dyn EntryTable<V>>
    where
        V: Debug + Clone + Send + Sync + 'static,
    {
        info!(
            "Creating {:?} table '{}' with ttl {} ms",
            self.backend, name, ttl.0
        );

        match self.backend {
            CacheBackend::Sweep => Arc::new(
                SweepTable::new(name, ttl, self.clock())
                    .with_sweep_interval(self.sweep_interval),
            ),
            CacheBackend::Moka => Arc::new(
                MokaTable::new(name, ttl, self.clock()).with_sweep_interval(self.sweep_interval),
            ),
        }
    }
}
