mod result_cache;
mod webhook_guard;

pub use result_cache::{DEFAULT_RESULT_TTL, DocumentResultCache, FlightGuard};
pub use webhook_guard::{DEFAULT_DEDUP_TTL, WebhookDedupGuard};
