//! Per-engine counters (lock-free atomics) with Prometheus text exposition.

use std::sync::atomic::{AtomicU64, Ordering};

pub struct EngineMetrics {
    // --- Reads ---
    /// List fetches that went to the network (one per coalesced group).
    pub remote_reads: AtomicU64,
    /// Extra attempts after a transient read failure.
    pub read_retries: AtomicU64,
    pub fallback_reads: AtomicU64,
    pub cache_hits: AtomicU64,
    pub stale_served: AtomicU64,
    /// Loads that joined a fetch already in flight.
    pub coalesced: AtomicU64,
    pub revalidations: AtomicU64,

    // --- Mutations ---
    pub mutations_ok: AtomicU64,
    pub mutations_failed: AtomicU64,
    /// Refused because another mutation held the gate.
    pub mutations_busy: AtomicU64,

    // --- Side channels ---
    pub notifications_sent: AtomicU64,
    pub notification_failures: AtomicU64,
    pub realtime_events: AtomicU64,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub const fn new() -> Self {
        Self {
            remote_reads: AtomicU64::new(0),
            read_retries: AtomicU64::new(0),
            fallback_reads: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            stale_served: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            revalidations: AtomicU64::new(0),
            mutations_ok: AtomicU64::new(0),
            mutations_failed: AtomicU64::new(0),
            mutations_busy: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            notification_failures: AtomicU64::new(0),
            realtime_events: AtomicU64::new(0),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let remote_reads = Self::get(&self.remote_reads);
        let read_retries = Self::get(&self.read_retries);
        let fallback_reads = Self::get(&self.fallback_reads);
        let cache_hits = Self::get(&self.cache_hits);
        let stale_served = Self::get(&self.stale_served);
        let coalesced = Self::get(&self.coalesced);
        let revalidations = Self::get(&self.revalidations);
        let mutations_ok = Self::get(&self.mutations_ok);
        let mutations_failed = Self::get(&self.mutations_failed);
        let mutations_busy = Self::get(&self.mutations_busy);
        let notifications_sent = Self::get(&self.notifications_sent);
        let notification_failures = Self::get(&self.notification_failures);
        let realtime_events = Self::get(&self.realtime_events);

        format!(
            "\
# HELP offers_remote_reads_total List fetches sent to the backend.\n\
# TYPE offers_remote_reads_total counter\n\
offers_remote_reads_total {remote_reads}\n\
# HELP offers_read_retries_total Read retries after transient failures.\n\
# TYPE offers_read_retries_total counter\n\
offers_read_retries_total {read_retries}\n\
# HELP offers_fallback_reads_total Reads served by the fallback table query.\n\
# TYPE offers_fallback_reads_total counter\n\
offers_fallback_reads_total {fallback_reads}\n\
# HELP offers_cache_hits_total Loads served from a fresh cache entry.\n\
# TYPE offers_cache_hits_total counter\n\
offers_cache_hits_total {cache_hits}\n\
# HELP offers_stale_served_total Loads served from a stale cache entry.\n\
# TYPE offers_stale_served_total counter\n\
offers_stale_served_total {stale_served}\n\
# HELP offers_coalesced_total Loads that joined an in-flight fetch.\n\
# TYPE offers_coalesced_total counter\n\
offers_coalesced_total {coalesced}\n\
# HELP offers_revalidations_total Background revalidations started.\n\
# TYPE offers_revalidations_total counter\n\
offers_revalidations_total {revalidations}\n\
# HELP offers_mutations_ok_total Mutations the backend accepted.\n\
# TYPE offers_mutations_ok_total counter\n\
offers_mutations_ok_total {mutations_ok}\n\
# HELP offers_mutations_failed_total Mutations that failed.\n\
# TYPE offers_mutations_failed_total counter\n\
offers_mutations_failed_total {mutations_failed}\n\
# HELP offers_mutations_busy_total Mutations refused while another was running.\n\
# TYPE offers_mutations_busy_total counter\n\
offers_mutations_busy_total {mutations_busy}\n\
# HELP offers_notifications_sent_total Notifications delivered.\n\
# TYPE offers_notifications_sent_total counter\n\
offers_notifications_sent_total {notifications_sent}\n\
# HELP offers_notification_failures_total Notifications that failed.\n\
# TYPE offers_notification_failures_total counter\n\
offers_notification_failures_total {notification_failures}\n\
# HELP offers_realtime_events_total Realtime change events received.\n\
# TYPE offers_realtime_events_total counter\n\
offers_realtime_events_total {realtime_events}\n"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_counts() {
        let metrics = EngineMetrics::new();
        EngineMetrics::bump(&metrics.cache_hits);
        EngineMetrics::bump(&metrics.cache_hits);
        let text = metrics.render();
        assert!(text.contains("# TYPE offers_cache_hits_total counter\n"));
        assert!(text.contains("\noffers_cache_hits_total 2\n"));
        assert!(text.contains("\noffers_remote_reads_total 0\n"));
    }
}
