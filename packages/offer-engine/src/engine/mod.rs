//! The offer engine: one handle over cache, coalescing, gate, subscriptions
//! and notifier, publishing an [`OfferBook`] to observers.

mod live;
mod load;
mod mutations;

pub use load::LoadOptions;
pub use mutations::{CreatedOffer, LimitCheck, MutationReceipt};

use offer_types::{Offer, Sanitizer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::actor::{ActorKey, Role};
use crate::backend::RemoteBackend;
use crate::cache::OfferCache;
use crate::config::EngineConfig;
use crate::error::Error;
use crate::gate::MutationGate;
use crate::gateway::Gateway;
use crate::in_flight::InFlightRegistry;
use crate::metrics::EngineMetrics;
use crate::notifier::{NotificationKind, Notifier, NotifyOutcome, OfferNotice};
use crate::realtime::RealtimeTransport;
use crate::state::OfferBook;
use crate::subscriptions::SubscriptionManager;

/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct OfferEngine {
    inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    config: EngineConfig,
    gateway: Gateway,
    notifier: Notifier,
    sanitizer: Sanitizer,
    cache: OfferCache,
    in_flight: Arc<InFlightRegistry>,
    gate: MutationGate,
    subscriptions: SubscriptionManager,
    realtime: Option<Arc<dyn RealtimeTransport>>,
    book: watch::Sender<OfferBook>,
    metrics: Arc<EngineMetrics>,
}

impl OfferEngine {
    /// Engine without a realtime transport; subscribing fails with
    /// [`Error::Config`].
    pub fn new(config: EngineConfig, backend: Arc<dyn RemoteBackend>) -> Self {
        Self::build(config, backend, None)
    }

    pub fn with_realtime(
        config: EngineConfig,
        backend: Arc<dyn RemoteBackend>,
        realtime: Arc<dyn RealtimeTransport>,
    ) -> Self {
        Self::build(config, backend, Some(realtime))
    }

    fn build(
        config: EngineConfig,
        backend: Arc<dyn RemoteBackend>,
        realtime: Option<Arc<dyn RealtimeTransport>>,
    ) -> Self {
        let metrics = Arc::new(EngineMetrics::new());
        let gateway = Gateway::new(
            Arc::clone(&backend),
            config.retry_policy(),
            config.offers_table.clone(),
            Arc::clone(&metrics),
        );
        let (book, _) = watch::channel(OfferBook::default());
        let inner = EngineInner {
            gateway,
            notifier: Notifier::new(backend),
            sanitizer: Sanitizer::new(config.quantity_ceiling),
            cache: OfferCache::new(config.cache_ttl(), config.swr_enabled),
            in_flight: Arc::new(InFlightRegistry::new()),
            gate: MutationGate::new(),
            subscriptions: SubscriptionManager::new(),
            realtime,
            book,
            metrics,
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Current published state.
    pub fn snapshot(&self) -> OfferBook {
        self.inner.book.borrow().clone()
    }

    /// Receiver that wakes on every published change.
    pub fn watch(&self) -> watch::Receiver<OfferBook> {
        self.inner.book.subscribe()
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.inner.metrics
    }

    pub fn cache(&self) -> &OfferCache {
        &self.inner.cache
    }

    pub fn set_cache_ttl(&self, ttl: Duration) {
        self.inner.cache.set_ttl(ttl);
    }

    pub fn set_swr_enabled(&self, enabled: bool) {
        self.inner.cache.set_swr_enabled(enabled);
    }

    /// Whether a list fetch for this actor is currently in flight.
    pub fn is_fetching(&self, role: Role, actor_id: &str) -> bool {
        self.inner.in_flight.contains(&ActorKey::new(role, actor_id))
    }

    pub fn is_mutating(&self) -> bool {
        self.inner.gate.is_busy()
    }

    pub fn clear_error(&self) {
        self.inner.book.send_modify(|book| book.error = None);
    }

    /// Drop cached lists and published state. Fetches already in flight run
    /// to completion and deregister themselves; open channels are kept.
    pub fn reset(&self) {
        self.inner.cache.clear();
        self.inner.book.send_replace(OfferBook::default());
        debug!("Offer engine reset");
    }
}

impl EngineInner {
    pub(crate) fn record_error(&self, err: &Error) {
        let message = err.to_string();
        self.book.send_modify(|book| {
            book.error = Some(message);
            book.loading = false;
        });
    }

    pub(crate) fn set_loading(&self, loading: bool) {
        self.book.send_modify(|book| {
            book.loading = loading;
            if loading {
                book.error = None;
            }
        });
    }

    /// Drop cache entries for both parties of an offer.
    pub(crate) fn invalidate_parties(&self, offer: &Offer) {
        if !offer.buyer_id.is_empty() {
            self.cache.invalidate(&ActorKey::buyer(offer.buyer_id.as_str()));
        }
        if !offer.supplier_id.is_empty() {
            self.cache.invalidate(&ActorKey::supplier(offer.supplier_id.as_str()));
        }
    }

    /// Fire a notification on its own task. The outcome is logged and
    /// counted, never surfaced to the caller.
    pub(crate) fn dispatch_notification(self: &Arc<Self>, kind: NotificationKind, notice: OfferNotice) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            match inner.notifier.notify(kind, &notice).await {
                NotifyOutcome::Sent { related_id, .. } => {
                    EngineMetrics::bump(&inner.metrics.notifications_sent);
                    debug!(?kind, offer = ?related_id, "Notification sent");
                }
                NotifyOutcome::Skipped(reason) => {
                    debug!(?kind, offer = ?notice.offer_id, reason = %reason, "Notification skipped");
                }
                NotifyOutcome::Failed(e) => {
                    EngineMetrics::bump(&inner.metrics.notification_failures);
                    warn!(?kind, offer = ?notice.offer_id, error = %e, "Notification failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{settle, test_engine, MockBackend};
    use serde_json::json;

    #[tokio::test]
    async fn test_reset_clears_cache_and_book() {
        let backend = MockBackend::new();
        backend.respond("get_buyer_offers", json!([{ "id": "o1", "buyer_id": "b1" }]));
        let engine = test_engine(&backend);

        engine.load_buyer_offers("b1", LoadOptions::default()).await;
        assert_eq!(engine.cache().len(), 1);
        assert_eq!(engine.snapshot().buyer.offers.len(), 1);

        engine.reset();
        assert!(engine.cache().is_empty());
        assert_eq!(engine.snapshot(), OfferBook::default());
    }

    #[tokio::test]
    async fn test_zero_ttl_at_runtime_forces_refetch() {
        let backend = MockBackend::new();
        backend.respond("get_buyer_offers", json!([{ "id": "o1", "buyer_id": "b1" }]));
        backend.respond("get_buyer_offers", json!([]));
        let engine = test_engine(&backend);

        engine.load_buyer_offers("b1", LoadOptions::default()).await;
        engine.set_cache_ttl(Duration::ZERO);
        let offers = engine.load_buyer_offers("b1", LoadOptions::default()).await;
        assert!(offers.is_empty());
        assert_eq!(backend.calls("get_buyer_offers"), 2);
    }

    #[tokio::test]
    async fn test_clear_error() {
        let backend = MockBackend::new();
        backend.fail("get_buyer_offers", crate::BackendError::remote("Database error"));
        let engine = test_engine(&backend);

        engine.load_buyer_offers("b1", LoadOptions::default()).await;
        assert!(engine.snapshot().error.is_some());
        engine.clear_error();
        assert!(engine.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn test_watch_sees_published_lists() {
        let backend = MockBackend::new();
        backend.respond("get_supplier_offers", json!([{ "id": "o1", "supplier_id": "s1" }]));
        let engine = test_engine(&backend);
        let mut rx = engine.watch();

        engine.load_supplier_offers("s1", LoadOptions::default()).await;
        settle().await;
        assert!(rx.has_changed().unwrap());
        let book = rx.borrow_and_update().clone();
        assert_eq!(book.supplier.actor_id.as_deref(), Some("s1"));
        assert_eq!(book.supplier.offers[0].id, "o1");
        assert!(!book.loading);
    }
}
