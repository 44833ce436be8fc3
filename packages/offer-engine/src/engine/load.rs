//! Read path: cache policy, coalesced fetches, background revalidation.

use offer_types::Offer;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{EngineInner, OfferEngine};
use crate::actor::{ActorKey, Role};
use crate::cache::Lookup;
use crate::error::{context, Error};
use crate::in_flight::SharedFetch;
use crate::metrics::EngineMetrics;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Skip the cache and go to the network. Still joins a fetch already in
    /// flight for the same actor.
    pub force_network: bool,
}

impl LoadOptions {
    pub fn forced() -> Self {
        Self {
            force_network: true,
        }
    }
}

impl OfferEngine {
    pub async fn load_buyer_offers(&self, buyer_id: &str, options: LoadOptions) -> Vec<Offer> {
        self.load_offers(Role::Buyer, buyer_id, options).await
    }

    pub async fn load_supplier_offers(&self, supplier_id: &str, options: LoadOptions) -> Vec<Offer> {
        self.load_offers(Role::Supplier, supplier_id, options).await
    }

    /// Offers for one actor, published as that role's list.
    ///
    /// Fresh cache → no network. Stale cache with SWR on → stale data now,
    /// refetch in the background. Otherwise fetch and wait. A failed fetch
    /// publishes an error and yields an empty list.
    pub async fn load_offers(&self, role: Role, actor_id: &str, options: LoadOptions) -> Vec<Offer> {
        let key = ActorKey::new(role, actor_id);

        if !options.force_network {
            match self.inner.cache.lookup(&key) {
                Lookup::Fresh(offers) => {
                    EngineMetrics::bump(&self.inner.metrics.cache_hits);
                    debug!(actor = %key, count = offers.len(), "Offers served from cache");
                    self.inner.show(&key, &offers);
                    return offers;
                }
                Lookup::Stale(offers) => {
                    EngineMetrics::bump(&self.inner.metrics.stale_served);
                    EngineMetrics::bump(&self.inner.metrics.revalidations);
                    debug!(actor = %key, "Stale offers served, revalidating");
                    self.inner.show(&key, &offers);
                    // Handle dropped: the fetch task runs on without us.
                    let _ = self.inner.start_fetch(&key);
                    return offers;
                }
                Lookup::Miss => {}
            }
        }

        self.inner.begin_load(&key);
        match self.inner.start_fetch(&key).await {
            Ok(offers) => {
                self.inner.end_load();
                offers
            }
            Err(e) => {
                let err = Error::from_backend(context::LOAD, e);
                warn!(actor = %key, error = %err, "Offer load failed");
                self.inner.fail_load(&key, &err);
                Vec::new()
            }
        }
    }
}

impl EngineInner {
    /// Join or start the network fetch for `key`. The fetch task itself
    /// writes the cache and publishes on success, so a revalidation nobody
    /// awaits still lands.
    pub(crate) fn start_fetch(self: &Arc<Self>, key: &ActorKey) -> SharedFetch {
        let inner = Arc::clone(self);
        let task_key = key.clone();
        let (fetch, joined) = self.in_flight.join_or_start(key, move || async move {
            EngineMetrics::bump(&inner.metrics.remote_reads);
            let result = inner.gateway.fetch_offers(&task_key).await;
            match &result {
                Ok(offers) => {
                    inner.cache.set(&task_key, offers.clone());
                    inner.publish_fetched(&task_key, offers);
                }
                Err(e) => warn!(actor = %task_key, error = %e, "Offer fetch failed"),
            }
            result
        });
        if joined {
            EngineMetrics::bump(&self.metrics.coalesced);
            debug!(actor = %key, "Joined in-flight offer fetch");
        }
        fetch
    }

    /// Point the role view at this actor and show `offers`.
    fn show(&self, key: &ActorKey, offers: &[Offer]) {
        self.book.send_modify(|book| {
            let view = book.view_mut(key.role);
            view.actor_id = Some(key.actor_id.clone());
            view.offers = offers.to_vec();
        });
    }

    /// Publish a fetch result unless the role view moved on to another actor.
    fn publish_fetched(&self, key: &ActorKey, offers: &[Offer]) {
        self.book.send_modify(|book| {
            let view = book.view_mut(key.role);
            if view.actor_id.as_deref().is_some_and(|id| id != key.actor_id) {
                return;
            }
            view.actor_id = Some(key.actor_id.clone());
            view.offers = offers.to_vec();
            book.error = None;
        });
    }

    fn begin_load(&self, key: &ActorKey) {
        self.book.send_modify(|book| {
            let view = book.view_mut(key.role);
            if !view.is_for(&key.actor_id) {
                view.actor_id = Some(key.actor_id.clone());
                view.offers.clear();
            }
            book.loading = true;
            book.error = None;
        });
    }

    fn end_load(&self) {
        let still_fetching = !self.in_flight.is_empty();
        self.book.send_modify(|book| book.loading = still_fetching);
    }

    fn fail_load(&self, key: &ActorKey, err: &Error) {
        let still_fetching = !self.in_flight.is_empty();
        let message = err.to_string();
        self.book.send_modify(|book| {
            let view = book.view_mut(key.role);
            if view.is_for(&key.actor_id) {
                view.offers.clear();
            }
            book.error = Some(message);
            book.loading = still_fetching;
        });
    }
}
