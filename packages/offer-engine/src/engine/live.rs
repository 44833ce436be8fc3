//! Realtime: one channel per actor, each pushed change reloads that actor.

use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{EngineInner, LoadOptions, OfferEngine};
use crate::actor::{ActorKey, Role};
use crate::error::Error;
use crate::metrics::EngineMetrics;
use crate::realtime::{ChangeEvent, ChannelHandle, ChannelTopic, OpenedChannel};
use crate::subscriptions::{CloseReport, Subscription};

impl OfferEngine {
    pub fn subscribe_to_buyer_offers(&self, buyer_id: &str) -> Result<ChannelHandle, Error> {
        self.subscribe(Role::Buyer, buyer_id)
    }

    pub fn subscribe_to_supplier_offers(&self, supplier_id: &str) -> Result<ChannelHandle, Error> {
        self.subscribe(Role::Supplier, supplier_id)
    }

    /// Open (or replace) the channel for this actor. Must be called inside a
    /// Tokio runtime: the event forwarder is spawned onto it.
    pub fn subscribe(&self, role: Role, actor_id: &str) -> Result<ChannelHandle, Error> {
        let transport = self
            .inner
            .realtime
            .clone()
            .ok_or_else(|| Error::Config("realtime transport not configured".into()))?;
        let key = ActorKey::new(role, actor_id);
        let engine = Arc::downgrade(&self.inner);

        let handle = self
            .inner
            .subscriptions
            .open(key.clone(), || {
                let OpenedChannel { handle, events } =
                    transport.open_channel(ChannelTopic::for_actor(&key))?;
                let cancel = CancellationToken::new();
                tokio::spawn(forward_changes(engine, key.clone(), events, cancel.clone()));
                Ok(Subscription::new(handle, Arc::clone(&transport), cancel))
            })?;

        info!(actor = %key, handle = %handle.id, "Subscribed to offer changes");
        Ok(handle)
    }

    /// Close this actor's channel. `Ok(false)` when none was open.
    pub fn unsubscribe(&self, role: Role, actor_id: &str) -> Result<bool, Error> {
        self.inner
            .subscriptions
            .close(&ActorKey::new(role, actor_id))
            .map_err(Error::from)
    }

    /// Close every channel; individual close failures are logged only.
    pub fn unsubscribe_all(&self) -> CloseReport {
        let report = self.inner.subscriptions.close_all();
        debug!(closed = report.closed, failed = report.failed, "Unsubscribed from all channels");
        report
    }
}

/// Reload the actor's list on every change until cancelled, the channel
/// ends, or the engine is dropped.
async fn forward_changes(
    engine: Weak<EngineInner>,
    key: ActorKey,
    mut events: mpsc::UnboundedReceiver<ChangeEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        let Some(event) = event else { break };
        let Some(inner) = engine.upgrade() else { break };

        EngineMetrics::bump(&inner.metrics.realtime_events);
        debug!(actor = %key, event = %event.event, "Offer change pushed");
        OfferEngine { inner }
            .load_offers(key.role, &key.actor_id, LoadOptions::forced())
            .await;
    }
    debug!(actor = %key, "Change forwarder stopped");
}
