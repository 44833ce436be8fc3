//! Ownership of open realtime channels, at most one per actor key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::actor::ActorKey;
use crate::realtime::{ChannelHandle, RealtimeError, RealtimeTransport};

/// An open channel plus the token that stops its event forwarder.
pub struct Subscription {
    handle: ChannelHandle,
    transport: Arc<dyn RealtimeTransport>,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new(
        handle: ChannelHandle,
        transport: Arc<dyn RealtimeTransport>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            handle,
            transport,
            cancel,
        }
    }

    fn close(self) -> Result<(), RealtimeError> {
        self.cancel.cancel();
        self.transport.close_channel(&self.handle)
    }
}

/// Result of [`SubscriptionManager::close_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseReport {
    pub closed: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct SubscriptionManager {
    entries: Mutex<HashMap<ActorKey, Subscription>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ActorKey, Subscription>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a channel for `key`, closing any channel already held for it
    /// first. On factory failure nothing is registered.
    pub fn open<F>(&self, key: ActorKey, factory: F) -> Result<ChannelHandle, RealtimeError>
    where
        F: FnOnce() -> Result<Subscription, RealtimeError>,
    {
        let previous = self.lock().remove(&key);
        if let Some(previous) = previous {
            let handle = previous.handle.id.clone();
            if let Err(e) = previous.close() {
                warn!(actor = %key, handle = %handle, error = %e, "Failed to close replaced channel");
            }
        }

        let subscription = factory()?;
        let handle = subscription.handle.clone();
        debug!(actor = %key, handle = %handle.id, "Realtime channel opened");
        if let Some(raced) = self.lock().insert(key.clone(), subscription) {
            if let Err(e) = raced.close() {
                warn!(actor = %key, error = %e, "Failed to close raced channel");
            }
        }
        Ok(handle)
    }

    /// Close the channel held for `key`, if any.
    pub fn close(&self, key: &ActorKey) -> Result<bool, RealtimeError> {
        let Some(subscription) = self.lock().remove(key) else {
            return Ok(false);
        };
        subscription.close().map(|_| true)
    }

    /// Close every channel. A failing close is logged and does not stop the
    /// others; the registry ends up empty either way.
    pub fn close_all(&self) -> CloseReport {
        let drained: Vec<(ActorKey, Subscription)> = self.lock().drain().collect();
        let mut report = CloseReport::default();
        for (key, subscription) in drained {
            let handle = subscription.handle.id.clone();
            match subscription.close() {
                Ok(()) => report.closed += 1,
                Err(e) => {
                    warn!(actor = %key, handle = %handle, error = %e, "Failed to close channel");
                    report.failed += 1;
                }
            }
        }
        report
    }

    pub fn contains(&self, key: &ActorKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
