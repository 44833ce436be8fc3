//! Registry of list fetches currently in flight, one per actor key.
//!
//! Each fetch runs as its own task so that a caller dropping its handle never
//! cancels the work other callers joined. The task owns an [`InFlightGuard`]
//! that deregisters the entry when the task ends, whether it succeeded,
//! failed, or panicked.

use futures::future::{BoxFuture, FutureExt, Shared};
use offer_types::Offer;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::actor::ActorKey;
use crate::backend::BackendError;

pub type FetchResult = Result<Vec<Offer>, BackendError>;

/// Cloneable handle on one in-flight fetch.
pub type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct Entry {
    generation: u64,
    fetch: SharedFetch,
}

#[derive(Default)]
pub struct InFlightRegistry {
    entries: Mutex<HashMap<ActorKey, Entry>>,
    next_generation: AtomicU64,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ActorKey, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
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

    /// Join the fetch in flight for `key`, or spawn `start()` as a new one.
    /// Returns the shared handle and whether an existing fetch was joined.
    ///
    /// The registry lock is held across spawn + insert, so two callers can
    /// never both start a fetch for the same key.
    pub fn join_or_start<F, Fut>(self: &Arc<Self>, key: &ActorKey, start: F) -> (SharedFetch, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let mut entries = self.lock();
        if let Some(entry) = entries.get(key) {
            return (entry.fetch.clone(), true);
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let guard = InFlightGuard {
            registry: Arc::clone(self),
            key: key.clone(),
            generation,
        };
        let work = start();
        let task = tokio::spawn(async move {
            let _guard = guard;
            work.await
        });
        let fetch = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(BackendError::Transport(format!("fetch task failed: {e}"))),
            }
        }
        .boxed()
        .shared();

        entries.insert(
            key.clone(),
            Entry {
                generation,
                fetch: fetch.clone(),
            },
        );
        (fetch, false)
    }
}

/// Owned by the fetch task. Removes its registry entry on drop.
pub struct InFlightGuard {
    registry: Arc<InFlightRegistry>,
    key: ActorKey,
    generation: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut entries = self.registry.lock();
        if entries
            .get(&self.key)
            .is_some_and(|e| e.generation == self.generation)
        {
            entries.remove(&self.key);
        }
    }
}
