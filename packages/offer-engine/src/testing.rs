//! Shared test doubles: a scripted backend and an in-memory realtime hub.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::backend::{BackendError, RemoteBackend};
use crate::config::EngineConfig;
use crate::engine::OfferEngine;
use crate::gateway::procedures;
use crate::realtime::{
    ChangeEvent, ChannelHandle, ChannelTopic, OpenedChannel, RealtimeError, RealtimeTransport,
};

struct Scripted {
    result: Result<Value, BackendError>,
    delay: Option<Duration>,
}

/// Backend answering from per-procedure FIFO scripts. Unscripted calls fail,
/// except `create_notification`, which succeeds.
#[derive(Default)]
pub(crate) struct MockBackend {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    select_script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<(String, Value)>>,
    selects: Mutex<Vec<(String, String, String)>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, procedure: &str, result: Result<Value, BackendError>, delay: Option<Duration>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(procedure.to_string())
            .or_default()
            .push_back(Scripted { result, delay });
    }

    pub fn respond(&self, procedure: &str, value: Value) {
        self.push(procedure, Ok(value), None);
    }

    pub fn respond_after(&self, procedure: &str, delay: Duration, value: Value) {
        self.push(procedure, Ok(value), Some(delay));
    }

    pub fn fail(&self, procedure: &str, err: BackendError) {
        self.push(procedure, Err(err), None);
    }

    pub fn respond_select(&self, value: Value) {
        self.select_script.lock().unwrap().push_back(Scripted {
            result: Ok(value),
            delay: None,
        });
    }

    pub fn calls(&self, procedure: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == procedure)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len() + self.select_calls()
    }

    pub fn args(&self, procedure: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == procedure)
            .map(|(_, args)| args.clone())
            .collect()
    }

    pub fn select_calls(&self) -> usize {
        self.selects.lock().unwrap().len()
    }

    pub fn selects(&self) -> Vec<(String, String, String)> {
        self.selects.lock().unwrap().clone()
    }
}

async fn play(script: Option<Scripted>, missing: String) -> Result<Value, BackendError> {
    let Some(script) = script else {
        return Err(BackendError::remote(missing));
    };
    if let Some(delay) = script.delay {
        tokio::time::sleep(delay).await;
    }
    script.result
}

#[async_trait]
impl RemoteBackend for MockBackend {
    async fn call(&self, procedure: &str, args: Value) -> Result<Value, BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push((procedure.to_string(), args));
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(procedure)
            .and_then(VecDeque::pop_front);
        if script.is_none() && procedure == procedures::CREATE_NOTIFICATION {
            return Ok(json!({ "id": "notification-1" }));
        }
        play(script, format!("no scripted response for {procedure}")).await
    }

    async fn select_eq(&self, table: &str, column: &str, value: &str) -> Result<Value, BackendError> {
        self.selects
            .lock()
            .unwrap()
            .push((table.to_string(), column.to_string(), value.to_string()));
        let script = self.select_script.lock().unwrap().pop_front();
        play(script, format!("no scripted rows for {table}")).await
    }
}

/// Realtime hub keeping one sender per open channel.
#[derive(Default)]
pub(crate) struct MockRealtime {
    next_id: AtomicU64,
    senders: Mutex<HashMap<String, (ChannelTopic, mpsc::UnboundedSender<ChangeEvent>)>>,
    opened: Mutex<Vec<ChannelTopic>>,
    closed: Mutex<Vec<ChannelHandle>>,
    failing: Mutex<HashSet<String>>,
}

impl MockRealtime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Closing any channel on this topic will report an error.
    pub fn fail_close_for(&self, topic_name: &str) {
        self.failing.lock().unwrap().insert(topic_name.to_string());
    }

    /// Deliver `event` to every open channel on `topic_name`.
    pub fn push(&self, topic_name: &str, event: ChangeEvent) {
        for (topic, tx) in self.senders.lock().unwrap().values() {
            if topic.name == topic_name {
                let _ = tx.send(event.clone());
            }
        }
    }

    pub fn opened(&self) -> Vec<ChannelTopic> {
        self.opened.lock().unwrap().clone()
    }

    pub fn closed(&self) -> Vec<ChannelHandle> {
        self.closed.lock().unwrap().clone()
    }
}

impl RealtimeTransport for MockRealtime {
    fn open_channel(&self, topic: ChannelTopic) -> Result<OpenedChannel, RealtimeError> {
        let id = format!("ch-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders
            .lock()
            .unwrap()
            .insert(id.clone(), (topic.clone(), tx));
        self.opened.lock().unwrap().push(topic.clone());
        Ok(OpenedChannel {
            handle: ChannelHandle { id, topic },
            events: rx,
        })
    }

    fn close_channel(&self, handle: &ChannelHandle) -> Result<(), RealtimeError> {
        self.closed.lock().unwrap().push(handle.clone());
        self.senders.lock().unwrap().remove(&handle.id);
        if self.failing.lock().unwrap().contains(&handle.topic.name) {
            return Err(RealtimeError(format!("close failed for {}", handle.id)));
        }
        Ok(())
    }
}

/// Default config with a short retry base and SWR off.
pub(crate) fn test_config() -> EngineConfig {
    EngineConfig {
        swr_enabled: false,
        retry_base_delay_ms: 10,
        backend_url: "http://backend.test".into(),
        ..EngineConfig::default()
    }
}

pub(crate) fn test_engine(backend: &Arc<MockBackend>) -> OfferEngine {
    test_engine_with(backend, test_config())
}

pub(crate) fn test_engine_with(backend: &Arc<MockBackend>, config: EngineConfig) -> OfferEngine {
    OfferEngine::new(config, backend.clone())
}

pub(crate) fn test_live_engine(backend: &Arc<MockBackend>, realtime: &Arc<MockRealtime>) -> OfferEngine {
    OfferEngine::with_realtime(test_config(), backend.clone(), realtime.clone())
}

/// Let spawned tasks (notifications, revalidations, forwarders) run.
pub(crate) async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
