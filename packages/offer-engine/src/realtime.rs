//! Realtime transport seam: change-feed channels filtered to one actor.

use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

use crate::actor::ActorKey;

/// Table whose row changes are pushed.
pub const OFFERS_TABLE: &str = "offers";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelTopic {
    pub name: String,
    pub table: String,
    /// Row filter, e.g. `buyer_id=eq.42`.
    pub filter: String,
}

impl ChannelTopic {
    pub fn for_actor(key: &ActorKey) -> Self {
        Self {
            name: format!("{}-offers-{}", key.role, key.actor_id),
            table: OFFERS_TABLE.into(),
            filter: format!("{}=eq.{}", key.role.id_column(), key.actor_id),
        }
    }
}

/// Opaque handle the transport hands back for an open channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelHandle {
    pub id: String,
    pub topic: ChannelTopic,
}

/// One pushed row change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// `INSERT`, `UPDATE` or `DELETE`.
    pub event: String,
    pub record: Value,
}

pub struct OpenedChannel {
    pub handle: ChannelHandle,
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeError(pub String);

impl fmt::Display for RealtimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "realtime error: {}", self.0)
    }
}

impl std::error::Error for RealtimeError {}

pub trait RealtimeTransport: Send + Sync {
    /// Open and subscribe a channel. Events arrive on the returned receiver
    /// until the channel is closed.
    fn open_channel(&self, topic: ChannelTopic) -> Result<OpenedChannel, RealtimeError>;

    fn close_channel(&self, handle: &ChannelHandle) -> Result<(), RealtimeError>;
}
