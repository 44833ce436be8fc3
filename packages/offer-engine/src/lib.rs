//! # Offer Engine
//!
//! Client-side engine for buyer/supplier offer negotiation. Keeps per-actor
//! offer lists cached (TTL + stale-while-revalidate), coalesces concurrent
//! reads, serializes mutations, follows realtime pushes, and fires
//! best-effort notifications.
//!
//! ## Quick Start
//! ```bash
//! OFFERS_BACKEND_URL=http://localhost:54321 cargo run --bin offer-engine -- buyer <buyer-id>
//! ```
//!
//! ## Layout
//! - [`backend`] - remote procedure seam and its error classification
//! - [`gateway`] - typed procedures, read retry, fallback table query
//! - [`cache`], [`in_flight`], [`gate`] - read cache, fetch coalescing, mutation lock
//! - [`subscriptions`], [`realtime`] - realtime channel ownership
//! - [`notifier`] - best-effort notifications
//! - [`OfferEngine`] - the orchestrator

pub mod actor;
pub mod backend;
pub mod cache;
pub mod config;
mod engine;
mod error;
pub mod gate;
pub mod gateway;
#[cfg(feature = "http")]
pub mod http;
pub mod in_flight;
pub mod metrics;
pub mod notifier;
pub mod realtime;
pub mod state;
pub mod subscriptions;

#[cfg(test)]
pub(crate) mod testing;

pub use actor::{ActorKey, Role};
pub use backend::{BackendError, RemoteBackend};
pub use config::EngineConfig;
pub use engine::{CreatedOffer, LimitCheck, LoadOptions, MutationReceipt, OfferEngine};
pub use error::Error;
pub use gateway::PriceCheck;
pub use offer_types::{Offer, OfferInput, OfferStatus, StatusDisplay};
pub use state::{OfferBook, RoleView};
