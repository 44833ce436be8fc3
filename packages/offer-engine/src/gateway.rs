//! Typed offer procedures over a [`RemoteBackend`].
//!
//! Reads retry transient failures with exponential backoff and fall back to a
//! direct table query when the list procedure is not deployed. Mutations are
//! never retried: the backend may have applied them before the connection
//! dropped.

use chrono::{DateTime, Utc};
use offer_types::{normalize_offers, parse_timestamp, Offer, SanitizedOffer};
use rand::Rng;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::actor::ActorKey;
use crate::backend::{BackendError, RemoteBackend};
use crate::metrics::EngineMetrics;

/// Procedure names the backend exposes.
pub mod procedures {
    pub const GET_BUYER_OFFERS: &str = "get_buyer_offers";
    pub const GET_SUPPLIER_OFFERS: &str = "get_supplier_offers";
    pub const VALIDATE_OFFER_LIMITS: &str = "validate_offer_limits";
    pub const VALIDATE_OFFER_AGAINST_TIERS: &str = "validate_offer_against_tiers";
    pub const CREATE_OFFER: &str = "create_offer";
    pub const ACCEPT_OFFER: &str = "accept_offer";
    pub const REJECT_OFFER: &str = "reject_offer";
    pub const CANCEL_OFFER: &str = "cancel_offer";
    pub const MARK_OFFER_AS_PURCHASED: &str = "mark_offer_as_purchased";
    pub const DELETE_OFFER: &str = "delete_offer";
    pub const CREATE_NOTIFICATION: &str = "create_notification";
}

/// Ceiling on a single backoff sleep, before jitter.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Bounded exponential backoff for reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Sleep before `attempt` (1-based retry count): `base * 2^(attempt-1)`,
    /// capped at [`MAX_RETRY_DELAY`], plus up to 50% jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let base = base_ms
            .saturating_mul(factor)
            .min(MAX_RETRY_DELAY.as_millis() as u64);
        let jitter = rand::thread_rng().gen_range(0..=base / 2);
        Duration::from_millis(base + jitter)
    }
}

/// Answer of `validate_offer_against_tiers`. `data` is the backend answer
/// as received; tier rules differ per deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceCheck {
    pub is_valid: bool,
    pub reason: Option<String>,
    pub data: Value,
}

/// Answer of `validate_offer_limits`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitsResponse {
    pub allowed: bool,
    pub product_count: Option<u64>,
    pub supplier_count: Option<u64>,
    pub product_limit: Option<u64>,
    pub supplier_limit: Option<u64>,
    pub reason: Option<String>,
}

/// Answer of `create_offer`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateResponse {
    pub success: bool,
    pub offer_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub error_type: Option<String>,
    pub error: Option<String>,
}

/// Answer of the status-changing procedures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationResponse {
    pub success: bool,
    pub error: Option<String>,
    pub purchase_deadline: Option<DateTime<Utc>>,
}

pub struct Gateway {
    backend: Arc<dyn RemoteBackend>,
    retry: RetryPolicy,
    offers_table: String,
    metrics: Arc<EngineMetrics>,
}

impl Gateway {
    pub fn new(
        backend: Arc<dyn RemoteBackend>,
        retry: RetryPolicy,
        offers_table: impl Into<String>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            backend,
            retry,
            offers_table: offers_table.into(),
            metrics,
        }
    }

    /// Offer list for one actor: procedure with retry, table query when the
    /// procedure is missing. Any other remote error is returned as-is.
    pub async fn fetch_offers(&self, key: &ActorKey) -> Result<Vec<Offer>, BackendError> {
        let procedure = key.role.list_procedure();
        let mut args = Map::new();
        args.insert(key.role.id_arg().into(), Value::String(key.actor_id.clone()));
        let args = Value::Object(args);

        let mut last_err = None;
        for attempt in 0..self.retry.max_attempts {
            if attempt > 0 {
                EngineMetrics::bump(&self.metrics.read_retries);
                tokio::time::sleep(self.retry.delay(attempt)).await;
            }

            match self.backend.call(procedure, args.clone()).await {
                Ok(data) => {
                    let offers = normalize_offers(&data);
                    debug!(actor = %key, attempt, count = offers.len(), "Offers fetched");
                    return Ok(offers);
                }
                Err(e) if e.is_missing_procedure() => {
                    info!(actor = %key, procedure, "List procedure missing, querying table");
                    return self.fetch_from_table(key).await;
                }
                Err(e) if e.is_transient() => {
                    warn!(actor = %key, attempt, error = %e, "Offer fetch failed (retrying)");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| BackendError::Transport("offer fetch failed after retries".into())))
    }

    async fn fetch_from_table(&self, key: &ActorKey) -> Result<Vec<Offer>, BackendError> {
        EngineMetrics::bump(&self.metrics.fallback_reads);
        let rows = self
            .backend
            .select_eq(&self.offers_table, key.role.id_column(), &key.actor_id)
            .await?;
        Ok(normalize_offers(&rows))
    }

    pub async fn validate_offer_limits(
        &self,
        buyer_id: &str,
        product_id: &str,
        supplier_id: &str,
    ) -> Result<LimitsResponse, BackendError> {
        let data = self
            .backend
            .call(
                procedures::VALIDATE_OFFER_LIMITS,
                json!({
                    "p_buyer_id": buyer_id,
                    "p_product_id": product_id,
                    "p_supplier_id": supplier_id,
                }),
            )
            .await?;
        let row = first_row(&data);
        Ok(LimitsResponse {
            allowed: flag(row, "allowed").unwrap_or(false),
            product_count: number(row, "product_count"),
            supplier_count: number(row, "supplier_count"),
            product_limit: number(row, "product_limit"),
            supplier_limit: number(row, "supplier_limit"),
            reason: text(row, "reason"),
        })
    }

    /// Check an offered unit price against the product's price tiers.
    /// A bare boolean answer is accepted; an answer without any verdict
    /// counts as valid.
    pub async fn validate_offer_price(
        &self,
        product_id: &str,
        quantity: u64,
        price: u64,
    ) -> Result<PriceCheck, BackendError> {
        let data = self
            .backend
            .call(
                procedures::VALIDATE_OFFER_AGAINST_TIERS,
                json!({
                    "p_product_id": product_id,
                    "p_offered_quantity": quantity,
                    "p_offered_price": price,
                }),
            )
            .await?;
        let row = first_row(&data);
        let is_valid = match row {
            Value::Bool(b) => *b,
            _ => ["is_valid", "valid", "allowed"]
                .iter()
                .find_map(|k| flag(row, k))
                .unwrap_or(true),
        };
        let reason = ["reason", "message", "error"]
            .iter()
            .find_map(|k| text(row, k));
        Ok(PriceCheck {
            is_valid,
            reason,
            data,
        })
    }

    pub async fn create_offer(&self, offer: &SanitizedOffer) -> Result<CreateResponse, BackendError> {
        let mut args = json!({
            "p_buyer_id": offer.buyer_id,
            "p_supplier_id": offer.supplier_id,
            "p_product_id": offer.product_id,
            "p_offered_price": offer.price,
            "p_offered_quantity": offer.quantity,
            // Older deployments of the procedure read these names.
            "p_price": offer.price,
            "p_quantity": offer.quantity,
        });
        if let Some(message) = &offer.message {
            args["p_message"] = Value::String(message.clone());
        }

        let data = self.backend.call(procedures::CREATE_OFFER, args).await?;
        let row = first_row(&data);
        let offer_id = text(row, "offer_id").or_else(|| text(row, "id"));
        Ok(CreateResponse {
            success: flag(row, "success").unwrap_or(offer_id.is_some()),
            offer_id,
            expires_at: text(row, "expires_at").as_deref().and_then(parse_timestamp),
            error_type: text(row, "error_type"),
            error: text(row, "error"),
        })
    }

    pub async fn accept_offer(&self, offer_id: &str) -> Result<MutationResponse, BackendError> {
        self.mutate(procedures::ACCEPT_OFFER, json!({ "p_offer_id": offer_id }))
            .await
    }

    /// `p_rejection_reason` is sent only when a non-blank reason is given.
    pub async fn reject_offer(
        &self,
        offer_id: &str,
        reason: Option<&str>,
    ) -> Result<MutationResponse, BackendError> {
        let mut args = json!({ "p_offer_id": offer_id });
        if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
            args["p_rejection_reason"] = Value::String(reason.to_string());
        }
        self.mutate(procedures::REJECT_OFFER, args).await
    }

    pub async fn cancel_offer(&self, offer_id: &str) -> Result<MutationResponse, BackendError> {
        self.mutate(procedures::CANCEL_OFFER, json!({ "p_offer_id": offer_id }))
            .await
    }

    pub async fn mark_offer_as_purchased(
        &self,
        offer_id: &str,
        order_id: Option<&str>,
    ) -> Result<MutationResponse, BackendError> {
        self.mutate(
            procedures::MARK_OFFER_AS_PURCHASED,
            json!({ "p_offer_id": offer_id, "p_order_id": order_id }),
        )
        .await
    }

    pub async fn delete_offer(&self, offer_id: &str) -> Result<(), BackendError> {
        self.backend
            .call(procedures::DELETE_OFFER, json!({ "p_offer_id": offer_id }))
            .await
            .map(|_| ())
    }

    /// A missing `success` flag counts as success; only an explicit `false`
    /// is a refusal.
    async fn mutate(&self, procedure: &str, args: Value) -> Result<MutationResponse, BackendError> {
        let data = self.backend.call(procedure, args).await?;
        let row = first_row(&data);
        Ok(MutationResponse {
            success: flag(row, "success").unwrap_or(true),
            error: text(row, "error"),
            purchase_deadline: text(row, "purchase_deadline")
                .as_deref()
                .and_then(parse_timestamp),
        })
    }
}

/// Set-returning procedures answer with a one-row array.
fn first_row(data: &Value) -> &Value {
    match data {
        Value::Array(rows) => rows.first().unwrap_or(&Value::Null),
        other => other,
    }
}

fn flag(row: &Value, key: &str) -> Option<bool> {
    match row.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn number(row: &Value, key: &str) -> Option<u64> {
    let value = match row.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (value.is_finite() && value >= 0.0).then(|| value.trunc() as u64)
}

fn text(row: &Value, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
