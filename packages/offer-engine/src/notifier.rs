//! Best-effort user notifications about offer lifecycle events.
//!
//! Every entry point resolves to a [`NotifyOutcome`]; nothing here returns an
//! error or panics on bad input.

use chrono::{DateTime, SecondsFormat, Utc};
use offer_types::Offer;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::actor::Role;
use crate::backend::{BackendError, RemoteBackend};
use crate::gateway::procedures;

const SUPPLIER_OFFERS_URL: &str = "/supplier/offers";
const BUYER_OFFERS_URL: &str = "/buyer/offers";

/// Offer fields a notification may mention. Built from a canonical [`Offer`]
/// or from a loose record carrying current or legacy field names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfferNotice {
    pub offer_id: Option<String>,
    pub buyer_id: Option<String>,
    pub supplier_id: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub buyer_name: Option<String>,
    pub supplier_name: Option<String>,
    pub quantity: Option<u64>,
    pub price: Option<u64>,
    pub expires_at: Option<String>,
    pub purchase_deadline: Option<String>,
    pub rejection_reason: Option<String>,
}

impl OfferNotice {
    pub fn from_value(raw: &Value) -> Self {
        Self {
            offer_id: text(raw, &["/id", "/offer_id"]),
            buyer_id: text(raw, &["/buyer_id", "/buyer/id"]),
            supplier_id: text(raw, &["/supplier_id", "/supplier/id"]),
            product_id: text(raw, &["/product_id", "/product/id"]),
            product_name: text(raw, &["/product_name", "/product/name"]),
            buyer_name: text(raw, &["/buyer_name", "/buyer/name"]),
            supplier_name: text(raw, &["/supplier_name", "/supplier/name"]),
            quantity: count(raw, &["/quantity", "/offered_quantity"]),
            price: count(raw, &["/price", "/offered_price"]),
            expires_at: text(raw, &["/expires_at"]),
            purchase_deadline: text(raw, &["/purchase_deadline"]),
            rejection_reason: text(raw, &["/rejection_reason"]),
        }
    }
}

impl From<&Offer> for OfferNotice {
    fn from(offer: &Offer) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            offer_id: non_empty(&offer.id),
            buyer_id: non_empty(&offer.buyer_id),
            supplier_id: non_empty(&offer.supplier_id),
            product_id: non_empty(&offer.product_id),
            product_name: offer.product_name.clone(),
            buyer_name: offer.buyer_name.clone(),
            supplier_name: offer.supplier_name.clone(),
            quantity: Some(offer.quantity).filter(|q| *q > 0),
            price: Some(offer.price).filter(|p| *p > 0),
            expires_at: offer.expires_at.map(rfc3339),
            purchase_deadline: offer.purchase_deadline.map(rfc3339),
            rejection_reason: offer.rejection_reason.clone(),
        }
    }
}

/// How the supplier answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Accepted,
    Rejected,
}

impl Response {
    /// `None` for anything other than an accept/reject status.
    pub fn parse(status: &str) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "accepted" | "approved" => Some(Response::Accepted),
            "rejected" => Some(Response::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// To the supplier, when an offer is created.
    Received,
    /// To the buyer, when the supplier answers.
    Response(Response),
    /// To whichever side `Role` names.
    Expired(Role),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotifyOutcome {
    Sent {
        related_id: Option<String>,
        metadata: Value,
    },
    /// Nothing was sent (no recipient, bad status).
    Skipped(String),
    Failed(BackendError),
}

impl NotifyOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotifyOutcome::Sent { .. })
    }
}

#[derive(Clone)]
pub struct Notifier {
    backend: Arc<dyn RemoteBackend>,
}

impl Notifier {
    pub fn new(backend: Arc<dyn RemoteBackend>) -> Self {
        Self { backend }
    }

    pub async fn notify_offer_received(&self, notice: &OfferNotice) -> NotifyOutcome {
        self.notify(NotificationKind::Received, notice).await
    }

    /// `status` is the raw new status; anything but accepted/rejected is skipped.
    pub async fn notify_offer_response(&self, notice: &OfferNotice, status: &str) -> NotifyOutcome {
        match Response::parse(status) {
            Some(response) => self.notify(NotificationKind::Response(response), notice).await,
            None => NotifyOutcome::Skipped(format!("no response notification for status {status:?}")),
        }
    }

    pub async fn notify_offer_expired(&self, notice: &OfferNotice, role: Role) -> NotifyOutcome {
        self.notify(NotificationKind::Expired(role), notice).await
    }

    pub async fn notify(&self, kind: NotificationKind, notice: &OfferNotice) -> NotifyOutcome {
        let Some(payload) = build_payload(kind, notice, Utc::now()) else {
            debug!(?kind, offer = ?notice.offer_id, "Notification skipped: no recipient");
            return NotifyOutcome::Skipped("missing recipient".into());
        };
        let metadata = payload.get("p_metadata").cloned().unwrap_or(Value::Null);

        match self
            .backend
            .call(procedures::CREATE_NOTIFICATION, json!({ "p_payload": payload }))
            .await
        {
            Ok(_) => NotifyOutcome::Sent {
                related_id: notice.offer_id.clone(),
                metadata,
            },
            Err(e) => NotifyOutcome::Failed(e),
        }
    }
}

/// `None` when the recipient id is missing.
fn build_payload(kind: NotificationKind, notice: &OfferNotice, now: DateTime<Utc>) -> Option<Value> {
    let product = notice.product_name.as_deref().unwrap_or("un producto");
    let buyer = notice.buyer_name.as_deref().unwrap_or("Un comprador");
    let supplier = notice.supplier_name.as_deref().unwrap_or("El proveedor");

    let (recipient, notification_type, title, message, action_url, metadata) = match kind {
        NotificationKind::Received => {
            let mut message = format!("{buyer} te ha enviado una oferta por {product}");
            if let (Some(quantity), Some(price)) = (notice.quantity, notice.price) {
                message.push_str(&format!(": {quantity} unidades a ${price}"));
            }
            (
                notice.supplier_id.as_deref()?,
                "offer_received",
                "Nueva oferta recibida",
                message,
                SUPPLIER_OFFERS_URL,
                json!({
                    "offer_id": notice.offer_id,
                    "product_id": notice.product_id,
                    "buyer_id": notice.buyer_id,
                    "quantity": notice.quantity,
                    "price": notice.price,
                    "expires_at": notice.expires_at,
                }),
            )
        }
        NotificationKind::Response(Response::Accepted) => {
            let mut message = format!("{supplier} aceptó tu oferta por {product}");
            if let Some(deadline) = &notice.purchase_deadline {
                message.push_str(&format!(". Tienes hasta {deadline} para completar la compra"));
            }
            (
                notice.buyer_id.as_deref()?,
                "offer_accepted",
                "Oferta aceptada",
                message,
                BUYER_OFFERS_URL,
                json!({
                    "offer_id": notice.offer_id,
                    "product_id": notice.product_id,
                    "purchase_deadline": notice.purchase_deadline,
                }),
            )
        }
        NotificationKind::Response(Response::Rejected) => {
            let mut message = format!("{supplier} rechazó tu oferta por {product}");
            if let Some(reason) = &notice.rejection_reason {
                message.push_str(&format!(". Motivo: {reason}"));
            }
            (
                notice.buyer_id.as_deref()?,
                "offer_rejected",
                "Oferta rechazada",
                message,
                BUYER_OFFERS_URL,
                json!({
                    "offer_id": notice.offer_id,
                    "product_id": notice.product_id,
                    "rejection_reason": notice.rejection_reason,
                }),
            )
        }
        NotificationKind::Expired(role) => {
            let (recipient, message, url) = match role {
                Role::Buyer => (
                    notice.buyer_id.as_deref()?,
                    format!("Tu oferta por {product} ha expirado"),
                    BUYER_OFFERS_URL,
                ),
                Role::Supplier => (
                    notice.supplier_id.as_deref()?,
                    format!("La oferta de {buyer} por {product} ha expirado"),
                    SUPPLIER_OFFERS_URL,
                ),
            };
            (
                recipient,
                "offer_expired",
                "Oferta expirada",
                message,
                url,
                json!({
                    "offer_id": notice.offer_id,
                    "product_id": notice.product_id,
                    "expired_at": rfc3339(now),
                }),
            )
        }
    };

    Some(json!({
        "p_user_id": recipient,
        "p_type": notification_type,
        "p_title": title,
        "p_message": message,
        "p_related_id": notice.offer_id,
        "p_action_url": action_url,
        "p_metadata": metadata,
    }))
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn text(raw: &Value, pointers: &[&str]) -> Option<String> {
    let value = pointers.iter().filter_map(|p| raw.pointer(p)).find(|v| !v.is_null())?;
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn count(raw: &Value, pointers: &[&str]) -> Option<u64> {
    let value = pointers.iter().filter_map(|p| raw.pointer(p)).find(|v| !v.is_null())?;
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (n.is_finite() && n > 0.0).then(|| n.trunc() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;

    fn legacy_record() -> Value {
        json!({
            "id": "o1",
            "buyer_id": "b1",
            "supplier_id": "s1",
            "product_id": "p1",
            "product_name": "Palta Hass",
            "buyer_name": "Ana",
            "offered_quantity": 4,
            "offered_price": 2500
        })
    }

    fn sent_payload(backend: &MockBackend) -> Value {
        backend.args("create_notification")[0]["p_payload"].clone()
    }

    #[tokio::test]
    async fn test_offer_received_goes_to_supplier() {
        let backend = MockBackend::new();
        let notifier = Notifier::new(backend.clone());

        let outcome = notifier
            .notify_offer_received(&OfferNotice::from_value(&legacy_record()))
            .await;
        assert!(outcome.is_sent());

        let payload = sent_payload(&backend);
        assert_eq!(payload["p_user_id"], "s1");
        assert_eq!(payload["p_type"], "offer_received");
        assert_eq!(payload["p_title"], "Nueva oferta recibida");
        assert_eq!(payload["p_related_id"], "o1");
        assert_eq!(payload["p_action_url"], "/supplier/offers");
        let message = payload["p_message"].as_str().unwrap();
        assert!(message.contains("Ana"));
        assert!(message.contains("Palta Hass"));
        assert!(message.contains('4'));
    }

    #[tokio::test]
    async fn test_missing_names_never_render_placeholders() {
        let backend = MockBackend::new();
        let notifier = Notifier::new(backend.clone());
        let notice = OfferNotice::from_value(&json!({ "id": "o1", "supplier_id": "s1" }));

        notifier.notify_offer_received(&notice).await;
        let message = sent_payload(&backend)["p_message"].as_str().unwrap().to_string();
        assert!(!message.contains("undefined"));
        assert!(!message.contains("null"));
        assert!(!message.contains("None"));
    }

    #[tokio::test]
    async fn test_response_accepted_and_rejected() {
        let backend = MockBackend::new();
        let notifier = Notifier::new(backend.clone());
        let mut notice = OfferNotice::from_value(&legacy_record());
        notice.rejection_reason = Some("precio muy bajo".into());

        assert!(notifier.notify_offer_response(&notice, "accepted").await.is_sent());
        assert!(notifier.notify_offer_response(&notice, "rejected").await.is_sent());

        let calls = backend.args("create_notification");
        assert_eq!(calls[0]["p_payload"]["p_type"], "offer_accepted");
        assert_eq!(calls[0]["p_payload"]["p_title"], "Oferta aceptada");
        assert_eq!(calls[0]["p_payload"]["p_user_id"], "b1");
        assert_eq!(calls[1]["p_payload"]["p_type"], "offer_rejected");
        assert_eq!(calls[1]["p_payload"]["p_action_url"], "/buyer/offers");
        assert!(calls[1]["p_payload"]["p_message"]
            .as_str()
            .unwrap()
            .contains("precio muy bajo"));
    }

    #[tokio::test]
    async fn test_invalid_response_status_sends_nothing() {
        let backend = MockBackend::new();
        let notifier = Notifier::new(backend.clone());
        let outcome = notifier
            .notify_offer_response(&OfferNotice::from_value(&legacy_record()), "pending")
            .await;
        assert!(matches!(outcome, NotifyOutcome::Skipped(_)));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_to_buyer() {
        let backend = MockBackend::new();
        let notifier = Notifier::new(backend.clone());

        let outcome = notifier
            .notify_offer_expired(&OfferNotice::from_value(&legacy_record()), Role::Buyer)
            .await;
        let NotifyOutcome::Sent { related_id, metadata } = outcome else {
            panic!("expected a sent notification");
        };
        assert_eq!(related_id.as_deref(), Some("o1"));
        assert_eq!(metadata["offer_id"], "o1");
        assert!(metadata["expired_at"].is_string());

        let payload = sent_payload(&backend);
        assert_eq!(payload["p_type"], "offer_expired");
        assert_eq!(payload["p_title"], "Oferta expirada");
        assert_eq!(payload["p_message"], "Tu oferta por Palta Hass ha expirado");
    }

    #[tokio::test]
    async fn test_expired_without_buyer_sends_nothing() {
        let backend = MockBackend::new();
        let notifier = Notifier::new(backend.clone());
        let notice = OfferNotice::from_value(&json!({ "id": "o1", "supplier_id": "s1" }));

        let outcome = notifier.notify_offer_expired(&notice, Role::Buyer).await;
        assert!(matches!(outcome, NotifyOutcome::Skipped(_)));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_outcome() {
        let backend = MockBackend::new();
        backend.fail("create_notification", BackendError::remote("RLS violation"));
        let notifier = Notifier::new(backend.clone());

        let outcome = notifier
            .notify_offer_received(&OfferNotice::from_value(&legacy_record()))
            .await;
        assert_eq!(outcome, NotifyOutcome::Failed(BackendError::remote("RLS violation")));
    }

    #[test]
    fn test_notice_from_offer_drops_empty_ids() {
        let mut offer = Offer::pending("o1", "", "s1", "p1", 100, 2);
        offer.product_name = Some("Miel".into());
        let notice = OfferNotice::from(&offer);
        assert_eq!(notice.buyer_id, None);
        assert_eq!(notice.supplier_id.as_deref(), Some("s1"));
        assert_eq!(notice.quantity, Some(2));
    }
}
