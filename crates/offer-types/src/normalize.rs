//! Raw backend record → canonical [`Offer`].
//!
//! Backend rows come in several shapes (RPC results, the `offers_with_details`
//! view, legacy `offered_*` columns, nested `product`/`buyer` objects). All
//! aliasing lives in the table below; nothing here ever fails.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::offer::Offer;
use crate::status::OfferStatus;

/// JSON pointers tried in order; the first non-null hit wins.
mod aliases {
    pub const ID: &[&str] = &["/id", "/offer_id"];
    pub const BUYER_ID: &[&str] = &["/buyer_id", "/buyer/id"];
    pub const SUPPLIER_ID: &[&str] = &["/supplier_id", "/supplier/id"];
    pub const PRODUCT_ID: &[&str] = &["/product_id", "/product/id", "/product/product_id"];
    pub const PRICE: &[&str] = &["/price", "/offered_price", "/p_price"];
    pub const QUANTITY: &[&str] = &["/quantity", "/offered_quantity", "/p_quantity"];
    pub const STATUS: &[&str] = &["/status"];
    pub const CREATED_AT: &[&str] = &["/created_at"];
    pub const EXPIRES_AT: &[&str] = &["/expires_at"];
    pub const PURCHASE_DEADLINE: &[&str] = &["/purchase_deadline"];
    pub const MESSAGE: &[&str] = &["/message", "/p_message"];
    pub const PRODUCT_NAME: &[&str] = &["/product/name", "/product_name"];
    pub const BUYER_NAME: &[&str] = &["/buyer/name", "/buyer_name"];
    pub const SUPPLIER_NAME: &[&str] = &["/supplier/name", "/supplier_name"];
    pub const REJECTION_REASON: &[&str] = &["/rejection_reason"];
}

/// Normalize one raw record. Missing or malformed fields degrade to empty
/// strings, zero, or `None`.
pub fn normalize_offer(raw: &Value) -> Offer {
    Offer {
        id: text(raw, aliases::ID).unwrap_or_default(),
        buyer_id: text(raw, aliases::BUYER_ID).unwrap_or_default(),
        supplier_id: text(raw, aliases::SUPPLIER_ID).unwrap_or_default(),
        product_id: text(raw, aliases::PRODUCT_ID).unwrap_or_default(),
        price: count(raw, aliases::PRICE),
        quantity: count(raw, aliases::QUANTITY),
        status: OfferStatus::from_raw(text(raw, aliases::STATUS).as_deref()),
        created_at: timestamp(raw, aliases::CREATED_AT),
        expires_at: timestamp(raw, aliases::EXPIRES_AT),
        purchase_deadline: timestamp(raw, aliases::PURCHASE_DEADLINE),
        message: text(raw, aliases::MESSAGE).filter(|m| !m.trim().is_empty()),
        product_name: text(raw, aliases::PRODUCT_NAME),
        buyer_name: text(raw, aliases::BUYER_NAME),
        supplier_name: text(raw, aliases::SUPPLIER_NAME),
        rejection_reason: text(raw, aliases::REJECTION_REASON),
    }
}

/// Normalize a batch. A non-array payload yields an empty list; non-object
/// elements are skipped.
pub fn normalize_offers(raw: &Value) -> Vec<Offer> {
    match raw {
        Value::Array(rows) => rows
            .iter()
            .filter(|row| row.is_object())
            .map(normalize_offer)
            .collect(),
        _ => Vec::new(),
    }
}

fn lookup<'a>(raw: &'a Value, pointers: &[&str]) -> Option<&'a Value> {
    pointers
        .iter()
        .filter_map(|p| raw.pointer(p))
        .find(|v| !v.is_null())
}

fn text(raw: &Value, pointers: &[&str]) -> Option<String> {
    match lookup(raw, pointers)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Non-negative integer from a number or numeric string, truncated.
fn count(raw: &Value, pointers: &[&str]) -> u64 {
    let value = match lookup(raw, pointers) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v.trunc() as u64,
        _ => 0,
    }
}

fn timestamp(raw: &Value, pointers: &[&str]) -> Option<DateTime<Utc>> {
    match lookup(raw, pointers)? {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// RFC 3339 first, then the Postgres text forms the backend also emits.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_maps_legacy_field_names() {
        let offer = normalize_offer(&json!({
            "offer_id": "o1",
            "buyer_id": "b1",
            "supplier_id": "s1",
            "product_id": "p1",
            "offered_price": 1500,
            "offered_quantity": 3,
            "status": "pending"
        }));
        assert_eq!(offer.id, "o1");
        assert_eq!(offer.price, 1500);
        assert_eq!(offer.quantity, 3);
        assert_eq!(offer.message, None);
    }

    #[test]
    fn test_current_names_take_precedence() {
        let offer = normalize_offer(&json!({ "price": 10, "offered_price": 99 }));
        assert_eq!(offer.price, 10);
    }

    #[test]
    fn test_legacy_status_mapping() {
        let accepted = normalize_offer(&json!({ "id": "a", "status": "accepted" }));
        assert_eq!(accepted.status, OfferStatus::Approved);
        let success = normalize_offer(&json!({ "id": "b", "status": "success" }));
        assert_eq!(success.status, OfferStatus::Paid);
    }

    #[test]
    fn test_malformed_fields_degrade() {
        let offer = normalize_offer(&json!({
            "id": 42,
            "price": "not a number",
            "quantity": -4,
            "created_at": "yesterday",
            "product": "flat string"
        }));
        assert_eq!(offer.id, "42");
        assert_eq!(offer.price, 0);
        assert_eq!(offer.quantity, 0);
        assert_eq!(offer.created_at, None);
        assert_eq!(offer.buyer_id, "");
        assert_eq!(offer.product_name, None);
    }

    #[test]
    fn test_numeric_strings_are_truncated() {
        let offer = normalize_offer(&json!({ "price": "1000.99", "quantity": "5" }));
        assert_eq!(offer.price, 1000);
        assert_eq!(offer.quantity, 5);
    }

    #[test]
    fn test_nested_display_names() {
        let offer = normalize_offer(&json!({
            "id": "o1",
            "product": { "name": "Palta Hass", "id": "p9" },
            "buyer_name": "Ana"
        }));
        assert_eq!(offer.product_name.as_deref(), Some("Palta Hass"));
        assert_eq!(offer.product_id, "p9");
        assert_eq!(offer.buyer_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_timestamps() {
        let offer = normalize_offer(&json!({
            "created_at": "2025-01-01T12:00:00Z",
            "expires_at": "2025-01-03 12:00:00+00",
            "purchase_deadline": "2025-01-02T08:30:00"
        }));
        assert_eq!(
            offer.created_at,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(
            offer.expires_at,
            Some(Utc.with_ymd_and_hms(2025, 1, 3, 12, 0, 0).unwrap())
        );
        assert_eq!(
            offer.purchase_deadline,
            Some(Utc.with_ymd_and_hms(2025, 1, 2, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_batch_rejects_non_array() {
        assert!(normalize_offers(&json!({ "id": "o1" })).is_empty());
        assert!(normalize_offers(&json!(null)).is_empty());
        assert!(normalize_offers(&json!("oops")).is_empty());
    }

    #[test]
    fn test_batch_skips_non_objects() {
        let offers = normalize_offers(&json!([{ "id": "o1" }, 7, null, { "id": "o2" }]));
        let ids: Vec<&str> = offers.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["o1", "o2"]);
    }
}
