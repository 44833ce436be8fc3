//! Offer input validation and free-text scrubbing.
//!
//! Message scrubbing is a best-effort XSS mitigation, not an HTML sanitizer:
//! script/style elements and `on*=` handlers go, other markup stays.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::ValidationError;

/// Hard ceiling on offered quantity.
pub const QUANTITY_CEILING: u64 = 1_000_000;

/// Largest integer a double represents exactly (2^53 − 1).
pub const MAX_PRICE: u64 = 9_007_199_254_740_991;

static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<\s*script\b[^>]*>.*?<\s*/\s*script\s*>").expect("invalid script pattern")
});

static STYLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<\s*style\b[^>]*>.*?<\s*/\s*style\s*>").expect("invalid style pattern")
});

/// Stray or unterminated opening/closing tokens left after block removal.
static DANGLING_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*/?\s*(script|style)\b[^>]*>?").expect("invalid dangling tag pattern")
});

static EVENT_HANDLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#)
        .expect("invalid event handler pattern")
});

/// A JSON number or a numeric-looking string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl NumericInput {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(n) => Some(*n as f64),
            Self::Float(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    fn raw(&self) -> String {
        match self {
            Self::Integer(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl From<i32> for NumericInput {
    fn from(n: i32) -> Self {
        Self::Integer(n.into())
    }
}

impl From<i64> for NumericInput {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<u64> for NumericInput {
    fn from(n: u64) -> Self {
        i64::try_from(n).map_or(Self::Float(n as f64), Self::Integer)
    }
}

impl From<f64> for NumericInput {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<&str> for NumericInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for NumericInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Offer form input as the UI hands it over. Accepts both current and legacy
/// key names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OfferInput {
    #[serde(alias = "buyerId", alias = "user_id")]
    pub buyer_id: Option<String>,
    #[serde(alias = "supplierId")]
    pub supplier_id: Option<String>,
    #[serde(alias = "productId")]
    pub product_id: Option<String>,
    #[serde(alias = "offered_quantity", alias = "p_quantity")]
    pub quantity: Option<NumericInput>,
    #[serde(alias = "offered_price", alias = "p_price")]
    pub price: Option<NumericInput>,
    #[serde(alias = "p_message")]
    pub message: Option<String>,
    pub buyer_name: Option<String>,
    pub product_name: Option<String>,
}

/// Validated create-offer payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SanitizedOffer {
    pub buyer_id: String,
    pub supplier_id: String,
    pub product_id: String,
    pub quantity: u64,
    pub price: u64,
    pub message: Option<String>,
    pub buyer_name: Option<String>,
    pub product_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Sanitizer {
    quantity_ceiling: u64,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            quantity_ceiling: QUANTITY_CEILING,
        }
    }
}

impl Sanitizer {
    pub fn new(quantity_ceiling: u64) -> Self {
        Self { quantity_ceiling }
    }

    pub fn sanitize(&self, input: &OfferInput) -> Result<SanitizedOffer, ValidationError> {
        let buyer_id = required_id("buyer_id", &input.buyer_id)?;
        let supplier_id = required_id("supplier_id", &input.supplier_id)?;
        let product_id = required_id("product_id", &input.product_id)?;
        let quantity = positive_integer("quantity", input.quantity.as_ref(), self.quantity_ceiling)?;
        let price = positive_integer("price", input.price.as_ref(), MAX_PRICE)?;
        let message = input
            .message
            .as_deref()
            .map(sanitize_message)
            .filter(|m| !m.is_empty());

        Ok(SanitizedOffer {
            buyer_id,
            supplier_id,
            product_id,
            quantity,
            price,
            message,
            buyer_name: input.buyer_name.clone(),
            product_name: input.product_name.clone(),
        })
    }
}

fn required_id(field: &'static str, value: &Option<String>) -> Result<String, ValidationError> {
    match value.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(ValidationError::MissingField(field)),
    }
}

/// Parse, floor, and bound-check a numeric field.
fn positive_integer(
    field: &'static str,
    value: Option<&NumericInput>,
    max: u64,
) -> Result<u64, ValidationError> {
    let value = value.ok_or(ValidationError::MissingField(field))?;
    let parsed = value.as_f64().ok_or_else(|| ValidationError::NotANumber {
        field,
        raw: value.raw(),
    })?;
    if !parsed.is_finite() {
        return Err(ValidationError::NotANumber {
            field,
            raw: value.raw(),
        });
    }
    let floored = parsed.floor();
    if floored <= 0.0 {
        return Err(ValidationError::NotPositive(field));
    }
    if floored > max as f64 {
        return Err(ValidationError::TooLarge { field, max });
    }
    Ok(floored as u64)
}

/// Strip script/style elements and inline event handlers, to a fixpoint.
pub fn sanitize_message(raw: &str) -> String {
    // Every pass that changes the text shortens it, so this terminates.
    let mut text = raw.to_string();
    loop {
        let next = scrub_once(&text);
        if next == text {
            return text.trim().to_string();
        }
        text = next;
    }
}

fn scrub_once(text: &str) -> String {
    let text = SCRIPT_BLOCK.replace_all(text, "");
    let text = STYLE_BLOCK.replace_all(&text, "");
    let text = DANGLING_TAG.replace_all(&text, "");
    EVENT_HANDLER.replace_all(&text, "").into_owned()
}
