//! Offer lifecycle states and the local transition table.

use serde::{Deserialize, Serialize};

/// Canonical offer status. Legacy backend values are folded in by [`OfferStatus::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    Cancelled,
    /// Optimistic, local-only marker. Never persisted by the backend.
    Reserved,
    Paid,
}

impl OfferStatus {
    pub const ALL: [OfferStatus; 7] = [
        Self::Pending,
        Self::Approved,
        Self::Rejected,
        Self::Expired,
        Self::Cancelled,
        Self::Reserved,
        Self::Paid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::Reserved => "reserved",
            Self::Paid => "paid",
        }
    }

    /// Classify a raw backend status. Returns `None` for unknown values.
    pub fn parse(raw: &str) -> Option<Self> {
        let status = match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "approved" | "accepted" => Self::Approved,
            "rejected" => Self::Rejected,
            "expired" => Self::Expired,
            "cancelled" | "canceled" => Self::Cancelled,
            "reserved" => Self::Reserved,
            "paid" | "success" | "purchased" => Self::Paid,
            _ => return None,
        };
        Some(status)
    }

    /// Like [`parse`](Self::parse) but never fails: missing or unknown → `Pending`.
    pub fn from_raw(raw: Option<&str>) -> Self {
        raw.and_then(Self::parse).unwrap_or(Self::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Expired | Self::Cancelled | Self::Paid
        )
    }

    /// Whether a local write from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: OfferStatus) -> bool {
        use OfferStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Pending, Expired)
                | (Approved, Reserved)
                | (Approved, Paid)
                | (Reserved, Paid)
        )
    }
}

/// UI tone for a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTone {
    Warning,
    Success,
    Error,
    Info,
    Neutral,
}

/// How a status is presented: badge tone, label, one-line description, and
/// whether the user can still act on the offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusDisplay {
    pub tone: StatusTone,
    pub label: &'static str,
    pub description: String,
    pub actionable: bool,
}

impl OfferStatus {
    pub fn display(&self) -> StatusDisplay {
        let (tone, label, description, actionable) = match self {
            Self::Pending => (
                StatusTone::Warning,
                "Pendiente",
                "Esperando respuesta del proveedor",
                true,
            ),
            Self::Approved => (
                StatusTone::Success,
                "Aceptada",
                "Tienes 24h para agregar al carrito",
                true,
            ),
            Self::Rejected => (
                StatusTone::Error,
                "Rechazada",
                "Rechazada por el proveedor",
                false,
            ),
            Self::Expired => (
                StatusTone::Neutral,
                "Caducada",
                "La oferta ha expirado",
                false,
            ),
            Self::Cancelled => (
                StatusTone::Neutral,
                "Cancelada",
                "Cancelada por el comprador",
                false,
            ),
            Self::Reserved => (
                StatusTone::Info,
                "En carrito",
                "Producto agregado al carrito",
                true,
            ),
            Self::Paid => (
                StatusTone::Info,
                "Compra Realizada",
                "Producto agregado al carrito y comprado",
                false,
            ),
        };
        StatusDisplay {
            tone,
            label,
            description: description.to_string(),
            actionable,
        }
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
