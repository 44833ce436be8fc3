//! Canonical offer record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::TransitionError;
use crate::status::{OfferStatus, StatusDisplay};

/// A buyer's price/quantity proposal to a supplier, post-normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub buyer_id: String,
    pub supplier_id: String,
    pub product_id: String,
    pub price: u64,
    pub quantity: u64,
    pub status: OfferStatus,
    pub created_at: Option<DateTime<Utc>>,
    /// Absent means the offer never expires while pending.
    pub expires_at: Option<DateTime<Utc>>,
    /// Set by the backend when the offer is approved.
    pub purchase_deadline: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub product_name: Option<String>,
    pub buyer_name: Option<String>,
    pub supplier_name: Option<String>,
    pub rejection_reason: Option<String>,
}

impl Offer {
    /// A freshly created offer as the backend would report it.
    pub fn pending(
        id: impl Into<String>,
        buyer_id: impl Into<String>,
        supplier_id: impl Into<String>,
        product_id: impl Into<String>,
        price: u64,
        quantity: u64,
    ) -> Self {
        Self {
            id: id.into(),
            buyer_id: buyer_id.into(),
            supplier_id: supplier_id.into(),
            product_id: product_id.into(),
            price,
            quantity,
            status: OfferStatus::Pending,
            created_at: None,
            expires_at: None,
            purchase_deadline: None,
            message: None,
            product_name: None,
            buyer_name: None,
            supplier_name: None,
            rejection_reason: None,
        }
    }

    /// Apply a local status write, rejecting anything the state machine forbids.
    pub fn transition(&mut self, next: OfferStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Status to show at `now`. Lapsed pending offers and approved offers past
    /// their purchase deadline read as expired; the stored status is untouched.
    pub fn display_status(&self, now: DateTime<Utc>) -> OfferStatus {
        match self.status {
            OfferStatus::Pending if self.expires_at.is_some_and(|at| at < now) => {
                OfferStatus::Expired
            }
            OfferStatus::Approved if self.purchase_deadline.is_some_and(|at| at < now) => {
                OfferStatus::Expired
            }
            status => status,
        }
    }

    /// Presentation for the status shown at `now`. A rejected offer carries
    /// the supplier's reason as its description when one was given.
    pub fn status_display(&self, now: DateTime<Utc>) -> StatusDisplay {
        let status = self.display_status(now);
        let mut display = status.display();
        if status == OfferStatus::Rejected {
            let reason = self
                .rejection_reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty());
            if let Some(reason) = reason {
                display.description = reason.to_string();
            }
        }
        display
    }

    /// Time left to act on the offer: until `expires_at` while pending, until
    /// `purchase_deadline` while approved. Zero otherwise.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        let deadline = match self.status {
            OfferStatus::Pending => self.expires_at,
            OfferStatus::Approved => self.purchase_deadline,
            _ => None,
        };
        deadline
            .and_then(|at| (at - now).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }
}

/// Human-readable countdown: `"Expirado"`, `"1h 2m 3s"`, `"2m 3s"` or `"3s"`.
pub fn format_time_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    if secs == 0 {
        return "Expirado".into();
    }
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
