//! Write path: limit check, create, status changes. All gated.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use offer_types::{Offer, OfferInput, OfferStatus, ValidationError};
use serde::Serialize;
use std::future::Future;
use tracing::{debug, info, warn};

use super::OfferEngine;
use crate::backend::BackendError;
use crate::error::{context, Error};
use crate::gateway::{MutationResponse, PriceCheck};
use crate::metrics::EngineMetrics;
use crate::notifier::{NotificationKind, OfferNotice, Response};

const DEFAULT_PRODUCT_LIMIT: u64 = 3;
const DEFAULT_SUPPLIER_LIMIT: u64 = 5;

/// Pending offers lapse after this long when the backend sends no expiry.
const DEFAULT_OFFER_LIFETIME_HOURS: i64 = 48;

const PRODUCT_LIMIT_REASON: &str = "Se alcanzó el límite mensual de ofertas (producto)";
const SUPPLIER_LIMIT_REASON: &str = "Se alcanzó el límite mensual de ofertas con este proveedor";
const LIMIT_REASON: &str = "Se alcanzó el límite mensual de ofertas";
const LIMITS_UNAVAILABLE: &str = "No se pudo validar límites";

/// Outcome of the pre-create limit check. Never an error: when the check
/// itself fails the result is permissive and carries `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitCheck {
    pub is_valid: bool,
    /// Offers this buyer already made on the product this month.
    pub current_count: Option<u64>,
    pub limit: u64,
    pub supplier_count: Option<u64>,
    pub supplier_limit: u64,
    pub reason: Option<String>,
    pub error: Option<String>,
}

impl LimitCheck {
    fn unavailable(detail: &str) -> Self {
        Self {
            is_valid: true,
            current_count: None,
            limit: DEFAULT_PRODUCT_LIMIT,
            supplier_count: None,
            supplier_limit: DEFAULT_SUPPLIER_LIMIT,
            reason: Some(LIMITS_UNAVAILABLE.into()),
            error: Some(format!("{}: {detail}", context::VALIDATE)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedOffer {
    pub offer_id: String,
    pub expires_at: Option<DateTime<Utc>>,
    /// The record appended to the supplier-side list.
    pub offer: Offer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReceipt {
    pub offer_id: String,
    pub status: OfferStatus,
    pub purchase_deadline: Option<DateTime<Utc>>,
}

impl OfferEngine {
    pub async fn validate_offer_limits(
        &self,
        buyer_id: &str,
        product_id: &str,
        supplier_id: &str,
    ) -> LimitCheck {
        if [buyer_id, product_id, supplier_id]
            .iter()
            .any(|id| id.trim().is_empty())
        {
            return LimitCheck::unavailable("parámetros inválidos");
        }

        let limits = match self
            .inner
            .gateway
            .validate_offer_limits(buyer_id, product_id, supplier_id)
            .await
        {
            Ok(limits) => limits,
            Err(e) => {
                warn!(buyer_id, product_id, error = %e, "Offer limit check failed, allowing");
                return LimitCheck::unavailable(e.message());
            }
        };

        let product_count = limits.product_count.unwrap_or(0);
        let supplier_count = limits.supplier_count.unwrap_or(0);
        let product_limit = limits.product_limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PRODUCT_LIMIT);
        let supplier_limit = limits
            .supplier_limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_SUPPLIER_LIMIT);
        let reason = limits.reason.or_else(|| {
            if product_count >= product_limit {
                Some(PRODUCT_LIMIT_REASON.into())
            } else if supplier_count >= supplier_limit {
                Some(SUPPLIER_LIMIT_REASON.into())
            } else {
                None
            }
        });

        LimitCheck {
            is_valid: limits.allowed,
            current_count: Some(product_count),
            limit: product_limit,
            supplier_count: Some(supplier_count),
            supplier_limit,
            reason,
            error: None,
        }
    }

    /// Check an offered price against the product's price tiers. Unlike the
    /// limit check, backend failures are returned to the caller.
    pub async fn validate_offer_price(
        &self,
        product_id: &str,
        quantity: u64,
        price: u64,
    ) -> Result<PriceCheck, Error> {
        let product_id = product_id.trim();
        if product_id.is_empty() {
            return Err(ValidationError::MissingField("product_id").into());
        }
        if quantity == 0 {
            return Err(ValidationError::NotPositive("quantity").into());
        }
        if price == 0 {
            return Err(ValidationError::NotPositive("price").into());
        }

        let check = self
            .inner
            .gateway
            .validate_offer_price(product_id, quantity, price)
            .await
            .map_err(|e| Error::from_backend(context::PRICE, e))?;
        debug!(product_id, quantity, price, valid = check.is_valid, "Offer price checked");
        Ok(check)
    }

    /// Sanitize, check limits, create, then append the new pending offer to
    /// the supplier-side list and notify the supplier.
    pub async fn create_offer(&self, input: &OfferInput) -> Result<CreatedOffer, Error> {
        let clean = match self.inner.sanitizer.sanitize(input) {
            Ok(clean) => clean,
            Err(e) => {
                let err = Error::InvalidInput(e);
                self.inner.record_error(&err);
                return Err(err);
            }
        };

        let Some(gate) = self.inner.gate.try_acquire() else {
            EngineMetrics::bump(&self.inner.metrics.mutations_busy);
            debug!(product = %clean.product_id, "create_offer refused: mutation in flight");
            return Err(Error::Busy);
        };
        self.inner.set_loading(true);

        let limits = self
            .validate_offer_limits(&clean.buyer_id, &clean.product_id, &clean.supplier_id)
            .await;
        if !limits.is_valid {
            let err = Error::LimitReached(limits.reason.unwrap_or_else(|| LIMIT_REASON.into()));
            return Err(self.fail_mutation(err));
        }

        let response = match self.inner.gateway.create_offer(&clean).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail_mutation(Error::from_backend(context::CREATE, e))),
        };
        if !response.success {
            let err = match response.error_type.as_deref() {
                Some("duplicate_pending") => Error::DuplicatePending(response.error),
                Some("limit_exceeded") => Error::LimitExceeded(response.error),
                _ => Error::Remote {
                    context: context::CREATE,
                    message: response.error.unwrap_or_else(|| "error desconocido".into()),
                    error_type: response.error_type,
                },
            };
            return Err(self.fail_mutation(err));
        }
        let Some(offer_id) = response.offer_id else {
            let err = Error::Remote {
                context: context::CREATE,
                message: "respuesta sin identificador de oferta".into(),
                error_type: None,
            };
            return Err(self.fail_mutation(err));
        };

        let now = Utc::now();
        let expires_at = response
            .expires_at
            .or_else(|| Some(now + ChronoDuration::hours(DEFAULT_OFFER_LIFETIME_HOURS)));
        let offer = Offer {
            created_at: Some(now),
            expires_at,
            message: clean.message.clone(),
            product_name: clean.product_name.clone(),
            buyer_name: clean.buyer_name.clone(),
            ..Offer::pending(
                offer_id.clone(),
                clean.buyer_id.clone(),
                clean.supplier_id.clone(),
                clean.product_id.clone(),
                clean.price,
                clean.quantity,
            )
        };

        self.inner.book.send_modify(|book| {
            book.supplier.offers.push(offer.clone());
            book.loading = false;
        });
        self.inner.invalidate_parties(&offer);
        EngineMetrics::bump(&self.inner.metrics.mutations_ok);
        drop(gate);

        info!(offer_id = %offer_id, product = %offer.product_id, "Offer created");
        self.inner
            .dispatch_notification(NotificationKind::Received, OfferNotice::from(&offer));

        Ok(CreatedOffer {
            offer_id,
            expires_at,
            offer,
        })
    }

    /// Supplier accepts. The buyer is notified on success.
    pub async fn accept_offer(&self, offer_id: &str) -> Result<MutationReceipt, Error> {
        let receipt = self
            .change_status(
                offer_id,
                context::ACCEPT,
                OfferStatus::Approved,
                None,
                self.inner.gateway.accept_offer(offer_id),
            )
            .await?;
        self.notify_buyer(offer_id, Response::Accepted);
        Ok(receipt)
    }

    /// Supplier rejects, optionally saying why. The buyer is notified on
    /// success.
    pub async fn reject_offer(&self, offer_id: &str, reason: Option<&str>) -> Result<MutationReceipt, Error> {
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        let receipt = self
            .change_status(
                offer_id,
                context::REJECT,
                OfferStatus::Rejected,
                reason,
                self.inner.gateway.reject_offer(offer_id, reason),
            )
            .await?;
        self.notify_buyer(offer_id, Response::Rejected);
        Ok(receipt)
    }

    /// Buyer withdraws a pending offer.
    pub async fn cancel_offer(&self, offer_id: &str) -> Result<MutationReceipt, Error> {
        self.change_status(
            offer_id,
            context::CANCEL,
            OfferStatus::Cancelled,
            None,
            self.inner.gateway.cancel_offer(offer_id),
        )
        .await
    }

    /// Backend confirmed the purchase; the local record becomes `paid`.
    pub async fn mark_offer_purchased(
        &self,
        offer_id: &str,
        order_id: Option<&str>,
    ) -> Result<MutationReceipt, Error> {
        self.change_status(
            offer_id,
            context::PURCHASE,
            OfferStatus::Paid,
            None,
            self.inner.gateway.mark_offer_as_purchased(offer_id, order_id),
        )
        .await
    }

    /// Optimistic, local-only `approved → reserved` (e.g. added to cart).
    /// The next authoritative fetch overwrites it.
    pub fn mark_offer_reserved(&self, offer_id: &str) -> Result<(), Error> {
        let mut outcome = Err(Error::NotFound(offer_id.to_string()));
        self.inner.book.send_if_modified(|book| {
            let mut result = Ok(());
            let touched = book.update_offer(offer_id, |offer| {
                if let Err(e) = offer.transition(OfferStatus::Reserved) {
                    result = Err(Error::from(e));
                }
            });
            if touched == 0 {
                return false;
            }
            outcome = result;
            outcome.is_ok()
        });
        outcome
    }

    /// Best-effort backend delete, then drop the offer from the buyer list.
    pub async fn delete_offer(&self, offer_id: &str) {
        if let Err(e) = self.inner.gateway.delete_offer(offer_id).await {
            debug!(offer_id, error = %e, "delete_offer failed, removing locally anyway");
        }
        self.inner
            .book
            .send_if_modified(|book| book.buyer.remove(offer_id));
    }

    /// Shared body of the status-changing mutations: gate, call, apply the
    /// transition to every local copy. A failed call leaves local state as
    /// it was.
    async fn change_status<F>(
        &self,
        offer_id: &str,
        context: &'static str,
        next: OfferStatus,
        rejection_reason: Option<&str>,
        call: F,
    ) -> Result<MutationReceipt, Error>
    where
        F: Future<Output = Result<MutationResponse, BackendError>>,
    {
        let Some(_gate) = self.inner.gate.try_acquire() else {
            EngineMetrics::bump(&self.inner.metrics.mutations_busy);
            debug!(offer_id, "{context} refused: mutation in flight");
            return Err(Error::Busy);
        };
        self.inner.set_loading(true);

        let response = match call.await {
            Ok(response) => response,
            Err(e) => return Err(self.fail_mutation(Error::from_backend(context, e))),
        };
        if !response.success {
            let err = Error::Remote {
                context,
                message: response.error.unwrap_or_else(|| "error desconocido".into()),
                error_type: None,
            };
            return Err(self.fail_mutation(err));
        }

        let mut touched_offer = None;
        self.inner.book.send_modify(|book| {
            book.update_offer(offer_id, |offer| {
                match offer.transition(next) {
                    Ok(()) => {
                        if let Some(deadline) = response.purchase_deadline {
                            offer.purchase_deadline = Some(deadline);
                        }
                        if let Some(reason) = rejection_reason {
                            offer.rejection_reason = Some(reason.to_string());
                        }
                    }
                    Err(e) => warn!(offer_id, error = %e, "Local status not updated"),
                }
                touched_offer = Some(offer.clone());
            });
            book.loading = false;
        });
        if let Some(offer) = &touched_offer {
            self.inner.invalidate_parties(offer);
        }
        EngineMetrics::bump(&self.inner.metrics.mutations_ok);
        info!(offer_id, status = %next, "Offer status changed");

        Ok(MutationReceipt {
            offer_id: offer_id.to_string(),
            status: next,
            purchase_deadline: response.purchase_deadline,
        })
    }

    fn notify_buyer(&self, offer_id: &str, response: Response) {
        let Some(notice) = self.inner.book.borrow().find(offer_id).map(OfferNotice::from) else {
            debug!(offer_id, "No local record, buyer notification skipped");
            return;
        };
        self.inner
            .dispatch_notification(NotificationKind::Response(response), notice);
    }

    fn fail_mutation(&self, err: Error) -> Error {
        EngineMetrics::bump(&self.inner.metrics.mutations_failed);
        warn!(kind = err.kind(), error = %err, "Offer mutation failed");
        self.inner.record_error(&err);
        err
    }
}
