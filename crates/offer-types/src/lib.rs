//! Shared offer types and pure-logic utilities for the offer engine.
//! No async and no I/O, so usable from any runtime or from plain tests.

mod error;
mod normalize;
mod offer;
mod sanitize;
mod status;

pub use error::{TransitionError, ValidationError};
pub use normalize::{normalize_offer, normalize_offers, parse_timestamp};
pub use offer::{format_time_remaining, Offer};
pub use sanitize::{
    sanitize_message, NumericInput, OfferInput, SanitizedOffer, Sanitizer, MAX_PRICE,
    QUANTITY_CEILING,
};
pub use status::{OfferStatus, StatusDisplay, StatusTone};
