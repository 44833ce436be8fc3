//! Error types for the offer engine.
//!
//! `Display` renders the user-facing message that also lands in
//! [`OfferBook::error`](crate::OfferBook::error).

use offer_types::{TransitionError, ValidationError};
use std::fmt;

use crate::backend::BackendError;
use crate::realtime::RealtimeError;

/// Message prefixes per operation.
pub(crate) mod context {
    pub const LOAD: &str = "Error al obtener ofertas";
    pub const CREATE: &str = "Error al crear oferta";
    pub const ACCEPT: &str = "Error al aceptar oferta";
    pub const REJECT: &str = "Error al rechazar oferta";
    pub const CANCEL: &str = "Error al cancelar oferta";
    pub const PURCHASE: &str = "Error al marcar oferta como comprada";
    pub const VALIDATE: &str = "Error al validar límites";
    pub const PRICE: &str = "Error al validar precio";
}

const DUPLICATE_PENDING: &str = "Ya existe una oferta pendiente para este producto";
const LIMIT_EXCEEDED: &str = "Se alcanzó el límite mensual de ofertas";

/// Offer engine error type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Offer input failed local validation. No network call was made.
    InvalidInput(ValidationError),
    /// Another mutation holds the gate. No network call was made.
    Busy,
    /// Pre-create limit check said no.
    LimitReached(String),
    /// Backend refused the create: a pending offer already exists.
    DuplicatePending(Option<String>),
    /// Backend refused the create: monthly limit hit.
    LimitExceeded(Option<String>),
    /// Backend answered with an error.
    Remote {
        context: &'static str,
        message: String,
        error_type: Option<String>,
    },
    /// Backend unreachable or answered garbage.
    Transport {
        context: &'static str,
        message: String,
    },
    /// Local status write the state machine forbids.
    InvalidTransition(TransitionError),
    /// No offer with this id in the published lists.
    NotFound(String),
    /// Realtime channel could not be opened or closed.
    Realtime(String),
    /// Engine is missing a collaborator (e.g. realtime transport).
    Config(String),
}

impl Error {
    pub(crate) fn from_backend(context: &'static str, err: BackendError) -> Self {
        match err {
            BackendError::Remote { message, code } => Error::Remote {
                context,
                message,
                error_type: code,
            },
            BackendError::Transport(message) => Error::Transport { context, message },
        }
    }

    /// Stable machine-readable category.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::Busy => "busy",
            Error::LimitReached(_) => "limit_reached",
            Error::DuplicatePending(_) => "duplicate_pending",
            Error::LimitExceeded(_) => "limit_exceeded",
            Error::Remote { .. } => "remote",
            Error::Transport { .. } => "transport",
            Error::InvalidTransition(_) => "invalid_transition",
            Error::NotFound(_) => "not_found",
            Error::Realtime(_) => "realtime",
            Error::Config(_) => "config",
        }
    }
}

/// Backend detail when it already says what happened, otherwise the default
/// message with the detail appended.
fn with_default(
    f: &mut fmt::Formatter<'_>,
    default: &str,
    detail: &Option<String>,
    keywords: &[&str],
) -> fmt::Result {
    match detail.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        None => f.write_str(default),
        Some(d) => {
            let lower = d.to_lowercase();
            if keywords.iter().any(|k| lower.contains(k)) {
                f.write_str(d)
            } else {
                write!(f, "{default} ({d})")
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(e) => write!(f, "Datos de oferta inválidos: {e}"),
            Error::Busy => f.write_str("Otra operación de oferta está en curso"),
            Error::LimitReached(reason) => f.write_str(reason),
            Error::DuplicatePending(detail) => {
                with_default(f, DUPLICATE_PENDING, detail, &["pendiente", "pending"])
            }
            Error::LimitExceeded(detail) => {
                with_default(f, LIMIT_EXCEEDED, detail, &["límite", "limite", "limit"])
            }
            Error::Remote { context, message, .. } => write!(f, "{context}: {message}"),
            Error::Transport { context, message } => write!(f, "{context}: {message}"),
            Error::InvalidTransition(e) => write!(f, "{e}"),
            Error::NotFound(id) => write!(f, "Oferta no encontrada: {id}"),
            Error::Realtime(msg) => write!(f, "realtime error: {msg}"),
            Error::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::InvalidInput(e)
    }
}

impl From<RealtimeError> for Error {
    fn from(e: RealtimeError) -> Self {
        Error::Realtime(e.0)
    }
}

impl From<TransitionError> for Error {
    fn from(e: TransitionError) -> Self {
        Error::InvalidTransition(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_pending_message_mentions_pending() {
        assert_eq!(Error::DuplicatePending(None).to_string(), DUPLICATE_PENDING);
        assert_eq!(
            Error::DuplicatePending(Some("Oferta pendiente existente".into())).to_string(),
            "Oferta pendiente existente"
        );
        let wrapped = Error::DuplicatePending(Some("conflict".into())).to_string();
        assert!(wrapped.contains("pendiente"), "{wrapped}");
        assert!(wrapped.contains("conflict"));
    }

    #[test]
    fn test_limit_exceeded_message() {
        assert!(Error::LimitExceeded(None).to_string().contains("límite"));
        assert_eq!(
            Error::LimitExceeded(Some("Monthly limit reached".into())).to_string(),
            "Monthly limit reached"
        );
    }

    #[test]
    fn test_backend_errors_keep_context() {
        let err = Error::from_backend(context::ACCEPT, BackendError::remote("boom"));
        assert_eq!(err.to_string(), "Error al aceptar oferta: boom");
        assert_eq!(err.kind(), "remote");

        let err = Error::from_backend(context::LOAD, BackendError::Transport("timeout".into()));
        assert_eq!(err.to_string(), "Error al obtener ofertas: timeout");
        assert_eq!(err.kind(), "transport");
    }

    #[test]
    fn test_validation_error_converts() {
        let err: Error = ValidationError::NotPositive("price").into();
        assert_eq!(err.kind(), "invalid_input");
        assert!(err.to_string().contains("price"));
    }
}
