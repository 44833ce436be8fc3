use crate::status::OfferStatus;

/// Local validation failure for offer input. Raised before any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingField(&'static str),
    NotANumber { field: &'static str, raw: String },
    NotPositive(&'static str),
    TooLarge { field: &'static str, max: u64 },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing field: {field}"),
            Self::NotANumber { field, raw } => write!(f, "{field} is not a number: {raw:?}"),
            Self::NotPositive(field) => write!(f, "{field} must be a positive integer"),
            Self::TooLarge { field, max } => write!(f, "{field} exceeds the maximum of {max}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// A local status write that the state machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: OfferStatus,
    pub to: OfferStatus,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid offer transition: {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}
