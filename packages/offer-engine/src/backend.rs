//! Remote backend seam: named procedures plus one filtered table read.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Postgres `undefined_function` and the PostgREST "no such function" code.
const MISSING_PROCEDURE_CODES: &[&str] = &["42883", "PGRST202"];

const MISSING_PROCEDURE_PHRASES: &[&str] = &[
    "could not find the function",
    "not find the function",
    "does not exist",
];

/// Failure reported by a [`RemoteBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend answered with an error.
    Remote { message: String, code: Option<String> },
    /// The request never produced a usable answer (network, timeout, 5xx).
    Transport(String),
}

impl BackendError {
    pub fn remote(message: impl Into<String>) -> Self {
        BackendError::Remote {
            message: message.into(),
            code: None,
        }
    }

    pub fn remote_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        BackendError::Remote {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            BackendError::Remote { message, .. } => message,
            BackendError::Transport(message) => message,
        }
    }

    /// Worth retrying on a read.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transport(_))
    }

    /// The named procedure is not deployed on this backend.
    pub fn is_missing_procedure(&self) -> bool {
        let BackendError::Remote { message, code } = self else {
            return false;
        };
        if code
            .as_deref()
            .is_some_and(|c| MISSING_PROCEDURE_CODES.contains(&c))
        {
            return true;
        }
        let lower = message.to_lowercase();
        MISSING_PROCEDURE_PHRASES.iter().any(|p| lower.contains(p))
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Remote {
                message,
                code: Some(code),
            } => write!(f, "{message} ({code})"),
            BackendError::Remote { message, .. } => f.write_str(message),
            BackendError::Transport(message) => write!(f, "transport error: {message}"),
        }
    }
}

impl std::error::Error for BackendError {}

/// The remote data service. Implementations must be cheap to share.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Invoke a named procedure with a JSON argument object.
    async fn call(&self, procedure: &str, args: Value) -> Result<Value, BackendError>;

    /// All rows of `table` where `column` equals `value`, newest first.
    async fn select_eq(&self, table: &str, column: &str, value: &str) -> Result<Value, BackendError>;
}
