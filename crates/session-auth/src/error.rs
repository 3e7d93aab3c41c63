//! Error types for auth API exchanges

/// Outcome of a failed exchange, before the lifecycle layer classifies it.
///
/// `Clone` because a refresh outcome is broadcast to every waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// No usable answer: connect failure, timeout, TLS, reset.
    #[error("network error: {0}")]
    Network(String),

    /// Success status but a body we could not decode.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ExchangeError {
    /// HTTP status, when the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ExchangeError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for exchange operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;
