//! Failure classification for auth API exchanges
//!
//! The same status means different things depending on the endpoint: a 401
//! from login is a wrong password (the user retries), a 401 from refresh
//! means the durable credential is gone (the session is over). Only the
//! refresh endpoint treats 400 as terminal.

use session_auth::ExchangeError;

use crate::error::Error;

/// Which exchange produced the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    Register,
    Refresh,
    FetchProfile,
    UpdateProfile,
}

impl Endpoint {
    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Endpoint::Login => "login",
            Endpoint::Register => "register",
            Endpoint::Refresh => "refresh",
            Endpoint::FetchProfile => "fetch_profile",
            Endpoint::UpdateProfile => "update_profile",
        }
    }
}

/// What a failure means for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Retry later; session untouched
    Transient,
    /// Caller-facing rejection; session untouched
    Validation,
    /// Server no longer honors the credential; session must be destroyed
    TerminalAuth,
}

/// Classify an HTTP status returned by `endpoint`.
///
/// 408/429/5xx are transient everywhere. Refresh: 400/401 terminal, the rest
/// transient. Profile: 401 terminal, other 4xx validation. Login/register:
/// every 4xx is validation (a 401 there is "wrong password").
pub fn classify_status(endpoint: Endpoint, status: u16) -> FailureClass {
    match (endpoint, status) {
        (_, 408 | 429) => FailureClass::Transient,
        (_, 500..=599) => FailureClass::Transient,
        (Endpoint::Refresh, 400 | 401) => FailureClass::TerminalAuth,
        (Endpoint::Refresh, _) => FailureClass::Transient,
        (Endpoint::FetchProfile | Endpoint::UpdateProfile, 401) => FailureClass::TerminalAuth,
        (_, 400..=499) => FailureClass::Validation,
        _ => FailureClass::Transient,
    }
}

/// Turn an exchange failure into the session error the caller sees.
///
/// Network errors and undecodable success bodies are transient.
pub fn classify(endpoint: Endpoint, error: ExchangeError) -> Error {
    match error {
        ExchangeError::Status { status, message } => match classify_status(endpoint, status) {
            FailureClass::TerminalAuth => Error::TerminalAuth(format!("{status}: {message}")),
            FailureClass::Validation => Error::Validation { status, message },
            FailureClass::Transient => Error::Transient(format!(
                "{} returned {status}: {message}",
                endpoint.label()
            )),
        },
        other => Error::Transient(format!("{}: {other}", endpoint.label())),
    }
}
