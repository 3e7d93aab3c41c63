//! Error taxonomy for session operations

use std::time::Duration;

/// Classified failure of a session operation.
///
/// `Clone` because one refresh outcome is handed to every waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No classification possible (network, 5xx, 429). Session untouched.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The server rejected the credential. The session has been destroyed.
    #[error("authentication rejected: {0}")]
    TerminalAuth(String),

    /// Business-rule rejection (bad input, conflict). Session untouched.
    #[error("rejected ({status}): {message}")]
    Validation { status: u16, message: String },

    /// Gave up waiting on another caller's refresh.
    #[error("timed out after {0:?} waiting for in-flight refresh")]
    RefreshTimeout(Duration),

    /// Refresh attempted after a terminal logout. Requires explicit sign-in.
    #[error("session is logged out")]
    TerminalLogout,

    #[error("not authenticated")]
    NotAuthenticated,
}

impl Error {
    /// Worth retrying later without user action.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_) | Error::RefreshTimeout(_))
    }

    /// The caller must send the user through sign-in again.
    pub fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            Error::TerminalAuth(_) | Error::TerminalLogout | Error::NotAuthenticated
        )
    }
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_and_sign_in_predicates() {
        assert!(Error::Transient("503".into()).is_transient());
        assert!(Error::RefreshTimeout(Duration::from_secs(10)).is_transient());
        assert!(!Error::TerminalLogout.is_transient());

        assert!(Error::TerminalAuth("revoked".into()).requires_sign_in());
        assert!(Error::TerminalLogout.requires_sign_in());
        assert!(Error::NotAuthenticated.requires_sign_in());
        assert!(
            !Error::Validation {
                status: 409,
                message: "email already in use".into()
            }
            .requires_sign_in()
        );
    }

    #[test]
    fn validation_display_keeps_server_message() {
        let err = Error::Validation {
            status: 409,
            message: "email already in use".into(),
        };
        assert_eq!(err.to_string(), "rejected (409): email already in use");
    }
}
