//! Lifecycle state record and the flags derived from it
//!
//! `SessionState` is the single authoritative record. It lives behind a
//! synchronous mutex in `SessionManager` and every method here runs inside
//! one critical section, so a read-decide-write never spans a suspension
//! point.

use serde::Serialize;
use session_auth::{Credential, Principal, Session};
use tokio::time::Instant;

use crate::flight::Flight;

/// Snapshot of the lifecycle flags.
///
/// `authenticated` is derived: credential held and not logged out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LifecycleFlags {
    pub authenticated: bool,
    pub initializing: bool,
    pub logged_out: bool,
    pub refresh_in_flight: bool,
    pub refresh_failed_recently: bool,
}

/// Informal session state, derived from flags and claims.
///
/// Transitions:
/// - Initializing → Authenticated | NearExpiry | Unauthenticated (bootstrap)
/// - Unauthenticated | LoggedOut → Authenticated (login, register, adopt)
/// - NearExpiry → Authenticated (refresh success)
/// - any → LoggedOut (logout, refresh 400/401, profile 401)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Initializing,
    Authenticated,
    /// Credential held but within the renewal threshold, expired, or unreadable
    NearExpiry,
    Unauthenticated,
    /// Terminal until an explicit sign-in
    LoggedOut,
}

impl AuthStatus {
    /// Status label for health/logging.
    pub fn label(&self) -> &'static str {
        match self {
            AuthStatus::Initializing => "initializing",
            AuthStatus::Authenticated => "authenticated",
            AuthStatus::NearExpiry => "near_expiry",
            AuthStatus::Unauthenticated => "unauthenticated",
            AuthStatus::LoggedOut => "logged_out",
        }
    }
}

#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) credential: Option<Credential>,
    pub(crate) principal: Option<Principal>,
    pub(crate) initializing: bool,
    pub(crate) logged_out: bool,
    pub(crate) cooldown_until: Option<Instant>,
    pub(crate) flight: Option<Flight>,
}

impl SessionState {
    pub(crate) fn new(credential: Option<Credential>) -> Self {
        Self {
            credential,
            principal: None,
            initializing: true,
            logged_out: false,
            cooldown_until: None,
            flight: None,
        }
    }

    pub(crate) fn authenticated(&self) -> bool {
        self.credential.is_some() && !self.logged_out
    }

    pub(crate) fn cooling_down(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    pub(crate) fn flags(&self, now: Instant) -> LifecycleFlags {
        LifecycleFlags {
            authenticated: self.authenticated(),
            initializing: self.initializing,
            logged_out: self.logged_out,
            refresh_in_flight: self.flight.is_some(),
            refresh_failed_recently: self.cooling_down(now),
        }
    }

    /// Credential and principal as a pair, when both are held.
    pub(crate) fn session(&self) -> Option<Session> {
        match (&self.credential, &self.principal, self.logged_out) {
            (Some(credential), Some(principal), false) => Some(Session {
                credential: credential.clone(),
                principal: principal.clone(),
            }),
            _ => None,
        }
    }

    /// Install a new credential/principal pair and leave any terminal state.
    pub(crate) fn establish(&mut self, session: Session) {
        self.credential = Some(session.credential);
        self.principal = Some(session.principal);
        self.logged_out = false;
        self.cooldown_until = None;
    }

    /// Clear everything and enter the terminal logged-out state.
    pub(crate) fn terminate(&mut self) {
        self.credential = None;
        self.principal = None;
        self.logged_out = true;
        self.cooldown_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{principal, session_expiring_in};
    use std::time::Duration;

    #[test]
    fn fresh_state_is_initializing_and_unauthenticated() {
        let state = SessionState::new(None);
        let flags = state.flags(Instant::now());
        assert_eq!(
            flags,
            LifecycleFlags {
                authenticated: false,
                initializing: true,
                logged_out: false,
                refresh_in_flight: false,
                refresh_failed_recently: false,
            }
        );
    }

    #[test]
    fn seeded_credential_counts_as_authenticated_without_principal() {
        let state = SessionState::new(Some(Credential::from("at")));
        assert!(state.authenticated());
        assert!(state.session().is_none(), "no principal yet");
    }

    #[test]
    fn establish_sets_pair_and_clears_terminal_state() {
        let mut state = SessionState::new(None);
        state.terminate();
        state.cooldown_until = Some(Instant::now() + Duration::from_secs(5));

        let session = session_expiring_in("a", 3_600);
        state.establish(session.clone());

        assert!(!state.logged_out);
        assert!(state.cooldown_until.is_none());
        assert_eq!(state.session(), Some(session));
    }

    #[test]
    fn terminate_clears_pair() {
        let mut state = SessionState::new(Some(Credential::from("at")));
        state.principal = Some(principal("Ada"));
        state.terminate();

        let flags = state.flags(Instant::now());
        assert!(flags.logged_out);
        assert!(!flags.authenticated);
        assert!(state.credential.is_none());
        assert!(state.principal.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_expires() {
        let mut state = SessionState::new(None);
        state.cooldown_until = Some(Instant::now() + Duration::from_secs(5));
        assert!(state.flags(Instant::now()).refresh_failed_recently);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!state.flags(Instant::now()).refresh_failed_recently);
    }

    #[test]
    fn status_labels() {
        assert_eq!(AuthStatus::NearExpiry.label(), "near_expiry");
        assert_eq!(
            serde_json::to_value(AuthStatus::LoggedOut).unwrap(),
            serde_json::json!("logged_out")
        );
    }
}
