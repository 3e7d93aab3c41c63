//! Session manager
//!
//! Owns the lifecycle state and is the only thing that mutates it. State sits
//! behind a synchronous mutex that is never held across an `.await`: each
//! operation snapshots what it needs, suspends on exactly one exchange, then
//! re-locks and applies the outcome in a single critical section.
//!
//! Two mechanisms keep concurrent operations coherent:
//!
//! - The refresh slot. The first `refresh()` caller claims the slot before
//!   its first suspension point and owns the network call; later callers
//!   subscribe to the owner's outcome.
//! - The session epoch. Every transition that replaces or destroys the
//!   session bumps it. A refresh owner watches the epoch and abandons its
//!   exchange when it moves, so a completion from a superseded session is
//!   never applied. The owner keeps the slot until it has resolved: a
//!   `refresh()` issued right after a sign-in joins the abandoned flight and
//!   receives the new session instead of starting a second exchange.
//!
//! Login, register, adopt, logout and profile calls are additionally
//! serialized by an async operation lock, so two of them never interleave.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use session_auth::{
    AuthBackend, Claims, Credential, DecodeError, LoginRequest, Principal, ProfilePatch,
    RegisterRequest, Session, claims,
};
use tokio::sync::{OnceCell, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::classify::{Endpoint, classify};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::flight::{self, Flight, OutcomeSender};
use crate::policy::RenewalPolicy;
use crate::state::{AuthStatus, LifecycleFlags, SessionState};
use crate::telemetry;

/// Session lifecycle manager. Share it as `Arc<SessionManager>`.
pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    config: SessionConfig,
    policy: RenewalPolicy,
    state: Mutex<SessionState>,
    epoch: watch::Sender<u64>,
    next_flight: AtomicU64,
    ops: tokio::sync::Mutex<()>,
    bootstrap: OnceCell<AuthStatus>,
}

enum Role {
    Owner {
        id: u64,
        epoch: u64,
        publisher: OutcomeSender,
    },
    Waiter(flight::OutcomeReceiver),
}

impl SessionManager {
    /// Empty manager. Call `bootstrap` before serving requests.
    pub fn new(backend: Arc<dyn AuthBackend>, config: SessionConfig) -> Self {
        Self::from_state(backend, config, SessionState::new(None))
    }

    /// Manager seeded with a credential held from a previous run.
    ///
    /// The principal is unknown until bootstrap refreshes or a profile fetch
    /// fills it in.
    pub fn with_credential(
        backend: Arc<dyn AuthBackend>,
        config: SessionConfig,
        credential: Credential,
    ) -> Self {
        Self::from_state(backend, config, SessionState::new(Some(credential)))
    }

    fn from_state(backend: Arc<dyn AuthBackend>, config: SessionConfig, state: SessionState) -> Self {
        let (epoch, _) = watch::channel(0);
        Self {
            backend,
            policy: RenewalPolicy::new(config.refresh_threshold),
            config,
            state: Mutex::new(state),
            epoch,
            next_flight: AtomicU64::new(1),
            ops: tokio::sync::Mutex::new(()),
            bootstrap: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn policy(&self) -> &RenewalPolicy {
        &self.policy
    }

    // --- Bootstrap ---

    /// Resolve the initial session. Runs at most once; concurrent and later
    /// callers get the first run's result.
    ///
    /// A held credential the policy considers fresh is kept without a
    /// network call. Otherwise one refresh is attempted (with no credential
    /// this is the durable-cookie case). If that refresh fails the held
    /// credential is dropped and bootstrap ends `Unauthenticated`; a
    /// transient failure does not set `logged_out`, so a later explicit
    /// refresh may still recover through the cookie.
    pub async fn bootstrap(&self) -> AuthStatus {
        *self.bootstrap.get_or_init(|| self.run_bootstrap()).await
    }

    async fn run_bootstrap(&self) -> AuthStatus {
        let (needs_refresh, epoch) = {
            let state = self.lock();
            let needs_refresh = !state.logged_out
                && (state.credential.is_none()
                    || self.policy.should_refresh_credential(
                        state.credential.as_ref(),
                        claims::now_epoch_secs(),
                        false,
                    ));
            (needs_refresh, self.current_epoch())
        };

        if needs_refresh {
            if let Err(e) = self.refresh().await {
                let mut state = self.lock();
                // A sign-in that landed meanwhile owns the state now
                let dropped = !state.logged_out
                    && self.current_epoch() == epoch
                    && state.credential.is_some();
                if dropped {
                    state.credential = None;
                    state.principal = None;
                }
                warn!(error = %e, dropped_credential = dropped, "bootstrap refresh failed");
            }
        }

        let status = {
            let mut state = self.lock();
            state.initializing = false;
            self.status_locked(&state)
        };
        info!(status = status.label(), "session bootstrap complete");

        match status {
            AuthStatus::LoggedOut => AuthStatus::Unauthenticated,
            other => other,
        }
    }

    // --- Sign-in ---

    pub async fn login(&self, request: LoginRequest) -> Result<Session> {
        let _op = self.ops.lock().await;
        let session = self
            .backend
            .login(&request)
            .await
            .map_err(|e| rejected(Endpoint::Login, e))?;
        Ok(self.establish(session, "login"))
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<Session> {
        let _op = self.ops.lock().await;
        let session = self
            .backend
            .register(&request)
            .await
            .map_err(|e| rejected(Endpoint::Register, e))?;
        Ok(self.establish(session, "register"))
    }

    /// Install a session obtained out of band (social-login callback).
    /// Same effect as a successful login, no network call.
    pub async fn adopt_session(&self, session: Session) -> Session {
        let _op = self.ops.lock().await;
        self.establish(session, "adopt")
    }

    fn establish(&self, session: Session, via: &'static str) -> Session {
        let mut state = self.lock();
        state.establish(session.clone());
        self.advance_epoch();
        info!(
            via,
            user_id = %session.principal.id,
            fingerprint = %session.credential.fingerprint(),
            "session established"
        );
        session
    }

    // --- Refresh ---

    /// Rotate the credential. Concurrent callers share one exchange.
    ///
    /// Fails immediately with `TerminalLogout` after a terminal logout.
    /// Waiters give up after `max_refresh_wait` with `RefreshTimeout`.
    pub async fn refresh(&self) -> Result<Session> {
        let role = {
            let mut state = self.lock();
            if state.logged_out {
                drop(state);
                debug!("refresh refused, session is logged out");
                telemetry::record_refresh("refused");
                return Err(Error::TerminalLogout);
            }
            match &state.flight {
                Some(flight) => Role::Waiter(flight.subscribe()),
                None => {
                    let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                    let (flight, publisher) = Flight::start(id);
                    state.flight = Some(flight);
                    Role::Owner {
                        id,
                        epoch: self.current_epoch(),
                        publisher,
                    }
                }
            }
        };

        match role {
            Role::Waiter(outcome) => {
                debug!("refresh already in flight, waiting for its outcome");
                telemetry::record_refresh_coalesced();
                flight::wait_for_outcome(outcome, self.config.max_refresh_wait).await
            }
            Role::Owner {
                id,
                epoch,
                publisher,
            } => self.fly(id, epoch, publisher).await,
        }
    }

    async fn fly(&self, id: u64, epoch: u64, publisher: OutcomeSender) -> Result<Session> {
        let mut guard = FlightGuard {
            state: &self.state,
            id,
            armed: true,
        };

        let mut epochs = self.epoch.subscribe();
        let started_on = *epochs.borrow_and_update();
        let exchange = if started_on != epoch {
            None
        } else {
            tokio::select! {
                result = self.backend.refresh() => Some(result),
                _ = epochs.changed() => None,
            }
        };

        let outcome = {
            let mut state = self.lock();
            let outcome = match exchange {
                Some(result) if self.current_epoch() == epoch => self.apply_refresh(&mut state, result),
                _ => {
                    debug!(flight = id, "refresh superseded by a session change");
                    telemetry::record_refresh("superseded");
                    superseded_outcome(&state)
                }
            };
            if state.flight.as_ref().is_some_and(|f| f.id() == id) {
                state.flight = None;
            }
            outcome
        };

        guard.armed = false;
        publisher.send_replace(Some(outcome.clone()));
        outcome
    }

    fn apply_refresh(
        &self,
        state: &mut SessionState,
        result: session_auth::Result<Session>,
    ) -> Result<Session> {
        match result {
            Ok(session) => {
                state.establish(session.clone());
                info!(
                    user_id = %session.principal.id,
                    fingerprint = %session.credential.fingerprint(),
                    "credential refreshed"
                );
                telemetry::record_refresh("success");
                Ok(session)
            }
            Err(e) => {
                let error = classify(Endpoint::Refresh, e);
                if let Error::TerminalAuth(reason) = &error {
                    warn!(reason = %reason, "refresh rejected, ending session");
                    telemetry::record_refresh("terminal");
                    self.terminate_locked(state, "refresh_rejected");
                } else {
                    state.cooldown_until = Some(Instant::now() + self.config.failure_cooldown);
                    warn!(
                        error = %error,
                        cooldown_secs = self.config.failure_cooldown.as_secs(),
                        "refresh failed, keeping credential"
                    );
                    telemetry::record_refresh("transient");
                }
                Err(error)
            }
        }
    }

    // --- Logout ---

    /// End the session. Local state is cleared before the server is told,
    /// and a failed notification changes nothing.
    pub async fn logout(&self) {
        let _op = self.ops.lock().await;
        let credential = {
            let mut state = self.lock();
            let credential = state.credential.take();
            self.terminate_locked(&mut state, "user_logout");
            credential
        };
        info!("logged out");

        if let Err(e) = self.backend.logout_notify(credential.as_ref()).await {
            warn!(error = %e, "logout notification failed, local session already cleared");
        }
    }

    // --- Profile ---

    pub async fn fetch_profile(&self) -> Result<Principal> {
        let _op = self.ops.lock().await;
        let (credential, epoch) = self.authenticated_credential()?;
        let result = self.backend.fetch_profile(&credential).await;
        self.apply_profile(Endpoint::FetchProfile, result, epoch, &credential)
    }

    pub async fn update_profile(&self, patch: ProfilePatch) -> Result<Principal> {
        let _op = self.ops.lock().await;
        let (credential, epoch) = self.authenticated_credential()?;
        let result = self.backend.update_profile(&credential, &patch).await;
        self.apply_profile(Endpoint::UpdateProfile, result, epoch, &credential)
    }

    fn authenticated_credential(&self) -> Result<(Credential, u64)> {
        let state = self.lock();
        match &state.credential {
            Some(credential) if !state.logged_out => Ok((credential.clone(), self.current_epoch())),
            _ => Err(Error::NotAuthenticated),
        }
    }

    /// Apply a profile result unless the session moved on while it was
    /// outstanding. The caller gets the result either way.
    fn apply_profile(
        &self,
        endpoint: Endpoint,
        result: session_auth::Result<Principal>,
        epoch: u64,
        credential: &Credential,
    ) -> Result<Principal> {
        let mut state = self.lock();
        let current = self.current_epoch() == epoch;
        match result {
            Ok(principal) => {
                if current && state.authenticated() {
                    state.principal = Some(principal.clone());
                    debug!(endpoint = endpoint.label(), user_id = %principal.id, "profile updated");
                } else {
                    debug!(endpoint = endpoint.label(), "session changed during profile call, result not applied");
                }
                Ok(principal)
            }
            Err(e) => {
                let error = classify(endpoint, e);
                match &error {
                    Error::TerminalAuth(reason)
                        if current && state.credential.as_ref() == Some(credential) =>
                    {
                        warn!(endpoint = endpoint.label(), reason = %reason, "credential rejected, ending session");
                        self.terminate_locked(&mut state, "profile_rejected");
                    }
                    _ => warn!(endpoint = endpoint.label(), error = %error, "profile exchange failed"),
                }
                Err(error)
            }
        }
    }

    // --- Policy helpers ---

    /// Renewal advice for the current credential.
    pub fn should_refresh(&self) -> bool {
        let state = self.lock();
        let credential = state.credential.as_ref().filter(|_| !state.logged_out);
        self.policy.should_refresh_credential(
            credential,
            claims::now_epoch_secs(),
            state.cooling_down(Instant::now()),
        )
    }

    /// Credential to attach to an outgoing authenticated request.
    ///
    /// Refreshes first when the policy advises it. If that refresh fails, the
    /// held credential is still handed out as long as it has not expired and
    /// the session was not terminated.
    pub async fn usable_credential(&self) -> Result<Credential> {
        let refresh_error = if self.should_refresh() {
            match self.refresh().await {
                Ok(session) => return Ok(session.credential),
                Err(e) => {
                    debug!(error = %e, "refresh before request failed, checking held credential");
                    Some(e)
                }
            }
        } else {
            None
        };

        let state = self.lock();
        match (&state.credential, state.logged_out) {
            (_, true) => Err(refresh_error.unwrap_or(Error::TerminalLogout)),
            (None, false) => Err(refresh_error.unwrap_or(Error::NotAuthenticated)),
            (Some(credential), false) => {
                let decoded = claims::decode(credential.expose());
                if claims::expired_or_invalid(&decoded, claims::now_epoch_secs()) {
                    Err(refresh_error.unwrap_or_else(|| {
                        Error::Transient("held credential expired while refresh cools down".into())
                    }))
                } else {
                    Ok(credential.clone())
                }
            }
        }
    }

    // --- Snapshots ---

    pub fn flags(&self) -> LifecycleFlags {
        self.lock().flags(Instant::now())
    }

    pub fn status(&self) -> AuthStatus {
        let state = self.lock();
        self.status_locked(&state)
    }

    /// Credential and principal, when both are held.
    pub fn session(&self) -> Option<Session> {
        self.lock().session()
    }

    pub fn principal(&self) -> Option<Principal> {
        let state = self.lock();
        state.principal.clone().filter(|_| !state.logged_out)
    }

    pub fn credential(&self) -> Option<Credential> {
        let state = self.lock();
        state.credential.clone().filter(|_| !state.logged_out)
    }

    /// Decoded claims of the held credential.
    pub fn claims(&self) -> Option<std::result::Result<Claims, DecodeError>> {
        self.credential().map(|c| claims::decode(c.expose()))
    }

    // --- Internals ---

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        lock_state(&self.state)
    }

    fn current_epoch(&self) -> u64 {
        *self.epoch.borrow()
    }

    /// Session replaced or destroyed: wake any refresh owner so it abandons
    /// its exchange. The slot stays claimed until the owner has resolved, so
    /// no second exchange can start while the old one is outstanding. Call
    /// with the state lock held, after the transition.
    fn advance_epoch(&self) {
        self.epoch.send_modify(|epoch| *epoch += 1);
    }

    fn terminate_locked(&self, state: &mut SessionState, reason: &'static str) {
        state.terminate();
        self.advance_epoch();
        telemetry::record_termination(reason);
    }

    fn status_locked(&self, state: &SessionState) -> AuthStatus {
        if state.logged_out {
            return AuthStatus::LoggedOut;
        }
        match &state.credential {
            Some(credential) => {
                if self.policy.should_refresh_credential(
                    Some(credential),
                    claims::now_epoch_secs(),
                    false,
                ) {
                    AuthStatus::NearExpiry
                } else {
                    AuthStatus::Authenticated
                }
            }
            None if state.initializing => AuthStatus::Initializing,
            None => AuthStatus::Unauthenticated,
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("flags", &self.flags())
            .finish_non_exhaustive()
    }
}

/// Clears the refresh slot if the owning future is dropped mid-exchange.
/// Dropping the owner also drops its publisher, which releases waiters.
struct FlightGuard<'a> {
    state: &'a Mutex<SessionState>,
    id: u64,
    armed: bool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut state = lock_state(self.state);
            if state.flight.as_ref().is_some_and(|f| f.id() == self.id) {
                state.flight = None;
            }
        }
        warn!(flight = self.id, "refresh dropped before completing");
        telemetry::record_refresh("abandoned");
    }
}

fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a superseded refresh resolves to: whatever the session is now.
fn superseded_outcome(state: &SessionState) -> Result<Session> {
    if state.logged_out {
        return Err(Error::TerminalLogout);
    }
    state
        .session()
        .ok_or_else(|| Error::Transient("refresh superseded by a session change".into()))
}

/// Classify a sign-in failure and log it. Session state is untouched.
fn rejected(endpoint: Endpoint, error: session_auth::ExchangeError) -> Error {
    let error = classify(endpoint, error);
    warn!(endpoint = endpoint.label(), error = %error, "sign-in failed");
    error
}
