//! Scripted auth backend and credential fixtures for unit tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use session_auth::{
    AuthBackend, BoxFuture, Credential, ExchangeError, LoginRequest, Principal, ProfilePatch,
    RegisterRequest, Session, claims,
};

/// Queue of canned replies for one exchange, plus a call counter.
pub(crate) struct Script<T> {
    replies: Mutex<VecDeque<session_auth::Result<T>>>,
    calls: AtomicUsize,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }
}

impl<T> Script<T> {
    pub(crate) fn push(&self, reply: session_auth::Result<T>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> session_auth::Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ExchangeError::Network("unscripted".into())))
    }
}

/// Backend that replays scripted replies. Unscripted calls fail as network
/// errors.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    pub(crate) login: Script<Session>,
    pub(crate) register: Script<Session>,
    pub(crate) refresh: Script<Session>,
    pub(crate) logout: Script<()>,
    pub(crate) fetch: Script<Principal>,
    pub(crate) update: Script<Principal>,
    /// Simulated latency of every refresh call
    pub(crate) refresh_delay: Duration,
    /// Simulated latency of every profile fetch
    pub(crate) fetch_delay: Duration,
    /// Credentials passed to `logout_notify`, exposed
    pub(crate) notified: Mutex<Vec<Option<String>>>,
}

impl ScriptedBackend {
    pub(crate) fn with_refresh_delay(delay: Duration) -> Self {
        Self {
            refresh_delay: delay,
            ..Default::default()
        }
    }
}

impl AuthBackend for ScriptedBackend {
    fn login<'a>(&'a self, _request: &'a LoginRequest) -> BoxFuture<'a, session_auth::Result<Session>> {
        Box::pin(async move { self.login.next() })
    }

    fn register<'a>(
        &'a self,
        _request: &'a RegisterRequest,
    ) -> BoxFuture<'a, session_auth::Result<Session>> {
        Box::pin(async move { self.register.next() })
    }

    fn refresh(&self) -> BoxFuture<'_, session_auth::Result<Session>> {
        Box::pin(async move {
            let reply = self.refresh.next();
            if !self.refresh_delay.is_zero() {
                tokio::time::sleep(self.refresh_delay).await;
            }
            reply
        })
    }

    fn logout_notify<'a>(
        &'a self,
        credential: Option<&'a Credential>,
    ) -> BoxFuture<'a, session_auth::Result<()>> {
        Box::pin(async move {
            self.notified
                .lock()
                .unwrap()
                .push(credential.map(|c| c.expose().clone()));
            self.logout.next()
        })
    }

    fn fetch_profile<'a>(
        &'a self,
        _credential: &'a Credential,
    ) -> BoxFuture<'a, session_auth::Result<Principal>> {
        Box::pin(async move {
            let reply = self.fetch.next();
            if !self.fetch_delay.is_zero() {
                tokio::time::sleep(self.fetch_delay).await;
            }
            reply
        })
    }

    fn update_profile<'a>(
        &'a self,
        _credential: &'a Credential,
        _patch: &'a ProfilePatch,
    ) -> BoxFuture<'a, session_auth::Result<Principal>> {
        Box::pin(async move { self.update.next() })
    }
}

/// Unsigned JWT-shaped token whose payload carries `exp`.
pub(crate) fn token_expiring_at(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({ "sub": "user-1", "exp": exp, "type": "access" }).to_string(),
    );
    format!("{header}.{payload}.c2ln")
}

/// Token expiring `secs` from the real wall clock (negative for the past).
pub(crate) fn token_expiring_in(secs: i64) -> String {
    token_expiring_at(claims::now_epoch_secs() + secs)
}

pub(crate) fn principal(name: &str) -> Principal {
    Principal {
        id: "user-1".into(),
        email: format!("{}@example.com", name.to_lowercase()),
        name: name.into(),
        avatar: None,
        is_enabled: true,
        created_at: None,
        updated_at: None,
        provider: Some("local".into()),
        roles: vec!["user".into()],
    }
}

pub(crate) fn session_expiring_in(name: &str, secs: i64) -> Session {
    Session {
        credential: Credential::from(token_expiring_in(secs)),
        principal: principal(name),
    }
}

pub(crate) fn status_error(status: u16, message: &str) -> ExchangeError {
    ExchangeError::Status {
        status,
        message: message.into(),
    }
}
