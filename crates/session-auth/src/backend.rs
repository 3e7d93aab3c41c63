//! Auth API abstraction
//!
//! The lifecycle manager drives the six exchanges through this trait and
//! never sees the transport. `HttpBackend` is the production implementation;
//! tests plug in scripted backends.

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::types::{Credential, LoginRequest, Principal, ProfilePatch, RegisterRequest, Session};

/// Boxed `Send` future, so the trait stays dyn-compatible (`Arc<dyn AuthBackend>`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The auth API as seen by the session core.
///
/// Every method is a single network round trip and the only place the core
/// suspends. Implementations report failures as `ExchangeError` and leave
/// classification (terminal vs transient vs validation) to the caller.
pub trait AuthBackend: Send + Sync {
    /// Exchange email/password for a session.
    fn login<'a>(&'a self, request: &'a LoginRequest) -> BoxFuture<'a, Result<Session>>;

    /// Create an account and return its first session.
    fn register<'a>(&'a self, request: &'a RegisterRequest) -> BoxFuture<'a, Result<Session>>;

    /// Rotate the credential using whatever durable refresh credential the
    /// transport carries (an httpOnly cookie for `HttpBackend`).
    fn refresh(&self) -> BoxFuture<'_, Result<Session>>;

    /// Tell the server the session is over. Callers ignore failures.
    fn logout_notify<'a>(&'a self, credential: Option<&'a Credential>)
    -> BoxFuture<'a, Result<()>>;

    fn fetch_profile<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, Result<Principal>>;

    fn update_profile<'a>(
        &'a self,
        credential: &'a Credential,
        patch: &'a ProfilePatch,
    ) -> BoxFuture<'a, Result<Principal>>;
}
