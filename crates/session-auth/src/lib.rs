//! Session credential types and auth API exchanges
//!
//! Provides the unverified claim inspector, the session/principal data
//! model, the `AuthBackend` trait the lifecycle manager drives, and a
//! reqwest implementation of that trait. This crate holds no session state;
//! it only describes credentials and performs single exchanges.
//!
//! Exchange flow:
//! 1. `AuthBackend::login` / `register` return a `Session` (credential + principal)
//! 2. `AuthBackend::refresh` rotates the credential using the cookie jar
//! 3. `claims::decode` reads `exp` so the caller can schedule the next refresh
//! 4. `AuthBackend::logout_notify` tells the server the session is over

pub mod backend;
pub mod claims;
pub mod constants;
pub mod error;
pub mod http;
pub mod types;

pub use backend::{AuthBackend, BoxFuture};
pub use claims::{Claims, DecodeError, decode, expired_or_invalid, now_epoch_secs};
pub use error::{ExchangeError, Result};
pub use http::HttpBackend;
pub use types::{Credential, LoginRequest, Principal, ProfilePatch, RegisterRequest, Session};
