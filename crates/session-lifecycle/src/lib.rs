//! Session lifecycle manager
//!
//! Holds the bearer credential and its principal, decides when the
//! credential is stale, and coordinates refresh against the auth API so
//! that at most one refresh call is ever outstanding. The manager is an
//! explicit handle (`Arc<SessionManager>`) owned by the application root.
//!
//! Session lifecycle:
//! 1. `SessionManager::bootstrap` runs once: keeps a fresh credential or refreshes,
//!    starting unauthenticated if that refresh fails
//! 2. `login` / `register` / `adopt_session` establish credential + principal together
//! 3. `refresh` is single-flight: concurrent callers share one network call
//! 4. Refresh 400/401 or profile 401 → terminal `LoggedOut`, no implicit refresh after
//! 5. Transient refresh failure → credential kept, proactive refresh cools down 5s
//! 6. `logout` clears locally first, then notifies the server best-effort
//! 7. Background task refreshes when the renewal policy advises

pub mod classify;
pub mod config;
pub mod error;
mod flight;
pub mod manager;
pub mod policy;
pub mod renewal;
pub mod state;
mod telemetry;

#[cfg(test)]
mod testing;

pub use classify::{Endpoint, FailureClass, classify, classify_status};
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use manager::SessionManager;
pub use policy::RenewalPolicy;
pub use renewal::spawn_renewal_task;
pub use state::{AuthStatus, LifecycleFlags};
