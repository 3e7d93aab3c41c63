//! Shared types for the session workspace
//!
//! `Secret` wraps bearer credentials so they never reach logs, and `Error`
//! covers configuration loading for every binary in the workspace.

mod error;
mod secret;

pub use error::{Error, Result, load_toml};
pub use secret::Secret;
