//! Auth API paths
//!
//! Relative to the configured API base URL. The refresh endpoint reads the
//! durable refresh credential from an httpOnly cookie, so it takes no body.

pub const LOGIN_PATH: &str = "/auth/login";

pub const REGISTER_PATH: &str = "/auth/register";

/// Rotates the access credential. Relies on the cookie jar, not a body.
pub const REFRESH_PATH: &str = "/auth/refresh";

pub const LOGOUT_PATH: &str = "/auth/logout";

/// Current user's profile (GET to read, PATCH to update)
pub const PROFILE_PATH: &str = "/users/me";
