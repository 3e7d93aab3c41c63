//! Session manager tuning

use std::time::Duration;

/// Refresh when the credential expires within this window.
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(5 * 60);

/// Suppress proactive refresh for this long after a transient failure.
pub const DEFAULT_FAILURE_COOLDOWN: Duration = Duration::from_secs(5);

/// Longest a caller waits on someone else's refresh before giving up.
pub const DEFAULT_MAX_REFRESH_WAIT: Duration = Duration::from_secs(10);

/// Timing knobs for a `SessionManager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub refresh_threshold: Duration,
    pub failure_cooldown: Duration,
    pub max_refresh_wait: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
            failure_cooldown: DEFAULT_FAILURE_COOLDOWN,
            max_refresh_wait: DEFAULT_MAX_REFRESH_WAIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.refresh_threshold, Duration::from_secs(300));
        assert_eq!(config.failure_cooldown, Duration::from_secs(5));
        assert_eq!(config.max_refresh_wait, Duration::from_secs(10));
    }
}
