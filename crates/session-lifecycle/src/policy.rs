//! Proactive renewal policy
//!
//! Answers "should the credential be refreshed now?" without ever
//! refreshing. Consulted by bootstrap, the background renewal task, and
//! `SessionManager::usable_credential` before an authenticated request.

use std::time::Duration;

use session_auth::{Claims, Credential, DecodeError, claims};

/// Threshold-based renewal advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalPolicy {
    threshold: Duration,
}

impl RenewalPolicy {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Advice over already-decoded claims.
    ///
    /// `decoded` is `None` when no credential is held. A credential that
    /// failed to decode counts as expired, so it is always due.
    pub fn should_refresh(
        &self,
        decoded: Option<&Result<Claims, DecodeError>>,
        now: i64,
        cooling_down: bool,
    ) -> bool {
        let Some(decoded) = decoded else {
            return false;
        };
        if cooling_down {
            return false;
        }
        match decoded {
            Ok(claims) => {
                let threshold = i64::try_from(self.threshold.as_secs()).unwrap_or(i64::MAX);
                claims.time_until_expiry(now) <= threshold
            }
            Err(_) => true,
        }
    }

    /// Advice over a raw credential.
    pub fn should_refresh_credential(
        &self,
        credential: Option<&Credential>,
        now: i64,
        cooling_down: bool,
    ) -> bool {
        let decoded = credential.map(|c| claims::decode(c.expose()));
        self.should_refresh(decoded.as_ref(), now, cooling_down)
    }
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_REFRESH_THRESHOLD)
    }
}
