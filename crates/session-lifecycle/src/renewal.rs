//! Proactive background renewal
//!
//! Spawns a periodic task that asks the renewal policy whether the held
//! credential is due and refreshes it if so. This keeps request paths from
//! paying refresh latency. The refresh goes through the normal single-flight
//! path, so a concurrent request-time refresh is joined rather than
//! duplicated.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::manager::SessionManager;

/// Spawn the renewal task.
///
/// Checks every `interval`. Terminal failures end the session (the manager
/// handles that) and later cycles simply find nothing to refresh. Transient
/// failures start the cooldown, so the next cycle may skip.
pub fn spawn_renewal_task(
    manager: Arc<SessionManager>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip the immediate first tick, bootstrap just ran
        ticker.tick().await;

        loop {
            ticker.tick().await;
            renewal_cycle(&manager).await;
        }
    })
}

/// One renewal check. Returns `true` if a refresh was attempted.
pub(crate) async fn renewal_cycle(manager: &SessionManager) -> bool {
    if !manager.should_refresh() {
        debug!("credential not due for renewal");
        return false;
    }

    match manager.refresh().await {
        Ok(session) => {
            info!(
                fingerprint = %session.credential.fingerprint(),
                "background renewal succeeded"
            );
        }
        Err(Error::TerminalAuth(reason)) => {
            warn!(reason = %reason, "background renewal rejected, session ended");
        }
        Err(e) => {
            warn!(error = %e, "background renewal failed, will retry next cycle");
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::testing::{ScriptedBackend, session_expiring_in, status_error};

    fn adopted(backend: &Arc<ScriptedBackend>) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(backend.clone(), SessionConfig::default()))
    }

    #[tokio::test]
    async fn cycle_skips_fresh_credential() {
        let backend = Arc::new(ScriptedBackend::default());
        let manager = adopted(&backend);
        manager.adopt_session(session_expiring_in("Ada", 3_600)).await;

        assert!(!renewal_cycle(&manager).await);
        assert_eq!(backend.refresh.calls(), 0);
    }

    #[tokio::test]
    async fn cycle_skips_without_session() {
        let backend = Arc::new(ScriptedBackend::default());
        let manager = adopted(&backend);

        assert!(!renewal_cycle(&manager).await);
        assert_eq!(backend.refresh.calls(), 0);
    }

    #[tokio::test]
    async fn cycle_survives_terminal_rejection() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.refresh.push(Err(status_error(401, "revoked")));
        let manager = adopted(&backend);
        manager.adopt_session(session_expiring_in("Ada", 60)).await;

        assert!(renewal_cycle(&manager).await);
        assert!(manager.flags().logged_out);
        assert!(!renewal_cycle(&manager).await, "nothing left to renew");
        assert_eq!(backend.refresh.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn task_renews_near_expiry_credential() {
        let backend = Arc::new(ScriptedBackend::default());
        let rotated = session_expiring_in("Ada", 3_600);
        backend.refresh.push(Ok(rotated.clone()));
        let manager = adopted(&backend);
        manager.adopt_session(session_expiring_in("Ada", 60)).await;

        let handle = spawn_renewal_task(manager.clone(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.refresh.calls(), 0, "first tick is skipped");

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(backend.refresh.calls(), 1);
        assert_eq!(manager.credential(), Some(rotated.credential));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(backend.refresh.calls(), 1, "rotated credential is fresh");
        assert!(!handle.is_finished());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn task_keeps_running_after_transient_failure() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.refresh.push(Err(status_error(503, "maintenance")));
        backend.refresh.push(Ok(session_expiring_in("Ada", 3_600)));
        let manager = adopted(&backend);
        manager.adopt_session(session_expiring_in("Ada", 120)).await;

        let handle = spawn_renewal_task(manager.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(backend.refresh.calls(), 1);
        assert!(manager.flags().authenticated);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.refresh.calls(), 2, "retried once the cooldown lapsed");
        assert!(!manager.should_refresh());
        handle.abort();
    }
}
