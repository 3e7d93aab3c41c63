//! In-flight refresh handle
//!
//! The owner of a refresh holds the `watch::Sender` and publishes exactly one
//! outcome. Every other caller holds a receiver and waits for it. If the
//! owner is dropped before publishing, the channel closes and waiters get a
//! transient error instead of hanging.

use std::time::Duration;

use session_auth::Session;
use tokio::sync::watch;

use crate::error::Error;

pub(crate) type RefreshOutcome = Result<Session, Error>;

pub(crate) type OutcomeSender = watch::Sender<Option<RefreshOutcome>>;
pub(crate) type OutcomeReceiver = watch::Receiver<Option<RefreshOutcome>>;

#[derive(Debug)]
pub(crate) struct Flight {
    id: u64,
    outcome: OutcomeReceiver,
}

impl Flight {
    /// New flight plus the sender its owner publishes through.
    pub(crate) fn start(id: u64) -> (Self, OutcomeSender) {
        let (tx, rx) = watch::channel(None);
        (Self { id, outcome: rx }, tx)
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn subscribe(&self) -> OutcomeReceiver {
        self.outcome.clone()
    }
}

/// Wait for the owner's outcome, bounded by `max_wait`.
pub(crate) async fn wait_for_outcome(
    mut outcome: OutcomeReceiver,
    max_wait: Duration,
) -> RefreshOutcome {
    match tokio::time::timeout(max_wait, next_outcome(&mut outcome)).await {
        Ok(result) => result,
        Err(_) => Err(Error::RefreshTimeout(max_wait)),
    }
}

async fn next_outcome(outcome: &mut OutcomeReceiver) -> RefreshOutcome {
    loop {
        let current = outcome.borrow_and_update().clone();
        if let Some(result) = current {
            return result;
        }
        if outcome.changed().await.is_err() {
            // Owner gone. It may still have published right before dropping.
            let last = outcome.borrow().clone();
            return last.unwrap_or_else(|| {
                Err(Error::Transient(
                    "refresh abandoned before completing".into(),
                ))
            });
        }
    }
}
