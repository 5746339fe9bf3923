use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::domain::Alert;
use tracing::debug;

use crate::state::{StateStore, Transition};

pub const DEFAULT_ALERT_DELAY: Duration = Duration::from_millis(3000);

/// What a pending clear does when a newer alert was raised after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertClearPolicy {
    /// Every timer clears the banner when it fires, even if a later alert
    /// replaced the one it was scheduled for.
    #[default]
    Unconditional,
    /// A timer only clears the banner it was scheduled for.
    LatestOnly,
}

pub struct AlertTimer {
    store: Arc<StateStore>,
    delay: Duration,
    policy: AlertClearPolicy,
    generation: Arc<AtomicU64>,
}

impl AlertTimer {
    pub fn new(store: Arc<StateStore>, delay: Duration, policy: AlertClearPolicy) -> Self {
        Self {
            store,
            delay,
            policy,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn policy(&self) -> AlertClearPolicy {
        self.policy
    }

    /// Shows `alert` now and schedules it to be cleared after the delay.
    pub async fn raise(&self, alert: Alert) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "alert: raised generation={generation} error={} msg={}",
            alert.error, alert.msg
        );
        let _ = self.store.dispatch(Transition::SetAlert(Some(alert))).await;

        let store = Arc::clone(&self.store);
        let current = Arc::clone(&self.generation);
        let deadline = tokio::time::Instant::now() + self.delay;
        let policy = self.policy;
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if policy == AlertClearPolicy::LatestOnly
                && current.load(Ordering::SeqCst) != generation
            {
                debug!("alert: skipped stale clear generation={generation}");
                return;
            }
            let _ = store.dispatch(Transition::SetAlert(None)).await;
        });
    }
}

#[cfg(test)]
#[path = "tests/alert_tests.rs"]
mod tests;
