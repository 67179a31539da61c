//! # Health Monitor
//!
//! Tracks the time since the last notification and raises one advisory
//! per silent interval. The monitor only reports: it never stops or
//! reconnects a session.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Advisory raised when a session has been silent for too long.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthAdvisory {
    /// Time since the last notification.
    pub silent_for: Duration,
    /// Configured silence threshold.
    pub threshold: Duration,
}

impl fmt::Display for HealthAdvisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no chain activity for {}s (threshold {}s)",
            self.silent_for.as_secs(),
            self.threshold.as_secs()
        )
    }
}

struct MonitorState {
    last_activity: Instant,
    advised: bool,
}

/// Silence tracker shared between the pipeline and the health task.
pub struct HealthMonitor {
    state: Mutex<MonitorState>,
    threshold: Duration,
}

impl HealthMonitor {
    /// Create a monitor whose silence clock starts now.
    pub fn new(threshold: Duration) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                last_activity: Instant::now(),
                advised: false,
            }),
            threshold,
        }
    }

    /// Note liveness. Returns `true` if this ends a degraded period.
    pub fn record_activity(&self) -> bool {
        let mut state = self.state.lock();
        state.last_activity = Instant::now();
        std::mem::replace(&mut state.advised, false)
    }

    /// Raise an advisory if silence exceeds the threshold and none has
    /// been raised since the last activity.
    pub fn check(&self, now: Instant) -> Option<HealthAdvisory> {
        let mut state = self.state.lock();
        let silent_for = now.saturating_duration_since(state.last_activity);
        if silent_for <= self.threshold || state.advised {
            return None;
        }
        state.advised = true;
        Some(HealthAdvisory {
            silent_for,
            threshold: self.threshold,
        })
    }

    /// Whether an advisory is outstanding.
    pub fn is_degraded(&self) -> bool {
        self.state.lock().advised
    }

    /// Configured threshold.
    pub fn threshold(&self) -> Duration {
        self.threshold
    }
}
