//! User activity tracking.
//!
//! Records when the user last interacted with the editor so background work
//! (external change polling) can wait until they pause.

use crate::clock::Millis;

/// Default quiet period before the user counts as idle.
pub const DEFAULT_IDLE_THRESHOLD_MS: Millis = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityTracker {
    last_activity: Millis,
}

impl ActivityTracker {
    /// Starts tracking as if the user had just interacted at `now`.
    pub fn new(now: Millis) -> Self {
        Self { last_activity: now }
    }

    pub fn record_activity(&mut self, now: Millis) {
        self.last_activity = now;
    }

    pub fn last_activity(&self) -> Millis {
        self.last_activity
    }

    /// True when strictly more than `threshold_ms` has passed since the last stamp.
    pub fn is_idle(&self, now: Millis, threshold_ms: Millis) -> bool {
        now.saturating_sub(self.last_activity) > threshold_ms
    }
}
