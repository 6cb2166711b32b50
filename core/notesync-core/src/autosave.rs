//! Fixed-interval autosave.
//!
//! On every interval the trigger asks a caller-supplied predicate whether a
//! dirty, file-backed document exists; the caller saves when it says yes.

use crate::clock::Millis;

pub const DEFAULT_AUTOSAVE_INTERVAL_MS: Millis = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutosaveTrigger {
    interval_ms: Millis,
    next_due: Option<Millis>,
}

impl AutosaveTrigger {
    pub fn new(interval_ms: Millis) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            next_due: None,
        }
    }

    /// Arms the timer. Restarting replaces any existing schedule.
    pub fn start(&mut self, now: Millis) {
        self.next_due = Some(now.saturating_add(self.interval_ms));
    }

    /// Disarms the timer. No tick fires after this.
    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn next_due(&self) -> Option<Millis> {
        self.next_due
    }

    /// Fires at most once per call. Returns true when the caller should save.
    ///
    /// Missed intervals are not replayed: after a long gap the next deadline
    /// is one interval from `now`.
    pub fn poll(&mut self, now: Millis, is_dirty: impl FnOnce() -> bool) -> bool {
        let due = match self.next_due {
            Some(due) if due <= now => due,
            _ => return false,
        };
        let next = due.saturating_add(self.interval_ms);
        self.next_due = Some(if next > now {
            next
        } else {
            now.saturating_add(self.interval_ms)
        });
        is_dirty()
    }
}

impl Default for AutosaveTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_AUTOSAVE_INTERVAL_MS)
    }
}
