//! Caller-side save scheduling helpers.
//!
//! # Responsibility
//! - Batch rapid edits into one save after a quiet period.
//! - Rate-limit the warning shown when saves keep failing.
//!
//! # Invariants
//! - Both helpers are pure state machines over caller-supplied instants;
//!   neither sleeps nor touches the disk.

use std::time::{Duration, Instant};

/// Quiet period used by the desktop editor before flushing edits.
pub const DEFAULT_SAVE_QUIET_PERIOD: Duration = Duration::from_millis(450);

/// Minimum time between two save-failure warnings.
pub const DEFAULT_WARNING_COOLDOWN: Duration = Duration::from_secs(60);

/// Trailing-edge debounce for saves.
#[derive(Debug, Clone)]
pub struct SaveDebouncer {
    quiet_period: Duration,
    last_edit: Option<Instant>,
}

impl SaveDebouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            last_edit: None,
        }
    }

    /// Records an edit; restarts the quiet period.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.last_edit = Some(now);
    }

    pub fn is_dirty(&self) -> bool {
        self.last_edit.is_some()
    }

    /// Returns whether the quiet period since the last edit has elapsed.
    pub fn is_due(&self, now: Instant) -> bool {
        self.last_edit
            .is_some_and(|edited| now.saturating_duration_since(edited) >= self.quiet_period)
    }

    /// Clears the dirty flag and returns `true` when a save is due.
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.last_edit = None;
            return true;
        }
        false
    }

    /// Clears the dirty flag unconditionally, for explicit saves.
    pub fn flush(&mut self) -> bool {
        self.last_edit.take().is_some()
    }
}

impl Default for SaveDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_SAVE_QUIET_PERIOD)
    }
}

/// Cooldown gate for dismissible save-failure warnings.
#[derive(Debug, Clone)]
pub struct WarningThrottle {
    cooldown: Duration,
    last_warned: Option<Instant>,
}

impl WarningThrottle {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_warned: None,
        }
    }

    /// Returns `true` when a warning may be shown now and starts the cooldown.
    pub fn should_warn(&mut self, now: Instant) -> bool {
        let allowed = self
            .last_warned
            .map_or(true, |warned| now.saturating_duration_since(warned) >= self.cooldown);
        if allowed {
            self.last_warned = Some(now);
        }
        allowed
    }

    /// Forgets the last warning, e.g. after a successful save.
    pub fn reset(&mut self) {
        self.last_warned = None;
    }
}

impl Default for WarningThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_WARNING_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::{SaveDebouncer, WarningThrottle};
    use std::time::{Duration, Instant};

    #[test]
    fn debouncer_waits_for_quiet_period_after_last_edit() {
        let start = Instant::now();
        let mut debouncer = SaveDebouncer::new(Duration::from_millis(450));
        assert!(!debouncer.is_due(start));

        debouncer.mark_dirty(start);
        debouncer.mark_dirty(start + Duration::from_millis(300));
        assert!(!debouncer.take_due(start + Duration::from_millis(600)));
        assert!(debouncer.take_due(start + Duration::from_millis(750)));
        assert!(!debouncer.is_dirty());
    }

    #[test]
    fn flush_reports_pending_edits() {
        let mut debouncer = SaveDebouncer::default();
        assert!(!debouncer.flush());
        debouncer.mark_dirty(Instant::now());
        assert!(debouncer.flush());
    }

    #[test]
    fn throttle_warns_once_per_cooldown() {
        let start = Instant::now();
        let mut throttle = WarningThrottle::new(Duration::from_secs(60));
        assert!(throttle.should_warn(start));
        assert!(!throttle.should_warn(start + Duration::from_secs(10)));
        assert!(throttle.should_warn(start + Duration::from_secs(61)));

        throttle.reset();
        assert!(throttle.should_warn(start + Duration::from_secs(62)));
    }
}
