//! Store configuration and format constants.
//!
//! # Responsibility
//! - Hold the canonical checklist question list used to realign pages.
//! - Hold the retry policy used by the atomic writer.
//!
//! # Invariants
//! - The checklist question order is the only key used for realignment.
//!   Question text may change between versions without losing answers.

use std::time::Duration;

/// Persisted document format version written on every save.
pub const FORMAT_VERSION: &str = "0.2.0";

/// Default document location, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "data/notes_db.json";

/// Category used for blank or missing step categories.
pub const DEFAULT_CATEGORY: &str = "General";

/// Step name used when a persisted step has no name.
pub const DEFAULT_STEP_NAME: &str = "Untitled Step";

/// Stroke color used by legacy point-only strokes and invalid colors.
pub const DEFAULT_STROKE_COLOR: &str = "#ff3b30";

/// Stroke width used by legacy point-only strokes and invalid widths.
pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;

const DEFAULT_CHECKLIST: [&str; 4] = [
    "Is the higher-timeframe trend aligned with the trade?",
    "Is there a clear entry trigger on the chart?",
    "Is the stop-loss level defined before entry?",
    "Is the reward at least twice the risk?",
];

/// Backoff schedule for replacing the canonical file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total replace attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Growth factor applied per attempt.
    pub factor: f64,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after the given zero-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.factor.powi(attempt as i32);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
        } else {
            Duration::ZERO
        }
    }

    /// Policy that retries without sleeping. Useful for tests and tooling.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            factor: 1.0,
            max_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            base_delay: Duration::from_millis(80),
            factor: 1.6,
            max_delay: Duration::from_millis(400),
        }
    }
}

/// Configuration shared by normalization, mutation and persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Canonical ordered checklist questions.
    pub checklist_questions: Vec<String>,
    /// Retry policy for the canonical file replace.
    pub retry: RetryPolicy,
}

impl StoreConfig {
    /// Replaces the checklist question list.
    pub fn with_checklist<I, S>(mut self, questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.checklist_questions = questions.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            checklist_questions: DEFAULT_CHECKLIST.iter().map(|q| q.to_string()).collect(),
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RetryPolicy, StoreConfig};
    use std::time::Duration;

    #[test]
    fn default_retry_delays_grow_then_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(80));
        assert!((127..=128).contains(&policy.delay_for(1).as_millis()));
        assert_eq!(policy.delay_for(10), Duration::from_millis(400));
    }

    #[test]
    fn default_retry_window_stays_within_a_few_seconds() {
        let policy = RetryPolicy::default();
        let total: Duration = (0..policy.max_attempts - 1)
            .map(|attempt| policy.delay_for(attempt))
            .sum();
        assert!(total < Duration::from_secs(5), "total={total:?}");
    }

    #[test]
    fn unbounded_cap_saturates_instead_of_overflowing() {
        let policy = RetryPolicy {
            max_attempts: 64,
            base_delay: Duration::from_secs(1),
            factor: 10.0,
            max_delay: Duration::MAX,
        };
        assert_eq!(policy.delay_for(40), Duration::MAX);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
    }

    #[test]
    fn immediate_policy_never_sleeps() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(7), Duration::ZERO);
    }

    #[test]
    fn default_config_has_four_questions() {
        assert_eq!(StoreConfig::default().checklist_questions.len(), 4);
    }
}
