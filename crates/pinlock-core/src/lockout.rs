//! Opt-in backoff for repeated wrong-PIN attempts
//!
//! The guard itself never rate-limits `unlock_app`. Hosts that want a
//! cool-down between failed attempts track them here and refuse to call
//! the guard while [`UnlockAttempts::remaining_lockout`] is non-zero.

use std::time::{Duration, Instant};

/// Lockout policy for failed PIN attempts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Thresholds and their corresponding lockout durations
    /// Format: (min_attempts, lockout_duration)
    thresholds: Vec<(u32, Duration)>,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            thresholds: vec![
                // Attempts 1-3: no lockout
                (4, Duration::from_secs(30)),
                (6, Duration::from_secs(5 * 60)),
                (8, Duration::from_secs(30 * 60)),
                (10, Duration::from_secs(24 * 60 * 60)),
            ],
        }
    }
}

impl LockoutPolicy {
    /// Create a custom lockout policy; thresholds are sorted by attempt count
    pub fn custom(mut thresholds: Vec<(u32, Duration)>) -> Self {
        thresholds.sort_by_key(|(min, _)| *min);
        Self { thresholds }
    }

    /// Get the lockout duration for a given number of failed attempts
    pub fn lockout_duration(&self, failed_attempts: u32) -> Option<Duration> {
        // Find the highest threshold that applies
        self.thresholds
            .iter()
            .rev()
            .find(|(min, _)| failed_attempts >= *min)
            .map(|(_, duration)| *duration)
    }

    /// Failed attempts allowed before the first cool-down
    pub fn free_attempts(&self) -> u32 {
        self.thresholds
            .first()
            .map(|(min, _)| min.saturating_sub(1))
            .unwrap_or(u32::MAX)
    }

    /// Get a human-readable description of the lockout
    pub fn lockout_description(&self, failed_attempts: u32) -> Option<String> {
        self.lockout_duration(failed_attempts).map(describe)
    }
}

/// Format a duration as whole seconds, minutes or hours
pub fn describe(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{} seconds", secs)
    } else if secs < 3600 {
        format!("{} minutes", secs / 60)
    } else {
        format!("{} hours", secs / 3600)
    }
}

/// Consecutive failed unlock attempts and the resulting cool-down
#[derive(Clone, Debug)]
pub struct UnlockAttempts {
    policy: LockoutPolicy,
    failed_attempts: u32,
    locked_until: Option<Instant>,
}

impl UnlockAttempts {
    /// Start counting with the given policy
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            policy,
            failed_attempts: 0,
            locked_until: None,
        }
    }

    /// Record a failed attempt at `now`, returning the cool-down it triggered
    pub fn record_failure(&mut self, now: Instant) -> Option<Duration> {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        let cool_down = self.policy.lockout_duration(self.failed_attempts);
        self.locked_until = cool_down.map(|duration| now + duration);
        cool_down
    }

    /// Record a successful unlock
    pub fn record_success(&mut self) {
        self.failed_attempts = 0;
        self.locked_until = None;
    }

    /// Cool-down left at `now`, if any
    pub fn remaining_lockout(&self, now: Instant) -> Option<Duration> {
        self.locked_until
            .filter(|until| now < *until)
            .map(|until| until.duration_since(now))
    }

    /// Consecutive failures so far
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Attempts left before the next cool-down starts
    pub fn attempts_remaining(&self) -> u32 {
        self.policy.free_attempts().saturating_sub(self.failed_attempts)
    }
}

impl Default for UnlockAttempts {
    fn default() -> Self {
        Self::new(LockoutPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, None)]
    #[case(3, None)]
    #[case(4, Some(30))]
    #[case(5, Some(30))]
    #[case(6, Some(300))]
    #[case(8, Some(1800))]
    #[case(10, Some(86400))]
    #[case(100, Some(86400))]
    fn test_default_policy(#[case] attempts: u32, #[case] secs: Option<u64>) {
        let policy = LockoutPolicy::default();
        assert_eq!(policy.lockout_duration(attempts), secs.map(Duration::from_secs));
    }

    #[test]
    fn test_lockout_description() {
        let policy = LockoutPolicy::default();

        assert_eq!(policy.lockout_description(4), Some("30 seconds".to_string()));
        assert_eq!(policy.lockout_description(6), Some("5 minutes".to_string()));
        assert_eq!(policy.lockout_description(10), Some("24 hours".to_string()));
        assert_eq!(policy.lockout_description(1), None);
    }

    #[test]
    fn test_custom_policy_is_sorted() {
        let policy = LockoutPolicy::custom(vec![
            (5, Duration::from_secs(60)),
            (2, Duration::from_secs(5)),
        ]);
        assert_eq!(policy.free_attempts(), 1);
        assert_eq!(policy.lockout_duration(3), Some(Duration::from_secs(5)));
        assert_eq!(policy.lockout_duration(7), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_attempt_tracking() {
        let mut attempts = UnlockAttempts::default();
        let start = Instant::now();
        assert_eq!(attempts.attempts_remaining(), 3);

        for _ in 0..3 {
            assert_eq!(attempts.record_failure(start), None);
        }
        assert_eq!(attempts.attempts_remaining(), 0);
        assert_eq!(attempts.remaining_lockout(start), None);

        assert_eq!(attempts.record_failure(start), Some(Duration::from_secs(30)));
        assert_eq!(
            attempts.remaining_lockout(start + Duration::from_secs(10)),
            Some(Duration::from_secs(20))
        );
        assert_eq!(attempts.remaining_lockout(start + Duration::from_secs(30)), None);

        attempts.record_success();
        assert_eq!(attempts.failed_attempts(), 0);
        assert_eq!(attempts.remaining_lockout(start), None);
    }

    #[test]
    fn test_empty_policy_never_locks() {
        let mut attempts = UnlockAttempts::new(LockoutPolicy::custom(Vec::new()));
        let now = Instant::now();
        for _ in 0..50 {
            assert_eq!(attempts.record_failure(now), None);
        }
        assert_eq!(attempts.remaining_lockout(now), None);
    }
}
