use std::time::Duration;

/// Linear retry schedule for callback delivery.
///
/// Attempts are numbered from 1. After a failed attempt `n` (and if
/// `n < max_attempts`) the dispatcher waits `n * base` before the next one,
/// so with the defaults the pauses are 1 s then 2 s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    max_attempts: u32,
    base: Duration,
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause that follows failed attempt `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt)
    }

    /// Whether another attempt is allowed after `attempt` failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// All pauses of a delivery that fails every attempt.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).map(|attempt| self.delay_for(attempt))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}
