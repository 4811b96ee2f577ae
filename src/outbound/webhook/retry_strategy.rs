use std::time::Duration;

/// Retry strategy for webhook delivery.
///
/// Delays come from a fixed, non-jittered schedule: the delay before attempt
/// `k + 1` is `delays[k - 1]`. When the schedule is shorter than the number of
/// retries, its last entry is reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryStrategy {
    max_attempts: u32,

    delays: Vec<Duration>,
}

impl RetryStrategy {
    /// Create a new retry strategy
    pub fn new(max_attempts: u32, delays: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delays,
        }
    }

    /// 3 attempts, waiting 1s then 3s between them
    pub fn default_strategy() -> Self {
        Self::new(
            3,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(5),
            ],
        )
    }

    /// Exactly one attempt
    pub fn single_attempt() -> Self {
        Self::new(1, Vec::new())
    }

    /// Build from a millisecond schedule, as found in configuration
    pub fn from_millis(max_attempts: u32, delays_ms: &[u64]) -> Self {
        Self::new(
            max_attempts,
            delays_ms.iter().copied().map(Duration::from_millis).collect(),
        )
    }

    /// Get maximum number of attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after `completed` attempts, or `None` once attempts are exhausted
    pub fn next_delay(&self, completed: u32) -> Option<Duration> {
        if !self.should_retry(completed) {
            return None;
        }

        if completed == 0 {
            // First attempt is immediate
            return Some(Duration::ZERO);
        }

        let index = usize::try_from(completed - 1).unwrap_or(usize::MAX);
        Some(
            self.delays
                .get(index)
                .or_else(|| self.delays.last())
                .copied()
                .unwrap_or(Duration::ZERO),
        )
    }

    /// Check if another attempt is allowed after `completed` attempts
    pub fn should_retry(&self, completed: u32) -> bool {
        completed < self.max_attempts
    }

    /// Get all delays, one per attempt, for visualization/testing
    pub fn get_all_delays(&self) -> Vec<Duration> {
        (0..self.max_attempts)
            .filter_map(|completed| self.next_delay(completed))
            .collect()
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::default_strategy()
    }
}
