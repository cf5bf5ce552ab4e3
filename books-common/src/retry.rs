use std::time;

#[derive(Copy, Clone, Debug)]
/// Backoff applied by a stage loop after consecutive failed poll cycles.
pub struct RetryPolicy {
    /// Coefficient to multiply initial_interval with for every past failure.
    backoff_coefficient: u32,
    /// The backoff after the first failure.
    initial_interval: time::Duration,
    /// The maximum possible backoff between cycles.
    maximum_interval: Option<time::Duration>,
}

impl RetryPolicy {
    pub fn new(
        backoff_coefficient: u32,
        initial_interval: time::Duration,
        maximum_interval: Option<time::Duration>,
    ) -> Self {
        Self {
            backoff_coefficient,
            initial_interval,
            maximum_interval,
        }
    }

    /// Time to wait before the next cycle, given how many cycles in a row failed before this one.
    pub fn time_until_next_retry(&self, previous_failures: u32) -> time::Duration {
        let candidate_interval = self
            .initial_interval
            .saturating_mul(self.backoff_coefficient.saturating_pow(previous_failures));

        match self.maximum_interval {
            Some(max_interval) => std::cmp::min(candidate_interval, max_interval),
            None => candidate_interval,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_coefficient: 2,
            initial_interval: time::Duration::from_secs(1),
            maximum_interval: Some(time::Duration::from_secs(30)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let policy = RetryPolicy::new(
            2,
            time::Duration::from_millis(100),
            Some(time::Duration::from_secs(1)),
        );

        assert_eq!(policy.time_until_next_retry(0), time::Duration::from_millis(100));
        assert_eq!(policy.time_until_next_retry(1), time::Duration::from_millis(200));
        assert_eq!(policy.time_until_next_retry(3), time::Duration::from_millis(800));
        assert_eq!(policy.time_until_next_retry(4), time::Duration::from_secs(1));
        // Large failure counts must not overflow.
        assert_eq!(policy.time_until_next_retry(200), time::Duration::from_secs(1));
    }

    #[test]
    fn test_uncapped_policy() {
        let policy = RetryPolicy::new(3, time::Duration::from_secs(1), None);

        assert_eq!(policy.time_until_next_retry(2), time::Duration::from_secs(9));
    }
}
