//! Retry policy for translation attempts.

use backon::{BackoffBuilder, ConstantBuilder, ExponentialBuilder};
use std::time::Duration;

use crate::config::{BackoffKind, RetryConfig};

/// Bounded attempt count plus the delay schedule between attempts.
///
/// The schedule yields `max_tries - 1` delays, so no delay follows the last
/// attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_tries: usize,
    backoff: Backoff,
}

#[derive(Debug, Clone)]
enum Backoff {
    Fixed(ConstantBuilder),
    Exponential(ExponentialBuilder),
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        let delay = Duration::from_millis(config.delay_ms);
        let retries = config.max_tries.saturating_sub(1);

        let backoff = match config.backoff {
            BackoffKind::Fixed => {
                let mut builder = ConstantBuilder::default()
                    .with_delay(delay)
                    .with_max_times(retries);
                if config.jitter {
                    builder = builder.with_jitter();
                }
                Backoff::Fixed(builder)
            }
            BackoffKind::Exponential => {
                let mut builder = ExponentialBuilder::default()
                    .with_min_delay(delay)
                    .with_max_delay(Duration::from_millis(config.max_delay_ms))
                    .with_factor(config.factor)
                    .with_max_times(retries);
                if config.jitter {
                    builder = builder.with_jitter();
                }
                Backoff::Exponential(builder)
            }
        };

        Self {
            max_tries: config.max_tries.max(1),
            backoff,
        }
    }

    /// Total number of attempts, including the first one.
    pub fn max_tries(&self) -> usize {
        self.max_tries
    }

    /// Fresh delay schedule for one record.
    pub fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        match &self.backoff {
            Backoff::Fixed(builder) => Box::new(builder.build()),
            Backoff::Exponential(builder) => Box::new(builder.build()),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(backoff: BackoffKind, max_tries: usize) -> RetryConfig {
        RetryConfig {
            max_tries,
            backoff,
            delay_ms: 100,
            max_delay_ms: 1000,
            factor: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_fixed_schedule() {
        let policy = RetryPolicy::new(&config(BackoffKind::Fixed, 3));
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(policy.max_tries(), 3);
        assert_eq!(delays, vec![Duration::from_millis(100); 2]);
    }

    #[test]
    fn test_exponential_schedule_is_capped() {
        let policy = RetryPolicy::new(&config(BackoffKind::Exponential, 6));
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(delays.len(), 5);
        // Backoff is computed in f32, so compare whole milliseconds.
        let millis: Vec<_> = delays.iter().map(Duration::as_millis).collect();
        assert_eq!(millis[..3].to_vec(), vec![100, 200, 400]);
        assert!(millis.iter().all(|ms| *ms <= 1000));
    }

    #[test]
    fn test_single_try_has_no_delay() {
        let policy = RetryPolicy::new(&config(BackoffKind::Fixed, 1));
        assert_eq!(policy.delays().count(), 0);
    }

    #[test]
    fn test_schedules_are_independent() {
        let policy = RetryPolicy::new(&config(BackoffKind::Fixed, 2));
        assert_eq!(policy.delays().count(), 1);
        assert_eq!(policy.delays().count(), 1);
    }

    #[test]
    fn test_default_matches_two_tries() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_tries(), 2);
        assert_eq!(
            policy.delays().collect::<Vec<_>>(),
            vec![Duration::from_secs(2)]
        );
    }
}
