use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    #[error("Invalid retry configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryStrategy {
    ExponentialBackoff,
    LinearBackoff,
    FixedDelay,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: RetryStrategy,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            strategy: RetryStrategy::ExponentialBackoff,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }
}

/// Bounded retry with backoff. Attempts are numbered from 1; the delay
/// after attempt `n` is computed by [`RetryPolicy::calculate_delay`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Result<Self, RetryError> {
        if config.max_attempts == 0 {
            return Err(RetryError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if config.base_delay > config.max_delay {
            return Err(RetryError::InvalidConfig(format!(
                "base_delay {:?} exceeds max_delay {:?}",
                config.base_delay, config.max_delay
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    pub fn should_give_up(&self, attempt: u32) -> bool {
        attempt >= self.config.max_attempts
    }

    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base_delay = match self.config.strategy {
            RetryStrategy::ExponentialBackoff => {
                self.config.base_delay.saturating_mul(2_u32.pow(exponent))
            }
            RetryStrategy::LinearBackoff => self.config.base_delay.saturating_mul(attempt.max(1)),
            RetryStrategy::FixedDelay => self.config.base_delay,
        };

        // Apply maximum delay cap
        let capped_delay = std::cmp::min(base_delay, self.config.max_delay);

        if self.config.jitter {
            apply_jitter(capped_delay)
        } else {
            capped_delay
        }
    }

    /// Sleep for the backoff that follows `attempt`.
    pub async fn backoff(&self, attempt: u32) {
        tokio::time::sleep(self.calculate_delay(attempt)).await;
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let mut rng = rand::rng();
    let jitter_factor = rng.random_range(0.5..1.5); // ±50% jitter
    delay.mul_f64(jitter_factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(strategy: RetryStrategy) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            strategy,
            jitter: false,
        })
        .unwrap()
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = policy(RetryStrategy::ExponentialBackoff);
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(200));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(350));
        assert_eq!(policy.calculate_delay(40), Duration::from_millis(350));
    }

    #[test]
    fn test_linear_and_fixed() {
        assert_eq!(
            policy(RetryStrategy::LinearBackoff).calculate_delay(3),
            Duration::from_millis(300)
        );
        assert_eq!(
            policy(RetryStrategy::FixedDelay).calculate_delay(3),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::new(RetryConfig::default()).unwrap();
        for _ in 0..50 {
            let delay = policy.calculate_delay(1);
            assert!(delay >= Duration::from_millis(250) && delay <= Duration::from_millis(750));
        }
    }

    #[test]
    fn test_give_up_after_max_attempts() {
        let policy = policy(RetryStrategy::FixedDelay);
        assert!(!policy.should_give_up(2));
        assert!(policy.should_give_up(3));
    }

    #[test]
    fn test_invalid_config() {
        assert!(RetryPolicy::new(RetryConfig::default().with_max_attempts(0)).is_err());
        assert!(
            RetryPolicy::new(RetryConfig::default().with_base_delay(Duration::from_secs(60)))
                .is_err()
        );
    }
}
