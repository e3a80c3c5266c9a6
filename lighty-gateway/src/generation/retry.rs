use std::time::Duration;

use lighty_core::config::GenerationSettings;

/// Longest wait between two attempts.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60 * 60);

/// Outcome of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the given delay
    Retry(Duration),
    /// The attempt budget is spent
    GiveUp,
}

/// Bounded exponential backoff.
///
/// The delay after failed attempt `n` (1-based) is
/// `base_delay * backoff_factor^(n - 1)`, capped at [`MAX_RETRY_DELAY`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    backoff_factor: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff_factor: if backoff_factor.is_finite() && backoff_factor >= 1.0 {
                backoff_factor
            } else {
                1.0
            },
        }
    }

    pub fn from_settings(settings: &GenerationSettings) -> Self {
        Self::new(
            settings.image_max_attempts,
            Duration::from_millis(settings.image_retry_base_ms),
            settings.image_backoff_factor,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(Duration::MAX)
            .min(MAX_RETRY_DELAY)
    }

    /// Decide what to do after `attempt` (1-based) has failed.
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(self.delay_for(attempt))
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&GenerationSettings::default())
    }
}
