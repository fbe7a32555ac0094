//! Engine configuration.

use crate::retry::RetryPolicy;

/// Tunables shared by every engine component.
///
/// Built with chained setters:
///
/// ```rust
/// use kickwall_engine::{EngineConfig, RetryPolicy};
///
/// let config = EngineConfig::new()
///     .with_retry(RetryPolicy::builder().max_retries(5).build())
///     .with_raffle_utc_offset_minutes(120);
/// assert_eq!(config.raffle_utc_offset_minutes, 120);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Policy applied when a unit of work fails with a transient conflict.
    pub retry: RetryPolicy,
    /// Offset from UTC, in minutes, of the venue's wall clock. Raffle days
    /// are bounded by midnight in this offset, not UTC midnight.
    pub raffle_utc_offset_minutes: i32,
}

impl EngineConfig {
    /// Defaults: the default retry policy and a venue clock at UTC.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the venue's offset from UTC in minutes.
    #[must_use]
    pub const fn with_raffle_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.raffle_utc_offset_minutes = minutes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_keep_the_venue_at_utc() {
        let config = EngineConfig::new();
        assert_eq!(config.raffle_utc_offset_minutes, 0);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn setters_replace_fields() {
        let config = EngineConfig::new()
            .with_retry(
                RetryPolicy::builder()
                    .max_retries(7)
                    .initial_delay(Duration::from_millis(5))
                    .build(),
            )
            .with_raffle_utc_offset_minutes(-300);

        assert_eq!(config.retry.max_retries, 7);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(5));
        assert_eq!(config.raffle_utc_offset_minutes, -300);
    }
}
