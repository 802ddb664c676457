//! # Refresh Policies
//!
//! A refresh is described by plain data: how many attempts, how long to wait
//! between them, and what must hold afterwards for the refresh to count as
//! done.
//!
//! ```text
//! attempt 1 ──fail──► wait delay(1) ──► attempt 2 ──fail──► wait delay(2) ──► ...
//!                                                                       │
//!                           attempt N fails ──► RetriesExhausted ◄──────┘
//!
//! General refresh:     delay(n) = initial × 4^(n-1)   (capped)
//! Balance-delta poll:  delay(n) = interval            (constant)
//! ```

use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use backoff::ExponentialBackoff;

use boost_core::{ClientModel, Credits};

use crate::config::BoostConfig;

/// Independent refresh kinds. At most one of each is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshKind {
    /// Full refresh issued on tunnel connect.
    General,
    /// Polls until the balance moves away from a starting value.
    BalanceDelta,
}

impl std::fmt::Display for RefreshKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshKind::General => write!(f, "general"),
            RefreshKind::BalanceDelta => write!(f, "balance_delta"),
        }
    }
}

// =============================================================================
// Retry Delay
// =============================================================================

/// Delay schedule between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDelay {
    Exponential {
        initial: Duration,
        multiplier: f64,
        max: Duration,
    },
    Fixed(Duration),
}

impl RetryDelay {
    /// A fresh backoff whose n-th `next_backoff()` is the wait after
    /// attempt n.
    pub fn backoff(&self) -> Box<dyn Backoff + Send> {
        match self {
            RetryDelay::Exponential {
                initial,
                multiplier,
                max,
            } => Box::new(ExponentialBackoff {
                current_interval: *initial,
                initial_interval: *initial,
                randomization_factor: 0.0,
                multiplier: *multiplier,
                max_interval: *max,
                max_elapsed_time: None,
                ..Default::default()
            }),
            RetryDelay::Fixed(interval) => Box::new(Constant::new(*interval)),
        }
    }

    /// The wait after attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut backoff = self.backoff();
        let mut delay = Duration::ZERO;
        for _ in 0..attempt.max(1) {
            delay = backoff.next_backoff().unwrap_or(delay);
        }
        delay
    }
}

// =============================================================================
// Success Condition
// =============================================================================

/// Checked against the staged model after each successful round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessCondition {
    Always,
    BalanceChangedFrom(Credits),
}

impl SuccessCondition {
    pub fn is_satisfied(&self, model: &ClientModel) -> bool {
        match self {
            SuccessCondition::Always => true,
            SuccessCondition::BalanceChangedFrom(starting) => model.balance != *starting,
        }
    }
}

// =============================================================================
// Refresh Policy
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshPolicy {
    pub max_attempts: u32,
    pub delay: RetryDelay,
    pub success: SuccessCondition,
}

impl RefreshPolicy {
    /// Exponential retries, succeeds on the first good round-trip.
    pub fn general(config: &BoostConfig) -> Self {
        let settings = &config.refresh;
        RefreshPolicy {
            max_attempts: settings.max_attempts,
            delay: RetryDelay::Exponential {
                initial: Duration::from_millis(settings.initial_delay_ms),
                multiplier: settings.multiplier,
                max: Duration::from_secs(settings.max_delay_secs),
            },
            success: SuccessCondition::Always,
        }
    }

    /// Fixed-interval polling until the balance differs from `starting`.
    pub fn balance_delta(config: &BoostConfig, starting: Credits) -> Self {
        let settings = &config.balance_poll;
        RefreshPolicy {
            max_attempts: settings.max_attempts,
            delay: RetryDelay::Fixed(Duration::from_millis(settings.interval_ms)),
            success: SuccessCondition::BalanceChangedFrom(starting),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delay_is_base_four() {
        let delay = RetryDelay::Exponential {
            initial: Duration::from_secs(1),
            multiplier: 4.0,
            max: Duration::from_secs(60),
        };
        assert_eq!(delay.delay_for(1), Duration::from_secs(1));
        assert_eq!(delay.delay_for(2), Duration::from_secs(4));
        assert_eq!(delay.delay_for(3), Duration::from_secs(16));
        assert_eq!(delay.delay_for(4), Duration::from_secs(60));
    }

    #[test]
    fn test_fixed_delay_is_constant() {
        let delay = RetryDelay::Fixed(Duration::from_millis(2000));
        assert_eq!(delay.delay_for(1), Duration::from_secs(2));
        assert_eq!(delay.delay_for(7), Duration::from_secs(2));
    }

    #[test]
    fn test_balance_changed_condition() {
        let condition = SuccessCondition::BalanceChangedFrom(Credits::from_units(100));
        let mut model = ClientModel {
            balance: Credits::from_units(100),
            ..Default::default()
        };
        assert!(!condition.is_satisfied(&model));

        model.balance = Credits::from_units(150);
        assert!(condition.is_satisfied(&model));
        assert!(SuccessCondition::Always.is_satisfied(&model));
    }

    #[test]
    fn test_policies_from_config() {
        let config = BoostConfig::default();
        let general = RefreshPolicy::general(&config);
        assert_eq!(general.max_attempts, config.refresh.max_attempts);
        assert_eq!(general.success, SuccessCondition::Always);

        let poll = RefreshPolicy::balance_delta(&config, Credits::from_units(5));
        assert_eq!(poll.delay, RetryDelay::Fixed(Duration::from_millis(2000)));
    }
}
