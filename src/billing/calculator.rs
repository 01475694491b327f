use chrono::{DateTime, Utc};
use log::warn;

use super::types::StayDuration;

/// Hourly rate applied when no other rate is configured, in monetary units.
pub const RATE_PER_HOUR: f64 = 10.0;

/// Length of the interval between two instants, whatever their order.
///
/// Sub-second remainders are dropped. Swapped arguments (clock skew, bad
/// input) give the same result as ordered ones.
pub fn elapsed_duration(entry_time: DateTime<Utc>, exit_time: DateTime<Utc>) -> StayDuration {
    let seconds = (exit_time - entry_time).num_seconds().unsigned_abs();
    StayDuration::from_seconds(seconds)
}

/// Amount due for `duration` at the default [`RATE_PER_HOUR`].
pub fn amount_due(duration: &StayDuration) -> f64 {
    BillingCalculator::default().amount_due(duration)
}

/// Linear time-based pricing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BillingCalculator {
    rate_per_hour: f64,
}

impl Default for BillingCalculator {
    fn default() -> Self {
        Self {
            rate_per_hour: RATE_PER_HOUR,
        }
    }
}

impl BillingCalculator {
    pub fn new(rate_per_hour: f64) -> Self {
        Self { rate_per_hour }
    }

    pub fn rate_per_hour(&self) -> f64 {
        self.rate_per_hour
    }

    pub fn elapsed_duration(
        &self,
        entry_time: DateTime<Utc>,
        exit_time: DateTime<Utc>,
    ) -> StayDuration {
        elapsed_duration(entry_time, exit_time)
    }

    /// `rate * (hours + minutes/60 + seconds/3600)`; a non-finite result is billed as 0.
    pub fn amount_due(&self, duration: &StayDuration) -> f64 {
        let amount = self.rate_per_hour * duration.as_hours();
        if !amount.is_finite() {
            warn!(
                "Non-finite amount for {} at rate {}, billing 0",
                duration, self.rate_per_hour
            );
            return 0.0;
        }
        amount
    }
}
