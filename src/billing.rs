//! Billing: turns a stay into a duration breakdown and an amount due.
//!
//! Everything here is pure; the session store supplies the timestamps.

pub mod calculator;
pub mod types;

pub use calculator::{amount_due, elapsed_duration, BillingCalculator, RATE_PER_HOUR};
pub use types::{Receipt, StayDuration};
