use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session_management::session::ParkingSession;

/// Whole-second stay length split into hours, minutes and seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StayDuration {
    pub hours: u64,
    /// Always below 60.
    pub minutes: u64,
    /// Always below 60.
    pub seconds: u64,
}

impl StayDuration {
    pub fn from_seconds(total: u64) -> Self {
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        self.hours * 3600 + self.minutes * 60 + self.seconds
    }

    /// Fractional hours, the unit the hourly rate applies to.
    pub fn as_hours(&self) -> f64 {
        self.hours as f64 + self.minutes as f64 / 60.0 + self.seconds as f64 / 3600.0
    }
}

impl fmt::Display for StayDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hours, {} minutes, {} seconds",
            self.hours, self.minutes, self.seconds
        )
    }
}

/// Outcome of closing a session: what was parked, for how long, and what it costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub session: ParkingSession,
    pub exit_time: DateTime<Utc>,
    pub duration: StayDuration,
    pub amount: f64,
}

impl Receipt {
    /// Amount with two fixed decimals, e.g. `15.00`.
    pub fn amount_label(&self) -> String {
        format!("{:.2}", self.amount)
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Plate:    {}", self.session.plate)?;
        writeln!(f, "Stay:     {}", self.duration)?;
        write!(f, "Amount:   {}", self.amount_label())
    }
}
