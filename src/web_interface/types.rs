use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::billing::{Receipt, StayDuration};
use crate::session_management::LiveEntry;

/// Body of `POST /api/sessions` and `PUT /api/sessions/{plate}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlateRequest {
    pub plate: String,
}

/// Query string of `GET /api/sessions`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub plate: String,
    pub entry_time: DateTime<Utc>,
    pub entry_date: String,
    pub entry_clock: String,
    pub duration: StayDuration,
    pub amount: f64,
    pub amount_label: String,
}

impl From<&LiveEntry> for SessionResponse {
    fn from(entry: &LiveEntry) -> Self {
        Self {
            plate: entry.session.plate.to_string(),
            entry_time: entry.session.entry_time(),
            entry_date: entry.session.entry_date_label(),
            entry_clock: entry.session.entry_clock_label(),
            duration: entry.duration,
            amount: entry.amount,
            amount_label: format!("{:.2}", entry.amount),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiptResponse {
    pub plate: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub duration: StayDuration,
    pub duration_label: String,
    pub amount: f64,
    pub amount_label: String,
}

impl From<&Receipt> for ReceiptResponse {
    fn from(receipt: &Receipt) -> Self {
        Self {
            plate: receipt.session.plate.to_string(),
            entry_time: receipt.session.entry_time(),
            exit_time: receipt.exit_time,
            duration: receipt.duration,
            duration_label: receipt.duration.to_string(),
            amount: receipt.amount,
            amount_label: receipt.amount_label(),
        }
    }
}
