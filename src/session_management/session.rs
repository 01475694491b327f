use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::session_management::plate::Plate;

/// An open parking stay. Serialized as `{"plate": ..., "entryTime": ...}`;
/// records written by the older browser app (`placa` / `entrada`) are read too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingSession {
    #[serde(alias = "placa")]
    pub plate: Plate,
    #[serde(rename = "entryTime", alias = "entrada")]
    entry_time: DateTime<Utc>,
}

impl ParkingSession {
    pub fn new(plate: Plate, entry_time: DateTime<Utc>) -> Self {
        Self { plate, entry_time }
    }

    /// Entry time is fixed at creation.
    pub fn entry_time(&self) -> DateTime<Utc> {
        self.entry_time
    }

    /// Entry date as `dd/mm/yyyy` in local time.
    pub fn entry_date_label(&self) -> String {
        self.entry_date_label_in(&Local)
    }

    /// Entry time of day as `HH:MM` in local time.
    pub fn entry_clock_label(&self) -> String {
        self.entry_clock_label_in(&Local)
    }

    pub fn entry_date_label_in<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        self.entry_time.with_timezone(tz).format("%d/%m/%Y").to_string()
    }

    pub fn entry_clock_label_in<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        self.entry_time.with_timezone(tz).format("%H:%M").to_string()
    }
}
