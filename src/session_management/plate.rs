//! Licence plate normalization.
//!
//! User input is reduced to ASCII uppercase alphanumerics and must then read
//! as three letters followed by four letters or digits. The canonical form
//! carries a hyphen after the third character: `ABC-1234`, `RUU-3G45`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error_handling::types::SessionError;

static PLATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}[A-Z0-9]{4}$").unwrap());

/// A validated plate in canonical `AAA-9999` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Plate(String);

impl Plate {
    /// Normalizes `raw` and checks it against the plate shape.
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let compact = normalize(raw);
        if !PLATE_REGEX.is_match(&compact) {
            return Err(SessionError::InvalidPlate(raw.to_string()));
        }
        let (letters, rest) = compact.split_at(3);
        Ok(Plate(format!("{}-{}", letters, rest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Trim, uppercase, and drop everything that is not an ASCII letter or digit.
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

impl fmt::Display for Plate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Plate {
    type Error = SessionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Plate::parse(&value)
    }
}

impl From<Plate> for String {
    fn from(plate: Plate) -> Self {
        plate.0
    }
}
