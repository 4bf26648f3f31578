//! Mexican RFC (fiscal identifier) validation and CFDI UUID extraction.
//!
//! - Persona moral: 3 letters + 6 digits (YYMMDD) + 3 alphanumerics (12 chars).
//! - Persona física: 4 letters + 6 digits (YYMMDD) + 3 alphanumerics (13 chars).

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RFC_MORAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-ZÑ&]{3}(\d{2})(\d{2})(\d{2})[A-Z0-9]{3}$").unwrap());
static RFC_FISICA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-ZÑ&]{4}(\d{2})(\d{2})(\d{2})[A-Z0-9]{3}$").unwrap());
static CFDI_UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});

#[derive(Debug, Clone, thiserror::Error)]
pub enum RfcError {
    #[error("RFC '{0}' does not match the persona moral (12-char) or persona física (13-char) shape")]
    BadShape(String),
    #[error("RFC '{0}' has an invalid date block: {1:02}-{2:02}-{3:02} is not a valid YYMMDD")]
    BadDate(String, u32, u32, u32),
}

/// A validated Mexican fiscal identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rfc(String);

impl Rfc {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Rfc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for Rfc {
    type Error = RfcError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let upper = value.to_uppercase();
        let caps = RFC_MORAL_RE
            .captures(&upper)
            .or_else(|| RFC_FISICA_RE.captures(&upper))
            .ok_or_else(|| RfcError::BadShape(value.to_string()))?;

        let yy: u32 = caps[1].parse().unwrap();
        let mm: u32 = caps[2].parse().unwrap();
        let dd: u32 = caps[3].parse().unwrap();
        if !(1..=12).contains(&mm) || !(1..=31).contains(&dd) {
            return Err(RfcError::BadDate(value.to_string(), yy, mm, dd));
        }

        Ok(Rfc(upper))
    }
}

impl TryFrom<String> for Rfc {
    type Error = RfcError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rfc::try_from(value.as_str())
    }
}

impl From<Rfc> for String {
    fn from(rfc: Rfc) -> Self {
        rfc.0
    }
}

/// Extracts and deduplicates (case-insensitively) every CFDI UUID found in
/// free text, in first-seen order.
pub fn extract_cfdi_uuids(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for m in CFDI_UUID_RE.find_iter(text) {
        let lower = m.as_str().to_lowercase();
        if seen.insert(lower.clone()) {
            out.push(lower);
        }
    }
    out
}
