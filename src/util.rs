//! Shared formatting and validation helpers.

use crate::errors::QuakeError;

/// Maximum accepted length for an event id.
const MAX_EVENT_ID_LEN: usize = 32;

/// Round a value to the given number of decimal places.
#[must_use]
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals.min(9) as i32);
    (value * factor).round() / factor
}

/// Format a magnitude with one decimal place ("6.5").
#[must_use]
pub fn format_mag(mag: Option<f64>) -> String {
    mag.map_or_else(|| "?".into(), |m| format!("{m:.1}"))
}

/// Format a count with thousands separators ("1,234,567").
#[must_use]
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Validate a user-supplied event id before any fetch is attempted.
///
/// Ids are network code + event code ("us7000abcd"): ASCII alphanumerics and
/// underscores only.
///
/// # Errors
///
/// Returns `QuakeError::Validation` describing the first problem found.
pub fn validate_event_id(id: &str) -> Result<(), QuakeError> {
    if id.is_empty() {
        return Err(QuakeError::Validation("event id is empty".into()));
    }
    if id.len() > MAX_EVENT_ID_LEN {
        return Err(QuakeError::Validation(format!(
            "event id exceeds {MAX_EVENT_ID_LEN} characters"
        )));
    }
    if let Some(bad) = id.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(QuakeError::Validation(format!(
            "event id contains forbidden character '{bad}'"
        )));
    }
    Ok(())
}
