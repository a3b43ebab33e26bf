//! Client-side input checks run before any request is issued.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValidationError;

/// Shortest password the server accepts.
pub const MIN_PASSWORD_LEN: usize = 6;

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^07\d{9}$").expect("invalid phone number regex"));

/// Strip the whitespace people type between digit groups.
pub fn normalize_phone(input: &str) -> String {
    input.chars().filter(|ch| !ch.is_whitespace()).collect()
}

/// Eleven digits starting with `07`, ignoring whitespace.
pub fn phone_number(input: &str) -> Result<(), ValidationError> {
    let normalized = normalize_phone(input);
    if normalized.is_empty() {
        return Err(ValidationError::new("phoneNumber", "is required"));
    }
    if !PHONE_RE.is_match(&normalized) {
        return Err(ValidationError::new(
            "phoneNumber",
            "must be 11 digits starting with 07",
        ));
    }
    Ok(())
}

/// At least [`MIN_PASSWORD_LEN`] characters.
pub fn password(input: &str) -> Result<(), ValidationError> {
    if input.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

/// Non-empty after trimming.
pub fn name(field: &str, input: &str) -> Result<(), ValidationError> {
    if input.trim().is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    Ok(())
}

/// Finite and strictly positive.
pub fn positive_amount(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }
    Ok(())
}

/// Whole number no smaller than `min`.
pub fn quantity(field: &str, value: i64, min: i64) -> Result<(), ValidationError> {
    if value < min {
        return Err(ValidationError::new(
            field,
            format!("must be at least {min}"),
        ));
    }
    Ok(())
}
