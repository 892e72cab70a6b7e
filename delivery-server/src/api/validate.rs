//! Input validation helpers
//!
//! Centralized text length limits and field checks used by the handlers.

use shared::error::{AppError, AppResult};

use crate::geo;

/// Entity names: customer, courier, item.
pub const MAX_NAME_LEN: usize = 200;

/// Short identifiers: phone numbers.
pub const MAX_SHORT_TEXT_LEN: usize = 100;

/// Notes and review comments.
pub const MAX_NOTE_LEN: usize = 500;

/// Addresses.
pub const MAX_ADDRESS_LEN: usize = 500;

/// Validate that a required string is non-empty and within the length limit.
pub fn required_text(value: &str, field: &str, max_len: usize) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn optional_text(value: Option<&str>, field: &str, max_len: usize) -> AppResult<()> {
    if let Some(v) = value {
        if v.len() > max_len {
            return Err(AppError::validation(format!(
                "{field} is too long ({} chars, max {max_len})",
                v.len()
            )));
        }
    }
    Ok(())
}

/// Validate an optional coordinate pair: both-or-neither, in range.
pub fn optional_coordinates(
    lat: Option<f64>,
    lon: Option<f64>,
    label: &str,
) -> AppResult<()> {
    match (lat, lon) {
        (None, None) => Ok(()),
        (Some(lat), Some(lon)) => coordinates(lat, lon, label),
        _ => Err(AppError::validation(format!(
            "{label} coordinates must include both lat and lon"
        ))),
    }
}

/// Validate a coordinate pair is on the globe.
pub fn coordinates(lat: f64, lon: f64, label: &str) -> AppResult<()> {
    if !geo::is_valid_lat(lat) {
        return Err(AppError::validation(format!(
            "{label} latitude must be between -90 and 90"
        )));
    }
    if !geo::is_valid_lon(lon) {
        return Err(AppError::validation(format!(
            "{label} longitude must be between -180 and 180"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_rejects_empty_and_oversized() {
        assert!(required_text("Alice", "name", MAX_NAME_LEN).is_ok());
        assert!(required_text("   ", "name", MAX_NAME_LEN).is_err());
        assert!(required_text(&"x".repeat(MAX_NAME_LEN + 1), "name", MAX_NAME_LEN).is_err());
    }

    #[test]
    fn coordinate_pairs_must_be_complete() {
        assert!(optional_coordinates(None, None, "pickup").is_ok());
        assert!(optional_coordinates(Some(55.0), Some(37.0), "pickup").is_ok());
        assert!(optional_coordinates(Some(55.0), None, "pickup").is_err());
        assert!(optional_coordinates(Some(95.0), Some(37.0), "pickup").is_err());
        assert!(optional_coordinates(Some(55.0), Some(187.0), "pickup").is_err());
    }
}
