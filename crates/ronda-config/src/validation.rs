//! Configuration validation

use crate::schema::RawConfig;
use ronda_api::{MAX_RADIUS_METERS, MIN_RADIUS_METERS};
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("attendance.token_ttl_hours must be positive, got {0}")]
    InvalidTokenTtl(i64),

    #[error(
        "attendance.default_radius_meters must be between {min} and {max}, got {value}",
        min = MIN_RADIUS_METERS,
        max = MAX_RADIUS_METERS
    )]
    RadiusOutOfRange { value: u32 },

    #[error("fines.default_absent_amount '{value}': {message}")]
    InvalidAmount { value: String, message: String },
}

/// Validate a raw configuration, collecting every problem
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(ttl) = config.attendance.token_ttl_hours {
        if ttl <= 0 {
            errors.push(ValidationError::InvalidTokenTtl(ttl));
        }
    }

    if let Some(radius) = config.attendance.default_radius_meters {
        if !radius_in_range(radius) {
            errors.push(ValidationError::RadiusOutOfRange { value: radius });
        }
    }

    if let Some(amount) = &config.fines.default_absent_amount {
        if let Err(message) = parse_amount(amount) {
            errors.push(ValidationError::InvalidAmount {
                value: amount.clone(),
                message,
            });
        }
    }

    errors
}

pub fn radius_in_range(radius: u32) -> bool {
    (MIN_RADIUS_METERS..=MAX_RADIUS_METERS).contains(&radius)
}

/// Parse a non-negative decimal money amount
pub fn parse_amount(s: &str) -> Result<Decimal, String> {
    let amount = Decimal::from_str(s.trim()).map_err(|e| format!("not a decimal ({e})"))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err("must not be negative".into());
    }
    Ok(amount)
}
