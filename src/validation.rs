//! Location and day-range validation
//!
//! Raw query parameters arrive as strings or numbers. Every field is checked
//! and all violations are returned together, so a caller never has to fix
//! one problem at a time.

use crate::error::{AqiError, FieldViolation};
use crate::models::Location;
use crate::models::location::{LATITUDE_RANGE, LONGITUDE_RANGE, check_range};
use tracing::debug;

pub const DAYS_RANGE: (u32, u32) = (1, 30);
pub const DEFAULT_DAYS: u32 = 7;

/// A query parameter as received from the outer layer
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Number(value as f64)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl RawValue {
    fn as_number(&self, field: &str) -> Result<f64, FieldViolation> {
        match self {
            RawValue::Number(n) => Ok(*n),
            RawValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| FieldViolation::new(field, format!("'{s}' is not a number"))),
        }
    }
}

/// A fully validated query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedQuery {
    pub location: Location,
    pub days: u32,
}

/// Validates raw coordinate and day-count inputs
pub struct LocationValidator;

impl LocationValidator {
    /// Validate a coordinate pair and optional day count (default 7)
    pub fn validate(
        latitude: impl Into<RawValue>,
        longitude: impl Into<RawValue>,
        days: Option<RawValue>,
    ) -> Result<ValidatedQuery, AqiError> {
        let mut violations = Vec::new();

        let latitude = Self::coordinate("latitude", latitude.into(), LATITUDE_RANGE, &mut violations);
        let longitude =
            Self::coordinate("longitude", longitude.into(), LONGITUDE_RANGE, &mut violations);
        let days = match days {
            None => Some(DEFAULT_DAYS),
            Some(raw) => match Self::days(&raw) {
                Ok(days) => Some(days),
                Err(violation) => {
                    violations.push(violation);
                    None
                }
            },
        };

        if !violations.is_empty() {
            debug!("Rejected query with {} violation(s)", violations.len());
            return Err(AqiError::violations(violations));
        }

        match (latitude, longitude, days) {
            (Some(lat), Some(lng), Some(days)) => Ok(ValidatedQuery {
                location: Location::new(lat, lng)?,
                days,
            }),
            _ => Err(AqiError::internal("validated query is missing a field")),
        }
    }

    /// Check a day count against the accepted range
    pub fn validate_days(field: &str, days: u32) -> Result<u32, AqiError> {
        let (min, max) = DAYS_RANGE;
        if (min..=max).contains(&days) {
            Ok(days)
        } else {
            Err(AqiError::validation(
                field,
                format!("must be within [{min}, {max}], got {days}"),
            ))
        }
    }

    fn coordinate(
        field: &str,
        raw: RawValue,
        range: (f64, f64),
        violations: &mut Vec<FieldViolation>,
    ) -> Option<f64> {
        match raw.as_number(field) {
            Ok(value) => match check_range(field, value, range) {
                Some(violation) => {
                    violations.push(violation);
                    None
                }
                None => Some(value),
            },
            Err(violation) => {
                violations.push(violation);
                None
            }
        }
    }

    fn days(raw: &RawValue) -> Result<u32, FieldViolation> {
        let (min, max) = DAYS_RANGE;
        let value = raw.as_number("days")?;
        if value.fract() != 0.0 {
            return Err(FieldViolation::new("days", "must be a whole number"));
        }
        if value < f64::from(min) || value > f64::from(max) {
            return Err(FieldViolation::new(
                "days",
                format!("must be within [{min}, {max}], got {value}"),
            ));
        }
        Ok(value as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_numeric_query_defaults_days() {
        let query = LocationValidator::validate(40.71, -74.0, None).unwrap();
        assert_eq!(query.days, DEFAULT_DAYS);
        assert_eq!(query.location.latitude(), 40.71);
    }

    #[test]
    fn test_valid_text_query() {
        let query =
            LocationValidator::validate(" 51.5 ", "-0.12", Some(RawValue::from("14"))).unwrap();
        assert_eq!(query.days, 14);
        assert_eq!(query.location.longitude(), -0.12);
    }

    #[test]
    fn test_all_violations_reported_together() {
        let err = LocationValidator::validate(95.0, "abc", Some(RawValue::from(31_i64))).unwrap_err();
        assert_eq!(err.invalid_fields(), vec!["latitude", "longitude", "days"]);
    }

    #[test]
    fn test_fractional_days_rejected() {
        let err = LocationValidator::validate(0.0, 0.0, Some(RawValue::from(2.5))).unwrap_err();
        assert_eq!(err.invalid_fields(), vec!["days"]);
    }

    #[test]
    fn test_validate_days_bounds() {
        assert!(LocationValidator::validate_days("days", 1).is_ok());
        assert!(LocationValidator::validate_days("days", 30).is_ok());
        assert!(LocationValidator::validate_days("days", 0).is_err());
        assert!(LocationValidator::validate_days("horizon_days", 31).is_err());
    }
}
