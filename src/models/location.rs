//! Location model for validated geographic coordinates

use crate::error::{AqiError, FieldViolation};
use serde::{Deserialize, Serialize};

pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

/// Validated location coordinates; immutable once constructed
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(try_from = "RawLocation")]
pub struct Location {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawLocation {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawLocation> for Location {
    type Error = AqiError;

    fn try_from(raw: RawLocation) -> Result<Self, Self::Error> {
        Location::new(raw.latitude, raw.longitude)
    }
}

impl Location {
    /// Create a new location, rejecting out-of-range or non-finite coordinates
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, AqiError> {
        let mut violations = Vec::new();
        if let Some(v) = check_range("latitude", latitude, LATITUDE_RANGE) {
            violations.push(v);
        }
        if let Some(v) = check_range("longitude", longitude, LONGITUDE_RANGE) {
            violations.push(v);
        }
        if violations.is_empty() {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(AqiError::violations(violations))
        }
    }

    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Round coordinates for cache key generation
    #[must_use]
    pub fn rounded_coordinates(&self, precision: u32) -> (f64, f64) {
        let multiplier = 10_f64.powi(i32::try_from(precision).unwrap_or(4));
        let lat = (self.latitude * multiplier).round() / multiplier;
        let lon = (self.longitude * multiplier).round() / multiplier;
        (lat, lon)
    }

    /// Stable textual key for this location at the given precision
    #[must_use]
    pub fn key(&self, precision: u32) -> String {
        let (lat, lon) = self.rounded_coordinates(precision);
        let digits = precision as usize;
        // -0.00 and 0.00 must map to the same key
        let lat = if lat == 0.0 { 0.0 } else { lat };
        let lon = if lon == 0.0 { 0.0 } else { lon };
        format!("{lat:.digits$}:{lon:.digits$}")
    }
}

pub(crate) fn check_range(field: &str, value: f64, (min, max): (f64, f64)) -> Option<FieldViolation> {
    if !value.is_finite() {
        Some(FieldViolation::new(field, "must be a finite number"))
    } else if value < min || value > max {
        Some(FieldViolation::new(
            field,
            format!("must be within [{min}, {max}], got {value}"),
        ))
    } else {
        None
    }
}
