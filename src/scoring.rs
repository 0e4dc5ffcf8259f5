//! Accuracy score for a user's visual AQI guess

use crate::AqiError;
use crate::error::FieldViolation;
use crate::models::GuessScore;
use crate::models::air_quality::{AQI_MAX, AQI_MIN};

/// Score `guess` against `actual`: 5 for an exact match, one point less per
/// category of difference, never below 1
pub fn score(guess: u8, actual: u8) -> Result<GuessScore, AqiError> {
    let violations: Vec<FieldViolation> = [("user_guess", guess), ("actual_level", actual)]
        .into_iter()
        .filter(|(_, value)| !(AQI_MIN..=AQI_MAX).contains(value))
        .map(|(field, value)| {
            FieldViolation::new(field, format!("must be within [{AQI_MIN}, {AQI_MAX}], got {value}"))
        })
        .collect();
    if !violations.is_empty() {
        return Err(AqiError::violations(violations));
    }

    let accuracy_score = match guess.abs_diff(actual) {
        0 => 5,
        1 => 4,
        2 => 3,
        3 => 2,
        _ => 1,
    };

    Ok(GuessScore {
        user_guess: guess,
        actual_level: actual,
        accuracy_score,
    })
}
