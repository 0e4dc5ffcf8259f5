//! Threshold alerts
//!
//! Two rules: poor or worse current air produces a `current_warning`, and
//! each forecast day with stagnant weather produces a `forecast_warning`.

use crate::models::{AirQualitySnapshot, Alert, AlertKind, Severity, WeatherDay};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;

/// Current AQI at or above this raises a warning
pub const WARNING_THRESHOLD: u8 = 4;

/// Canned advice for AQI 1-5
const MESSAGES: [&str; 5] = [
    "Air quality is excellent. Enjoy outdoor activities.",
    "Air quality is good. Unusually sensitive people should consider limiting prolonged outdoor exertion.",
    "Air quality is moderate. Sensitive groups should reduce prolonged outdoor exertion.",
    "Air quality is poor. Everyone should limit outdoor exertion; sensitive groups should stay indoors.",
    "Air quality is hazardous. Avoid all outdoor activity and keep windows closed.",
];

/// Message for an AQI value, saturating outside the scale
#[must_use]
pub fn message_for(aqi: u8) -> &'static str {
    let idx = usize::from(aqi.clamp(1, 5)) - 1;
    MESSAGES[idx]
}

#[derive(Debug, Clone, Default)]
pub struct AlertEngine;

impl AlertEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Evaluate both rules. `weather` is `None` when no covariates are available.
    #[must_use]
    pub fn evaluate(
        &self,
        snapshot: &AirQualitySnapshot,
        current_ttl: std::time::Duration,
        weather: Option<&[WeatherDay]>,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();
        alerts.extend(self.current_warning(snapshot, current_ttl));
        match weather {
            Some(days) => alerts.extend(self.forecast_warnings(days, snapshot.timestamp.date_naive())),
            None => debug!("No weather covariates, skipping forecast rule"),
        }
        alerts
    }

    /// Rule 1: warn on poor or hazardous current air
    #[must_use]
    pub fn current_warning(&self, snapshot: &AirQualitySnapshot, ttl: std::time::Duration) -> Option<Alert> {
        if snapshot.aqi_value < WARNING_THRESHOLD {
            return None;
        }
        let severity = if snapshot.aqi_value >= 5 {
            Severity::Hazardous
        } else {
            Severity::Poor
        };
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::minutes(5));
        Some(Alert {
            kind: AlertKind::CurrentWarning,
            severity,
            message: message_for(snapshot.aqi_value).to_string(),
            valid_until: snapshot.timestamp + ttl,
            date: None,
        })
    }

    /// Rule 2: warn on every stagnant day after `today`
    #[must_use]
    pub fn forecast_warnings(&self, days: &[WeatherDay], today: NaiveDate) -> Vec<Alert> {
        days.iter()
            .filter(|day| day.date > today && day.is_stagnant())
            .map(|day| Alert {
                kind: AlertKind::ForecastWarning,
                severity: Severity::Moderate,
                message: format!(
                    "Stagnant conditions expected on {} ({}, wind {:.1} m/s, humidity {:.0}%): pollutants may accumulate.",
                    day.date,
                    day.format_temperature(),
                    day.wind_speed,
                    day.humidity
                ),
                valid_until: end_of_day(day.date),
                date: Some(day.date),
            })
            .collect()
    }
}

/// Midnight UTC following `date`
fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    (date + Duration::days(1)).and_time(chrono::NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AqiCategory, Location};
    use std::collections::BTreeMap;

    fn snapshot(aqi: u8) -> AirQualitySnapshot {
        AirQualitySnapshot {
            aqi_value: aqi,
            category: AqiCategory::from_value(aqi),
            pollutant_levels: BTreeMap::new(),
            timestamp: Utc::now(),
            data_sources: vec![],
            location: Location::new(0.0, 0.0).unwrap(),
            weather_factor: None,
        }
    }

    fn weather(day: u32, temperature: f64, wind_speed: f64, humidity: f64) -> WeatherDay {
        WeatherDay {
            date: NaiveDate::from_ymd_opt(2024, 8, day).unwrap(),
            temperature,
            wind_speed,
            humidity,
            pressure: None,
            conditions: None,
        }
    }

    #[test]
    fn test_current_warning_thresholds() {
        let engine = AlertEngine::new();
        let ttl = std::time::Duration::from_secs(300);

        assert!(engine.current_warning(&snapshot(3), ttl).is_none());

        let poor = engine.current_warning(&snapshot(4), ttl).unwrap();
        assert_eq!(poor.severity, Severity::Poor);
        assert_eq!(poor.kind, AlertKind::CurrentWarning);
        assert_eq!(poor.message, message_for(4));

        let snap = snapshot(5);
        let hazardous = engine.current_warning(&snap, ttl).unwrap();
        assert_eq!(hazardous.severity, Severity::Hazardous);
        assert_eq!(hazardous.valid_until, snap.timestamp + Duration::seconds(300));
        assert_eq!(hazardous.date, None);
    }

    #[test]
    fn test_messages_are_distinct() {
        let messages: std::collections::HashSet<&str> = (1..=5).map(message_for).collect();
        assert_eq!(messages.len(), 5);
        assert_eq!(message_for(0), message_for(1));
        assert_eq!(message_for(9), message_for(5));
    }

    #[test]
    fn test_stagnant_days_produce_forecast_warnings() {
        let engine = AlertEngine::new();
        let days = vec![
            weather(1, 32.0, 1.5, 80.0),
            weather(2, 25.0, 1.0, 90.0),
            weather(3, 35.0, 2.9, 71.0),
        ];
        let alerts = engine.forecast_warnings(&days, NaiveDate::from_ymd_opt(2024, 7, 31).unwrap());
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.severity == Severity::Moderate));
        assert_eq!(alerts[0].date, Some(NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()));
        assert_eq!(alerts[1].valid_until.to_rfc3339(), "2024-08-04T00:00:00+00:00");
    }

    #[test]
    fn test_today_and_past_days_are_not_forecast() {
        let engine = AlertEngine::new();
        let days = vec![
            weather(1, 32.0, 1.5, 80.0),
            weather(2, 32.0, 1.5, 80.0),
            weather(3, 32.0, 1.5, 80.0),
        ];
        let alerts = engine.forecast_warnings(&days, NaiveDate::from_ymd_opt(2024, 8, 2).unwrap());
        let dates: Vec<Option<NaiveDate>> = alerts.iter().map(|a| a.date).collect();
        assert_eq!(dates, vec![Some(NaiveDate::from_ymd_opt(2024, 8, 3).unwrap())]);
    }

    #[test]
    fn test_missing_weather_skips_forecast_rule() {
        let engine = AlertEngine::new();
        let ttl = std::time::Duration::from_secs(60);
        assert!(engine.evaluate(&snapshot(2), ttl, None).is_empty());

        let snap = snapshot(5);
        let mut day = weather(5, 31.0, 0.5, 95.0);
        day.date = snap.timestamp.date_naive() + Duration::days(1);
        let alerts = engine.evaluate(&snap, ttl, Some(&[day]));
        let kinds: Vec<AlertKind> = alerts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::CurrentWarning, AlertKind::ForecastWarning]);
    }
}
