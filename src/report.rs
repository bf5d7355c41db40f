use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("submitter id is empty")]
    EmptySubmitter,

    #[error("failed to parse report timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid position ({longitude}, {latitude})")]
    InvalidPosition { longitude: f64, latitude: f64 },
}

/// Longitude/latitude pair, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub longitude: f64,
    pub latitude: f64,
}

impl Position {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Both coordinates are finite and inside the WGS84 ranges
    pub fn is_valid(&self) -> bool {
        self.longitude.is_finite()
            && self.latitude.is_finite()
            && (-180.0..=180.0).contains(&self.longitude)
            && (-90.0..=90.0).contains(&self.latitude)
    }
}

/// A citizen report as handed to the grouping engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    /// Surrounding whitespace is not significant; see [`Report::submitter`]
    pub submitter_id: String,
    pub position: Position,
    pub category: String,
    /// When the incident was reported. Windowing is driven by this value.
    pub reported_at: String,
}

impl Report {
    /// Submitter id with surrounding whitespace removed. Sessions are keyed
    /// by this value.
    pub fn submitter(&self) -> &str {
        self.submitter_id.trim()
    }

    /// Parse `reported_at` into an absolute instant
    pub fn timestamp(&self) -> Result<DateTime<Utc>, ReportError> {
        parse_reported_at(&self.reported_at)
    }

    /// Check the fields the engine depends on and return the report instant.
    ///
    /// Position and category are not inspected here.
    pub fn validate(&self) -> Result<DateTime<Utc>, ReportError> {
        if self.submitter().is_empty() {
            return Err(ReportError::EmptySubmitter);
        }
        self.timestamp()
    }
}

/// Parse a report timestamp.
///
/// Accepts RFC 3339 (any offset, normalized to UTC). A date-time without an
/// offset (`2024-08-23T10:00:00`, optional fractional seconds) is read as UTC.
pub fn parse_reported_at(value: &str) -> Result<DateTime<Utc>, ReportError> {
    let value = value.trim();
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(rfc_err) => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|ndt| Utc.from_utc_datetime(&ndt))
            .map_err(|_| ReportError::InvalidTimestamp {
                value: value.to_string(),
                source: rfc_err,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_report(submitter: &str, reported_at: &str) -> Report {
        Report {
            id: "report-1".to_string(),
            submitter_id: submitter.to_string(),
            position: Position::new(-74.0721, 4.7110),
            category: "robo_personas".to_string(),
            reported_at: reported_at.to_string(),
        }
    }

    #[test]
    fn test_parse_rfc3339_utc() {
        let ts = parse_reported_at("2024-08-23T10:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-08-23T10:00:00+00:00");
    }

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let ts = parse_reported_at("2024-08-23T05:00:00-05:00").unwrap();
        assert_eq!(ts, parse_reported_at("2024-08-23T10:00:00Z").unwrap());
    }

    #[test]
    fn test_parse_naive_as_utc() {
        let ts = parse_reported_at("2024-08-23T10:00:00.250").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-08-23T10:00:00.250+00:00");
    }

    #[test]
    fn test_parse_garbage() {
        let err = parse_reported_at("yesterday at noon").unwrap_err();
        assert!(matches!(err, ReportError::InvalidTimestamp { .. }));
        assert!(err.to_string().contains("yesterday at noon"));
    }

    #[test]
    fn test_validate_rejects_blank_submitter() {
        let report = make_report("   ", "2024-08-23T10:00:00Z");
        assert!(matches!(report.validate(), Err(ReportError::EmptySubmitter)));
    }

    #[test]
    fn test_validate_returns_instant() {
        let report = make_report("+573001234567", "2024-08-23T10:00:00Z");
        assert_eq!(
            report.validate().unwrap(),
            "2024-08-23T10:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn test_position_validity() {
        assert!(Position::new(-74.0721, 4.7110).is_valid());
        assert!(Position::new(180.0, -90.0).is_valid());
        assert!(!Position::new(f64::NAN, 4.0).is_valid());
        assert!(!Position::new(-74.0, f64::INFINITY).is_valid());
        assert!(!Position::new(-181.0, 4.0).is_valid());
        assert!(!Position::new(-74.0, 91.0).is_valid());
    }
}
