//! Conversion of upstream report messages into engine input.

use crate::grouping::ids::new_report_id;
use crate::grouping::{ClusterId, GroupingError, SharedGroupingEngine};
use crate::report::{Position, Report, ReportError};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("rejected report: {0}")]
    Report(#[from] ReportError),

    #[error("grouping failed: {0}")]
    Grouping(#[from] GroupingError),
}

/// A report as received from the messaging channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSubmission {
    #[serde(default)]
    pub id: Option<String>,
    pub submitter_id: String,
    pub longitude: f64,
    pub latitude: f64,
    pub category: String,
    #[serde(default)]
    pub reported_at: Option<String>,
}

impl ReportSubmission {
    /// Build an engine report, filling in a missing id and timestamp.
    ///
    /// A missing timestamp becomes the current time.
    pub fn into_report(self, report_id_prefix: &str) -> Result<Report, ReportError> {
        let position = Position::new(self.longitude, self.latitude);
        if !position.is_valid() {
            return Err(ReportError::InvalidPosition {
                longitude: self.longitude,
                latitude: self.latitude,
            });
        }

        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| new_report_id(report_id_prefix));

        let reported_at = self
            .reported_at
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));

        Ok(Report {
            id,
            submitter_id: self.submitter_id,
            position,
            category: self.category,
            reported_at,
        })
    }
}

/// A report together with the cluster it was assigned to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedReport {
    pub id: String,
    pub submitter_id: String,
    pub longitude: f64,
    pub latitude: f64,
    pub category: String,
    pub reported_at: String,
    pub cluster_id: ClusterId,
}

impl AssignedReport {
    pub fn new(report: Report, cluster_id: ClusterId) -> Self {
        Self {
            id: report.id,
            submitter_id: report.submitter_id,
            longitude: report.position.longitude,
            latitude: report.position.latitude,
            category: report.category,
            reported_at: report.reported_at,
            cluster_id,
        }
    }
}

/// Build a report from a submission and assign it a cluster
pub fn submit(
    engine: &SharedGroupingEngine,
    submission: ReportSubmission,
    report_id_prefix: &str,
) -> Result<AssignedReport, IntakeError> {
    let report = submission.into_report(report_id_prefix)?;
    let cluster_id = engine.process_report(&report)?;
    Ok(AssignedReport::new(report, cluster_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::SweepReference;
    use crate::grouping::{GroupingEngine, SequentialIdGenerator};
    use chrono::Duration;

    fn make_submission(submitter: &str, reported_at: Option<&str>) -> ReportSubmission {
        ReportSubmission {
            id: None,
            submitter_id: submitter.to_string(),
            longitude: -75.5636,
            latitude: 6.2442,
            category: "extorsion".to_string(),
            reported_at: reported_at.map(str::to_string),
        }
    }

    fn make_engine() -> SharedGroupingEngine {
        SharedGroupingEngine::new(
            GroupingEngine::new(Duration::hours(1))
                .with_sweep_reference(SweepReference::EventTime)
                .with_id_generator(SequentialIdGenerator::new("crime")),
        )
    }

    #[test]
    fn test_missing_id_is_generated() {
        let report = make_submission("+573001234567", Some("2024-08-23T09:00:00Z"))
            .into_report("report")
            .unwrap();
        assert!(report.id.starts_with("report-"));
        assert_eq!(report.reported_at, "2024-08-23T09:00:00Z");
    }

    #[test]
    fn test_supplied_id_is_kept() {
        let mut submission = make_submission("+573001234567", Some("2024-08-23T09:00:00Z"));
        submission.id = Some("report-001".to_string());
        assert_eq!(submission.into_report("report").unwrap().id, "report-001");
    }

    #[test]
    fn test_missing_timestamp_defaults_to_now() {
        let before = Utc::now() - Duration::seconds(1);
        let report = make_submission("A", None).into_report("report").unwrap();
        let at = report.timestamp().unwrap();
        assert!(at >= before);
        assert!(at <= Utc::now());
    }

    #[test]
    fn test_invalid_position_rejected() {
        let mut submission = make_submission("A", Some("2024-08-23T09:00:00Z"));
        submission.latitude = f64::NAN;
        assert!(matches!(
            submission.into_report("report"),
            Err(ReportError::InvalidPosition { .. })
        ));
    }

    #[test]
    fn test_submit_assigns_clusters() {
        let engine = make_engine();

        let first = submit(
            &engine,
            make_submission("+573001234567", Some("2024-08-23T09:00:00Z")),
            "report",
        )
        .unwrap();
        let second = submit(
            &engine,
            make_submission("+573001234567", Some("2024-08-23T09:15:00Z")),
            "report",
        )
        .unwrap();

        assert_eq!(first.cluster_id.as_str(), "crime-1");
        assert_eq!(second.cluster_id, first.cluster_id);
        assert_eq!(second.category, "extorsion");
    }

    #[test]
    fn test_submit_rejects_bad_timestamp() {
        let engine = make_engine();
        let err = submit(&engine, make_submission("A", Some("2024-13-45")), "report").unwrap_err();
        assert!(matches!(err, IntakeError::Grouping(GroupingError::InvalidInput(_))));
        assert!(engine.active_sessions().is_empty());
    }

    #[test]
    fn test_submission_from_json() {
        let json = r#"{"submitter_id":"+573001234567","longitude":-74.07,"latitude":4.71,"category":"robo_personas","reported_at":"2024-08-23T10:30:00Z"}"#;
        let submission: ReportSubmission = serde_json::from_str(json).unwrap();
        assert!(submission.id.is_none());
        assert_eq!(submission.reported_at.as_deref(), Some("2024-08-23T10:30:00Z"));
    }
}
