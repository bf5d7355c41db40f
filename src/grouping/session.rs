use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A report time whose window end falls outside the representable range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session window starting at {0} ends out of range")]
pub struct ExpiryOutOfRange(pub DateTime<Utc>);

/// End of a window of length `window` opened at `timestamp`
pub fn window_end(
    timestamp: DateTime<Utc>,
    window: Duration,
) -> Result<DateTime<Utc>, ExpiryOutOfRange> {
    timestamp
        .checked_add_signed(window)
        .ok_or(ExpiryOutOfRange(timestamp))
}

/// Identifier grouping reports believed to describe the same incident
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(String);

impl ClusterId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ClusterId> for String {
    fn from(id: ClusterId) -> Self {
        id.0
    }
}

/// Per-submitter bookkeeping for the cluster currently being built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub submitter_id: String,
    pub cluster_id: ClusterId,
    /// Earliest report folded into this session
    pub first_report_at: DateTime<Utc>,
    /// Most recent report folded into this session
    pub last_report_at: DateTime<Utc>,
    pub report_count: u64,
    /// Always `last_report_at + window`
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Open a session for the first report of a submitter
    pub fn open(
        submitter_id: String,
        cluster_id: ClusterId,
        timestamp: DateTime<Utc>,
        window: Duration,
    ) -> Result<Self, ExpiryOutOfRange> {
        Ok(Self {
            submitter_id,
            cluster_id,
            first_report_at: timestamp,
            last_report_at: timestamp,
            report_count: 1,
            expires_at: window_end(timestamp, window)?,
        })
    }

    /// Whether a report at `timestamp` falls inside this session's window
    pub fn accepts(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp <= self.expires_at
    }

    /// Whether the session has lapsed relative to `reference`
    pub fn is_expired(&self, reference: DateTime<Utc>) -> bool {
        self.expires_at < reference
    }

    /// Fold a report into this session.
    ///
    /// A report older than `last_report_at` still counts, but never moves
    /// `last_report_at` or `expires_at` backwards. The session is left
    /// unchanged on error.
    pub fn absorb(
        &mut self,
        timestamp: DateTime<Utc>,
        window: Duration,
    ) -> Result<(), ExpiryOutOfRange> {
        let last_report_at = self.last_report_at.max(timestamp);
        self.expires_at = window_end(last_report_at, window)?;
        self.last_report_at = last_report_at;
        self.first_report_at = self.first_report_at.min(timestamp);
        self.report_count += 1;
        Ok(())
    }
}

/// Aggregate view over the active sessions
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionStatistics {
    pub active_count: usize,
    pub total_reports: u64,
    /// Zero when there are no active sessions
    pub average_reports_per_session: f64,
}

impl SessionStatistics {
    pub fn from_sessions<'a>(sessions: impl IntoIterator<Item = &'a Session>) -> Self {
        let (active_count, total_reports) = sessions
            .into_iter()
            .fold((0usize, 0u64), |(count, total), s| {
                (count + 1, total + s.report_count)
            });

        let average_reports_per_session = if active_count > 0 {
            total_reports as f64 / active_count as f64
        } else {
            0.0
        };

        Self {
            active_count,
            total_reports,
            average_reports_per_session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_open_session() {
        let session = Session::open(
            "A".to_string(),
            ClusterId::new("crime-1"),
            ts("2024-08-23T10:00:00Z"),
            Duration::hours(1),
        )
        .unwrap();

        assert_eq!(session.report_count, 1);
        assert_eq!(session.first_report_at, session.last_report_at);
        assert_eq!(session.expires_at, ts("2024-08-23T11:00:00Z"));
    }

    #[test]
    fn test_absorb_extends_window() {
        let mut session = Session::open(
            "A".to_string(),
            ClusterId::new("crime-1"),
            ts("2024-08-23T10:00:00Z"),
            Duration::hours(1),
        )
        .unwrap();

        session
            .absorb(ts("2024-08-23T10:45:00Z"), Duration::hours(1))
            .unwrap();

        assert_eq!(session.report_count, 2);
        assert_eq!(session.last_report_at, ts("2024-08-23T10:45:00Z"));
        assert_eq!(session.expires_at, ts("2024-08-23T11:45:00Z"));
    }

    #[test]
    fn test_absorb_out_of_order_keeps_expiry() {
        let mut session = Session::open(
            "A".to_string(),
            ClusterId::new("crime-1"),
            ts("2024-08-23T10:30:00Z"),
            Duration::hours(1),
        )
        .unwrap();

        session
            .absorb(ts("2024-08-23T10:05:00Z"), Duration::hours(1))
            .unwrap();

        assert_eq!(session.report_count, 2);
        assert_eq!(session.first_report_at, ts("2024-08-23T10:05:00Z"));
        assert_eq!(session.last_report_at, ts("2024-08-23T10:30:00Z"));
        assert_eq!(session.expires_at, ts("2024-08-23T11:30:00Z"));
    }

    #[test]
    fn test_window_boundaries() {
        let session = Session::open(
            "A".to_string(),
            ClusterId::new("crime-1"),
            ts("2024-08-23T10:00:00Z"),
            Duration::hours(1),
        )
        .unwrap();

        // Inclusive at the exact expiry instant
        assert!(session.accepts(ts("2024-08-23T11:00:00Z")));
        assert!(!session.accepts(ts("2024-08-23T11:00:01Z")));

        assert!(!session.is_expired(ts("2024-08-23T11:00:00Z")));
        assert!(session.is_expired(ts("2024-08-23T11:00:01Z")));
    }

    #[test]
    fn test_open_past_end_of_time() {
        let at = DateTime::<Utc>::MAX_UTC - Duration::minutes(30);
        let err = Session::open("A".to_string(), ClusterId::new("crime-1"), at, Duration::hours(1))
            .unwrap_err();
        assert_eq!(err, ExpiryOutOfRange(at));
    }

    #[test]
    fn test_absorb_out_of_range_leaves_session() {
        let start = DateTime::<Utc>::MAX_UTC - Duration::hours(2);
        let mut session = Session::open(
            "A".to_string(),
            ClusterId::new("crime-1"),
            start,
            Duration::hours(1),
        )
        .unwrap();
        let before = session.clone();

        let late = start + Duration::minutes(90);
        assert!(session.absorb(late, Duration::hours(1)).is_err());
        assert_eq!(session, before);
    }

    #[test]
    fn test_statistics_empty() {
        let stats = SessionStatistics::from_sessions(&Vec::<Session>::new());
        assert_eq!(stats.active_count, 0);
        assert_eq!(stats.total_reports, 0);
        assert_eq!(stats.average_reports_per_session, 0.0);
    }

    #[test]
    fn test_cluster_id_serializes_as_string() {
        let json = serde_json::to_string(&ClusterId::new("crime-abc")).unwrap();
        assert_eq!(json, "\"crime-abc\"");
    }
}
