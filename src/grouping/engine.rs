use crate::config::types::{GroupingConfig, SweepReference, MAX_SESSION_WINDOW};
use crate::grouping::clock::{Clock, SystemClock};
use crate::grouping::ids::{ClusterIdGenerator, TimestampIdGenerator};
use crate::grouping::session::{
    window_end, ClusterId, ExpiryOutOfRange, Session, SessionStatistics,
};
use crate::report::{Report, ReportError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GroupingError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ReportError),

    #[error("session window must be positive and at most 366 days, got {0:?}")]
    InvalidWindow(std::time::Duration),

    #[error(transparent)]
    ExpiryOutOfRange(#[from] ExpiryOutOfRange),
}

/// Serializable copy of the engine state, for checkpointing outside the engine
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub latest_event: Option<DateTime<Utc>>,
    pub sessions: Vec<Session>,
}

/// Assigns reports to crime clusters using a sliding per-submitter window.
///
/// Reports from one submitter that arrive within `window` of the previous
/// one share a cluster. A report outside the window, or from a submitter with
/// no session, opens a new cluster. Expired sessions are swept on every
/// report.
pub struct GroupingEngine {
    window: Duration,
    sweep_reference: SweepReference,
    clock: Box<dyn Clock>,
    id_generator: Box<dyn ClusterIdGenerator>,
    /// Active sessions keyed by submitter id
    sessions: HashMap<String, Session>,
    /// Greatest report timestamp processed so far
    latest_event: Option<DateTime<Utc>>,
}

impl GroupingEngine {
    /// Create an engine with the system clock and timestamp-based cluster ids
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            sweep_reference: SweepReference::default(),
            clock: Box::new(SystemClock),
            id_generator: Box::new(TimestampIdGenerator::default()),
            sessions: HashMap::new(),
            latest_event: None,
        }
    }

    pub fn from_config(config: &GroupingConfig) -> Result<Self, GroupingError> {
        let window = Some(config.session_window)
            .filter(|w| *w <= MAX_SESSION_WINDOW)
            .and_then(|w| Duration::from_std(w).ok())
            .filter(|w| *w > Duration::zero())
            .ok_or(GroupingError::InvalidWindow(config.session_window))?;

        Ok(Self::new(window)
            .with_sweep_reference(config.sweep_reference)
            .with_id_generator(TimestampIdGenerator::new(&config.cluster_id_prefix)))
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_id_generator(mut self, generator: impl ClusterIdGenerator + 'static) -> Self {
        self.id_generator = Box::new(generator);
        self
    }

    pub fn with_sweep_reference(mut self, reference: SweepReference) -> Self {
        self.sweep_reference = reference;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Assign a cluster id to a report.
    ///
    /// Invalid input is rejected before anything is touched: no sweep runs and
    /// no session changes. The same holds for a report whose window would end
    /// past the last representable instant.
    pub fn process_report(&mut self, report: &Report) -> Result<ClusterId, GroupingError> {
        let timestamp = report.validate()?;
        window_end(timestamp, self.window)?;
        let submitter = report.submitter();

        self.latest_event = Some(match self.latest_event {
            Some(latest) if latest > timestamp => latest,
            _ => timestamp,
        });

        self.sweep();

        if let Some(session) = self.sessions.get_mut(submitter) {
            if session.accepts(timestamp) {
                session.absorb(timestamp, self.window)?;
                debug!(
                    report_id = %report.id,
                    submitter = %submitter,
                    cluster_id = %session.cluster_id,
                    report_count = session.report_count,
                    "Extended session"
                );
                return Ok(session.cluster_id.clone());
            }
        }

        let cluster_id = self.id_generator.next_cluster_id();
        let session = Session::open(
            submitter.to_string(),
            cluster_id.clone(),
            timestamp,
            self.window,
        )?;
        debug!(
            report_id = %report.id,
            submitter = %submitter,
            cluster_id = %cluster_id,
            expires_at = %session.expires_at,
            "Opened session"
        );
        self.sessions.insert(submitter.to_string(), session);

        Ok(cluster_id)
    }

    /// All live sessions, ordered by first report then submitter id
    pub fn active_sessions(&mut self) -> Vec<Session> {
        self.sweep();

        let mut sessions: Vec<Session> = self.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| {
            a.first_report_at
                .cmp(&b.first_report_at)
                .then_with(|| a.submitter_id.cmp(&b.submitter_id))
        });
        sessions
    }

    /// Look up a submitter's session without sweeping.
    ///
    /// A stored session that has already lapsed reads as absent.
    pub fn session_for(&self, submitter_id: &str) -> Option<Session> {
        let session = self.sessions.get(submitter_id.trim())?;
        match self.reference_time() {
            Some(reference) if session.is_expired(reference) => None,
            _ => Some(session.clone()),
        }
    }

    /// Drop a submitter's session regardless of its window.
    ///
    /// Returns whether a live session was removed.
    pub fn expire_session(&mut self, submitter_id: &str) -> bool {
        let Some(session) = self.sessions.remove(submitter_id.trim()) else {
            return false;
        };

        let live = match self.reference_time() {
            Some(reference) => !session.is_expired(reference),
            None => true,
        };
        if live {
            debug!(
                submitter = %submitter_id,
                cluster_id = %session.cluster_id,
                "Force-expired session"
            );
        }
        live
    }

    pub fn statistics(&mut self) -> SessionStatistics {
        self.sweep();
        SessionStatistics::from_sessions(self.sessions.values())
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            latest_event: self.latest_event,
            sessions: self.sessions.values().cloned().collect(),
        }
    }

    /// Replace the session store with a previously taken snapshot
    pub fn restore(&mut self, snapshot: EngineSnapshot) {
        self.latest_event = match (self.latest_event, snapshot.latest_event) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.sessions = snapshot
            .sessions
            .into_iter()
            .map(|s| (s.submitter_id.clone(), s))
            .collect();
        self.sweep();
    }

    /// Instant that expiry is measured against, if one is known yet
    fn reference_time(&self) -> Option<DateTime<Utc>> {
        match self.sweep_reference {
            SweepReference::EventTime => self.latest_event,
            SweepReference::WallClock => Some(self.clock.now()),
            SweepReference::Latest => {
                let now = self.clock.now();
                Some(self.latest_event.map_or(now, |latest| latest.max(now)))
            }
        }
    }

    fn sweep(&mut self) {
        let Some(reference) = self.reference_time() else {
            return;
        };

        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired(reference));

        let removed = before - self.sessions.len();
        if removed > 0 {
            debug!(removed, reference = %reference, "Swept expired sessions");
        }
    }
}
