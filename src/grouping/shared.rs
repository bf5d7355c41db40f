use crate::grouping::engine::{EngineSnapshot, GroupingEngine, GroupingError};
use crate::grouping::session::{ClusterId, Session, SessionStatistics};
use crate::report::Report;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Thread-safe handle to a [`GroupingEngine`].
///
/// Every operation holds one lock for its full lookup, sweep and mutate
/// sequence, so two reports from the same submitter can never interleave.
#[derive(Clone)]
pub struct SharedGroupingEngine {
    inner: Arc<Mutex<GroupingEngine>>,
}

impl SharedGroupingEngine {
    pub fn new(engine: GroupingEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    // No engine method panics mid-mutation, so a poisoned store is intact
    fn lock(&self) -> MutexGuard<'_, GroupingEngine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn process_report(&self, report: &Report) -> Result<ClusterId, GroupingError> {
        self.lock().process_report(report)
    }

    pub fn active_sessions(&self) -> Vec<Session> {
        self.lock().active_sessions()
    }

    pub fn session_for(&self, submitter_id: &str) -> Option<Session> {
        self.lock().session_for(submitter_id)
    }

    pub fn expire_session(&self, submitter_id: &str) -> bool {
        self.lock().expire_session(submitter_id)
    }

    pub fn statistics(&self) -> SessionStatistics {
        self.lock().statistics()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.lock().snapshot()
    }

    pub fn restore(&self, snapshot: EngineSnapshot) {
        self.lock().restore(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::SweepReference;
    use crate::grouping::ids::SequentialIdGenerator;
    use crate::report::Position;
    use chrono::Duration;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_concurrent_submitters() {
        let engine = SharedGroupingEngine::new(
            GroupingEngine::new(Duration::hours(1))
                .with_sweep_reference(SweepReference::EventTime)
                .with_id_generator(SequentialIdGenerator::new("C")),
        );

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let engine = engine.clone();
                thread::spawn(move || {
                    let mut clusters = HashSet::new();
                    for minute in 0..25 {
                        let report = Report {
                            id: format!("r-{}-{}", worker, minute),
                            // Two workers per submitter
                            submitter_id: format!("S{}", worker % 4),
                            position: Position::new(-74.07, 4.71),
                            category: "extorsion".to_string(),
                            reported_at: format!("2024-08-23T10:{:02}:00Z", minute),
                        };
                        clusters.insert(engine.process_report(&report).unwrap());
                    }
                    clusters
                })
            })
            .collect();

        let mut all_clusters = HashSet::new();
        for handle in handles {
            let clusters = handle.join().unwrap();
            assert_eq!(clusters.len(), 1);
            all_clusters.extend(clusters);
        }

        assert_eq!(all_clusters.len(), 4);

        let stats = engine.statistics();
        assert_eq!(stats.active_count, 4);
        assert_eq!(stats.total_reports, 200);
        for submitter in 0..4 {
            let session = engine.session_for(&format!("S{}", submitter)).unwrap();
            assert_eq!(session.report_count, 50);
        }
    }
}
