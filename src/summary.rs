use crate::grouping::ClusterId;
use crate::intake::AssignedReport;
use std::collections::{BTreeMap, HashMap};

/// Running totals over assigned reports
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSummary {
    pub total_reports: usize,
    /// Reports per category
    pub by_category: BTreeMap<String, usize>,
    cluster_sizes: HashMap<ClusterId, usize>,
}

impl ReportSummary {
    pub fn record(&mut self, report: &AssignedReport) {
        self.total_reports += 1;
        *self.by_category.entry(report.category.clone()).or_insert(0) += 1;
        *self
            .cluster_sizes
            .entry(report.cluster_id.clone())
            .or_insert(0) += 1;
    }

    /// Number of distinct clusters seen
    pub fn cluster_count(&self) -> usize {
        self.cluster_sizes.len()
    }

    /// Clusters that grouped more than one report
    pub fn multi_report_clusters(&self) -> usize {
        self.cluster_sizes.values().filter(|&&n| n > 1).count()
    }

    pub fn reports_in(&self, cluster_id: &ClusterId) -> usize {
        self.cluster_sizes.get(cluster_id).copied().unwrap_or(0)
    }
}

impl<'a> FromIterator<&'a AssignedReport> for ReportSummary {
    fn from_iter<I: IntoIterator<Item = &'a AssignedReport>>(iter: I) -> Self {
        let mut summary = Self::default();
        for report in iter {
            summary.record(report);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assigned(cluster: &str, category: &str) -> AssignedReport {
        AssignedReport {
            id: format!("report-{}-{}", cluster, category),
            submitter_id: "+573001234567".to_string(),
            longitude: -76.5225,
            latitude: 3.4516,
            category: category.to_string(),
            reported_at: "2024-08-23T08:15:00Z".to_string(),
            cluster_id: ClusterId::new(cluster),
        }
    }

    #[test]
    fn test_summary_counts() {
        let reports = vec![
            assigned("crime-1", "homicidio"),
            assigned("crime-1", "homicidio"),
            assigned("crime-2", "hurto_comercial"),
            assigned("crime-3", "homicidio"),
        ];

        let summary: ReportSummary = reports.iter().collect();

        assert_eq!(summary.total_reports, 4);
        assert_eq!(summary.by_category.get("homicidio"), Some(&3));
        assert_eq!(summary.by_category.get("hurto_comercial"), Some(&1));
        assert_eq!(summary.cluster_count(), 3);
        assert_eq!(summary.multi_report_clusters(), 1);
        assert_eq!(summary.reports_in(&ClusterId::new("crime-1")), 2);
        assert_eq!(summary.reports_in(&ClusterId::new("crime-9")), 0);
    }

    #[test]
    fn test_empty_summary() {
        let summary = ReportSummary::default();
        assert_eq!(summary.total_reports, 0);
        assert_eq!(summary.cluster_count(), 0);
        assert!(summary.by_category.is_empty());
    }
}
