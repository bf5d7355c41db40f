use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub grouping: GroupingConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupingConfig {
    #[serde(default = "default_session_window", with = "duration_format")]
    pub session_window: Duration,
    #[serde(default)]
    pub sweep_reference: SweepReference,
    #[serde(default = "default_cluster_id_prefix")]
    pub cluster_id_prefix: String,
    #[serde(default = "default_report_id_prefix")]
    pub report_id_prefix: String,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            session_window: default_session_window(),
            sweep_reference: SweepReference::default(),
            cluster_id_prefix: default_cluster_id_prefix(),
            report_id_prefix: default_report_id_prefix(),
        }
    }
}

/// Longest accepted `session_window`
pub const MAX_SESSION_WINDOW: Duration = Duration::from_secs(366 * 24 * 3600);

fn default_session_window() -> Duration {
    Duration::from_secs(3600)
}

fn default_cluster_id_prefix() -> String {
    "crime".to_string()
}

fn default_report_id_prefix() -> String {
    "report".to_string()
}

/// Instant that session expiry is measured against during a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepReference {
    /// Later of the wall clock and the newest report timestamp seen
    #[default]
    Latest,
    /// Newest report timestamp seen; suited to replaying historical reports
    EventTime,
    /// Wall clock only
    WallClock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_buffer_limit")]
    pub buffer_limit: usize,
    #[serde(default = "default_on_invalid_report")]
    pub on_invalid_report: InvalidReportStrategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_limit: default_buffer_limit(),
            on_invalid_report: default_on_invalid_report(),
        }
    }
}

fn default_buffer_limit() -> usize {
    1024
}

fn default_on_invalid_report() -> InvalidReportStrategy {
    InvalidReportStrategy::Drop
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidReportStrategy {
    Drop,
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_checkpoint_path")]
    pub path: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_checkpoint_path(),
        }
    }
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("~/.local/share/crime-grouping/sessions.json")
}

// Durations are written as `<n>ms`, `<n>s`, `<n>m` or `<n>h`
mod duration_format {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty duration string".to_string());
        }

        let (value_str, unit) = if let Some(v) = s.strip_suffix("ms") {
            (v, "ms")
        } else if let Some(v) = s.strip_suffix('s') {
            (v, "s")
        } else if let Some(v) = s.strip_suffix('m') {
            (v, "m")
        } else if let Some(v) = s.strip_suffix('h') {
            (v, "h")
        } else {
            return Err(format!("invalid duration format: {}", s));
        };

        let value: u64 = value_str
            .trim()
            .parse()
            .map_err(|_| format!("invalid numeric value: {}", value_str))?;

        let out_of_range = || format!("duration out of range: {}", s);
        let duration = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.checked_mul(60).ok_or_else(out_of_range)?),
            "h" => Duration::from_secs(value.checked_mul(3600).ok_or_else(out_of_range)?),
            _ => return Err(format!("unknown unit: {}", unit)),
        };

        Ok(duration)
    }

    pub(super) fn format_duration(d: Duration) -> String {
        let secs = d.as_secs();
        if d.subsec_nanos() != 0 || secs == 0 {
            format!("{}ms", d.as_millis())
        } else if secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::duration_format::{format_duration, parse_duration};
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("1d").is_err());
        assert!(parse_duration("xm").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        let err = parse_duration("6000000000000000h").unwrap_err();
        assert!(err.contains("out of range"));
        assert!(parse_duration("400000000000000000m").is_err());
        assert_eq!(
            parse_duration("18446744073709551615s").unwrap(),
            Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
        assert_eq!(format_duration(Duration::from_secs(90 * 60)), "90m");
        assert_eq!(format_duration(Duration::from_secs(61)), "61s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.grouping.session_window, Duration::from_secs(3600));
        assert_eq!(config.grouping.sweep_reference, SweepReference::Latest);
        assert_eq!(config.grouping.cluster_id_prefix, "crime");
        assert_eq!(config.pipeline.on_invalid_report, InvalidReportStrategy::Drop);
        assert!(!config.checkpoint.enabled);
    }

    #[test]
    fn test_sweep_reference_names() {
        let config: GroupingConfig =
            serde_yaml::from_str("sweep_reference: event_time").unwrap();
        assert_eq!(config.sweep_reference, SweepReference::EventTime);

        let config: GroupingConfig =
            serde_yaml::from_str("sweep_reference: wall_clock").unwrap();
        assert_eq!(config.sweep_reference, SweepReference::WallClock);
    }
}
