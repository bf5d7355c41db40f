pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# CRIME GROUPING CONFIGURATION
# =============================================================================
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/crime-grouping/config.yml
#   3. /etc/crime-grouping/config.yml
#
# Every section is optional; omitted values fall back to the defaults shown.
# Values may reference environment variables with $env{VAR_NAME}.

# =============================================================================
# GROUPING
# =============================================================================
# Reports from the same submitter are grouped into one crime while each report
# arrives within session_window of the previous one.

grouping:
  # Duration: <n>ms, <n>s, <n>m or <n>h
  session_window: 1h

  # Instant that session expiry is measured against:
  #   latest      - later of the wall clock and the newest report time (live)
  #   event_time  - newest report time only (replaying historical reports)
  #   wall_clock  - wall clock only
  sweep_reference: event_time

  # Prefixes for generated identifiers
  cluster_id_prefix: crime
  report_id_prefix: report

# =============================================================================
# PIPELINE
# =============================================================================

pipeline:
  # Reports buffered between reader, processor and writer
  buffer_limit: 1024

  # What to do with a line that is not a valid report: drop or abort
  on_invalid_report: drop

# =============================================================================
# CHECKPOINT
# =============================================================================
# Active sessions can be saved on exit and restored on start, so grouping
# continues across restarts.

checkpoint:
  enabled: false
  path: ~/.local/share/crime-grouping/sessions.json
"#
    .to_string()
}
