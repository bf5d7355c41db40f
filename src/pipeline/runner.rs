use crate::config::types::{Config, InvalidReportStrategy};
use crate::grouping::SharedGroupingEngine;
use crate::intake::{self, AssignedReport, ReportSubmission};
use crate::summary::ReportSummary;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Errors that can occur during pipeline operation
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid report on line {line}: {reason}")]
    InvalidReport { line: u64, reason: String },
}

/// A submission tagged with the input line it came from
#[derive(Debug, Clone)]
pub struct NumberedSubmission {
    pub line: u64,
    pub submission: ReportSubmission,
}

/// Totals reported by a finished pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    pub lines_read: u64,
    pub dropped: u64,
    pub summary: ReportSummary,
}

/// Either drop an invalid report with a warning, or abort the run
fn handle_invalid(
    strategy: InvalidReportStrategy,
    line: u64,
    reason: String,
) -> Result<(), PipelineError> {
    match strategy {
        InvalidReportStrategy::Drop => {
            warn!(line, reason = %reason, "Dropping invalid report");
            Ok(())
        }
        InvalidReportStrategy::Abort => Err(PipelineError::InvalidReport { line, reason }),
    }
}

/// Run the reader task.
///
/// Reads one JSON report per line and forwards it downstream. Blank lines are
/// skipped. A line that is not UTF-8 is treated like any other invalid
/// report. Returns the number of lines read and the number dropped.
pub async fn run_reader<R>(
    mut reader: R,
    output: mpsc::Sender<NumberedSubmission>,
    on_invalid: InvalidReportStrategy,
) -> Result<(u64, u64), PipelineError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut line_no = 0u64;
    let mut dropped = 0u64;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        line_no += 1;

        let line = match std::str::from_utf8(trim_line_ending(&buf)) {
            Ok(line) => line,
            Err(e) => {
                handle_invalid(on_invalid, line_no, format!("line is not valid UTF-8: {}", e))?;
                dropped += 1;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let submission = match serde_json::from_str::<ReportSubmission>(line) {
            Ok(submission) => submission,
            Err(e) => {
                handle_invalid(on_invalid, line_no, e.to_string())?;
                dropped += 1;
                continue;
            }
        };

        let item = NumberedSubmission {
            line: line_no,
            submission,
        };
        if output.send(item).await.is_err() {
            info!("Processor channel closed, reader stopping");
            break;
        }
    }

    debug!(lines = line_no, dropped, "Reader finished");
    Ok((line_no, dropped))
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Run the processor task.
///
/// Assigns every submission a cluster through the shared engine and sends the
/// result to the writer. Returns the number of reports dropped as invalid.
pub async fn run_processor(
    mut input: mpsc::Receiver<NumberedSubmission>,
    output: mpsc::Sender<AssignedReport>,
    engine: SharedGroupingEngine,
    report_id_prefix: String,
    on_invalid: InvalidReportStrategy,
) -> Result<u64, PipelineError> {
    let mut dropped = 0u64;

    while let Some(NumberedSubmission { line, submission }) = input.recv().await {
        let assigned = match intake::submit(&engine, submission, &report_id_prefix) {
            Ok(assigned) => assigned,
            Err(e) => {
                handle_invalid(on_invalid, line, e.to_string())?;
                dropped += 1;
                continue;
            }
        };

        debug!(
            line,
            report_id = %assigned.id,
            cluster_id = %assigned.cluster_id,
            "Assigned report"
        );

        if output.send(assigned).await.is_err() {
            info!("Writer channel closed, processor stopping");
            break;
        }
    }

    Ok(dropped)
}

/// Run the writer task.
///
/// Writes each assigned report as one JSON line and keeps a running summary.
pub async fn run_writer<W>(
    mut input: mpsc::Receiver<AssignedReport>,
    mut writer: W,
) -> Result<ReportSummary, PipelineError>
where
    W: AsyncWrite + Unpin,
{
    let mut summary = ReportSummary::default();

    while let Some(assigned) = input.recv().await {
        let mut line = serde_json::to_vec(&assigned)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        summary.record(&assigned);
    }

    writer.flush().await?;
    Ok(summary)
}

/// Wire reader, processor and writer together and drive them to completion
pub async fn run_pipeline<R, W>(
    reader: R,
    writer: W,
    engine: SharedGroupingEngine,
    config: &Config,
) -> Result<PipelineOutcome, PipelineError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let buffer = config.pipeline.buffer_limit;
    let on_invalid = config.pipeline.on_invalid_report;

    let (submission_tx, submission_rx) = mpsc::channel(buffer);
    let (assigned_tx, assigned_rx) = mpsc::channel(buffer);

    let ((lines_read, unparsed), rejected, summary) = tokio::try_join!(
        run_reader(reader, submission_tx, on_invalid),
        run_processor(
            submission_rx,
            assigned_tx,
            engine,
            config.grouping.report_id_prefix.clone(),
            on_invalid,
        ),
        run_writer(assigned_rx, writer),
    )?;

    Ok(PipelineOutcome {
        lines_read,
        dropped: unparsed + rejected,
        summary,
    })
}
