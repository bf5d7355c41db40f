use crate::checkpoint::{CheckpointError, CheckpointManager, SessionCheckpoint};
use crate::config::parse::{load_config, ConfigError};
use crate::config::Config;
use crate::grouping::{GroupingEngine, GroupingError, SharedGroupingEngine};
use crate::pipeline::{run_pipeline, PipelineError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::info;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("grouping error: {0}")]
    Grouping(#[from] GroupingError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("failed to open input '{path}': {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub async fn run(
    config_path: Option<PathBuf>,
    input: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(&path)?
        }
        None => {
            info!("No config file found, using defaults");
            Config::default()
        }
    };

    run_with_config(&config, input.as_deref())
        .await
        .map_err(|e| e.into())
}

async fn run_with_config(config: &Config, input: Option<&Path>) -> Result<(), RunError> {
    let engine = SharedGroupingEngine::new(GroupingEngine::from_config(&config.grouping)?);

    let checkpoints = config
        .checkpoint
        .enabled
        .then(|| CheckpointManager::new(&config.checkpoint.path));

    if let Some(manager) = &checkpoints {
        if let Some(checkpoint) = manager.load().await? {
            engine.restore(checkpoint.into_snapshot());
        }
    }

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|source| RunError::Input {
                    path: path.to_path_buf(),
                    source,
                })?;
            info!(input = %path.display(), "Reading reports");
            Box::new(BufReader::new(file))
        }
        None => {
            info!("Reading reports from stdin");
            Box::new(BufReader::new(tokio::io::stdin()))
        }
    };

    let outcome = run_pipeline(reader, tokio::io::stdout(), engine.clone(), config).await?;

    let summary = &outcome.summary;
    info!(
        lines = outcome.lines_read,
        assigned = summary.total_reports,
        dropped = outcome.dropped,
        clusters = summary.cluster_count(),
        multi_report_clusters = summary.multi_report_clusters(),
        "Finished grouping reports"
    );
    for (category, count) in &summary.by_category {
        info!(category = %category, count, "Reports by category");
    }

    let stats = engine.statistics();
    info!(
        active_sessions = stats.active_count,
        reports_in_sessions = stats.total_reports,
        average_reports_per_session = stats.average_reports_per_session,
        "Session statistics"
    );

    if let Some(manager) = &checkpoints {
        let checkpoint = SessionCheckpoint::from_snapshot(engine.snapshot());
        manager.save(&checkpoint).await?;
        info!(path = %manager.path().display(), "Saved session checkpoint");
    }

    Ok(())
}
