use crate::grouping::{EngineSnapshot, Session};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CURRENT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint io error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CheckpointError>;

/// On-disk form of the grouping engine's sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCheckpoint {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub latest_event: Option<DateTime<Utc>>,
    pub sessions: Vec<Session>,
}

impl SessionCheckpoint {
    pub fn from_snapshot(snapshot: EngineSnapshot) -> Self {
        Self {
            version: CURRENT_VERSION,
            saved_at: Utc::now(),
            latest_event: snapshot.latest_event,
            sessions: snapshot.sessions,
        }
    }

    pub fn into_snapshot(self) -> EngineSnapshot {
        EngineSnapshot {
            latest_event: self.latest_event,
            sessions: self.sessions,
        }
    }
}

/// Saves and loads session checkpoints as a JSON file
pub struct CheckpointManager {
    path: PathBuf,
}

impl CheckpointManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }

    pub async fn load(&self) -> Result<Option<SessionCheckpoint>> {
        tracing::info!(path = %self.path.display(), "Loading checkpoint");

        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No checkpoint found");
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let checkpoint: SessionCheckpoint = serde_json::from_str(&content)?;

        if checkpoint.version != CURRENT_VERSION {
            tracing::warn!(
                "Checkpoint version mismatch: {} vs {}, ignoring checkpoint",
                checkpoint.version,
                CURRENT_VERSION
            );
            return Ok(None);
        }

        tracing::info!(
            sessions = checkpoint.sessions.len(),
            "Loaded checkpoint saved at {}",
            checkpoint.saved_at
        );
        Ok(Some(checkpoint))
    }

    /// Write to a temp file next to the checkpoint, then rename it into place
    pub async fn save(&self, checkpoint: &SessionCheckpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }

        let content = serde_json::to_string_pretty(checkpoint)?;
        let tmp_path = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        tracing::debug!(
            path = %self.path.display(),
            sessions = checkpoint.sessions.len(),
            "Checkpoint saved"
        );
        Ok(())
    }
}
