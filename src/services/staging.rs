use crate::api::error::AppError;
use crate::utils::validation::sanitize_filename;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::{Builder, TempPath};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Default)]
struct StagingCounters {
    staged: AtomicU64,
    released: AtomicU64,
}

/// Writes payloads to uniquely named ephemeral files for storage clients that
/// only accept a file-system path.
#[derive(Debug, Clone)]
pub struct StagingFileManager {
    dir: PathBuf,
    counters: Arc<StagingCounters>,
}

/// A staged copy of a payload. Removed by `StagingFileManager::unstage`, or
/// on drop if the request unwinds before reaching it.
#[derive(Debug)]
pub struct StagedArtifact {
    path: Option<TempPath>,
    counters: Arc<StagingCounters>,
}

impl StagedArtifact {
    pub fn path(&self) -> &Path {
        match &self.path {
            Some(p) => &**p,
            None => Path::new(""),
        }
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            tracing::warn!("Staged artifact {:?} released on drop", path.to_path_buf());
            self.counters.released.fetch_add(1, Ordering::SeqCst);
            // TempPath removes the file when dropped.
            drop(path);
        }
    }
}

impl StagingFileManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counters: Arc::default(),
        }
    }

    /// Writes `buffer` verbatim to `<millis>-<token>-<name>` in the staging
    /// directory.
    pub async fn stage(&self, buffer: &[u8], file_name: &str) -> Result<StagedArtifact, AppError> {
        let safe_name = sanitize_filename(file_name).unwrap_or_else(|_| "upload".to_string());

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Staging(format!("Failed to create staging dir: {}", e)))?;

        let prefix = format!("{}-", Utc::now().timestamp_millis());
        let suffix = format!("-{}", safe_name);
        let temp_file = Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .rand_bytes(12)
            .tempfile_in(&self.dir)
            .map_err(|e| AppError::Staging(format!("Failed to create staging file: {}", e)))?;

        let mut writer = tokio::fs::File::from_std(
            temp_file
                .reopen()
                .map_err(|e| AppError::Staging(e.to_string()))?,
        );
        let temp_path = temp_file.into_temp_path();

        writer
            .write_all(buffer)
            .await
            .map_err(|e| AppError::Staging(format!("Failed to write staging file: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| AppError::Staging(e.to_string()))?;

        self.counters.staged.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Staged {} bytes at {:?}", buffer.len(), temp_path.to_path_buf());

        Ok(StagedArtifact {
            path: Some(temp_path),
            counters: self.counters.clone(),
        })
    }

    /// Deletes a staged artifact. Failures are logged and swallowed.
    pub async fn unstage(&self, mut artifact: StagedArtifact) {
        let Some(temp_path) = artifact.path.take() else {
            return;
        };
        self.counters.released.fetch_add(1, Ordering::SeqCst);

        let shown_path = temp_path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || temp_path.close()).await;

        match result {
            Ok(Ok(())) => tracing::debug!("Removed staged artifact {:?}", shown_path),
            Ok(Err(e)) => {
                let err = AppError::Cleanup(format!("{:?}: {}", shown_path, e));
                tracing::warn!("{}", err);
            }
            Err(e) => {
                let err = AppError::Cleanup(format!("{:?}: {}", shown_path, e));
                tracing::warn!("{}", err);
            }
        }
    }

    pub fn staged(&self) -> u64 {
        self.counters.staged.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u64 {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// Artifacts staged but not yet released.
    pub fn active(&self) -> u64 {
        self.staged().saturating_sub(self.released())
    }
}
