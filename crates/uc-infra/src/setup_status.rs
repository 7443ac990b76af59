//! File-based setup status repository
//!
//! Persists [`SetupStatus`] as a JSON document. Writes go to a sibling
//! temporary file that is then renamed over the target.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uc_core::ports::SetupStatusPort;
use uc_core::setup::SetupStatus;

pub const DEFAULT_SETUP_STATUS_FILE: &str = "setup_status.json";

pub struct FileSetupStatusRepository {
    status_file_path: PathBuf,
}

impl FileSetupStatusRepository {
    pub fn new(status_file_path: PathBuf) -> Self {
        Self { status_file_path }
    }

    /// Repository at `base_dir/DEFAULT_SETUP_STATUS_FILE`.
    pub fn with_defaults(base_dir: &Path) -> Self {
        Self::new(base_dir.join(DEFAULT_SETUP_STATUS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.status_file_path
    }
}

#[async_trait]
impl SetupStatusPort for FileSetupStatusRepository {
    async fn get_status(&self) -> anyhow::Result<SetupStatus> {
        let content = match fs::read_to_string(&self.status_file_path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SetupStatus::default())
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to read {}", self.status_file_path.display())
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(SetupStatus::default());
        }

        serde_json::from_str(&content).with_context(|| {
            format!(
                "Failed to parse setup status {}",
                self.status_file_path.display()
            )
        })
    }

    async fn set_status(&self, status: &SetupStatus) -> anyhow::Result<()> {
        if let Some(parent) = self.status_file_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json =
            serde_json::to_vec_pretty(status).context("Failed to serialize setup status")?;
        let tmp_path = self.status_file_path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp_path)
            .await
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        file.write_all(&json)
            .await
            .context("Failed to write setup status")?;
        file.sync_all()
            .await
            .context("Failed to sync setup status")?;
        drop(file);

        fs::rename(&tmp_path, &self.status_file_path)
            .await
            .with_context(|| format!("Failed to replace {}", self.status_file_path.display()))?;
        debug!(path = %self.status_file_path.display(), has_completed = status.has_completed, "setup status saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_reads_as_not_completed() {
        let temp_dir = TempDir::new().unwrap();
        let repo = FileSetupStatusRepository::new(temp_dir.path().join("missing.json"));

        assert_eq!(repo.get_status().await.unwrap(), SetupStatus::default());
    }

    #[tokio::test]
    async fn saved_status_is_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let repo = FileSetupStatusRepository::new(temp_dir.path().join("nested/status.json"));

        repo.set_status(&SetupStatus::completed()).await.unwrap();

        assert!(repo.get_status().await.unwrap().has_completed);
        assert!(!temp_dir.path().join("nested/status.json.tmp").exists());
    }

    #[tokio::test]
    async fn blank_file_reads_as_not_completed() {
        let temp_dir = TempDir::new().unwrap();
        let status_file = temp_dir.path().join("blank.json");
        fs::write(&status_file, "  \n").await.unwrap();

        let repo = FileSetupStatusRepository::new(status_file);

        assert!(!repo.get_status().await.unwrap().has_completed);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let status_file = temp_dir.path().join("corrupt.json");
        fs::write(&status_file, "{not json").await.unwrap();

        let repo = FileSetupStatusRepository::new(status_file);
        let err = repo.get_status().await.unwrap_err();

        assert!(err.to_string().contains("Failed to parse setup status"));
    }

    #[test]
    fn with_defaults_uses_default_file_name() {
        let repo = FileSetupStatusRepository::with_defaults(Path::new("/tmp/uc"));
        assert_eq!(repo.path(), Path::new("/tmp/uc").join(DEFAULT_SETUP_STATUS_FILE));
    }
}
