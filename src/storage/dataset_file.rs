use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    CommitHistory, Dataset, FetchStage, FetchWarning, RepositoryData, RepositoryRecord, UserProfile,
};

#[derive(Debug, Serialize, Deserialize)]
struct StoredDataset {
    username: String,
    fetched_at: DateTime<Utc>,
    profile: Option<UserProfile>,
    repositories: BTreeMap<String, StoredRepository>,
    #[serde(default)]
    warnings: Vec<FetchWarning>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredRepository {
    metadata: RepositoryRecord,
    commits: CommitHistory,
    #[serde(default)]
    readme: String,
    #[serde(default)]
    root_files: Vec<String>,
}

/// One JSON file per user under `data_dir`. A save replaces the whole file.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    dir: PathBuf,
}

impl DatasetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, username: &str) -> Result<PathBuf> {
        let valid = !username.is_empty()
            && username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::InvalidArgument(format!("not a GitHub username: {:?}", username)));
        }
        Ok(self.dir.join(format!("{}.json", username.to_lowercase())))
    }

    pub async fn save(&self, dataset: &Dataset) -> Result<PathBuf> {
        let path = self.path_for(&dataset.username)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let stored = StoredDataset {
            username: dataset.username.clone(),
            fetched_at: dataset.fetched_at,
            profile: dataset.profile.clone(),
            repositories: dataset
                .repositories
                .iter()
                .map(|repo| {
                    let mut metadata = repo.metadata.clone();
                    let readme = std::mem::take(&mut metadata.readme);
                    (
                        repo.id().to_string(),
                        StoredRepository {
                            metadata,
                            commits: repo.commits.clone(),
                            readme,
                            root_files: repo.root_files.clone(),
                        },
                    )
                })
                .collect(),
            warnings: dataset.warnings.clone(),
        };

        let json = serde_json::to_vec_pretty(&stored)?;
        // unique per writer so concurrent saves never share a temp file
        let tmp = self.dir.join(format!(".{}.{}.tmp", username_file_stem(&path), Uuid::new_v4()));
        if let Err(e) = write_then_rename(&tmp, &path, &json).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }

        tracing::info!(
            "Saved {} repositories for {} to {}",
            dataset.repositories.len(),
            dataset.username,
            path.display()
        );
        Ok(path)
    }

    /// Loads the stored dataset for `username`, or `None` if nothing was saved.
    /// A file belonging to another user is rejected.
    pub async fn load(&self, username: &str) -> Result<Option<Dataset>> {
        let path = self.path_for(username)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredDataset = serde_json::from_slice(&bytes)?;

        let owner = stored
            .profile
            .as_ref()
            .map(|p| p.login.as_str())
            .unwrap_or(&stored.username);
        if !owner.eq_ignore_ascii_case(username) {
            return Err(Error::CacheMismatch {
                cached: owner.to_string(),
                requested: username.to_string(),
            });
        }

        let mut warnings = stored.warnings;
        let repositories = stored
            .repositories
            .into_iter()
            .map(|(id, repo)| {
                let recorded = warnings
                    .iter()
                    .any(|w| w.repository == id && w.stage == FetchStage::Commits);
                if let (CommitHistory::Unavailable { unavailable }, false) = (&repo.commits, recorded) {
                    warnings.push(FetchWarning {
                        repository: id.clone(),
                        stage: FetchStage::Commits,
                        message: unavailable.clone(),
                    });
                }
                let mut metadata = repo.metadata;
                metadata.id = id;
                metadata.readme = repo.readme;
                RepositoryData {
                    metadata,
                    commits: repo.commits,
                    root_files: repo.root_files,
                }
            })
            .collect();

        let mut dataset = Dataset::new(stored.username, stored.profile, repositories, warnings);
        dataset.fetched_at = stored.fetched_at;

        tracing::info!(
            "Loaded {} cached repositories for {} (fetched {})",
            dataset.repositories.len(),
            dataset.username,
            dataset.fetched_at
        );
        Ok(Some(dataset))
    }
}

fn username_file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn write_then_rename(tmp: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    tokio::fs::write(tmp, contents).await?;
    tokio::fs::rename(tmp, path).await?;
    Ok(())
}
