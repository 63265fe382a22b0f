use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::commit::{CommitHistory, CommitRecord};
use super::repository::{RepositoryRecord, UserProfile};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryData {
    pub metadata: RepositoryRecord,
    pub commits: CommitHistory,
    #[serde(default)]
    pub root_files: Vec<String>,
}

impl RepositoryData {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStage {
    Commits,
    Readme,
    RootFiles,
}

/// Per-repository problem that did not abort the fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchWarning {
    pub repository: String,
    pub stage: FetchStage,
    pub message: String,
}

/// Everything one fetch produced for a user. Repositories are sorted by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub username: String,
    pub fetched_at: DateTime<Utc>,
    pub profile: Option<UserProfile>,
    pub repositories: Vec<RepositoryData>,
    #[serde(default)]
    pub warnings: Vec<FetchWarning>,
}

impl Dataset {
    pub fn new(
        username: impl Into<String>,
        profile: Option<UserProfile>,
        mut repositories: Vec<RepositoryData>,
        warnings: Vec<FetchWarning>,
    ) -> Self {
        repositories.sort_by(|a, b| a.metadata.id.cmp(&b.metadata.id));
        repositories.dedup_by(|a, b| a.metadata.id == b.metadata.id);
        Self {
            username: username.into(),
            fetched_at: Utc::now(),
            profile,
            repositories,
            warnings,
        }
    }

    pub fn repository_ids(&self) -> BTreeSet<&str> {
        self.repositories.iter().map(|r| r.id()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.repositories
            .binary_search_by(|r| r.metadata.id.as_str().cmp(id))
            .is_ok()
    }

    pub fn repository(&self, id: &str) -> Option<&RepositoryData> {
        self.repositories
            .binary_search_by(|r| r.metadata.id.as_str().cmp(id))
            .ok()
            .map(|idx| &self.repositories[idx])
    }

    pub fn records(&self) -> impl Iterator<Item = &RepositoryRecord> {
        self.repositories.iter().map(|r| &r.metadata)
    }

    /// Commits of every repository whose history is available.
    pub fn all_commits(&self) -> impl Iterator<Item = &CommitRecord> {
        self.repositories.iter().flat_map(|r| r.commits.commits())
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
