use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::github::client::GitHubClient;
use crate::models::{
    CommitHistory, CommitRecord, Dataset, FetchStage, FetchWarning, RepositoryData,
    RepositoryRecord, UserProfile,
};

/// Anything that can produce a full [`Dataset`] for a user.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    async fn fetch_dataset(&self, username: &str) -> Result<Dataset>;
}

pub struct GitHubFetcher {
    client: Option<Arc<GitHubClient>>,
    config: FetchConfig,
}

struct RepoFetch {
    data: RepositoryData,
    warnings: Vec<FetchWarning>,
    fatal: Option<Error>,
}

impl GitHubFetcher {
    /// A fetcher without a token is constructed fine but refuses to fetch.
    pub fn new(token: Option<&str>, config: FetchConfig) -> Result<Self> {
        let client = match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => Some(Arc::new(GitHubClient::new(token, &config)?)),
            None => None,
        };
        Ok(Self { client, config })
    }

    fn client(&self) -> Result<&Arc<GitHubClient>> {
        self.client.as_ref().ok_or_else(|| {
            Error::AuthenticationFailed("no GitHub access token configured".to_string())
        })
    }

    pub async fn fetch_repositories(&self, username: &str) -> Result<Vec<RepositoryRecord>> {
        let client = self.client()?;
        let mut seen = HashSet::new();
        let repos = client
            .list_user_repos(username)
            .await?
            .into_iter()
            .filter(|r| seen.insert(r.full_name.clone()))
            .map(RepositoryRecord::from_api)
            .collect();
        Ok(repos)
    }

    async fn fetch_details(
        client: Arc<GitHubClient>,
        mut record: RepositoryRecord,
        max_commits: u32,
    ) -> RepoFetch {
        let id = record.id.clone();
        let mut warnings = Vec::new();

        let commits = match client.list_commits(&id, max_commits).await {
            Ok(collected) => {
                if collected.truncated {
                    tracing::warn!("Commit history of {} cut at {} commits", id, max_commits);
                    warnings.push(FetchWarning {
                        repository: id.clone(),
                        stage: FetchStage::Commits,
                        message: format!("commit history truncated at {} commits", max_commits),
                    });
                }
                CommitHistory::available(
                    collected
                        .items
                        .into_iter()
                        .map(|s| CommitRecord::from_api(&id, s))
                        .collect(),
                )
            }
            Err(e) if is_fatal(&e) => return RepoFetch::fatal(record, e),
            Err(e) => {
                tracing::warn!("Commits unavailable for {}: {}", id, e);
                warnings.push(FetchWarning {
                    repository: id.clone(),
                    stage: FetchStage::Commits,
                    message: e.to_string(),
                });
                CommitHistory::unavailable(e.to_string())
            }
        };

        match client.get_readme(&id).await {
            Ok(readme) => record.readme = readme,
            Err(e) if is_fatal(&e) => return RepoFetch::fatal(record, e),
            Err(e) => {
                tracing::warn!("README unavailable for {}: {}", id, e);
                warnings.push(FetchWarning {
                    repository: id.clone(),
                    stage: FetchStage::Readme,
                    message: e.to_string(),
                });
            }
        }

        let root_files = match client.list_root_files(&id).await {
            Ok(files) => files,
            Err(e) if is_fatal(&e) => return RepoFetch::fatal(record, e),
            Err(e) => {
                tracing::warn!("File listing unavailable for {}: {}", id, e);
                warnings.push(FetchWarning {
                    repository: id.clone(),
                    stage: FetchStage::RootFiles,
                    message: e.to_string(),
                });
                Vec::new()
            }
        };

        RepoFetch {
            data: RepositoryData {
                metadata: record,
                commits,
                root_files,
            },
            warnings,
            fatal: None,
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} repos")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

impl RepoFetch {
    fn fatal(record: RepositoryRecord, error: Error) -> Self {
        Self {
            data: RepositoryData {
                metadata: record,
                commits: CommitHistory::unavailable(error.to_string()),
                root_files: Vec::new(),
            },
            warnings: Vec::new(),
            fatal: Some(error),
        }
    }
}

/// Errors that will hit every remaining request too, so the fetch stops.
fn is_fatal(error: &Error) -> bool {
    matches!(
        error,
        Error::AuthenticationFailed(_) | Error::RateLimited { .. }
    )
}

#[async_trait]
impl RepositorySource for GitHubFetcher {
    async fn fetch_dataset(&self, username: &str) -> Result<Dataset> {
        let client = self.client()?.clone();

        let profile = UserProfile::from(client.get_user(username).await?);
        let repos = self.fetch_repositories(username).await?;
        tracing::info!("Found {} repositories for {}", repos.len(), username);

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit.max(1)));
        let pb = self.progress_bar(repos.len());

        let futures = repos.into_iter().map(|record| {
            let client = client.clone();
            let sem = semaphore.clone();
            let pb = pb.clone();
            let max_commits = self.config.max_commits_per_repo;

            async move {
                let _permit = sem.acquire().await;
                let fetched = Self::fetch_details(client, record, max_commits).await;
                pb.inc(1);
                fetched
            }
        });

        let mut results = join_all(futures).await;
        pb.finish_and_clear();

        results.sort_by(|a, b| a.data.metadata.id.cmp(&b.data.metadata.id));
        if let Some(fatal) = results.iter_mut().find_map(|r| r.fatal.take()) {
            return Err(fatal);
        }

        let mut repositories = Vec::with_capacity(results.len());
        let mut warnings = Vec::new();
        for result in results {
            repositories.push(result.data);
            warnings.extend(result.warnings);
        }

        if !warnings.is_empty() {
            tracing::warn!("Fetch for {} finished with {} warning(s)", username, warnings.len());
        }

        let dataset = Dataset::new(username, Some(profile), repositories, warnings);
        tracing::info!(
            "Fetched {} repositories and {} commits for {}",
            dataset.repositories.len(),
            dataset.all_commits().count(),
            username
        );
        if let Some(remaining) = client.rate_limits().remaining {
            tracing::debug!("GitHub quota remaining after fetch: {}", remaining);
        }
        Ok(dataset)
    }
}
