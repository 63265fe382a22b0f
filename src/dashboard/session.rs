use std::future::Future;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, MutexGuard, RwLock};
use uuid::Uuid;

use crate::analysis::{self, ActivityForecaster, RepositoryClusterer};
use crate::config::{ClusterConfig, ForecastConfig};
use crate::dashboard::cache::{SessionCache, ViewState};
use crate::error::{Error, Result};
use crate::github::RepositorySource;
use crate::llm::LlmAnalyzer;
use crate::models::{
    AnalysisReport, ClusterAssignment, CommitSentiment, DashboardOverview, Dataset, ForecastSeries,
    PersonaTitle, VariantResponse,
};
use crate::storage::DatasetStore;

/// Shared collaborators every session is built from.
#[derive(Clone)]
pub struct SessionDeps {
    pub source: Arc<dyn RepositorySource>,
    pub analyzer: Arc<LlmAnalyzer>,
    pub store: DatasetStore,
    pub cluster: ClusterConfig,
    pub forecast: ForecastConfig,
}

/// One user's dashboard. At most one action runs at a time; a second one is
/// rejected with [`Error::Busy`] rather than queued.
pub struct Session {
    id: Uuid,
    username: String,
    deps: SessionDeps,
    flight: Mutex<()>,
    cache: RwLock<SessionCache>,
    version: watch::Sender<u64>,
    shutdown: watch::Sender<bool>,
}

impl Session {
    pub fn new(username: impl Into<String>, deps: SessionDeps) -> Self {
        let (version, _) = watch::channel(0);
        let (shutdown, _) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            deps,
            flight: Mutex::new(()),
            cache: RwLock::new(SessionCache::new()),
            version,
            shutdown,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Version of the session state; bumps on every visible change.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Resolves once the version passes `after`; a closed session yields
    /// [`Error::Cancelled`] straight away.
    pub async fn wait_for_version(&self, after: u64) -> Result<u64> {
        let mut changes = self.version.subscribe();
        self.until_closed(async move {
            let version = changes
                .wait_for(|v| *v > after)
                .await
                .map(|v| *v)
                .map_err(|_| Error::Cancelled)?;
            Ok(version)
        })
        .await
    }

    pub async fn view(&self) -> (ViewState, u64) {
        let cache = self.cache.read().await;
        (cache.view(), self.version())
    }

    /// Abandons any in-flight call; it finishes with [`Error::Cancelled`].
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Fetches a fresh dataset, persists it and replaces the cached one.
    pub async fn fetch(&self) -> Result<()> {
        let _flight = self.begin()?;
        tracing::info!("Fetching GitHub data for {}", self.username);

        let fetched = self.until_closed(self.deps.source.fetch_dataset(&self.username)).await;
        let dataset = match fetched {
            Ok(dataset) => dataset,
            Err(e) => return Err(self.fail(e).await),
        };

        if let Err(e) = self.deps.store.save(&dataset).await {
            tracing::warn!("Could not persist dataset for {}: {}", self.username, e);
        }
        self.install(dataset).await;
        Ok(())
    }

    /// Replaces the cached dataset with the one saved on disk.
    pub async fn load_cached(&self) -> Result<()> {
        let _flight = self.begin()?;

        let loaded = match self.deps.store.load(&self.username).await {
            Ok(Some(dataset)) => dataset,
            Ok(None) => {
                return Err(self
                    .fail(Error::NotFound(format!("no cached data for {}", self.username)))
                    .await)
            }
            Err(e) => return Err(self.fail(e).await),
        };

        self.install(loaded).await;
        Ok(())
    }

    pub async fn analyze(&self, variants: Option<Vec<String>>) -> Result<AnalysisReport> {
        let _flight = self.begin()?;
        let (dataset, generation) = self.current("analysis").await?;
        let analyzer = &self.deps.analyzer;

        let variants = match variants {
            Some(requested) if !requested.is_empty() => {
                if let Some(unknown) = requested.iter().find(|v| !analyzer.variants().contains(*v)) {
                    return Err(Error::InvalidArgument(format!("unknown model variant: {}", unknown)));
                }
                requested
            }
            _ => analyzer.variants().to_vec(),
        };

        let (inputs, skipped) = analyzer.build_inputs(&dataset);
        let mut report = self
            .until_closed(async { Ok(analyzer.analyze_all(&inputs, &variants).await) })
            .await?;
        report.warnings.extend(skipped);

        self.store_derived(|cache| cache.set_analysis(generation, report.clone())).await;
        Ok(report)
    }

    pub async fn cluster(&self, k: Option<usize>) -> Result<ClusterAssignment> {
        let _flight = self.begin()?;
        let (dataset, generation) = self.current("clustering").await?;

        let k = k.unwrap_or(self.deps.cluster.k);
        let clusterer = RepositoryClusterer::new(self.deps.cluster.clone());
        let assignment = clusterer.cluster(dataset.records(), k)?;
        tracing::info!("Clustered {} repositories into {} group(s)", assignment.members.len(), k);

        self.store_derived(|cache| cache.set_clusters(generation, assignment.clone())).await;
        Ok(assignment)
    }

    pub async fn forecast(&self, horizon_days: Option<u32>) -> Result<ForecastSeries> {
        let _flight = self.begin()?;
        let (dataset, generation) = self.current("forecast").await?;

        let horizon = horizon_days.unwrap_or(self.deps.forecast.horizon_days);
        let forecaster = ActivityForecaster::new(self.deps.forecast.clone());
        let series = forecaster.forecast(dataset.all_commits(), horizon)?;

        self.store_derived(|cache| cache.set_forecast(generation, series.clone())).await;
        Ok(series)
    }

    pub async fn compare(&self, prompt: &str) -> Result<Vec<VariantResponse>> {
        let _flight = self.begin()?;
        if prompt.trim().is_empty() {
            return Err(Error::InvalidArgument("prompt must not be empty".to_string()));
        }
        self.until_closed(async { Ok(self.deps.analyzer.compare_models(prompt).await) })
            .await
    }

    pub async fn readme_tips(&self, repository: &str, variant: Option<&str>) -> Result<String> {
        let _flight = self.begin()?;
        let (dataset, _) = self.current("README tips").await?;

        let repo = dataset
            .repository(repository)
            .ok_or_else(|| Error::NotFound(format!("repository {} is not in the dataset", repository)))?;
        let variant = self.variant_or_default(variant)?;

        self.until_closed(self.deps.analyzer.readme_tips(repository, &repo.metadata.readme, &variant))
            .await
    }

    pub async fn persona(&self) -> Result<PersonaTitle> {
        let _flight = self.begin()?;
        let (dataset, generation) = self.current("persona").await?;

        let stats = analysis::developer_stats(&dataset);
        let variant = self.deps.analyzer.default_variant().to_string();
        let (title, model_generated) = self
            .until_closed(async { Ok(self.deps.analyzer.persona_title(&stats, &variant).await) })
            .await?;

        let persona = PersonaTitle {
            title,
            model_generated,
        };
        self.store_derived(|cache| cache.set_persona(generation, persona.clone())).await;
        Ok(persona)
    }

    /// Sentiment of the newest commit across all repositories.
    pub async fn latest_commit_sentiment(&self) -> Result<CommitSentiment> {
        let _flight = self.begin()?;
        let (dataset, _) = self.current("commit sentiment").await?;

        let newest = dataset
            .all_commits()
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then(b.sha.cmp(&a.sha)))
            .ok_or(Error::InsufficientData {
                what: "commit sentiment",
                needed: 1,
                found: 0,
            })?;

        let variant = self.deps.analyzer.default_variant().to_string();
        let (sentiment, verified) = self
            .until_closed(self.deps.analyzer.sentiment_of(&newest.message, &variant))
            .await?;

        Ok(CommitSentiment {
            repository: newest.repository.clone(),
            sha: newest.sha.clone(),
            headline: newest.headline().to_string(),
            variant,
            sentiment,
            verified,
        })
    }

    /// Read-only summary of the current dataset; never blocks on a running action.
    pub async fn overview(&self) -> Result<DashboardOverview> {
        let (dataset, _) = self.current("overview").await?;
        Ok(DashboardOverview {
            stats: analysis::overview_stats(&dataset),
            repositories: analysis::repository_insights(&dataset),
            developer: analysis::developer_stats(&dataset),
            timeline: analysis::timeline(&dataset),
        })
    }

    fn begin(&self) -> Result<MutexGuard<'_, ()>> {
        if self.is_closed() {
            return Err(Error::Cancelled);
        }
        self.flight.try_lock().map_err(|_| Error::Busy)
    }

    async fn current(&self, what: &'static str) -> Result<(Arc<Dataset>, u64)> {
        let cache = self.cache.read().await;
        match cache.dataset() {
            Some(dataset) => Ok((dataset, cache.generation())),
            None => Err(Error::InsufficientData {
                what,
                needed: 1,
                found: 0,
            }),
        }
    }

    fn variant_or_default(&self, variant: Option<&str>) -> Result<String> {
        let analyzer = &self.deps.analyzer;
        match variant {
            Some(v) if analyzer.variants().iter().any(|known| known == v) => Ok(v.to_string()),
            Some(v) => Err(Error::InvalidArgument(format!("unknown model variant: {}", v))),
            None => Ok(analyzer.default_variant().to_string()),
        }
    }

    async fn install(&self, dataset: Dataset) {
        let repos = dataset.repositories.len();
        let warnings = dataset.warnings.len();
        let generation = self.cache.write().await.replace_dataset(dataset);
        self.notify();
        tracing::info!(
            "Session {} now holds {} repositories ({} warning(s)), generation {}",
            self.id,
            repos,
            warnings,
            generation
        );
    }

    async fn store_derived<F>(&self, apply: F)
    where
        F: FnOnce(&mut SessionCache) -> bool,
    {
        let stored = apply(&mut *self.cache.write().await);
        if stored {
            self.notify();
        }
    }

    async fn fail(&self, error: Error) -> Error {
        if !matches!(error, Error::Cancelled) {
            self.cache.write().await.record_failure(error.to_string());
            self.notify();
        }
        tracing::warn!("Session {} action failed: {}", self.id, error);
        error
    }

    fn notify(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    async fn until_closed<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow_and_update() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            result = work => result,
            _ = shutdown.wait_for(|closed| *closed) => Err(Error::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::llm::{GenerateRequest, LLMProvider};
    use crate::models::{CommitHistory, CommitRecord, RepositoryData, RepositoryRecord, Sentiment};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    struct GatedSource {
        calls: AtomicUsize,
        started: Notify,
        release: Notify,
        gated: bool,
    }

    impl GatedSource {
        fn new(gated: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                started: Notify::new(),
                release: Notify::new(),
                gated,
            }
        }
    }

    #[async_trait]
    impl RepositorySource for GatedSource {
        async fn fetch_dataset(&self, username: &str) -> Result<Dataset> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            if self.gated {
                self.release.notified().await;
            }
            let ids: Vec<String> = if call == 0 {
                (0..4).map(|i| format!("{}/first-{}", username, i)).collect()
            } else {
                vec![format!("{}/second", username)]
            };
            Ok(sample_dataset(username, &ids))
        }
    }

    struct EchoProvider;

    #[async_trait]
    impl LLMProvider for EchoProvider {
        async fn generate(&self, _request: GenerateRequest) -> Result<String> {
            Ok(r#"{"sentiment":"positive","skills":["rust"],"quality_commentary":"fine"}"#.to_string())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn sample_dataset(username: &str, ids: &[String]) -> Dataset {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let repositories = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let commits = (0..30)
                    .map(|day| CommitRecord {
                        repository: id.clone(),
                        sha: format!("{}-{}", i, day),
                        author: username.to_string(),
                        timestamp: start + ChronoDuration::days(day),
                        message: format!("change {}", day),
                    })
                    .collect();
                RepositoryData {
                    metadata: RepositoryRecord {
                        id: id.clone(),
                        name: id.split('/').nth(1).unwrap_or(id).to_string(),
                        description: None,
                        stars: (i * 10) as u32,
                        forks: i as u32,
                        size: Some(100 + i as u64 * 100),
                        language: Some("Rust".to_string()),
                        created_at: start,
                        updated_at: start,
                        readme: format!("# {}", id),
                    },
                    commits: CommitHistory::available(commits),
                    root_files: vec!["README.md".to_string()],
                }
            })
            .collect();
        Dataset::new(username, None, repositories, vec![])
    }

    fn session(source: Arc<GatedSource>, dir: &TempDir) -> Arc<Session> {
        let analyzer = LlmAnalyzer::new(
            Arc::new(EchoProvider),
            AnalyzerConfig {
                variants: vec!["llama3.1".to_string(), "mistral".to_string()],
                timeout: Duration::from_secs(5),
                concurrency_limit: 2,
                max_commit_messages: 5,
                max_readme_chars: 500,
                show_progress: false,
            },
        );
        Arc::new(Session::new(
            "octocat",
            SessionDeps {
                source,
                analyzer: Arc::new(analyzer),
                store: DatasetStore::new(dir.path()),
                cluster: ClusterConfig {
                    k: 2,
                    max_iterations: 50,
                    seed: 42,
                },
                forecast: ForecastConfig {
                    horizon_days: 7,
                    season_length: 7,
                    interval_z: 1.2816,
                },
            },
        ))
    }

    #[tokio::test]
    async fn test_second_fetch_while_in_flight_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(GatedSource::new(true));
        let session = session(source.clone(), &dir);

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.fetch().await }
        });
        source.started.notified().await;

        assert!(matches!(session.fetch().await, Err(Error::Busy)));
        assert!(matches!(session.cluster(None).await, Err(Error::Busy)));

        source.release.notify_one();
        first.await.unwrap().unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        let (view, version) = session.view().await;
        assert!(matches!(view, ViewState::Ready { .. }));
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn test_refresh_discards_previous_derived_results() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(Arc::new(GatedSource::new(false)), &dir);

        session.fetch().await.unwrap();
        session.cluster(Some(2)).await.unwrap();
        session.forecast(None).await.unwrap();
        session.analyze(None).await.unwrap();

        session.fetch().await.unwrap();
        let (view, _) = session.view().await;
        match view {
            ViewState::Ready { snapshot } => {
                assert_eq!(snapshot.repositories.len(), 1);
                assert_eq!(snapshot.repositories[0].id, "octocat/second");
                assert!(snapshot.clusters.is_none());
                assert!(snapshot.forecast.is_none());
                assert!(snapshot.analysis.is_none());
                assert_eq!(snapshot.generation, 2);
            }
            other => panic!("unexpected view: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_actions_need_a_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(Arc::new(GatedSource::new(false)), &dir);
        assert!(matches!(
            session.cluster(None).await,
            Err(Error::InsufficientData { .. })
        ));
        assert!(matches!(session.view().await.0, ViewState::NoData));
    }

    #[tokio::test]
    async fn test_clustering_more_groups_than_repositories_fails() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(Arc::new(GatedSource::new(false)), &dir);
        session.fetch().await.unwrap();

        assert!(matches!(
            session.cluster(Some(9)).await,
            Err(Error::InsufficientData { needed: 9, found: 4, .. })
        ));
        let (view, _) = session.view().await;
        match view {
            ViewState::Ready { snapshot } => assert!(snapshot.clusters.is_none()),
            other => panic!("unexpected view: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_analysis_covers_every_variant() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(Arc::new(GatedSource::new(false)), &dir);
        session.fetch().await.unwrap();

        let report = session.analyze(None).await.unwrap();
        assert_eq!(report.records.len(), 8);
        assert_eq!(report.for_variant("mistral").count(), 4);

        assert!(matches!(
            session.analyze(Some(vec!["gpt-9".to_string()])).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_persists_and_load_cached_restores() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(GatedSource::new(false));
        session(source.clone(), &dir).fetch().await.unwrap();

        let fresh = session(source.clone(), &dir);
        fresh.load_cached().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let overview = fresh.overview().await.unwrap();
        assert_eq!(overview.stats.total_repos, 4);
        assert_eq!(overview.stats.total_commits_tracked, 120);
    }

    #[tokio::test]
    async fn test_load_cached_without_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(Arc::new(GatedSource::new(false)), &dir);
        assert!(matches!(session.load_cached().await, Err(Error::NotFound(_))));
        assert!(matches!(session.view().await.0, ViewState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_close_cancels_in_flight_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(GatedSource::new(true));
        let session = session(source.clone(), &dir);

        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.fetch().await }
        });
        source.started.notified().await;
        session.close();

        assert!(matches!(pending.await.unwrap(), Err(Error::Cancelled)));
        assert!(matches!(session.fetch().await, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_version_waiter_wakes_on_change_and_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(Arc::new(GatedSource::new(false)), &dir);

        let waiter = tokio::spawn({
            let session = session.clone();
            async move { session.wait_for_version(0).await }
        });
        session.fetch().await.unwrap();
        assert_eq!(waiter.await.unwrap().unwrap(), 1);

        let idle = tokio::spawn({
            let session = session.clone();
            async move { session.wait_for_version(1).await }
        });
        session.close();
        let woke = tokio::time::timeout(Duration::from_secs(2), idle).await.unwrap();
        assert!(matches!(woke.unwrap(), Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_latest_commit_sentiment_and_persona() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(Arc::new(GatedSource::new(false)), &dir);
        session.fetch().await.unwrap();

        let sentiment = session.latest_commit_sentiment().await.unwrap();
        assert_eq!(sentiment.sentiment, Sentiment::Positive);
        assert_eq!(sentiment.headline, "change 29");

        let persona = session.persona().await.unwrap();
        assert!(!persona.title.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_repository_for_readme_tips() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(Arc::new(GatedSource::new(false)), &dir);
        session.fetch().await.unwrap();

        assert!(matches!(
            session.readme_tips("octocat/missing", None).await,
            Err(Error::NotFound(_))
        ));
        let tips = session.readme_tips("octocat/first-0", Some("mistral")).await.unwrap();
        assert!(!tips.is_empty());
    }
}
