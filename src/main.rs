use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use gitdash::config::{AnalyzerConfig, ClusterConfig, FetchConfig, ForecastConfig};
use gitdash::dashboard::{SessionDeps, SessionRegistry};
use gitdash::server::{create_router, ApiState};
use gitdash::{Config, DatasetStore, GitHubFetcher, LlmAnalyzer, OllamaProvider};

#[derive(Parser, Debug)]
#[command(name = "gitdash")]
#[command(version = "0.1.0")]
#[command(about = "Serve a GitHub activity dashboard backed by local language models")]
struct Args {
    /// Default GitHub username for new sessions
    #[arg(short, long, env = "GITHUB_USERNAME")]
    username: Option<String>,

    /// Model endpoint address
    #[arg(long, env = "MODEL_ENDPOINT")]
    model_endpoint: Option<String>,

    /// Model variant to run (repeatable)
    #[arg(long = "model-variant")]
    model_variants: Vec<String>,

    /// Days to forecast
    #[arg(long, env = "FORECAST_HORIZON_DAYS")]
    forecast_horizon: Option<u32>,

    /// Default cluster count
    #[arg(long, env = "CLUSTER_COUNT")]
    clusters: Option<usize>,

    /// Maximum commits to fetch per repository (0 = all)
    #[arg(long, env = "MAX_COMMITS_PER_REPO")]
    max_commits_per_repo: Option<u32>,

    /// Directory for cached datasets
    #[arg(long, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "BIND_ADDR")]
    bind: Option<String>,

    /// Hide terminal progress bars
    #[arg(long)]
    no_progress: bool,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(username) = self.username {
            config.github_username = Some(username);
        }
        if let Some(endpoint) = self.model_endpoint {
            config.model_endpoint = endpoint;
        }
        if !self.model_variants.is_empty() {
            config.model_variants.clear();
            for variant in self.model_variants {
                if !config.model_variants.contains(&variant) {
                    config.model_variants.push(variant);
                }
            }
        }
        if let Some(days) = self.forecast_horizon {
            config.forecast_horizon_days = days;
        }
        if let Some(k) = self.clusters {
            config.cluster_count = k;
        }
        if let Some(max) = self.max_commits_per_repo {
            config.max_commits_per_repo = max;
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if self.no_progress {
            config.show_progress = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("gitdash=info".parse()?)
                .add_directive("reqwest=warn".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    // Load configuration, CLI flags win
    let args = Args::parse();
    let mut config = Config::from_env()?;
    args.apply(&mut config);
    config.validate()?;

    if config.github_token.is_none() {
        tracing::warn!("GITHUB_TOKEN is not set; fetches will be rejected until it is provided");
    }

    // Initialize clients
    let fetcher = GitHubFetcher::new(config.github_token.as_deref(), FetchConfig::from(&config))?;
    let provider = OllamaProvider::new(&config.model_endpoint, config.model_timeout)?;
    let analyzer = LlmAnalyzer::new(Arc::new(provider), AnalyzerConfig::from(&config));
    tracing::info!(
        "Using model server {} with variant(s): {}",
        config.model_endpoint,
        config.model_variants.join(", ")
    );

    let deps = SessionDeps {
        source: Arc::new(fetcher),
        analyzer: Arc::new(analyzer),
        store: DatasetStore::new(&config.data_dir),
        cluster: ClusterConfig::from(&config),
        forecast: ForecastConfig::from(&config),
    };
    let registry = Arc::new(SessionRegistry::new(deps, config.github_username.clone()));

    // Build router
    let app = create_router(ApiState {
        registry: registry.clone(),
    });

    // Start server
    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("gitdash listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    Ok(())
}

async fn shutdown_signal(registry: Arc<SessionRegistry>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
    registry.close_all().await;
}
