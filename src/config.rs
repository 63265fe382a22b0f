use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_MODEL_ENDPOINT: &str = "http://localhost:11434";
/// Longest forecast a request or the config may ask for.
pub const MAX_FORECAST_HORIZON_DAYS: u32 = 365;

#[derive(Debug, Clone)]
pub struct Config {
    pub github_username: Option<String>,
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub model_endpoint: String,
    pub model_variants: Vec<String>,
    pub forecast_horizon_days: u32,
    pub season_length_days: usize,
    pub cluster_count: usize,
    pub max_commits_per_repo: u32,
    pub concurrency_limit: usize,
    pub http_timeout: Duration,
    pub model_timeout: Duration,
    pub data_dir: PathBuf,
    pub bind_addr: String,
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_username: None,
            github_token: None,
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            model_endpoint: DEFAULT_MODEL_ENDPOINT.to_string(),
            model_variants: vec!["llama3.1".to_string(), "mistral".to_string()],
            forecast_horizon_days: 30,
            season_length_days: 7,
            cluster_count: 3,
            max_commits_per_repo: 300,
            concurrency_limit: 5,
            http_timeout: Duration::from_secs(30),
            model_timeout: Duration::from_secs(120),
            data_dir: PathBuf::from("data"),
            bind_addr: "127.0.0.1:8501".to_string(),
            show_progress: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key/value source; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let model_variants = match non_empty("MODEL_VARIANTS") {
            Some(list) => parse_variants(&list)?,
            None => defaults.model_variants,
        };

        let config = Self {
            github_username: non_empty("GITHUB_USERNAME"),
            github_token: non_empty("GITHUB_TOKEN"),
            github_api_url: non_empty("GITHUB_API_URL").unwrap_or(defaults.github_api_url),
            model_endpoint: non_empty("MODEL_ENDPOINT").unwrap_or(defaults.model_endpoint),
            model_variants,
            forecast_horizon_days: parse_var(&lookup, "FORECAST_HORIZON_DAYS", defaults.forecast_horizon_days)?,
            season_length_days: parse_var(&lookup, "SEASON_LENGTH_DAYS", defaults.season_length_days)?,
            cluster_count: parse_var(&lookup, "CLUSTER_COUNT", defaults.cluster_count)?,
            max_commits_per_repo: parse_var(&lookup, "MAX_COMMITS_PER_REPO", defaults.max_commits_per_repo)?,
            concurrency_limit: parse_var(&lookup, "CONCURRENCY_LIMIT", defaults.concurrency_limit)?,
            http_timeout: Duration::from_secs(parse_var(&lookup, "HTTP_TIMEOUT_SECS", 30u64)?),
            model_timeout: Duration::from_secs(parse_var(&lookup, "MODEL_TIMEOUT_SECS", 120u64)?),
            data_dir: non_empty("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            bind_addr: non_empty("BIND_ADDR").unwrap_or(defaults.bind_addr),
            show_progress: non_empty("SHOW_PROGRESS")
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(defaults.show_progress),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_variants.is_empty() {
            return Err(Error::Config("at least one model variant is required".to_string()));
        }
        if self.concurrency_limit == 0 {
            return Err(Error::Config("CONCURRENCY_LIMIT must be at least 1".to_string()));
        }
        if self.season_length_days < 2 {
            return Err(Error::Config("SEASON_LENGTH_DAYS must be at least 2".to_string()));
        }
        if self.forecast_horizon_days == 0 {
            return Err(Error::Config("FORECAST_HORIZON_DAYS must be at least 1".to_string()));
        }
        if self.forecast_horizon_days > MAX_FORECAST_HORIZON_DAYS {
            return Err(Error::Config(format!(
                "FORECAST_HORIZON_DAYS must be at most {}",
                MAX_FORECAST_HORIZON_DAYS
            )));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}

fn parse_variants(list: &str) -> Result<Vec<String>> {
    let mut variants: Vec<String> = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !variants.iter().any(|v| v == name) {
            variants.push(name.to_string());
        }
    }
    if variants.is_empty() {
        return Err(Error::Config("MODEL_VARIANTS lists no model names".to_string()));
    }
    Ok(variants)
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub api_url: String,
    pub per_page: u32,
    pub max_commits_per_repo: u32,
    pub concurrency_limit: usize,
    pub timeout: Duration,
    pub show_progress: bool,
}

impl From<&Config> for FetchConfig {
    fn from(config: &Config) -> Self {
        Self {
            api_url: config.github_api_url.clone(),
            per_page: 100,
            max_commits_per_repo: config.max_commits_per_repo,
            concurrency_limit: config.concurrency_limit,
            timeout: config.http_timeout,
            show_progress: config.show_progress,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub variants: Vec<String>,
    pub timeout: Duration,
    pub concurrency_limit: usize,
    pub max_commit_messages: usize,
    pub max_readme_chars: usize,
    pub show_progress: bool,
}

impl From<&Config> for AnalyzerConfig {
    fn from(config: &Config) -> Self {
        Self {
            variants: config.model_variants.clone(),
            timeout: config.model_timeout,
            concurrency_limit: config.concurrency_limit,
            max_commit_messages: 20,
            max_readme_chars: 6_000,
            show_progress: config.show_progress,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub k: usize,
    pub max_iterations: usize,
    pub seed: u64,
}

impl From<&Config> for ClusterConfig {
    fn from(config: &Config) -> Self {
        Self {
            k: config.cluster_count,
            max_iterations: 100,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub horizon_days: u32,
    pub season_length: usize,
    /// Normal quantile for the interval; 1.2816 gives an 80% band.
    pub interval_z: f64,
}

impl From<&Config> for ForecastConfig {
    fn from(config: &Config) -> Self {
        Self {
            horizon_days: config.forecast_horizon_days,
            season_length: config.season_length_days,
            interval_z: 1.2816,
        }
    }
}
