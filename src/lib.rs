pub mod config;
pub mod error;
pub mod models;
pub mod github;
pub mod llm;
pub mod taxonomy;
pub mod analysis;
pub mod storage;
pub mod dashboard;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
pub use github::{GitHubClient, GitHubFetcher, RepositorySource};
pub use llm::{LLMProvider, LlmAnalyzer, OllamaProvider};
pub use analysis::{ActivityForecaster, RepositoryClusterer};
pub use dashboard::{Session, SessionRegistry};
pub use storage::DatasetStore;
