pub mod client;
pub mod rate_limit;
pub mod paginator;
pub mod fetcher;

pub use client::GitHubClient;
pub use rate_limit::{RateLimitSnapshot, RateLimitTracker};
pub use paginator::Paginator;
pub use fetcher::{GitHubFetcher, RepositorySource};
