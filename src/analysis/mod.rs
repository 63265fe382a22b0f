pub mod clustering;
pub mod forecast;
pub mod insights;

pub use clustering::RepositoryClusterer;
pub use forecast::{daily_counts, ActivityForecaster};
pub use insights::{developer_stats, health_score, overview_stats, repository_insights, timeline};
