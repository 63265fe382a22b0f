use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageShare {
    pub language: String,
    pub repositories: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewStats {
    pub total_repos: usize,
    pub total_stars: u64,
    pub total_commits_tracked: usize,
    pub top_languages: Vec<LanguageShare>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthGrade {
    A,
    B,
    C,
}

impl std::fmt::Display for HealthGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthGrade::A => write!(f, "A"),
            HealthGrade::B => write!(f, "B"),
            HealthGrade::C => write!(f, "C"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoHealth {
    pub score: u8,
    pub max_score: u8,
    pub grade: HealthGrade,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryInsight {
    pub repository: String,
    pub health: RepoHealth,
    pub tech_stack: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Chronotype {
    NightOwl,
    EarlyBird,
    DayWalker,
}

impl std::fmt::Display for Chronotype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Chronotype::NightOwl => write!(f, "Night Owl"),
            Chronotype::EarlyBird => write!(f, "Early Bird"),
            Chronotype::DayWalker => write!(f, "Day Walker"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeveloperStats {
    pub total_commits: usize,
    pub longest_streak_days: u32,
    pub top_language: Option<String>,
    pub most_active_month: Option<String>,
    pub chronotype: Chronotype,
    pub commits_by_hour: [u32; 24],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    AccountCreated,
    FirstRepository,
    FirstCommit,
    MostStarred,
    LatestRepository,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub date: NaiveDate,
    pub kind: TimelineKind,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaTitle {
    pub title: String,
    /// False when the deterministic fallback was used.
    pub model_generated: bool,
}

/// Everything the overview page shows, derived from the current dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardOverview {
    pub stats: OverviewStats,
    pub repositories: Vec<RepositoryInsight>,
    pub developer: DeveloperStats,
    pub timeline: Vec<TimelineEvent>,
}
