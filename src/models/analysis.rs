use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    /// Loose match used on model output ("Positive.", "NEGATIVE", "mostly positive").
    pub fn from_label(label: &str) -> Option<Self> {
        let lower = label.trim().to_lowercase();
        if lower.contains("negative") {
            Some(Sentiment::Negative)
        } else if lower.contains("positive") {
            Some(Sentiment::Positive)
        } else if lower.contains("neutral") {
            Some(Sentiment::Neutral)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positive"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Negative => write!(f, "negative"),
        }
    }
}

/// Structured model output for one input. `verified` is false when the
/// fields were filled in by the fallback decoder.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub sentiment: Sentiment,
    pub skills: Vec<String>,
    pub commentary: String,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Completed { result: AnalysisResult },
    Failed { reason: String },
}

impl AnalysisOutcome {
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            AnalysisOutcome::Completed { result } => Some(result),
            AnalysisOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AnalysisOutcome::Failed { .. })
    }
}

/// Result of one (repository, model variant) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub repository: String,
    pub variant: String,
    pub outcome: AnalysisOutcome,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub records: Vec<AnalysisRecord>,
    pub warnings: Vec<String>,
}

impl AnalysisReport {
    pub fn for_variant<'a>(&'a self, variant: &'a str) -> impl Iterator<Item = &'a AnalysisRecord> + 'a {
        self.records.iter().filter(move |r| r.variant == variant)
    }

    pub fn failed_count(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_failed()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMember {
    pub repository: String,
    pub label: usize,
    /// Raw `(stars, forks, size)`.
    pub features: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub k: usize,
    pub members: Vec<ClusterMember>,
    /// Centroids in normalized feature space, indexed by label.
    pub centroids: Vec<[f64; 3]>,
    pub iterations: usize,
}

impl ClusterAssignment {
    pub fn label_of(&self, repository: &str) -> Option<usize> {
        self.members
            .iter()
            .find(|m| m.repository == repository)
            .map(|m| m.label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub commits: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
}

impl ForecastPoint {
    pub fn interval_width(&self) -> f64 {
        self.upper - self.lower
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub history: Vec<DailyCount>,
    pub points: Vec<ForecastPoint>,
    pub season_length: usize,
    /// Commits per day added by the fitted trend.
    pub slope: f64,
    pub repositories: Vec<String>,
}

/// Sentiment of the newest commit message in the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitSentiment {
    pub repository: String,
    pub sha: String,
    pub headline: String,
    pub variant: String,
    pub sentiment: Sentiment,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantResponse {
    pub variant: String,
    pub elapsed_ms: u64,
    pub response: Option<String>,
    pub error: Option<String>,
}
