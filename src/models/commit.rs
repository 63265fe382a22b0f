use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of `GET /repos/{owner}/{repo}/commits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    pub commit: CommitDetails,
    pub author: Option<CommitAuthorInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDetails {
    pub message: String,
    pub author: CommitAuthor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitAuthorInfo {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub repository: String,
    pub sha: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl CommitRecord {
    pub fn from_api(repository: &str, summary: CommitSummary) -> Self {
        // Prefer the GitHub login; fall back to the git author name.
        let author = summary
            .author
            .map(|a| a.login)
            .unwrap_or(summary.commit.author.name);

        Self {
            repository: repository.to_string(),
            sha: summary.sha,
            author,
            timestamp: summary.commit.author.date,
            message: summary.commit.message,
        }
    }

    pub fn headline(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// Commit list of one repository. A failed fetch is kept distinct from an
/// empty history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommitHistory {
    Available(Vec<CommitRecord>),
    Unavailable { unavailable: String },
}

impl CommitHistory {
    /// Sorts newest first and drops duplicate hashes.
    pub fn available(mut commits: Vec<CommitRecord>) -> Self {
        commits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.sha.cmp(&b.sha)));
        let mut seen = std::collections::HashSet::new();
        commits.retain(|c| seen.insert(c.sha.clone()));
        CommitHistory::Available(commits)
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        CommitHistory::Unavailable {
            unavailable: reason.into(),
        }
    }

    pub fn commits(&self) -> &[CommitRecord] {
        match self {
            CommitHistory::Available(commits) => commits,
            CommitHistory::Unavailable { .. } => &[],
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, CommitHistory::Available(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn commit(sha: &str, day: u32) -> CommitRecord {
        CommitRecord {
            repository: "octo/demo".to_string(),
            sha: sha.to_string(),
            author: "octocat".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
            message: format!("change {}\n\nbody", sha),
        }
    }

    #[test]
    fn test_available_orders_newest_first_and_dedupes() {
        let history = CommitHistory::available(vec![
            commit("a", 1),
            commit("b", 3),
            commit("a", 1),
            commit("c", 2),
        ]);
        let shas: Vec<_> = history.commits().iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_unavailable_serializes_as_marker_object() {
        let history = CommitHistory::unavailable("HTTP 500");
        let json = serde_json::to_string(&history).unwrap();
        assert_eq!(json, r#"{"unavailable":"HTTP 500"}"#);

        let back: CommitHistory = serde_json::from_str(&json).unwrap();
        assert!(!back.is_available());
        assert!(back.commits().is_empty());
    }

    #[test]
    fn test_headline_is_first_line() {
        assert_eq!(commit("x", 4).headline(), "change x");
    }
}
