use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `GET /users/{username}` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    pub id: u64,
    pub name: Option<String>,
    pub avatar_url: String,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub public_repos: u32,
    pub followers: u32,
    pub following: u32,
    pub created_at: DateTime<Utc>,
}

/// One entry of `GET /users/{username}/repos`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stargazers_count: u32,
    pub forks_count: u32,
    pub size: Option<u64>,
    pub fork: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner: RepositoryOwner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
}

/// One entry of `GET /repos/{owner}/{repo}/contents`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: String,
}

/// Repository metadata as held by a session. Identified by `owner/name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub stars: u32,
    pub forks: u32,
    /// Kilobytes, as reported by GitHub.
    #[serde(default)]
    pub size: Option<u64>,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub readme: String,
}

impl RepositoryRecord {
    pub fn from_api(repo: GitHubRepository) -> Self {
        Self {
            id: repo.full_name,
            name: repo.name,
            description: repo.description,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            size: repo.size,
            language: repo.language,
            created_at: repo.created_at,
            updated_at: repo.updated_at,
            readme: String::new(),
        }
    }

    /// `(stars, forks, size)`, or `None` when a component is missing.
    pub fn feature_vector(&self) -> Option<[f64; 3]> {
        let size = self.size?;
        Some([self.stars as f64, self.forks as f64, size as f64])
    }

    pub fn owner(&self) -> &str {
        self.id.split_once('/').map(|(owner, _)| owner).unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub login: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub public_repos: u32,
    pub followers: u32,
    pub created_at: DateTime<Utc>,
}

impl From<GitHubUser> for UserProfile {
    fn from(user: GitHubUser) -> Self {
        Self {
            login: user.login,
            name: user.name,
            bio: user.bio,
            public_repos: user.public_repos,
            followers: user.followers,
            created_at: user.created_at,
        }
    }
}
