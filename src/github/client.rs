use reqwest::{header, Client, Response, StatusCode};

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::github::paginator::{Collected, Paginator};
use crate::github::rate_limit::{detect_rate_limit, RateLimitSnapshot, RateLimitTracker};
use crate::models::{CommitSummary, ContentEntry, GitHubRepository, GitHubUser};

const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw+json";

pub struct GitHubClient {
    client: Client,
    rate_limits: RateLimitTracker,
    base_url: String,
    per_page: u32,
}

impl GitHubClient {
    pub fn new(token: &str, config: &FetchConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("gitdash/0.1"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::network(&config.api_url, e))?;

        Ok(Self {
            client,
            rate_limits: RateLimitTracker::new(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            per_page: config.per_page.clamp(1, 100),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issues a GET and turns authentication and rate-limit responses into
    /// errors. Any other status is left for the caller to interpret.
    pub async fn get(&self, url: &str, accept: Option<&'static str>) -> Result<Response> {
        let endpoint = self.endpoint_of(url);
        tracing::debug!("GET {}", endpoint);

        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(header::ACCEPT, accept);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::network(endpoint.clone(), e))?;
        self.rate_limits.update_from_headers(response.headers());

        if let Some(err) = detect_rate_limit(response.status(), response.headers(), &endpoint) {
            tracing::warn!("GitHub rate limit reached on {}", endpoint);
            return Err(err);
        }

        // a 403 here is not a rate limit, so the token lacks access
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::AuthenticationFailed(format!(
                "GitHub returned {} for {}",
                status.as_u16(),
                endpoint
            )));
        }

        Ok(response)
    }

    pub async fn get_user(&self, username: &str) -> Result<GitHubUser> {
        let url = self.url(&format!("/users/{}", username));
        tracing::info!("Fetching user: {}", username);

        let response = self.get(&url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("GitHub user {}", username)));
        }

        let response = self.ensure_success(response, &url).await?;
        response.json().await.map_err(|e| Error::network(self.endpoint_of(&url), e))
    }

    pub async fn list_user_repos(&self, username: &str) -> Result<Vec<GitHubRepository>> {
        let url = self.url(&format!("/users/{}/repos?type=owner&sort=full_name", username));
        tracing::info!("Fetching repositories for: {}", username);
        Paginator::new(self).fetch_all(&url, self.per_page).await
    }

    /// Newest commits first; `max_commits == 0` walks the whole history.
    pub async fn list_commits(&self, repository: &str, max_commits: u32) -> Result<Collected<CommitSummary>> {
        let url = self.url(&format!("/repos/{}/commits", repository));
        tracing::debug!("Fetching commits for: {}", repository);

        let paginator = Paginator::new(self);
        if max_commits == 0 {
            Ok(Collected {
                items: paginator.fetch_all(&url, self.per_page).await?,
                truncated: false,
            })
        } else {
            paginator.fetch_limited(&url, self.per_page, max_commits).await
        }
    }

    /// README body as raw text; a repository without one yields `""`.
    pub async fn get_readme(&self, repository: &str) -> Result<String> {
        let url = self.url(&format!("/repos/{}/readme", repository));
        let response = self.get(&url, Some(RAW_MEDIA_TYPE)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("No README in {}", repository);
            return Ok(String::new());
        }

        let response = self.ensure_success(response, &url).await?;
        response.text().await.map_err(|e| Error::network(self.endpoint_of(&url), e))
    }

    /// Top-level entry names; directories carry a trailing `/`.
    pub async fn list_root_files(&self, repository: &str) -> Result<Vec<String>> {
        let url = self.url(&format!("/repos/{}/contents", repository));
        let response = self.get(&url, None).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let response = self.ensure_success(response, &url).await?;
        let entries: Vec<ContentEntry> = response
            .json()
            .await
            .map_err(|e| Error::network(self.endpoint_of(&url), e))?;

        Ok(entries
            .into_iter()
            .map(|e| {
                if e.entry_type == "dir" {
                    format!("{}/", e.name)
                } else {
                    e.name
                }
            })
            .collect())
    }

    pub async fn ensure_success(&self, response: Response, url: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::GitHubApi(format!(
            "{} returned {}: {}",
            self.endpoint_of(url),
            status,
            body.chars().take(200).collect::<String>()
        )))
    }

    pub fn rate_limits(&self) -> RateLimitSnapshot {
        self.rate_limits.snapshot()
    }

    /// Path and query of `url`, used to name the failing endpoint in errors.
    pub fn endpoint_of(&self, url: &str) -> String {
        url.strip_prefix(&self.base_url).unwrap_or(url).to_string()
    }
}
