use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::github::client::GitHubClient;

/// Items gathered by a capped walk, and whether the cap cut the list short.
#[derive(Debug)]
pub struct Collected<T> {
    pub items: Vec<T>,
    pub truncated: bool,
}

/// Walks GitHub's `Link: <...>; rel="next"` cursor until it runs out.
pub struct Paginator<'a> {
    client: &'a GitHubClient,
}

impl<'a> Paginator<'a> {
    pub fn new(client: &'a GitHubClient) -> Self {
        Self { client }
    }

    pub async fn fetch_all<T: DeserializeOwned>(&self, base_url: &str, per_page: u32) -> Result<Vec<T>> {
        Ok(self.fetch(base_url, per_page, None).await?.items)
    }

    pub async fn fetch_limited<T: DeserializeOwned>(
        &self,
        base_url: &str,
        per_page: u32,
        max_items: u32,
    ) -> Result<Collected<T>> {
        self.fetch(base_url, per_page, Some(max_items as usize)).await
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        base_url: &str,
        per_page: u32,
        max_items: Option<usize>,
    ) -> Result<Collected<T>> {
        let mut all_items = Vec::new();
        let mut truncated = false;
        let separator = if base_url.contains('?') { "&" } else { "?" };
        let mut next_url = Some(format!("{}{}per_page={}&page=1", base_url, separator, per_page));
        let mut pages = 0;

        while let Some(url) = next_url.take() {
            let response = self.client.get(&url, None).await?;

            // GitHub answers 409 when listing commits of an empty repository.
            if response.status() == StatusCode::CONFLICT {
                tracing::debug!("{} reported an empty repository", self.client.endpoint_of(&url));
                break;
            }

            let response = self.client.ensure_success(response, &url).await?;
            next_url = response
                .headers()
                .get("link")
                .and_then(|v| v.to_str().ok())
                .and_then(next_link);

            let items: Vec<T> = response
                .json()
                .await
                .map_err(|e| Error::network(self.client.endpoint_of(&url), e))?;
            all_items.extend(items);
            pages += 1;

            if let Some(max) = max_items {
                if all_items.len() >= max {
                    truncated = all_items.len() > max || next_url.is_some();
                    all_items.truncate(max);
                    break;
                }
            }
        }

        tracing::debug!(
            "Collected {} items over {} page(s){}",
            all_items.len(),
            pages,
            if truncated { ", stopped at the cap" } else { "" }
        );
        Ok(Collected {
            items: all_items,
            truncated,
        })
    }
}

/// Extracts the `rel="next"` target from a `Link` header.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| p.trim() == r#"rel="next""#);
        if is_next && target.starts_with('<') && target.ends_with('>') {
            Some(target[1..target.len() - 1].to_string())
        } else {
            None
        }
    })
}
