use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use tracing::debug;

use crate::{
    config::Configuration,
    graphql::{GraphQLResponse, convert_search_nodes, create_search_query},
    types::{Forge, PullRequest},
};

// Stops runaway pagination when pages keep coming back without pull requests.
const MAX_PAGES: usize = 20;

/// Resolves the GitHub token: the configured one first, then the
/// environment, then the `gh` CLI.
pub async fn get_github_token(configured: Option<&str>) -> Result<String> {
    if let Some(token) = configured.filter(|t| !t.trim().is_empty()) {
        return Ok(token.to_string());
    }

    // Prefer environment variables over gh CLI to avoid subprocess overhead.
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var) {
            if !token.trim().is_empty() {
                return Ok(token);
            }
        }
    }

    let output = tokio::process::Command::new("gh")
        .args(["auth", "token"])
        .output()
        .await
        .context("Failed to run 'gh auth token'")?;

    if !output.status.success() {
        anyhow::bail!("Failed to get GitHub token from gh CLI. Please run 'gh auth login' first");
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();

    if token.is_empty() {
        anyhow::bail!("Empty token returned from gh CLI");
    }

    Ok(token)
}

/// Search backend for github.com, using the GraphQL search API.
pub struct GitHub {
    client: Octocrab,
    max_results: usize,
}

impl GitHub {
    pub fn new(client: Octocrab, max_results: usize) -> Self {
        Self {
            client,
            max_results: max_results.max(1),
        }
    }

    /// Creates an authenticated client from the configuration.
    pub async fn connect(config: &Configuration) -> Result<Self> {
        let token = get_github_token(config.github_token())
            .await
            .context("Failed to obtain GitHub authentication token")?;
        let client = Octocrab::builder()
            .personal_token(token)
            .build()
            .context("Failed to create GitHub client")?;
        Ok(Self::new(client, config.max_results_per_query()))
    }

    async fn search_pages(&self, query: &str) -> Result<Vec<PullRequest>> {
        let mut prs = Vec::new();
        let mut after_cursor: Option<String> = None;
        let mut page_count = 0;

        while prs.len() < self.max_results {
            page_count += 1;
            let remaining = self.max_results - prs.len();
            let request = create_search_query(query, remaining, after_cursor.as_deref());

            let response: GraphQLResponse = self
                .client
                .graphql(&request)
                .await
                .with_context(|| format!("GitHub search request failed for '{}'", query))?;
            let results = response.into_results()?;

            let page = convert_search_nodes(results.nodes)?;
            prs.extend(page.into_iter().take(remaining));

            if !results.page_info.has_next_page {
                break;
            }
            after_cursor = results.page_info.end_cursor;
            if after_cursor.is_none() || page_count >= MAX_PAGES {
                break;
            }
        }

        debug!(query = %query, pages = page_count, results = prs.len(), "Searched GitHub");
        Ok(prs)
    }
}

#[async_trait]
impl Forge for GitHub {
    async fn search_pull_requests(
        &self,
        query: &str,
        timeout: Duration,
    ) -> Result<Vec<PullRequest>> {
        tokio::time::timeout(timeout, self.search_pages(query))
            .await
            .map_err(|_| anyhow::anyhow!("GitHub search timed out after {:?}", timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_configured_token_wins() {
        let token = get_github_token(Some("from-config")).await.unwrap();
        assert_eq!(token, "from-config");
    }

    #[tokio::test]
    async fn test_max_results_at_least_one() {
        let client = Octocrab::builder().build().unwrap();
        assert_eq!(GitHub::new(client, 0).max_results, 1);
    }
}
