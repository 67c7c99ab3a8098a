use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::types::{PullRequest, Repo};

/// GitHub caps search pages at 100 nodes.
pub const MAX_PAGE_SIZE: usize = 100;

const SEARCH_QUERY: &str = r#"
    query($query: String!, $first: Int!, $after: String) {
        search(query: $query, type: ISSUE, first: $first, after: $after) {
            nodes {
                ... on PullRequest {
                    number
                    title
                    url
                    isDraft
                    updatedAt
                    author {
                        login
                        __typename
                    }
                    repository {
                        nameWithOwner
                    }
                }
            }
            pageInfo {
                hasNextPage
                endCursor
            }
        }
    }
"#;

pub fn create_search_query(search: &str, first: usize, after: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "query": SEARCH_QUERY,
        "variables": {
            "query": search,
            "first": first.min(MAX_PAGE_SIZE),
            "after": after,
        }
    })
}

/// Categorises GitHub actors so bot logins can be told apart.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorType {
    User,
    Bot,
    App,
    Unknown,
}

impl AuthorType {
    pub fn from_typename(typename: &str) -> Self {
        match typename {
            "User" => AuthorType::User,
            "Bot" => AuthorType::Bot,
            "App" => AuthorType::App,
            _ => AuthorType::Unknown,
        }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self, AuthorType::Bot | AuthorType::App)
    }
}

#[derive(Debug, Deserialize)]
pub struct GraphQLResponse {
    pub data: Option<SearchData>,
    #[serde(default)]
    pub errors: Vec<GraphQLError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchData {
    pub search: SearchResults,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub nodes: Vec<Option<SearchNode>>,
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// A search hit. Issues come back as empty objects because the query only
/// selects fields on `PullRequest`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SearchNode {
    PullRequest(GraphQLPullRequest),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLPullRequest {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub is_draft: bool,
    pub updated_at: DateTime<Utc>,
    pub author: Option<GraphQLAuthor>,
    pub repository: Option<GraphQLRepository>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLAuthor {
    pub login: String,
    #[serde(rename = "__typename")]
    pub typename: String,
}

impl GraphQLAuthor {
    /// Bots are rendered as `login[bot]`, matching the REST API logins.
    pub fn display_format(&self) -> String {
        if AuthorType::from_typename(&self.typename).is_bot() {
            format!("{}[bot]", self.login)
        } else {
            self.login.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRepository {
    pub name_with_owner: String,
}

impl GraphQLResponse {
    /// Returns the search results, or fails with the server's messages.
    pub fn into_results(self) -> Result<SearchResults> {
        if !self.errors.is_empty() {
            let messages: Vec<String> = self.errors.into_iter().map(|e| e.message).collect();
            anyhow::bail!("GitHub GraphQL error: {}", messages.join("; "));
        }
        Ok(self
            .data
            .context("GitHub GraphQL response has no data")?
            .search)
    }
}

/// Deleted accounts have no author; GitHub shows them as "ghost".
const GHOST_AUTHOR: &str = "ghost";

pub fn convert_graphql_pr(graphql_pr: GraphQLPullRequest) -> Result<PullRequest> {
    let repository = match &graphql_pr.repository {
        Some(repo) => Repo::parse(&repo.name_with_owner)
            .with_context(|| format!("Invalid repository for PR {}", graphql_pr.url))?,
        None => Repo::from_pr_url(&graphql_pr.url)?,
    };

    Ok(PullRequest {
        number: graphql_pr.number,
        author: graphql_pr
            .author
            .as_ref()
            .map(GraphQLAuthor::display_format)
            .unwrap_or_else(|| GHOST_AUTHOR.to_string()),
        title: graphql_pr.title,
        url: graphql_pr.url,
        repository,
        draft: graphql_pr.is_draft,
        updated_at: graphql_pr.updated_at,
    })
}

/// Converts one page of search nodes, skipping anything that is not a
/// pull request.
pub fn convert_search_nodes(nodes: Vec<Option<SearchNode>>) -> Result<Vec<PullRequest>> {
    nodes
        .into_iter()
        .flatten()
        .filter_map(|node| match node {
            SearchNode::PullRequest(pr) => Some(convert_graphql_pr(pr)),
            SearchNode::Other(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "data": {
            "search": {
                "nodes": [
                    {
                        "number": 12,
                        "title": "Fix flaky test",
                        "url": "https://github.com/acme/api/pull/12",
                        "isDraft": false,
                        "updatedAt": "2025-01-02T03:04:05Z",
                        "author": { "login": "alice", "__typename": "User" },
                        "repository": { "nameWithOwner": "acme/api" }
                    },
                    {},
                    null,
                    {
                        "number": 13,
                        "title": "Bump serde",
                        "url": "https://github.com/acme/web/pull/13",
                        "isDraft": true,
                        "updatedAt": "2025-01-03T00:00:00Z",
                        "author": { "login": "dependabot", "__typename": "Bot" },
                        "repository": null
                    },
                    {
                        "number": 14,
                        "title": "Orphaned",
                        "url": "https://github.com/acme/web/pull/14",
                        "isDraft": false,
                        "updatedAt": "2025-01-03T00:00:00Z",
                        "author": null,
                        "repository": { "nameWithOwner": "acme/web" }
                    }
                ],
                "pageInfo": { "hasNextPage": true, "endCursor": "Y3Vyc29y" }
            }
        }
    }"#;

    #[test]
    fn test_create_search_query_caps_page_size() {
        let query = create_search_query("is:pr", 500, Some("abc"));
        assert_eq!(query["variables"]["query"], "is:pr");
        assert_eq!(query["variables"]["first"], 100);
        assert_eq!(query["variables"]["after"], "abc");

        let first_page = create_search_query("is:pr", 10, None);
        assert!(first_page["variables"]["after"].is_null());
    }

    #[test]
    fn test_convert_page() {
        let response: GraphQLResponse = serde_json::from_str(PAGE).unwrap();
        let results = response.into_results().unwrap();
        assert!(results.page_info.has_next_page);
        assert_eq!(results.page_info.end_cursor.as_deref(), Some("Y3Vyc29y"));

        let prs = convert_search_nodes(results.nodes).unwrap();
        assert_eq!(prs.len(), 3);

        assert_eq!(prs[0].number, 12);
        assert_eq!(prs[0].repository.as_str(), "acme/api");
        assert_eq!(prs[0].author, "alice");
        assert!(!prs[0].draft);

        assert_eq!(prs[1].author, "dependabot[bot]");
        assert_eq!(prs[1].repository.as_str(), "acme/web");
        assert!(prs[1].draft);

        assert_eq!(prs[2].author, "ghost");
    }

    #[test]
    fn test_graphql_errors_reported() {
        let body = r#"{ "data": null, "errors": [ { "message": "bad query" }, { "message": "rate limited" } ] }"#;
        let response: GraphQLResponse = serde_json::from_str(body).unwrap();
        let err = response.into_results().unwrap_err();
        assert!(err.to_string().contains("bad query; rate limited"));
    }

    #[test]
    fn test_missing_data_reported() {
        let response: GraphQLResponse = serde_json::from_str("{}").unwrap();
        assert!(response.into_results().is_err());
    }

    #[test]
    fn test_author_type() {
        assert!(AuthorType::from_typename("Bot").is_bot());
        assert!(!AuthorType::from_typename("User").is_bot());
        assert_eq!(AuthorType::from_typename("Mannequin"), AuthorType::Unknown);
    }
}
