use std::{
    fmt,
    hash::{Hash, Hasher},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error returned when a repository identifier is not in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    Empty,
    MissingSeparator(String),
    EmptyComponent(String),
    TooManyComponents(String),
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoError::Empty => write!(f, "repository identifier is empty"),
            RepoError::MissingSeparator(s) => {
                write!(f, "repository '{}' must be in format 'owner/name'", s)
            }
            RepoError::EmptyComponent(s) => {
                write!(f, "repository '{}' has an empty owner or name", s)
            }
            RepoError::TooManyComponents(s) => {
                write!(f, "repository '{}' has more than one '/'", s)
            }
        }
    }
}

impl std::error::Error for RepoError {}

/// A repository identifier in `owner/name` form.
///
/// The full name is kept as one string so rule patterns can be matched
/// against it without allocating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Repo {
    full_name: String,
    split: usize,
}

impl Repo {
    pub fn new(owner: &str, name: &str) -> Result<Self, RepoError> {
        Self::parse(&format!("{}/{}", owner, name))
    }

    pub fn parse(s: &str) -> Result<Self, RepoError> {
        let s = s.trim().trim_end_matches('/');
        if s.is_empty() {
            return Err(RepoError::Empty);
        }
        let split = s
            .find('/')
            .ok_or_else(|| RepoError::MissingSeparator(s.to_string()))?;
        let (owner, name) = (&s[..split], &s[split + 1..]);
        if owner.is_empty() || name.is_empty() {
            return Err(RepoError::EmptyComponent(s.to_string()));
        }
        if name.contains('/') {
            return Err(RepoError::TooManyComponents(s.to_string()));
        }
        Ok(Self {
            full_name: s.to_string(),
            split,
        })
    }

    /// Derives the repository from a pull request web URL such as
    /// `https://github.com/owner/name/pull/42`.
    pub fn from_pr_url(pr_url: &str) -> anyhow::Result<Self> {
        let url = url::Url::parse(pr_url)
            .map_err(|e| anyhow::anyhow!("Failed to parse URL '{}': {}", pr_url, e))?;
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        if segments.len() < 2 {
            anyhow::bail!("URL '{}' does not name a repository", pr_url);
        }
        Ok(Self::new(segments[0], segments[1])?)
    }

    pub fn owner(&self) -> &str {
        &self.full_name[..self.split]
    }

    pub fn name(&self) -> &str {
        &self.full_name[self.split + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.full_name
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

impl TryFrom<String> for Repo {
    type Error = RepoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Repo::parse(&value)
    }
}

impl From<Repo> for String {
    fn from(repo: Repo) -> Self {
        repo.full_name
    }
}

/// A pull request as returned by a search.
///
/// Records are never mutated after the forge produces them. Equality and
/// hashing consider only the repository and the number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub repository: Repo,
    pub author: String,
    pub draft: bool,
    pub updated_at: DateTime<Utc>,
}

impl PullRequest {
    pub fn key(&self) -> (&Repo, u64) {
        (&self.repository, self.number)
    }
}

impl PartialEq for PullRequest {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for PullRequest {}

impl Hash for PullRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// A code-review host that can run pull request searches.
///
/// Implementations must return within `timeout`; callers also enforce it.
#[async_trait]
pub trait Forge: Send + Sync {
    async fn search_pull_requests(
        &self,
        query: &str,
        timeout: Duration,
    ) -> anyhow::Result<Vec<PullRequest>>;
}

#[derive(Debug)]
pub enum QueryErrorKind {
    /// The forge reported a failure.
    Search(anyhow::Error),
    /// The deadline elapsed before the forge answered.
    TimedOut(Duration),
    /// The task running the query panicked or was cancelled.
    Aborted(String),
}

/// A single failed query, tagged with where it came from.
#[derive(Debug)]
pub struct QueryError {
    pub category: String,
    pub query: String,
    pub kind: QueryErrorKind,
}

impl QueryError {
    pub fn new(category: impl Into<String>, query: impl Into<String>, kind: QueryErrorKind) -> Self {
        Self {
            category: category.into(),
            query: query.into(),
            kind,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, QueryErrorKind::TimedOut(_))
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error searching PRs matching query '{}' (category '{}'): ",
            self.query, self.category
        )?;
        match &self.kind {
            QueryErrorKind::Search(e) => write!(f, "{:#}", e),
            QueryErrorKind::TimedOut(d) => write!(f, "timed out after {:?}", d),
            QueryErrorKind::Aborted(reason) => write!(f, "task aborted: {}", reason),
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            QueryErrorKind::Search(e) => Some(&**e),
            _ => None,
        }
    }
}
