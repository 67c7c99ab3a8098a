//! prbar: a periodically refreshed menu of the pull requests you care about.
//!
//! Runs the configured search queries against GitHub in parallel, drops
//! pull requests matched by ignore rules, and splits the rest into shown and
//! hidden sets per category using hide rules. Failing queries are reported
//! alongside a best-effort result instead of failing the whole refresh.

pub mod classify;
pub mod cli;
pub mod config;
pub mod github;
pub mod graphql;
pub mod menu;
pub mod query;
pub mod refresh;
pub mod rule;
pub mod types;

pub use classify::classify;
pub use cli::{OutputMode, RunSpec, parse_args};
pub use config::{ConfigFile, Configuration, default_config_paths, resolve_config_path};
pub use github::GitHub;
pub use menu::{PrMenuModel, RepositoryGroups, group_by_repository};
pub use query::{FetchOutcome, fetch_all, fetch_and_classify};
pub use refresh::{Refresher, Snapshot};
pub use rule::{PatternError, Rule, RuleField, RuleSpec};
pub use types::{Forge, PullRequest, QueryError, QueryErrorKind, Repo, RepoError};
