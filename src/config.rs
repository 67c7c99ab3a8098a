//! Configuration file loading and validation.
//!
//! The YAML file is read into a [`ConfigFile`], then validated into an
//! immutable [`Configuration`]. Validation compiles every rule pattern, so
//! nothing downstream has to deal with a bad regex.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    rule::{Rule, RuleSpec},
    types::PullRequest,
};

const CONFIG_DIR_NAME: &str = "prbar";
const CONFIG_FILE_NAME: &str = "config.yml";

const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RESULTS_PER_QUERY: usize = 100;
const MAX_RESULTS_PER_QUERY_LIMIT: usize = 1000;

fn default_refresh_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

fn default_query_timeout() -> u64 {
    DEFAULT_QUERY_TIMEOUT_SECS
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS_PER_QUERY
}

/// Configuration exactly as written in the YAML file.
///
/// Also doubles as a builder for [`Configuration`] in code and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,

    /// Seconds between refresh cycles.
    #[serde(default = "default_refresh_interval")]
    pub github_refresh_interval: u64,

    #[serde(default)]
    pub show_drafts: bool,

    #[serde(default)]
    pub render_hidden_prs: bool,

    /// Upper bound, in seconds, for a single search query.
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,

    #[serde(default = "default_max_results")]
    pub max_results_per_query: usize,

    /// Category name to the ordered queries run for it.
    #[serde(default)]
    pub query_groups: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub ignore_prs: Vec<RuleSpec>,

    #[serde(default)]
    pub hide_prs: Vec<RuleSpec>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            github_token: None,
            github_refresh_interval: default_refresh_interval(),
            show_drafts: false,
            render_hidden_prs: false,
            query_timeout: default_query_timeout(),
            max_results_per_query: default_max_results(),
            query_groups: BTreeMap::new(),
            ignore_prs: Vec::new(),
            hide_prs: Vec::new(),
        }
    }
}

impl ConfigFile {
    pub fn category<I, S>(mut self, name: impl Into<String>, queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query_groups
            .insert(name.into(), queries.into_iter().map(Into::into).collect());
        self
    }

    pub fn ignore(mut self, rule: RuleSpec) -> Self {
        self.ignore_prs.push(rule);
        self
    }

    pub fn hide(mut self, rule: RuleSpec) -> Self {
        self.hide_prs.push(rule);
        self
    }

    pub fn show_drafts(mut self, show: bool) -> Self {
        self.show_drafts = show;
        self
    }

    pub fn render_hidden(mut self, render: bool) -> Self {
        self.render_hidden_prs = render;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout.as_secs();
        self
    }

    /// Checks every field and compiles all rule patterns.
    pub fn validate(self) -> Result<Configuration> {
        if self.github_refresh_interval == 0 {
            anyhow::bail!("github_refresh_interval must be greater than zero");
        }
        if self.query_timeout == 0 {
            anyhow::bail!("query_timeout must be greater than zero");
        }
        if !(1..=MAX_RESULTS_PER_QUERY_LIMIT).contains(&self.max_results_per_query) {
            anyhow::bail!(
                "max_results_per_query must be between 1 and {}, got {}",
                MAX_RESULTS_PER_QUERY_LIMIT,
                self.max_results_per_query
            );
        }

        for (category, queries) in &self.query_groups {
            if category.trim().is_empty() {
                anyhow::bail!("query_groups contains a blank category name");
            }
            if let Some(index) = queries.iter().position(|q| q.trim().is_empty()) {
                anyhow::bail!("query_groups.{}[{}] is a blank query", category, index);
            }
        }

        let ignore_rules = self
            .ignore_prs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| {
                if spec.category.is_some() {
                    anyhow::bail!(
                        "ignore_prs[{}]: ignore rules apply to every category and cannot set 'category'",
                        index
                    );
                }
                Rule::compile(spec).with_context(|| format!("ignore_prs[{}]", index))
            })
            .collect::<Result<Vec<_>>>()?;

        let hide_rules = self
            .hide_prs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| Rule::compile(spec).with_context(|| format!("hide_prs[{}]", index)))
            .collect::<Result<Vec<_>>>()?;

        let github_token = self.github_token.filter(|t| !t.trim().is_empty());

        Ok(Configuration {
            github_token,
            refresh_interval: Duration::from_secs(self.github_refresh_interval),
            show_drafts: self.show_drafts,
            render_hidden: self.render_hidden_prs,
            query_timeout: Duration::from_secs(self.query_timeout),
            max_results_per_query: self.max_results_per_query,
            query_groups: self.query_groups,
            ignore_rules,
            hide_rules,
        })
    }
}

/// Validated configuration for one or more refresh cycles.
#[derive(Debug, Clone)]
pub struct Configuration {
    github_token: Option<String>,
    refresh_interval: Duration,
    show_drafts: bool,
    render_hidden: bool,
    query_timeout: Duration,
    max_results_per_query: usize,
    query_groups: BTreeMap<String, Vec<String>>,
    ignore_rules: Vec<Rule>,
    hide_rules: Vec<Rule>,
}

impl Configuration {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: ConfigFile =
            serde_yml::from_str(content).context("Failed to parse configuration YAML")?;
        file.validate()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid configuration file {}", path.display()))?;
        debug!(
            path = %path.display(),
            categories = config.query_groups.len(),
            queries = config.query_count(),
            ignore_rules = config.ignore_rules.len(),
            hide_rules = config.hide_rules.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn query_groups(&self) -> &BTreeMap<String, Vec<String>> {
        &self.query_groups
    }

    pub fn query_count(&self) -> usize {
        self.query_groups.values().map(Vec::len).sum()
    }

    pub fn ignore_rules(&self) -> &[Rule] {
        &self.ignore_rules
    }

    pub fn hide_rules(&self) -> &[Rule] {
        &self.hide_rules
    }

    pub fn show_drafts(&self) -> bool {
        self.show_drafts
    }

    pub fn render_hidden(&self) -> bool {
        self.render_hidden
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub fn max_results_per_query(&self) -> usize {
        self.max_results_per_query
    }

    pub fn github_token(&self) -> Option<&str> {
        self.github_token.as_deref()
    }

    /// True when any ignore rule matches the pull request.
    pub fn is_ignored(&self, pr: &PullRequest) -> bool {
        self.ignore_rules.iter().any(|rule| rule.matches(pr))
    }

    /// True when any hide rule matches the pull request in `category`.
    pub fn is_hidden(&self, pr: &PullRequest, category: &str) -> bool {
        self.hide_rules
            .iter()
            .any(|rule| rule.matches_with_category(pr, category))
    }

    pub fn with_show_drafts(mut self, show: bool) -> Self {
        self.show_drafts = show;
        self
    }

    pub fn with_render_hidden(mut self, render: bool) -> Self {
        self.render_hidden = render;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.refresh_interval = interval;
        }
        self
    }
}

/// Locations searched for the configuration file, in order.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        paths.push(dir.join(CONFIG_FILE_NAME));
    }
    paths
}

/// Picks the configuration file to load: the explicit path if given,
/// otherwise the first of `candidates` that exists.
pub fn resolve_config_path(explicit: Option<&Path>, candidates: &[PathBuf]) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .with_context(|| {
            let searched: Vec<String> = candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            format!(
                "No configuration file found (searched: {})",
                searched.join(", ")
            )
        })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::Repo;

    const FULL_CONFIG: &str = r#"
github_token: "secret"
github_refresh_interval: 120
show_drafts: true
render_hidden_prs: true
query_timeout: 10
max_results_per_query: 50
query_groups:
  mine:
    - "is:pr is:open author:@me archived:false"
  review:
    - "is:pr is:open review-requested:@me archived:false"
    - "is:pr is:open team-review-requested:@me"
ignore_prs:
  - repository: "^acme/legacy-"
hide_prs:
  - category: "review"
    author: "dependabot"
"#;

    fn pr(repo: &str, author: &str) -> PullRequest {
        PullRequest {
            number: 7,
            title: "bump".to_string(),
            url: format!("https://github.com/{}/pull/7", repo),
            repository: Repo::parse(repo).unwrap(),
            author: author.to_string(),
            draft: false,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_config_deserialize_full() {
        let config = Configuration::from_yaml_str(FULL_CONFIG).unwrap();
        assert_eq!(config.github_token(), Some("secret"));
        assert_eq!(config.refresh_interval(), Duration::from_secs(120));
        assert!(config.show_drafts());
        assert!(config.render_hidden());
        assert_eq!(config.query_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_results_per_query(), 50);
        assert_eq!(config.query_groups().len(), 2);
        assert_eq!(config.query_count(), 3);
        assert_eq!(config.ignore_rules().len(), 1);
        assert_eq!(config.hide_rules().len(), 1);
    }

    #[test]
    fn test_config_defaults() {
        let config = Configuration::from_yaml_str("query_groups: {}\n").unwrap();
        assert_eq!(config.github_token(), None);
        assert_eq!(
            config.refresh_interval(),
            Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS)
        );
        assert!(!config.show_drafts());
        assert!(!config.render_hidden());
        assert_eq!(
            config.query_timeout(),
            Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS)
        );
        assert_eq!(config.query_count(), 0);
    }

    #[test]
    fn test_blank_token_is_none() {
        let config = Configuration::from_yaml_str("github_token: \"  \"\n").unwrap();
        assert_eq!(config.github_token(), None);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Configuration::from_yaml_str("query_group: {}\n").unwrap_err();
        assert!(format!("{:#}", err).contains("query_group"));
    }

    #[test]
    fn test_invalid_regex_rejected_at_load() {
        let yaml = "hide_prs:\n  - title: \"(wip\"\n";
        let err = Configuration::from_yaml_str(yaml).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("hide_prs[0]"), "{}", message);
        assert!(message.contains("invalid title pattern"), "{}", message);
    }

    #[test]
    fn test_ignore_rule_with_category_rejected() {
        let err = ConfigFile::default()
            .ignore(RuleSpec::new().category("mine").title("x"))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("cannot set 'category'"));
    }

    #[test]
    fn test_blank_category_and_query_rejected() {
        assert!(
            ConfigFile::default()
                .category(" ", ["is:pr"])
                .validate()
                .is_err()
        );
        let err = ConfigFile::default()
            .category("mine", ["is:pr", ""])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("query_groups.mine[1]"));
    }

    #[test]
    fn test_zero_durations_rejected() {
        let file = ConfigFile {
            github_refresh_interval: 0,
            ..ConfigFile::default()
        };
        assert!(file.validate().is_err());
        let file = ConfigFile {
            query_timeout: 0,
            ..ConfigFile::default()
        };
        assert!(file.validate().is_err());
        let file = ConfigFile {
            max_results_per_query: 0,
            ..ConfigFile::default()
        };
        assert!(file.validate().is_err());
    }

    #[test]
    fn test_is_ignored_and_is_hidden() {
        let config = Configuration::from_yaml_str(FULL_CONFIG).unwrap();
        assert!(config.is_ignored(&pr("acme/legacy-api", "alice")));
        assert!(!config.is_ignored(&pr("acme/api", "alice")));

        let bot = pr("acme/api", "dependabot[bot]");
        assert!(config.is_hidden(&bot, "review"));
        assert!(!config.is_hidden(&bot, "mine"));
        assert!(!config.is_hidden(&pr("acme/api", "alice"), "review"));
    }

    #[test]
    fn test_overrides() {
        let config = ConfigFile::default()
            .validate()
            .unwrap()
            .with_show_drafts(true)
            .with_render_hidden(true)
            .with_refresh_interval(Duration::from_secs(5));
        assert!(config.show_drafts());
        assert!(config.render_hidden());
        assert_eq!(config.refresh_interval(), Duration::from_secs(5));

        let unchanged = config.with_refresh_interval(Duration::ZERO);
        assert_eq!(unchanged.refresh_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("prbar-config-{}.yml", std::process::id()));
        std::fs::write(&path, FULL_CONFIG).unwrap();
        let config = Configuration::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.query_count(), 3);
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let path = Path::new("/nonexistent/prbar/config.yml");
        let err = Configuration::load(path).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/prbar/config.yml"));
    }

    #[test]
    fn test_resolve_config_path() {
        let explicit = Path::new("/tmp/explicit.yml");
        assert_eq!(
            resolve_config_path(Some(explicit), &[]).unwrap(),
            explicit.to_path_buf()
        );

        let missing = PathBuf::from("/nonexistent/a.yml");
        let err = resolve_config_path(None, std::slice::from_ref(&missing)).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/a.yml"));
    }
}
