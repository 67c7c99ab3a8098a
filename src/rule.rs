//! Filter rules for ignoring and hiding pull requests.
//!
//! A rule is a set of optional predicates. Patterns are compiled once when
//! the rule is built, so an invalid pattern is reported while loading the
//! configuration and matching itself cannot fail.
//!
//! Both matching entry points share [`Rule::evaluate`]: only the predicates
//! that are present take part, and a rule with none of them present never
//! matches. [`Rule::matches`] considers the content predicates only;
//! [`Rule::matches_with_category`] also considers the category predicate,
//! so a rule naming just a category matches every pull request in a
//! matching category.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::PullRequest;

/// Rule fields that hold a regular expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleField {
    Category,
    Repository,
    Title,
    Author,
}

impl RuleField {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleField::Category => "category",
            RuleField::Repository => "repository",
            RuleField::Title => "title",
            RuleField::Author => "author",
        }
    }
}

impl fmt::Display for RuleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule pattern that failed to compile.
#[derive(Debug)]
pub struct PatternError {
    pub field: RuleField,
    pub pattern: String,
    pub source: regex::Error,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {} pattern '{}': {}",
            self.field, self.pattern, self.source
        )
    }
}

impl std::error::Error for PatternError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// The uncompiled form of a rule, as written in the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<bool>,
}

impl RuleSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, pattern: impl Into<String>) -> Self {
        self.category = Some(pattern.into());
        self
    }

    pub fn repository(mut self, pattern: impl Into<String>) -> Self {
        self.repository = Some(pattern.into());
        self
    }

    pub fn title(mut self, pattern: impl Into<String>) -> Self {
        self.title = Some(pattern.into());
        self
    }

    pub fn author(mut self, pattern: impl Into<String>) -> Self {
        self.author = Some(pattern.into());
        self
    }

    pub fn draft(mut self, draft: bool) -> Self {
        self.draft = Some(draft);
        self
    }

    /// Compiles every pattern, failing on the first invalid one.
    pub fn compile(self) -> Result<Rule, PatternError> {
        Rule::compile(self)
    }
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    spec: RuleSpec,
    category: Option<Regex>,
    repository: Option<Regex>,
    title: Option<Regex>,
    author: Option<Regex>,
}

fn compile_field(field: RuleField, pattern: Option<&str>) -> Result<Option<Regex>, PatternError> {
    pattern
        .map(|p| {
            Regex::new(p).map_err(|source| PatternError {
                field,
                pattern: p.to_string(),
                source,
            })
        })
        .transpose()
}

impl Rule {
    pub fn compile(spec: RuleSpec) -> Result<Self, PatternError> {
        Ok(Self {
            category: compile_field(RuleField::Category, spec.category.as_deref())?,
            repository: compile_field(RuleField::Repository, spec.repository.as_deref())?,
            title: compile_field(RuleField::Title, spec.title.as_deref())?,
            author: compile_field(RuleField::Author, spec.author.as_deref())?,
            spec,
        })
    }

    pub fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    pub fn has_category(&self) -> bool {
        self.category.is_some()
    }

    pub fn has_content_predicate(&self) -> bool {
        self.repository.is_some()
            || self.title.is_some()
            || self.author.is_some()
            || self.spec.draft.is_some()
    }

    /// Tests the content predicates (repository, title, author, draft)
    /// against a pull request. Returns false when none are set.
    pub fn matches(&self, pr: &PullRequest) -> bool {
        self.evaluate(pr, None)
    }

    /// Like [`Rule::matches`], but the category predicate, when present,
    /// takes part as well.
    pub fn matches_with_category(&self, pr: &PullRequest, category: &str) -> bool {
        self.evaluate(pr, Some(category))
    }

    // Regexes use search semantics: a pattern matches anywhere in the field.
    fn evaluate(&self, pr: &PullRequest, category: Option<&str>) -> bool {
        let category_check = category
            .zip(self.category.as_ref())
            .map(|(name, re)| re.is_match(name));

        let checks = [
            category_check,
            self.repository
                .as_ref()
                .map(|re| re.is_match(pr.repository.as_str())),
            self.title.as_ref().map(|re| re.is_match(&pr.title)),
            self.author.as_ref().map(|re| re.is_match(&pr.author)),
            self.spec.draft.map(|draft| draft == pr.draft),
        ];

        let mut present = checks.into_iter().flatten().peekable();
        present.peek().is_some() && present.all(|matched| matched)
    }
}

impl TryFrom<RuleSpec> for Rule {
    type Error = PatternError;

    fn try_from(spec: RuleSpec) -> Result<Self, Self::Error> {
        Rule::compile(spec)
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.spec == other.spec
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::Repo;

    fn pr(number: u64, repo: &str, title: &str, author: &str, draft: bool) -> PullRequest {
        PullRequest {
            number,
            title: title.to_string(),
            url: format!("https://github.com/{}/pull/{}", repo, number),
            repository: Repo::parse(repo).unwrap(),
            author: author.to_string(),
            draft,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_rule_never_matches() {
        let rule = RuleSpec::new().compile().unwrap();
        let p = pr(1, "a/b", "fix", "alice", false);
        assert!(!rule.matches(&p));
        assert!(!rule.matches_with_category(&p, "mine"));
    }

    #[test]
    fn test_title_rule_uses_search_semantics() {
        let rule = RuleSpec::new().title("wip").compile().unwrap();
        assert!(rule.matches(&pr(1, "a/b", "feat: wip thing", "alice", false)));
        assert!(!rule.matches(&pr(2, "a/b", "feat: done", "alice", false)));

        let anchored = RuleSpec::new().title("^wip").compile().unwrap();
        assert!(anchored.matches(&pr(3, "a/b", "wip: start", "alice", false)));
        assert!(!anchored.matches(&pr(4, "a/b", "feat: wip thing", "alice", false)));
    }

    #[test]
    fn test_repository_and_author_rules() {
        let rule = RuleSpec::new()
            .repository("^acme/")
            .author("dependabot")
            .compile()
            .unwrap();
        assert!(rule.matches(&pr(1, "acme/web", "bump", "dependabot[bot]", false)));
        assert!(!rule.matches(&pr(2, "acme/web", "bump", "alice", false)));
        assert!(!rule.matches(&pr(3, "other/web", "bump", "dependabot[bot]", false)));
    }

    #[test]
    fn test_draft_rule_is_exact_equality() {
        let drafts = RuleSpec::new().draft(true).compile().unwrap();
        let ready = RuleSpec::new().draft(false).compile().unwrap();
        let draft_pr = pr(1, "a/b", "x", "alice", true);
        let ready_pr = pr(2, "a/b", "x", "alice", false);
        assert!(drafts.matches(&draft_pr));
        assert!(!drafts.matches(&ready_pr));
        assert!(ready.matches(&ready_pr));
        assert!(!ready.matches(&draft_pr));
    }

    #[test]
    fn test_all_present_predicates_must_match() {
        let rule = RuleSpec::new()
            .title("fix")
            .draft(false)
            .compile()
            .unwrap();
        assert!(rule.matches(&pr(1, "a/b", "fix the bug", "alice", false)));
        assert!(!rule.matches(&pr(2, "a/b", "fix the bug", "alice", true)));
    }

    #[test]
    fn test_category_predicate_ignored_by_content_match() {
        let rule = RuleSpec::new()
            .category("^review")
            .title("bump")
            .compile()
            .unwrap();
        let p = pr(1, "a/b", "bump deps", "bot", false);
        assert!(rule.matches(&p));
        assert!(rule.matches_with_category(&p, "review requests"));
        assert!(!rule.matches_with_category(&p, "mine"));
    }

    // A rule naming only a category has no content predicate, so the
    // content-only match rejects it, while the category-aware match treats
    // the category as its sole predicate and accepts every PR in it.
    #[test]
    fn test_category_only_rule() {
        let rule = RuleSpec::new().category("^team$").compile().unwrap();
        let p = pr(1, "a/b", "anything", "alice", false);
        assert!(!rule.has_content_predicate());
        assert!(!rule.matches(&p));
        assert!(rule.matches_with_category(&p, "team"));
        assert!(!rule.matches_with_category(&p, "teams"));
    }

    #[test]
    fn test_invalid_pattern_reports_field() {
        let err = RuleSpec::new().author("(unclosed").compile().unwrap_err();
        assert_eq!(err.field, RuleField::Author);
        assert_eq!(err.pattern, "(unclosed");
        assert!(err.to_string().contains("invalid author pattern"));
    }

    #[test]
    fn test_invalid_category_pattern_rejected_at_compile() {
        let err = Rule::try_from(RuleSpec::new().category("[")).unwrap_err();
        assert_eq!(err.field, RuleField::Category);
    }

    #[test]
    fn test_rule_spec_deserialize_rejects_unknown_fields() {
        let spec: RuleSpec = serde_yml::from_str("title: '^wip'\ndraft: true\n").unwrap();
        assert_eq!(spec, RuleSpec::new().title("^wip").draft(true));
        assert!(serde_yml::from_str::<RuleSpec>("label: bug\n").is_err());
    }
}
