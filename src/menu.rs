use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::PullRequest;

/// Pull requests of one category, keyed by repository full name.
pub type RepositoryGroups<'a> = BTreeMap<&'a str, Vec<&'a PullRequest>>;

/// Classified pull requests, ready for rendering.
///
/// Every category that was queried is a key of both maps, even when one
/// side holds no pull requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrMenuModel {
    pub shown: BTreeMap<String, Vec<PullRequest>>,
    pub hidden: BTreeMap<String, Vec<PullRequest>>,
}

impl PrMenuModel {
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.shown.keys().map(String::as_str)
    }

    pub fn shown_count(&self) -> usize {
        self.shown.values().map(Vec::len).sum()
    }

    pub fn hidden_count(&self) -> usize {
        self.hidden.values().map(Vec::len).sum()
    }

    pub fn shown_by_repository(&self, category: &str) -> RepositoryGroups<'_> {
        self.shown
            .get(category)
            .map(|prs| group_by_repository(prs))
            .unwrap_or_default()
    }

    pub fn hidden_by_repository(&self, category: &str) -> RepositoryGroups<'_> {
        self.hidden
            .get(category)
            .map(|prs| group_by_repository(prs))
            .unwrap_or_default()
    }

    /// All shown pull requests grouped by repository, ignoring categories.
    ///
    /// This is the single-category view: categories are merged in name
    /// order before grouping.
    pub fn flat_by_repository(&self) -> RepositoryGroups<'_> {
        let mut groups = RepositoryGroups::new();
        for pr in self.shown.values().flatten() {
            groups.entry(pr.repository.as_str()).or_default().push(pr);
        }
        groups
    }
}

/// Groups pull requests by repository, sorted by repository name, keeping
/// the input order within each repository.
pub fn group_by_repository(prs: &[PullRequest]) -> RepositoryGroups<'_> {
    let mut groups = RepositoryGroups::new();
    for pr in prs {
        groups.entry(pr.repository.as_str()).or_default().push(pr);
    }
    groups
}
