use std::collections::BTreeMap;

use crate::{config::Configuration, menu::PrMenuModel, types::PullRequest};

/// Splits each category's pull requests into shown and hidden sets.
///
/// When drafts are not shown, draft pull requests are dropped before any
/// hide rule is evaluated, so they end up in neither set. A pull request is
/// hidden when any hide rule matches it for its category; everything else
/// is shown. Ignore rules are not applied here: the input is expected to be
/// ignore-filtered already.
pub fn classify(
    per_category: &BTreeMap<String, Vec<PullRequest>>,
    config: &Configuration,
) -> PrMenuModel {
    let mut model = PrMenuModel::default();

    for (category, prs) in per_category {
        let (hidden, shown): (Vec<PullRequest>, Vec<PullRequest>) = prs
            .iter()
            .filter(|pr| config.show_drafts() || !pr.draft)
            .cloned()
            .partition(|pr| config.is_hidden(pr, category));

        model.hidden.insert(category.clone(), hidden);
        model.shown.insert(category.clone(), shown);
    }

    model
}
