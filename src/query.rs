use std::{collections::BTreeMap, sync::Arc, time::Instant};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
    classify::classify,
    config::Configuration,
    menu::PrMenuModel,
    types::{Forge, PullRequest, QueryError, QueryErrorKind},
};

/// Raw, ignore-filtered results of every configured query.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub per_category: BTreeMap<String, Vec<PullRequest>>,
    pub errors: Vec<QueryError>,
}

struct CategoryOutcome {
    prs: Vec<PullRequest>,
    errors: Vec<QueryError>,
}

/// Runs every query of every category in parallel.
///
/// One task is spawned per category and, inside it, one task per query.
/// Each task returns its own results, and parents collect them by slot
/// once all children finish. A category's pull requests are therefore the
/// concatenation of its queries' results in configuration order, whatever
/// order the searches complete in. Pull requests matching any ignore rule
/// are dropped as each query's results arrive.
///
/// Failing queries never abort the run: each one contributes no results
/// and one [`QueryError`] naming its query.
pub async fn fetch_all<F>(config: &Arc<Configuration>, forge: &Arc<F>) -> FetchOutcome
where
    F: Forge + ?Sized + 'static,
{
    let start = Instant::now();

    let tasks: Vec<(&String, &Vec<String>, JoinHandle<CategoryOutcome>)> = config
        .query_groups()
        .iter()
        .map(|(category, queries)| {
            let handle = tokio::spawn(fetch_category(
                Arc::clone(config),
                Arc::clone(forge),
                category.clone(),
                queries.clone(),
            ));
            (category, queries, handle)
        })
        .collect();

    let mut outcome = FetchOutcome::default();
    for (category, queries, handle) in tasks {
        match handle.await {
            Ok(category_outcome) => {
                outcome
                    .per_category
                    .insert(category.clone(), category_outcome.prs);
                outcome.errors.extend(category_outcome.errors);
            }
            Err(join_error) => {
                let reason = join_error.to_string();
                outcome.per_category.insert(category.clone(), Vec::new());
                outcome.errors.extend(queries.iter().map(|query| {
                    QueryError::new(
                        category.as_str(),
                        query.as_str(),
                        QueryErrorKind::Aborted(reason.clone()),
                    )
                }));
            }
        }
    }

    debug!(
        categories = outcome.per_category.len(),
        errors = outcome.errors.len(),
        elapsed = ?start.elapsed(),
        "Fetched all query groups"
    );

    outcome
}

/// Fetches every query and classifies the results into shown and hidden
/// pull requests per category, returning the model with every query error.
pub async fn fetch_and_classify<F>(
    config: &Arc<Configuration>,
    forge: &Arc<F>,
) -> (PrMenuModel, Vec<QueryError>)
where
    F: Forge + ?Sized + 'static,
{
    let outcome = fetch_all(config, forge).await;
    let model = classify(&outcome.per_category, config);
    (model, outcome.errors)
}

async fn fetch_category<F>(
    config: Arc<Configuration>,
    forge: Arc<F>,
    category: String,
    queries: Vec<String>,
) -> CategoryOutcome
where
    F: Forge + ?Sized + 'static,
{
    let handles: Vec<JoinHandle<Result<Vec<PullRequest>, QueryErrorKind>>> = queries
        .iter()
        .map(|query| {
            tokio::spawn(run_query(
                Arc::clone(&config),
                Arc::clone(&forge),
                query.clone(),
            ))
        })
        .collect();

    let mut outcome = CategoryOutcome {
        prs: Vec::new(),
        errors: Vec::new(),
    };

    for (query, joined) in queries.iter().zip(join_all(handles).await) {
        let result = joined.unwrap_or_else(|e| Err(QueryErrorKind::Aborted(e.to_string())));
        match result {
            Ok(prs) => outcome.prs.extend(prs),
            Err(kind) => outcome
                .errors
                .push(QueryError::new(category.as_str(), query.as_str(), kind)),
        }
    }

    outcome
}

async fn run_query<F>(
    config: Arc<Configuration>,
    forge: Arc<F>,
    query: String,
) -> Result<Vec<PullRequest>, QueryErrorKind>
where
    F: Forge + ?Sized + 'static,
{
    let timeout = config.query_timeout();
    let start = Instant::now();

    let prs = match tokio::time::timeout(timeout, forge.search_pull_requests(&query, timeout)).await
    {
        Ok(Ok(prs)) => prs,
        Ok(Err(e)) => return Err(QueryErrorKind::Search(e)),
        Err(_) => return Err(QueryErrorKind::TimedOut(timeout)),
    };

    let total = prs.len();
    let kept: Vec<PullRequest> = prs.into_iter().filter(|pr| !config.is_ignored(pr)).collect();

    debug!(
        query = %query,
        elapsed = ?start.elapsed(),
        results = total,
        ignored = total - kept.len(),
        "Ran GitHub query"
    );

    Ok(kept)
}
