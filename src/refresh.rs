use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    config::Configuration,
    menu::PrMenuModel,
    query::fetch_and_classify,
    types::{Forge, QueryError},
};

/// Result of one refresh cycle.
#[derive(Debug)]
pub struct Snapshot {
    pub model: PrMenuModel,
    pub errors: Vec<QueryError>,
    /// True when every query failed and `model` is from an earlier cycle.
    pub stale: bool,
    pub refreshed_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Drives refresh cycles one at a time and remembers the last model that
/// was built from at least one successful query.
pub struct Refresher<F: Forge + ?Sized + 'static> {
    config: Arc<Configuration>,
    forge: Arc<F>,
    last_good: Option<(PrMenuModel, DateTime<Utc>)>,
}

impl<F: Forge + ?Sized + 'static> Refresher<F> {
    pub fn new(config: Arc<Configuration>, forge: Arc<F>) -> Self {
        Self {
            config,
            forge,
            last_good: None,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Runs one full fetch and classification. Taking `&mut self` keeps
    /// cycles from overlapping.
    pub async fn refresh(&mut self) -> Snapshot {
        let (model, errors) = fetch_and_classify(&self.config, &self.forge).await;
        let now = Utc::now();

        let query_count = self.config.query_count();
        let all_failed = query_count > 0 && errors.len() >= query_count;

        debug!(
            shown = model.shown_count(),
            hidden = model.hidden_count(),
            errors = errors.len(),
            all_failed,
            "Refresh cycle finished"
        );

        if all_failed {
            if let Some((previous, refreshed_at)) = &self.last_good {
                return Snapshot {
                    model: previous.clone(),
                    errors,
                    stale: true,
                    refreshed_at: *refreshed_at,
                };
            }
        } else {
            self.last_good = Some((model.clone(), now));
        }

        Snapshot {
            model,
            errors,
            stale: false,
            refreshed_at: now,
        }
    }
}
