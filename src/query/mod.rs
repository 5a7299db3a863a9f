//! Query handling — turns a table request into a `TableResponse`.
//!
//! In cache mode a query reads the last published snapshot and never
//! touches the network. In live mode it runs a refresh first, publishes
//! it, and falls back to the stale snapshot if the refresh fails.

pub mod table;

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{CacheView, SnapshotCache};
use crate::config::QuerySource;
use crate::fetch::FetchEngine;

pub use table::{render_rows, Row, TableResponse, COLUMNS};

/// Parameters accepted by a deployments query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    /// Schema only: no rows, no data source consulted.
    pub info: bool,
}

impl QueryParams {
    /// Parse a function-style request line, e.g. `"deployments info"`.
    /// The first word is the function name; only `info` is recognised.
    pub fn from_function(function: &str) -> Self {
        Self {
            info: function.split_whitespace().skip(1).any(|w| w == "info"),
        }
    }
}

pub struct QueryHandler {
    engine: Arc<FetchEngine>,
    cache: Arc<SnapshotCache>,
    source: QuerySource,
    update_every: Duration,
    shutdown: watch::Receiver<bool>,
}

impl QueryHandler {
    pub fn new(
        engine: Arc<FetchEngine>,
        cache: Arc<SnapshotCache>,
        source: QuerySource,
        update_every: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            engine,
            cache,
            source,
            update_every,
            shutdown,
        }
    }

    pub fn source(&self) -> QuerySource {
        self.source
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub async fn handle_query(&self, params: QueryParams) -> TableResponse {
        let transaction = Uuid::new_v4();

        if params.info {
            info!(transaction = %transaction, "📋 Info query");
            return TableResponse::info(self.update_every);
        }

        let response = match self.source {
            QuerySource::Cache => self.from_view(self.cache.get(), None),
            QuerySource::Live => self.live().await,
        };

        info!(
            transaction = %transaction,
            source = ?self.source,
            status = response.status,
            rows = response.data.len(),
            "📋 Deployments query served"
        );
        response
    }

    async fn live(&self) -> TableResponse {
        match self.engine.refresh_all(self.shutdown.clone()).await {
            Ok(report) => {
                let snapshot = Arc::new(report.snapshot);
                self.cache.swap(Arc::clone(&snapshot));
                TableResponse::render(&snapshot, self.update_every)
            }
            Err(e) => {
                warn!("Live refresh failed — serving last snapshot: {}", e);
                self.from_view(self.cache.get(), Some(format!("refresh failed: {e}")))
            }
        }
    }

    fn from_view(&self, view: CacheView, error: Option<String>) -> TableResponse {
        match view {
            CacheView::Empty => TableResponse::not_populated(self.update_every, error),
            CacheView::Ready(snapshot) => TableResponse {
                error,
                ..TableResponse::render(&snapshot, self.update_every)
            },
        }
    }
}
