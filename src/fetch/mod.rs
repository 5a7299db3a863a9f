//! Fetch engine — model list first, then every model's deployments.
//!
//! The model list is a single blocking call; if it fails the whole cycle
//! fails and nothing is published. Deployment lists are fetched per model
//! on a bounded set of tasks. A model whose deployment fetch fails simply
//! contributes nothing and is counted as a partial failure.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::api::{deployments_endpoint, key_preview, ApiTransport, MODELS_ENDPOINT};
use crate::decode::{decode_deployments, decode_models};
use crate::error::{ConfigError, FetchError, PartialFetchError};
use crate::model::{Deployment, Model, Snapshot};

/// Hard ceiling on simultaneous deployment requests.
pub const MAX_PARALLELISM: usize = 64;

/// Result of a successful refresh cycle.
#[derive(Debug)]
pub struct RefreshReport {
    pub snapshot: Snapshot,
    /// Present when at least one model's deployments could not be fetched.
    pub partial: Option<PartialFetchError>,
}

pub struct FetchEngine {
    transport: Arc<dyn ApiTransport>,
    api_key: Arc<Zeroizing<String>>,
    timeout: Duration,
    /// `None` means one in-flight request per model (still capped).
    parallelism: Option<usize>,
}

impl FetchEngine {
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        api_key: Zeroizing<String>,
        timeout: Duration,
        parallelism: Option<usize>,
    ) -> Result<Self, ConfigError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey("engine settings".into()));
        }
        Ok(Self {
            transport,
            api_key: Arc::new(api_key),
            timeout,
            parallelism,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Concurrency actually used for `model_count` models.
    pub fn effective_parallelism(&self, model_count: usize) -> usize {
        self.parallelism
            .unwrap_or(model_count)
            .clamp(1, MAX_PARALLELISM)
    }

    /// Run one full refresh cycle and build a new snapshot.
    ///
    /// Returns `FetchError::Cancelled` as soon as `shutdown` flips to
    /// `true`; in-flight requests are dropped with the task set.
    pub async fn refresh_all(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<RefreshReport, FetchError> {
        let started = Instant::now();
        info!(api_key = %key_preview(&self.api_key), "Refreshing inventory");

        let models = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => return Err(FetchError::Cancelled),
            models = self.fetch_models() => models?,
        };
        info!(models = models.len(), "Model list fetched");

        let outcomes = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => return Err(FetchError::Cancelled),
            outcomes = self.fetch_all_deployments(&models) => outcomes,
        };

        let total = models.len();
        let mut failed = 0;
        let mut deployments = Vec::new();
        for outcome in outcomes {
            match outcome {
                Some(mut batch) => deployments.append(&mut batch),
                None => failed += 1,
            }
        }

        let partial = (failed > 0).then_some(PartialFetchError { failed, total });
        let snapshot = Snapshot::new(models, deployments, failed);

        info!(
            models = snapshot.models.len(),
            deployments = snapshot.deployments.len(),
            failed = failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Refresh complete"
        );
        if let Some(partial) = &partial {
            warn!("{}", partial);
        }

        Ok(RefreshReport { snapshot, partial })
    }

    /// Fetch and decode the model list.
    pub async fn fetch_models(&self) -> Result<Vec<Model>, FetchError> {
        let bytes = self
            .transport
            .fetch(MODELS_ENDPOINT, &self.api_key, self.timeout)
            .await?;
        decode_models(&bytes).map_err(|source| FetchError::Decode {
            endpoint: MODELS_ENDPOINT.to_string(),
            source,
        })
    }

    /// One slot per model, in model order. `None` marks a failed fetch.
    async fn fetch_all_deployments(&self, models: &[Model]) -> Vec<Option<Vec<Deployment>>> {
        let limit = self.effective_parallelism(models.len());
        debug!(models = models.len(), parallelism = limit, "Fetching deployments");

        let semaphore = Arc::new(Semaphore::new(limit));
        let mut tasks = JoinSet::new();

        for (idx, model) in models.iter().enumerate() {
            if model.id.is_empty() {
                warn!(model = %model.name, "Model has no id — skipping deployment fetch");
                continue;
            }

            let semaphore = Arc::clone(&semaphore);
            let transport = Arc::clone(&self.transport);
            let api_key = Arc::clone(&self.api_key);
            let timeout = self.timeout;
            let model_id = model.id.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (idx, Err(FetchError::Cancelled));
                };
                let result =
                    fetch_deployments(transport.as_ref(), &api_key, timeout, &model_id).await;
                (idx, result)
            });
        }

        let mut slots: Vec<Option<Vec<Deployment>>> = vec![None; models.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, Ok(deployments))) => {
                    debug!(model_id = %models[idx].id, deployments = deployments.len(), "Deployments fetched");
                    slots[idx] = Some(deployments);
                }
                Ok((idx, Err(e))) => {
                    warn!(model_id = %models[idx].id, "Deployment fetch failed: {}", e);
                }
                Err(e) => {
                    warn!("Deployment fetch task aborted: {}", e);
                }
            }
        }
        slots
    }
}

/// Fetch one model's deployments and attribute orphans to that model.
async fn fetch_deployments(
    transport: &dyn ApiTransport,
    api_key: &str,
    timeout: Duration,
    model_id: &str,
) -> Result<Vec<Deployment>, FetchError> {
    let endpoint = deployments_endpoint(model_id);
    let bytes = transport.fetch(&endpoint, api_key, timeout).await?;
    let mut deployments =
        decode_deployments(&bytes).map_err(|source| FetchError::Decode { endpoint, source })?;

    for deployment in deployments.iter_mut().filter(|d| d.model_id.is_empty()) {
        deployment.model_id = model_id.to_string();
    }
    Ok(deployments)
}

/// Resolves once shutdown is requested. Never resolves if the sender is gone.
pub(crate) async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
