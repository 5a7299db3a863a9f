//! Scripted transport for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{deployments_endpoint, ApiTransport, MODELS_ENDPOINT};
use crate::error::FetchError;

#[derive(Clone)]
pub enum Scripted {
    Body(String),
    Status(u16, String),
    Transport(String),
    /// Never answers; only a timeout or cancellation gets past it.
    Hang,
}

#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<String, Scripted>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    seen_keys: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(&self, endpoint: &str, response: Scripted) {
        self.responses.lock().unwrap().insert(endpoint.to_string(), response);
    }

    /// Script `/models` with the given `(id, name)` pairs.
    pub fn models(&self, models: &[(&str, &str)]) {
        let items: Vec<String> = models
            .iter()
            .map(|(id, name)| {
                format!(r#"{{"id":"{id}","name":"{name}","instance_type_name":"A10G"}}"#)
            })
            .collect();
        self.respond(MODELS_ENDPOINT, Scripted::Body(format!(r#"{{"models":[{}]}}"#, items.join(","))));
    }

    /// Script one model's deployments as `(id, status)` pairs.
    pub fn deployments(&self, model_id: &str, deployments: &[(&str, &str)]) {
        let items: Vec<String> = deployments
            .iter()
            .map(|(id, status)| {
                format!(r#"{{"id":"{id}","name":"{id}-name","model_id":"{model_id}","status":"{status}"}}"#)
            })
            .collect();
        self.respond(
            &deployments_endpoint(model_id),
            Scripted::Body(format!(r#"{{"deployments":[{}]}}"#, items.join(","))),
        );
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn seen_keys(&self) -> Vec<String> {
        self.seen_keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApiTransport for MockTransport {
    async fn fetch(
        &self,
        endpoint: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_keys.lock().unwrap().push(api_key.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.responses.lock().unwrap().get(endpoint).cloned();
        let result = match scripted {
            Some(Scripted::Body(body)) => Ok(body.into_bytes()),
            Some(Scripted::Status(status, body)) => {
                Err(FetchError::http_status(endpoint, status, body.as_bytes()))
            }
            Some(Scripted::Transport(message)) => Err(FetchError::Transport {
                endpoint: endpoint.to_string(),
                message,
            }),
            Some(Scripted::Hang) => {
                tokio::time::sleep(timeout).await;
                Err(FetchError::Transport {
                    endpoint: endpoint.to_string(),
                    message: format!("timed out after {}s", timeout.as_secs()),
                })
            }
            None => Err(FetchError::http_status(endpoint, 404, b"not scripted")),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
