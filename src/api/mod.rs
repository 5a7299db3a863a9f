//! Inventory API access — the two read endpoints and the transport seam.
//!
//! The fetch engine only talks to `ApiTransport`. The production
//! implementation is `client::HttpTransport`; tests swap in a scripted
//! transport that counts calls.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::FetchError;

pub mod client;

#[cfg(test)]
pub mod mock;

pub use client::HttpTransport;

/// Default public API root.
pub const DEFAULT_BASE_URL: &str = "https://api.baseten.co/v1";

/// "List models" endpoint, relative to the base URL.
pub const MODELS_ENDPOINT: &str = "/models";

/// "List deployments for model" endpoint, relative to the base URL.
pub fn deployments_endpoint(model_id: &str) -> String {
    format!("/models/{}/deployments", model_id)
}

/// Shortest key whose first eight characters may be shown.
const MIN_PREVIEWABLE_KEY_LEN: usize = 13;

/// First eight characters of a key followed by `...`. Keys too short to
/// keep most of their length hidden render as `...` alone.
pub fn key_preview(api_key: &str) -> String {
    if api_key.chars().count() < MIN_PREVIEWABLE_KEY_LEN {
        return "...".into();
    }
    let head: String = api_key.chars().take(8).collect();
    format!("{}...", head)
}

// ── Transport Trait ─────────────────────────────────────────────────

/// One authenticated GET against the inventory API.
///
/// Implementations must send `Authorization: Api-Key <key>` and
/// `Accept: application/json`, verify TLS, bound the call by `timeout`
/// and never retry on their own. Non-2xx answers are errors.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn fetch(
        &self,
        endpoint: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, FetchError>;
}
