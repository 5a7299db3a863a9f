//! reqwest-backed transport.

use async_trait::async_trait;
use http::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use std::time::Duration;
use tracing::{debug, warn};

use super::{key_preview, ApiTransport};
use crate::error::FetchError;

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport rooted at `base_url`.
    ///
    /// Certificate and hostname verification stay at reqwest's defaults
    /// (enabled); redirects are followed.
    pub fn new(base_url: &str) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("deploywatch/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn fetch(
        &self,
        endpoint: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, FetchError> {
        debug!(endpoint = endpoint, api_key = %key_preview(api_key), "GET");

        let mut auth = HeaderValue::from_str(&format!("Api-Key {}", api_key)).map_err(|_| {
            FetchError::Transport {
                endpoint: endpoint.to_string(),
                message: "API key contains characters not allowed in a header".into(),
            }
        })?;
        auth.set_sensitive(true);

        let resp = self
            .client
            .get(self.url(endpoint))
            .header(AUTHORIZATION, auth)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(endpoint, timeout, e))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| transport_error(endpoint, timeout, e))?;

        if !status.is_success() {
            let err = FetchError::http_status(endpoint, status.as_u16(), &body);
            warn!(endpoint = endpoint, status = status.as_u16(), "{}", err);
            return Err(err);
        }

        debug!(endpoint = endpoint, bytes = body.len(), "Fetched");
        Ok(body.to_vec())
    }
}

fn transport_error(endpoint: &str, timeout: Duration, e: reqwest::Error) -> FetchError {
    let message = if e.is_timeout() {
        format!("timed out after {:?}", timeout)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    };
    FetchError::Transport {
        endpoint: endpoint.to_string(),
        message,
    }
}
