//! Error taxonomy for the fetch path and configuration.
//!
//! A failed model list aborts a refresh cycle with a `FetchError`. Failed
//! per-model deployment fetches never abort anything; they are counted
//! into a `PartialFetchError` and travel with the snapshot.

use thiserror::Error;

/// Maximum number of body bytes kept when an endpoint answers non-2xx.
pub const BODY_PREVIEW_LIMIT: usize = 500;

/// A single fetch (transport + status + decode) failed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// DNS, connect, TLS or timeout failure. Nothing was received.
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    /// The server answered, but not with a 2xx status.
    #[error("{endpoint} returned HTTP {status}: {body_preview}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        body_preview: String,
    },

    /// The payload arrived but did not have the expected shape.
    #[error("unexpected payload from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: DecodeError,
    },

    /// The refresh was abandoned because the process is shutting down.
    #[error("refresh cancelled by shutdown")]
    Cancelled,
}

impl FetchError {
    /// Build an `HttpStatus` error, keeping at most `BODY_PREVIEW_LIMIT` bytes of body.
    pub fn http_status(endpoint: impl Into<String>, status: u16, body: &[u8]) -> Self {
        FetchError::HttpStatus {
            endpoint: endpoint.into(),
            status,
            body_preview: body_preview(body),
        }
    }

    /// HTTP status code if the server responded at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The payload could not be turned into records.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("response has no '{0}' array")]
    MissingArray(&'static str),
}

/// N of M per-model deployment fetches failed. Non-fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{failed} of {total} deployment fetches failed")]
pub struct PartialFetchError {
    pub failed: usize,
    pub total: usize,
}

/// Configuration could not be assembled.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API key not configured: set DEPLOYWATCH_API_KEY or 'api_key' in {0}")]
    MissingApiKey(String),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Lossy UTF-8 preview of a body, cut to `BODY_PREVIEW_LIMIT` bytes on a char boundary.
fn body_preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= BODY_PREVIEW_LIMIT {
        return text.into_owned();
    }
    let mut end = BODY_PREVIEW_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
