//! Unix socket JSON-RPC server.
//!
//! Listens on `~/.deploywatch/deploywatch.sock` (configurable) for
//! newline-delimited JSON-RPC 2.0 requests. Local-only; the socket is
//! created owner-only.
//!
//! Methods:
//! - `dw.deployments` — the deployments table (`{"info": true}` for schema only)
//! - `dw.status` — cache and refresh state

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::CacheView;
use crate::fetch::wait_for_shutdown;
use crate::query::{QueryHandler, QueryParams};

/// Bound on a single request line.
const MAX_REQUEST_BYTES: u64 = 1_048_576;

const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

// ── JSON-RPC Types ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    method: String,
    params: Option<Value>,
    id: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: "2.0", result: Some(result), error: None, id }
    }
    fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self { jsonrpc: "2.0", result: None, error: Some(JsonRpcError { code, message }), id }
    }
}

// ── Server ──────────────────────────────────────────────────────────

pub struct Server {
    socket_path: PathBuf,
    handler: Arc<QueryHandler>,
}

impl Server {
    pub fn new(socket_path: PathBuf, handler: Arc<QueryHandler>) -> Self {
        Self { socket_path, handler }
    }

    /// Accept connections until shutdown is requested, then remove the socket.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        // Remove stale socket file
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .with_context(|| format!("removing stale socket {}", self.socket_path.display()))?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("binding {}", self.socket_path.display()))?;

        // Owner-only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        info!(
            socket = %self.socket_path.display(),
            source = ?self.handler.source(),
            "📡 Deploywatch server listening"
        );

        loop {
            let stream = tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        warn!("Accept failed: {}", e);
                        continue;
                    }
                },
            };

            let handler = Arc::clone(&self.handler);
            tokio::spawn(serve_connection(stream, handler));
        }

        let _ = std::fs::remove_file(&self.socket_path);
        info!("Server stopped");
        Ok(())
    }
}

async fn serve_connection(stream: UnixStream, handler: Arc<QueryHandler>) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        let response = match read_request_line(&mut reader, &mut line, MAX_REQUEST_BYTES).await {
            Ok(RequestLine::Eof) => break,
            Ok(RequestLine::Line) if line.trim().is_empty() => continue,
            Ok(RequestLine::Line) => handle_request(&line, &handler).await,
            Ok(RequestLine::TooLong) => {
                warn!(limit = MAX_REQUEST_BYTES, "Request line too long — closing connection");
                JsonRpcResponse::error(None, INVALID_REQUEST, "Request too large".into())
            }
            Err(e) => {
                debug!("Connection read failed: {}", e);
                break;
            }
        };

        let resp_json = serde_json::to_string(&response).unwrap_or_default();
        if writer.write_all(resp_json.as_bytes()).await.is_err() {
            break;
        }
        if writer.write_all(b"\n").await.is_err() {
            break;
        }
        if response.error.as_ref().is_some_and(|e| e.code == INVALID_REQUEST) {
            break;
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum RequestLine {
    Eof,
    Line,
    /// More than `limit` bytes without a newline.
    TooLong,
}

/// Read one request line into `line`, bounding that line alone by `limit`.
async fn read_request_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    line: &mut String,
    limit: u64,
) -> std::io::Result<RequestLine> {
    line.clear();
    let n = reader.take(limit + 1).read_line(line).await?;
    if n == 0 {
        Ok(RequestLine::Eof)
    } else if n as u64 > limit {
        Ok(RequestLine::TooLong)
    } else {
        Ok(RequestLine::Line)
    }
}

// ── Request Handling ────────────────────────────────────────────────

async fn handle_request(raw: &str, handler: &QueryHandler) -> JsonRpcResponse {
    let req: JsonRpcRequest = match serde_json::from_str(raw) {
        Ok(r) => r,
        Err(e) => return JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e)),
    };

    let request_id = Uuid::new_v4();
    debug!(request_id = %request_id, method = %req.method, "Request received");

    let params = req.params.unwrap_or(Value::Null);

    match req.method.as_str() {
        "dw.deployments" => handle_deployments(req.id, params, handler).await,
        "dw.status" => handle_status(req.id, handler),
        _ => JsonRpcResponse::error(req.id, METHOD_NOT_FOUND, format!("Unknown method: {}", req.method)),
    }
}

/// Accepts `null`, `{"info": bool}`, or `{"function": "deployments info"}`.
fn parse_query_params(params: Value) -> Result<QueryParams, String> {
    match params {
        Value::Null => Ok(QueryParams::default()),
        Value::Object(ref map) if map.contains_key("function") => match map.get("function") {
            Some(Value::String(f)) => Ok(QueryParams::from_function(f)),
            _ => Err("'function' must be a string".to_string()),
        },
        other => serde_json::from_value(other).map_err(|e| e.to_string()),
    }
}

async fn handle_deployments(id: Option<Value>, params: Value, handler: &QueryHandler) -> JsonRpcResponse {
    let query = match parse_query_params(params) {
        Ok(q) => q,
        Err(e) => return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e)),
    };

    let table = handler.handle_query(query).await;
    match serde_json::to_value(&table) {
        Ok(v) => JsonRpcResponse::success(id, v),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Serialization failed: {}", e)),
    }
}

fn handle_status(id: Option<Value>, handler: &QueryHandler) -> JsonRpcResponse {
    let result = match handler.cache().get() {
        CacheView::Empty => serde_json::json!({
            "populated": false,
            "source": handler.source(),
        }),
        CacheView::Ready(snapshot) => serde_json::json!({
            "populated": true,
            "source": handler.source(),
            "last_update": snapshot.last_update.to_rfc3339(),
            "models": snapshot.models.len(),
            "deployments": snapshot.deployments.len(),
            "partial_failures": snapshot.failed_model_fetches,
        }),
    };
    JsonRpcResponse::success(id, result)
}
