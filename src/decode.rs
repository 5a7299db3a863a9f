//! Response decoder — raw JSON bytes into typed records.
//!
//! Only the top-level array is mandatory. Every field inside a record is
//! read leniently: missing or null scalars become zero values, so one odd
//! record never sinks the whole payload.

use serde_json::Value;

use crate::error::DecodeError;
use crate::model::{Deployment, DeploymentStatus, Model};

const MODELS_KEY: &str = "models";
const DEPLOYMENTS_KEY: &str = "deployments";

/// Decode a "list models" payload.
pub fn decode_models(bytes: &[u8]) -> Result<Vec<Model>, DecodeError> {
    let root: Value = serde_json::from_slice(bytes)?;
    let items = top_level_array(&root, MODELS_KEY)?;

    Ok(items
        .iter()
        .map(|obj| Model {
            id: string_field(obj, "id"),
            name: string_field(obj, "name"),
            instance_type_name: string_field(obj, "instance_type_name"),
            production_deployment_id: optional_string_field(obj, "production_deployment_id"),
            development_deployment_id: optional_string_field(obj, "development_deployment_id"),
            deployments_count: count_field(obj, "deployments_count"),
        })
        .collect())
}

/// Decode a "list deployments for model" payload.
pub fn decode_deployments(bytes: &[u8]) -> Result<Vec<Deployment>, DecodeError> {
    let root: Value = serde_json::from_slice(bytes)?;
    let items = top_level_array(&root, DEPLOYMENTS_KEY)?;

    Ok(items
        .iter()
        .map(|obj| Deployment {
            id: string_field(obj, "id"),
            name: string_field(obj, "name"),
            model_id: string_field(obj, "model_id"),
            environment: optional_string_field(obj, "environment"),
            status: obj
                .get("status")
                .and_then(Value::as_str)
                .map(DeploymentStatus::from_api)
                .unwrap_or_default(),
            is_production: bool_field(obj, "is_production"),
            is_development: bool_field(obj, "is_development"),
            active_replica_count: count_field(obj, "active_replica_count"),
        })
        .collect())
}

// ── Field readers ───────────────────────────────────────────────────

fn top_level_array<'a>(root: &'a Value, key: &'static str) -> Result<&'a Vec<Value>, DecodeError> {
    root.get(key)
        .and_then(Value::as_array)
        .ok_or(DecodeError::MissingArray(key))
}

fn optional_string_field(obj: &Value, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn string_field(obj: &Value, key: &str) -> String {
    optional_string_field(obj, key).unwrap_or_default()
}

fn bool_field(obj: &Value, key: &str) -> bool {
    match obj.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    }
}

/// Non-negative integer; negatives and non-numbers clamp to 0.
fn count_field(obj: &Value, key: &str) -> u32 {
    obj.get(key)
        .and_then(Value::as_u64)
        .map(|n| n.min(u32::MAX as u64) as u32)
        .unwrap_or(0)
}
