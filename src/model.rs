//! Inventory records — models, their deployments, and the snapshot
//! that groups one refresh cycle's worth of both.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ── Status & Severity ───────────────────────────────────────────────

/// Lifecycle state of a deployment as reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Active,
    ScaledToZero,
    Inactive,
    Deploying,
    Failed,
    #[default]
    Unknown,
}

impl DeploymentStatus {
    /// Raw API token, e.g. `SCALED_TO_ZERO`.
    pub fn api_token(self) -> &'static str {
        match self {
            DeploymentStatus::Active => "ACTIVE",
            DeploymentStatus::ScaledToZero => "SCALED_TO_ZERO",
            DeploymentStatus::Inactive => "INACTIVE",
            DeploymentStatus::Deploying => "DEPLOYING",
            DeploymentStatus::Failed => "FAILED",
            DeploymentStatus::Unknown => "UNKNOWN",
        }
    }

    /// Human-readable label shown in the status column.
    pub fn label(self) -> &'static str {
        match self {
            DeploymentStatus::Active => "Active",
            DeploymentStatus::ScaledToZero => "Scaled to Zero",
            DeploymentStatus::Inactive => "Inactive",
            DeploymentStatus::Deploying => "Deploying",
            DeploymentStatus::Failed => "Failed",
            DeploymentStatus::Unknown => "Unknown",
        }
    }

    /// Row highlighting class derived from the status.
    pub fn severity(self) -> Severity {
        match self {
            DeploymentStatus::Active => Severity::Normal,
            DeploymentStatus::Deploying => Severity::Notice,
            DeploymentStatus::ScaledToZero | DeploymentStatus::Inactive => Severity::Warning,
            DeploymentStatus::Failed => Severity::Error,
            DeploymentStatus::Unknown => Severity::Normal,
        }
    }

    /// Parse an API token. Anything unrecognized is `Unknown`.
    pub fn from_api(token: &str) -> Self {
        token.parse().unwrap_or_default()
    }
}

impl FromStr for DeploymentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(DeploymentStatus::Active),
            "SCALED_TO_ZERO" => Ok(DeploymentStatus::ScaledToZero),
            "INACTIVE" => Ok(DeploymentStatus::Inactive),
            "DEPLOYING" => Ok(DeploymentStatus::Deploying),
            "FAILED" => Ok(DeploymentStatus::Failed),
            "UNKNOWN" => Ok(DeploymentStatus::Unknown),
            _ => Err(()),
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Presentation-only health class. Never stored, always derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Notice,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Notice => "notice",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

// ── Records ─────────────────────────────────────────────────────────

/// A deployable model artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub instance_type_name: String,
    pub production_deployment_id: Option<String>,
    pub development_deployment_id: Option<String>,
    pub deployments_count: u32,
}

/// One running (or stopped) instance of a model.
///
/// `model_id` is a lookup key, not an owning link; the model may be
/// missing from the snapshot and renderers must cope with that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Deployment {
    pub id: String,
    pub name: String,
    pub model_id: String,
    pub environment: Option<String>,
    pub status: DeploymentStatus,
    pub is_production: bool,
    pub is_development: bool,
    pub active_replica_count: u32,
}

// ── Snapshot ────────────────────────────────────────────────────────

/// Immutable result of one complete refresh cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub models: Vec<Model>,
    pub deployments: Vec<Deployment>,
    pub last_update: DateTime<Utc>,
    /// Models whose deployment list could not be fetched this cycle.
    pub failed_model_fetches: usize,
}

impl Snapshot {
    pub fn new(models: Vec<Model>, deployments: Vec<Deployment>, failed_model_fetches: usize) -> Self {
        Self {
            models,
            deployments,
            last_update: Utc::now(),
            failed_model_fetches,
        }
    }

    /// Index models by id for render-time lookups.
    pub fn model_index(&self) -> HashMap<&str, &Model> {
        self.models.iter().map(|m| (m.id.as_str(), m)).collect()
    }
}
