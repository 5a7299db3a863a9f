//! Table schema and row rendering for the deployments view.
//!
//! The column list is static; rows are a pure function of a snapshot.

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::time::Duration;

use crate::model::{DeploymentStatus, Severity, Snapshot};

pub const HELP: &str =
    "View model deployments with status, environment, and resource information";
pub const DEFAULT_SORT_COLUMN: &str = "model_name";

/// Fallback for a model (or instance type) the snapshot cannot resolve.
pub const UNKNOWN: &str = "Unknown";
/// Fallback for a deployment without an environment.
pub const NO_ENVIRONMENT: &str = "none";

// ── Column Schema ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Visual {
    #[serde(rename = "value")]
    Value,
    #[serde(rename = "pill")]
    Pill,
    #[serde(rename = "rowOptions")]
    RowOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    None,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Summary {
    Count,
    Sum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    Multiselect,
    Range,
    None,
}

/// Static description of one table column.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Column {
    #[serde(skip)]
    pub key: &'static str,
    pub index: usize,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub visualization: Visual,
    pub transform: Transform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<&'static str>,
    pub sort: SortOrder,
    pub sortable: bool,
    pub summary: Summary,
    pub filter: Filter,
    pub visible: bool,
    pub sticky: bool,
    pub unique_key: bool,
    pub full_width: bool,
    pub dummy: bool,
}

const fn text(index: usize, key: &'static str, name: &'static str) -> Column {
    Column {
        key,
        index,
        name,
        field_type: FieldType::String,
        visualization: Visual::Value,
        transform: Transform::None,
        units: None,
        sort: SortOrder::Ascending,
        sortable: true,
        summary: Summary::Count,
        filter: Filter::Multiselect,
        visible: true,
        sticky: false,
        unique_key: false,
        full_width: false,
        dummy: false,
    }
}

const fn pill(index: usize, key: &'static str, name: &'static str) -> Column {
    Column {
        visualization: Visual::Pill,
        ..text(index, key, name)
    }
}

/// Columns in row order. The last one carries per-row options only.
pub static COLUMNS: [Column; 11] = [
    Column {
        sticky: true,
        ..text(0, "model_name", "Model Name")
    },
    text(1, "model_id", "Model ID"),
    text(2, "deployment_name", "Deployment Name"),
    Column {
        full_width: true,
        ..text(3, "instance_type_name", "Instance Type")
    },
    pill(4, "environment", "Environment"),
    pill(5, "status", "Status"),
    text(6, "is_production", "Production"),
    text(7, "is_development", "Development"),
    Column {
        field_type: FieldType::Integer,
        transform: Transform::Number,
        units: Some("replicas"),
        sort: SortOrder::Descending,
        summary: Summary::Sum,
        filter: Filter::Range,
        ..text(8, "active_replicas", "Active Replicas")
    },
    Column {
        unique_key: true,
        visible: false,
        ..text(9, "deployment_id", "Deployment ID")
    },
    Column {
        field_type: FieldType::None,
        visualization: Visual::RowOptions,
        sort: SortOrder::Fixed,
        sortable: false,
        filter: Filter::None,
        visible: false,
        dummy: true,
        ..text(10, "rowOptions", "rowOptions")
    },
];

/// Serializes the column list as an object keyed by column key, in index order.
#[derive(Debug, Clone, Copy)]
pub struct Columns(pub &'static [Column]);

impl Serialize for Columns {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for column in self.0 {
            map.serialize_entry(column.key, column)?;
        }
        map.end()
    }
}

// ── Rows ────────────────────────────────────────────────────────────

/// One rendered deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub model_name: String,
    pub model_id: String,
    pub deployment_name: String,
    pub instance_type: String,
    pub environment: String,
    pub status: DeploymentStatus,
    pub is_production: bool,
    pub is_development: bool,
    pub active_replicas: u32,
    /// Row key; hidden column.
    pub deployment_id: String,
    pub severity: Severity,
}

#[derive(Serialize)]
struct RowOptions {
    severity: Severity,
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(COLUMNS.len()))?;
        seq.serialize_element(&self.model_name)?;
        seq.serialize_element(&self.model_id)?;
        seq.serialize_element(&self.deployment_name)?;
        seq.serialize_element(&self.instance_type)?;
        seq.serialize_element(&self.environment)?;
        seq.serialize_element(self.status.label())?;
        seq.serialize_element(yes_no(self.is_production))?;
        seq.serialize_element(yes_no(self.is_development))?;
        seq.serialize_element(&self.active_replicas)?;
        seq.serialize_element(&self.deployment_id)?;
        seq.serialize_element(&RowOptions { severity: self.severity })?;
        seq.end()
    }
}

/// Render every deployment in the snapshot.
///
/// Models are resolved by id at render time; a dangling `model_id` renders
/// as "Unknown". Rows come back sorted by model name, then deployment name,
/// then deployment id, so identical snapshots always render identically.
pub fn render_rows(snapshot: &Snapshot) -> Vec<Row> {
    let models = snapshot.model_index();

    let mut rows: Vec<Row> = snapshot
        .deployments
        .iter()
        .map(|d| {
            let model = models.get(d.model_id.as_str());
            Row {
                model_name: model.map_or(UNKNOWN, |m| m.name.as_str()).to_string(),
                model_id: d.model_id.clone(),
                deployment_name: d.name.clone(),
                instance_type: model
                    .map(|m| m.instance_type_name.as_str())
                    .filter(|s| !s.is_empty())
                    .unwrap_or(UNKNOWN)
                    .to_string(),
                environment: d
                    .environment
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .unwrap_or(NO_ENVIRONMENT)
                    .to_string(),
                status: d.status,
                is_production: d.is_production,
                is_development: d.is_development,
                active_replicas: d.active_replica_count,
                deployment_id: d.id.clone(),
                severity: d.status.severity(),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        a.model_name
            .cmp(&b.model_name)
            .then_with(|| a.deployment_name.cmp(&b.deployment_name))
            .then_with(|| a.deployment_id.cmp(&b.deployment_id))
    });
    rows
}

// ── Response ────────────────────────────────────────────────────────

/// Table-shaped answer to a deployments query.
#[derive(Debug, Serialize)]
pub struct TableResponse {
    pub status: u16,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub has_history: bool,
    pub help: &'static str,
    pub update_every: u64,
    /// `Some(false)` until the first refresh completes. Absent in info mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub populated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_failures: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub data: Vec<Row>,
    pub columns: Columns,
    pub default_sort_column: &'static str,
}

impl TableResponse {
    fn base(status: u16, update_every: Duration) -> Self {
        Self {
            status,
            kind: "table",
            has_history: false,
            help: HELP,
            update_every: update_every.as_secs(),
            populated: None,
            last_update: None,
            partial_failures: None,
            error: None,
            data: Vec::new(),
            columns: Columns(&COLUMNS),
            default_sort_column: DEFAULT_SORT_COLUMN,
        }
    }

    /// Schema only. No rows, no data source consulted.
    pub fn info(update_every: Duration) -> Self {
        Self::base(200, update_every)
    }

    /// An explicit "nothing fetched yet" table.
    pub fn not_populated(update_every: Duration, error: Option<String>) -> Self {
        let status = if error.is_some() { 503 } else { 200 };
        Self {
            populated: Some(false),
            error,
            ..Self::base(status, update_every)
        }
    }

    /// Full table for a snapshot.
    pub fn render(snapshot: &Snapshot, update_every: Duration) -> Self {
        Self {
            populated: Some(true),
            last_update: Some(snapshot.last_update),
            partial_failures: (snapshot.failed_model_fetches > 0)
                .then_some(snapshot.failed_model_fetches),
            data: render_rows(snapshot),
            ..Self::base(200, update_every)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Deployment, Model};
    use serde_json::json;

    fn snapshot(models: Vec<Model>, deployments: Vec<Deployment>) -> Snapshot {
        Snapshot::new(models, deployments, 0)
    }

    fn model(id: &str, name: &str) -> Model {
        Model {
            id: id.into(),
            name: name.into(),
            instance_type_name: "A10G".into(),
            ..Default::default()
        }
    }

    fn deployment(id: &str, model_id: &str, status: DeploymentStatus) -> Deployment {
        Deployment {
            id: id.into(),
            name: format!("{id}-name"),
            model_id: model_id.into(),
            status,
            ..Default::default()
        }
    }

    #[test]
    fn test_failed_deployment_row() {
        let snap = snapshot(
            vec![model("m1", "Foo")],
            vec![deployment("d1", "m1", DeploymentStatus::Failed)],
        );
        let rows = render_rows(&snap);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].model_name, "Foo");
        assert_eq!(rows[0].status.label(), "Failed");
        assert_eq!(rows[0].severity, Severity::Error);

        let value = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(
            value,
            json!(["Foo", "m1", "d1-name", "A10G", "none", "Failed", "No", "No", 0, "d1", {"severity": "error"}])
        );
    }

    #[test]
    fn test_dangling_model_reference_renders_unknown() {
        let snap = snapshot(vec![], vec![deployment("d1", "ghost", DeploymentStatus::Active)]);
        let rows = render_rows(&snap);
        assert_eq!(rows[0].model_name, UNKNOWN);
        assert_eq!(rows[0].instance_type, UNKNOWN);
        assert_eq!(rows[0].model_id, "ghost");
    }

    #[test]
    fn test_flags_environment_and_replicas() {
        let mut d = deployment("d1", "m1", DeploymentStatus::ScaledToZero);
        d.environment = Some("production".into());
        d.is_production = true;
        d.active_replica_count = 0;
        let mut e = deployment("d2", "m1", DeploymentStatus::Deploying);
        e.is_development = true;
        e.active_replica_count = 2;

        let rows = render_rows(&snapshot(vec![model("m1", "Foo")], vec![d, e]));
        let first = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(first[4], "production");
        assert_eq!(first[5], "Scaled to Zero");
        assert_eq!(first[6], "Yes");
        assert_eq!(first[10]["severity"], "warning");

        let second = serde_json::to_value(&rows[1]).unwrap();
        assert_eq!(second[7], "Yes");
        assert_eq!(second[8], 2);
        assert_eq!(second[10]["severity"], "notice");
    }

    #[test]
    fn test_rows_sorted_by_model_then_deployment() {
        let snap = snapshot(
            vec![model("m1", "Zeta"), model("m2", "Alpha")],
            vec![
                deployment("b", "m1", DeploymentStatus::Active),
                deployment("z", "m2", DeploymentStatus::Active),
                deployment("a", "m1", DeploymentStatus::Active),
                deployment("y", "m2", DeploymentStatus::Active),
            ],
        );
        let order: Vec<_> = render_rows(&snap)
            .into_iter()
            .map(|r| (r.model_name, r.deployment_name))
            .collect();
        assert_eq!(
            order,
            [
                ("Alpha".to_string(), "y-name".to_string()),
                ("Alpha".to_string(), "z-name".to_string()),
                ("Zeta".to_string(), "a-name".to_string()),
                ("Zeta".to_string(), "b-name".to_string()),
            ]
        );
    }

    #[test]
    fn test_unique_key_distinguishes_deployments_of_one_model() {
        let snap = snapshot(
            vec![model("m1", "Foo")],
            vec![
                deployment("d1", "m1", DeploymentStatus::Active),
                deployment("d2", "m1", DeploymentStatus::Inactive),
            ],
        );
        let key = COLUMNS.iter().find(|c| c.unique_key).unwrap().index;
        let keys: Vec<_> = render_rows(&snap)
            .iter()
            .map(|r| serde_json::to_value(r).unwrap()[key].clone())
            .collect();
        assert_eq!(keys.len(), 2);
        assert_ne!(keys[0], keys[1]);
    }

    #[test]
    fn test_columns_serialize_in_index_order() {
        let value = serde_json::to_string(&Columns(&COLUMNS)).unwrap();
        let mut last = 0;
        for column in COLUMNS.iter() {
            let pos = value.find(&format!("\"{}\":", column.key)).unwrap();
            assert!(pos >= last, "{} out of order", column.key);
            last = pos;
        }
        assert!(COLUMNS.iter().enumerate().all(|(i, c)| c.index == i));
    }

    #[test]
    fn test_column_hints() {
        let parsed = serde_json::to_value(&Columns(&COLUMNS)).unwrap();
        assert_eq!(parsed["model_name"]["sticky"], true);
        assert_eq!(parsed["model_id"]["unique_key"], false);
        assert_eq!(parsed["deployment_id"]["unique_key"], true);
        assert_eq!(parsed["deployment_id"]["visible"], false);
        assert_eq!(COLUMNS.iter().filter(|c| c.unique_key).count(), 1);
        assert_eq!(parsed["status"]["visualization"], "pill");
        assert_eq!(parsed["active_replicas"]["type"], "integer");
        assert_eq!(parsed["active_replicas"]["units"], "replicas");
        assert_eq!(parsed["active_replicas"]["summary"], "sum");
        assert_eq!(parsed["rowOptions"]["visualization"], "rowOptions");
        assert_eq!(parsed["rowOptions"]["dummy"], true);
    }

    #[test]
    fn test_render_response_metadata() {
        let mut snap = snapshot(
            vec![model("m1", "Foo")],
            vec![deployment("d1", "m1", DeploymentStatus::Active)],
        );
        snap.failed_model_fetches = 2;
        let response = TableResponse::render(&snap, Duration::from_secs(60));
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["status"], 200);
        assert_eq!(value["type"], "table");
        assert_eq!(value["has_history"], false);
        assert_eq!(value["update_every"], 60);
        assert_eq!(value["partial_failures"], 2);
        assert_eq!(value["populated"], true);
        assert_eq!(value["default_sort_column"], "model_name");
        assert_eq!(value["data"].as_array().unwrap().len(), 1);
        assert!(value.get("error").is_none());
        assert!(value["last_update"].is_string());
    }

    #[test]
    fn test_not_populated_status() {
        let empty = TableResponse::not_populated(Duration::from_secs(60), None);
        assert_eq!(empty.status, 200);
        assert_eq!(empty.populated, Some(false));
        assert_eq!(serde_json::to_value(&empty).unwrap()["populated"], false);
        assert!(TableResponse::info(Duration::from_secs(60)).populated.is_none());
        let failed = TableResponse::not_populated(Duration::from_secs(60), Some("down".into()));
        assert_eq!(failed.status, 503);
        assert!(failed.data.is_empty());
    }
}
