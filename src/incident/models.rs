//! Incident and alert models as reported by the SecMaster SIEM,
//! plus the locally cached snapshot types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Incident labels come back from the SIEM either as a list of tags or as a
/// single free-text string, depending on the ingest path that created the
/// incident.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Labels {
    List(Vec<String>),
    Text(String),
}

impl Labels {
    /// Render labels for display / payload text. `-` when empty.
    pub fn display(&self) -> String {
        match self {
            Labels::List(items) if items.is_empty() => "-".to_string(),
            Labels::List(items) => items.join(", "),
            Labels::Text(text) if text.is_empty() => "-".to_string(),
            Labels::Text(text) => text.clone(),
        }
    }
}

/// An aggregated security event in the SIEM, referencing zero or more alerts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Incident {
    pub id: String,
    pub title: Option<String>,
    /// Some SIEM ingest paths fill `name` instead of `title`.
    pub name: Option<String>,
    pub severity: Option<String>,
    pub handle_status: Option<String>,
    pub labels: Option<Labels>,
    /// Free text or an arbitrary JSON object, depending on the data source.
    pub description: Option<Value>,
    pub owner: Option<String>,
    pub responsible_person: Option<String>,
    pub responsible_dept: Option<String>,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
    /// Ids of the constituent alerts, in the order the SIEM reports them.
    pub alert_list: Vec<String>,
    /// Fully hydrated alerts (fetched one by one from the SIEM).
    pub associated_alerts: Vec<Alert>,
}

impl Incident {
    /// Preferred human-readable name: `title`, falling back to `name`.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_default()
    }
}

/// A single alert as reported by the SIEM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Alert {
    pub id: String,
    pub title: Option<String>,
    pub severity: Option<String>,
    pub handle_status: Option<String>,
    pub description: Option<Value>,
    pub data_source_product_name: Option<String>,
}

/// Locally cached copy of an incident together with its graph bundle.
///
/// `graph_data` and `graph_summary` form one atomic bundle: they are always
/// written together and a snapshot with only one of them present is treated
/// as having no bundle at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentSnapshot {
    pub incident_id: String,
    pub alert_list: Vec<String>,
    pub graph_data: Option<Value>,
    pub graph_summary: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Lightweight view of a snapshot used by the sync sweep — carries only what
/// drift detection needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub incident_id: String,
    pub alert_list: Vec<String>,
    pub has_graph_data: bool,
    pub has_graph_summary: bool,
}

impl SnapshotSummary {
    /// A bundle counts as missing when either half of it is absent.
    pub fn graph_bundle_missing(&self) -> bool {
        !self.has_graph_data || !self.has_graph_summary
    }
}

/// The stored graph bundle for an incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphBundle {
    pub graph_data: Value,
    pub graph_summary: Option<String>,
}

/// Render a description value as plain text: strings pass through, anything
/// else is serialized as JSON.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
