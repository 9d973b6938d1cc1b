//! SecMaster SIEM client.
//!
//! Retrieves live incidents and alerts from the SecMaster SOC API. Responses
//! arrive wrapped in a `data.data_object` envelope; the interesting fields
//! live on the inner object while the row id sits on the wrapper.

use crate::incident::models::{Alert, Incident};
use crate::incident::source::IncidentSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Typed configuration for the SecMaster client.
#[derive(Debug, Clone)]
pub struct SecMasterConfig {
    pub base_url: Option<String>,
    pub project_id: String,
    pub workspace_id: String,
    /// Static auth token sent as `X-Auth-Token` when present.
    pub auth_token: Option<String>,
    pub request_timeout: Duration,
}

impl Default for SecMasterConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            project_id: String::new(),
            workspace_id: String::new(),
            auth_token: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Client for the SecMaster SOC incident/alert API.
pub struct SecMasterClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    workspace_id: String,
    auth_token: Option<String>,
}

impl SecMasterClient {
    pub fn new(config: &SecMasterConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .context("SecMaster base_url is not configured")?
            .trim_end_matches('/')
            .to_string();

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .context("Failed to create SecMaster HTTP client")?;

        Ok(Self {
            http,
            base_url,
            project_id: config.project_id.clone(),
            workspace_id: config.workspace_id.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn soc_url(&self, kind: &str, id: &str) -> String {
        format!(
            "{}/v1/{}/workspaces/{}/soc/{}/{}",
            self.base_url, self.project_id, self.workspace_id, kind, id
        )
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let mut request = self
            .http
            .get(url)
            .header("Content-Type", "application/json;charset=utf8")
            .header("X-Project-Id", &self.project_id);
        if let Some(token) = &self.auth_token {
            request = request.header("X-Auth-Token", token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("SecMaster request failed: {}", url))?
            .error_for_status()
            .with_context(|| format!("SecMaster returned error status: {}", url))?;

        response
            .json::<Value>()
            .await
            .with_context(|| format!("SecMaster returned invalid JSON: {}", url))
    }

    /// Fetch one alert by id.
    pub async fn retrieve_alert_by_id(&self, alert_id: &str) -> Result<Alert> {
        let url = self.soc_url("alerts", alert_id);
        let data = self.get_json(&url).await?;

        let item = data
            .get("data")
            .context("SecMaster alert response missing data envelope")?;
        let object = item.get("data_object").unwrap_or(item);

        let mut alert: Alert = serde_json::from_value(object.clone())
            .with_context(|| format!("Failed to parse alert {}", alert_id))?;
        if alert.id.is_empty() {
            alert.id = item
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or(alert_id)
                .to_string();
        }
        if alert.data_source_product_name.is_none() {
            alert.data_source_product_name = object
                .pointer("/data_source/product_name")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        Ok(alert)
    }
}

#[async_trait]
impl IncidentSource for SecMasterClient {
    async fn retrieve_incident_by_id(&self, incident_id: &str) -> Result<Incident> {
        let url = self.soc_url("incidents", incident_id);
        let data = self.get_json(&url).await?;

        let item = data
            .get("data")
            .context("SecMaster incident response missing data envelope")?;
        let object = item.get("data_object").unwrap_or(item);

        let mut incident: Incident = serde_json::from_value(object.clone())
            .with_context(|| format!("Failed to parse incident {}", incident_id))?;
        if incident.id.is_empty() {
            incident.id = item
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or(incident_id)
                .to_string();
        }

        // Hydrate associated alerts one by one; a single bad alert must not
        // sink the whole incident.
        let mut associated_alerts = Vec::with_capacity(incident.alert_list.len());
        for alert_id in &incident.alert_list {
            match self.retrieve_alert_by_id(alert_id).await {
                Ok(alert) => associated_alerts.push(alert),
                Err(err) => {
                    tracing::warn!(
                        "Failed to fetch alert {} for incident {}: {:#}",
                        alert_id,
                        incident_id,
                        err
                    );
                }
            }
        }
        incident.associated_alerts = associated_alerts;

        Ok(incident)
    }
}
