//! SOC Console
//!
//! A security-operations console backend with:
//! - SecMaster SIEM integration for incident and alert retrieval
//! - Locally cached incident snapshots with drift detection
//! - LightRAG-backed incident graph intelligence (knowledge graph + summary)
//! - A periodic sync job and an on-demand rebuild API

pub mod api;
pub mod graph;
pub mod incident;
pub mod siem;
pub mod sync;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use graph::{BuildCoordinator, GraphBundleOrchestrator, GraphConfig, GraphRefresher, RemoteGraphClient};
use incident::{IncidentSource, MemorySnapshotStore, SnapshotStore};
use siem::{SecMasterClient, SecMasterConfig};
use sync::IncidentSyncScheduler;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub secmaster: SecMasterYamlConfig,
    pub lightrag: LightRagYamlConfig,
    pub proxy: ProxyYamlConfig,
    pub sync: SyncYamlConfig,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// SecMaster SIEM configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecMasterYamlConfig {
    pub base_url: Option<String>,
    pub project_id: String,
    pub workspace_id: String,
    pub auth_token: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Default for SecMasterYamlConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            project_id: String::new(),
            workspace_id: String::new(),
            auth_token: None,
            request_timeout_seconds: 30,
        }
    }
}

/// LightRAG configuration section — absent base_url disables the graph
/// intelligence subsystem entirely.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LightRagYamlConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_seconds: u64,
    pub poll_interval_seconds: u64,
    pub workspace_timeout_seconds: u64,
    pub track_timeout_seconds: u64,
    pub max_retry_attempts: u32,
    pub graph_max_depth: u32,
    pub graph_max_nodes: u32,
    /// Operator-supplied summary prompt override.
    pub prompt: Option<String>,
    pub prompts_path: PathBuf,
}

impl Default for LightRagYamlConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            request_timeout_seconds: 30,
            poll_interval_seconds: 3,
            workspace_timeout_seconds: 180,
            track_timeout_seconds: 420,
            max_retry_attempts: 2,
            graph_max_depth: 3,
            graph_max_nodes: 500,
            prompt: None,
            prompts_path: PathBuf::from("resources/event_graph_prompts.json"),
        }
    }
}

/// Outbound proxy configuration section
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProxyYamlConfig {
    pub enabled: bool,
    pub url: Option<String>,
}

/// Background sync configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncYamlConfig {
    pub refresh_interval_seconds: u64,
    pub rebuild_queue_capacity: usize,
}

impl Default for SyncYamlConfig {
    fn default() -> Self {
        Self {
            refresh_interval_seconds: 300,
            rebuild_queue_capacity: 16,
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub secmaster: SecMasterConfig,
    pub graph: GraphConfig,
    pub sync_interval: Duration,
    pub rebuild_queue_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let secmaster = SecMasterConfig {
            base_url: std::env::var("SECMASTER_BASE_URL")
                .ok()
                .or(yaml.secmaster.base_url),
            project_id: std::env::var("SECMASTER_PROJECT_ID")
                .unwrap_or(yaml.secmaster.project_id),
            workspace_id: std::env::var("SECMASTER_WORKSPACE_ID")
                .unwrap_or(yaml.secmaster.workspace_id),
            auth_token: std::env::var("SECMASTER_AUTH_TOKEN")
                .ok()
                .or(yaml.secmaster.auth_token),
            request_timeout: Duration::from_secs(yaml.secmaster.request_timeout_seconds),
        };

        let graph = GraphConfig {
            base_url: std::env::var("LIGHTRAG_BASE_URL")
                .ok()
                .or(yaml.lightrag.base_url),
            api_key: std::env::var("LIGHTRAG_API_KEY")
                .ok()
                .or(yaml.lightrag.api_key),
            request_timeout: Duration::from_secs(yaml.lightrag.request_timeout_seconds),
            poll_interval: Duration::from_secs(yaml.lightrag.poll_interval_seconds),
            workspace_timeout: Duration::from_secs(yaml.lightrag.workspace_timeout_seconds),
            track_timeout: Duration::from_secs(yaml.lightrag.track_timeout_seconds),
            max_retry_attempts: yaml.lightrag.max_retry_attempts,
            graph_max_depth: yaml.lightrag.graph_max_depth,
            graph_max_nodes: yaml.lightrag.graph_max_nodes,
            prompt: yaml.lightrag.prompt,
            prompts_path: yaml.lightrag.prompts_path,
            proxy_url: yaml.proxy.url,
            proxy_enabled: yaml.proxy.enabled,
        };

        Ok(Self {
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.server.port),
            secmaster,
            graph,
            sync_interval: Duration::from_secs(
                std::env::var("SYNC_INTERVAL_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(yaml.sync.refresh_interval_seconds),
            ),
            rebuild_queue_capacity: yaml.sync.rebuild_queue_capacity,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

// ============================================================================
// Application state
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SnapshotStore>,
    pub source: Arc<dyn IncidentSource>,
    /// `None` when LightRAG is not configured.
    pub refresher: Option<Arc<GraphRefresher>>,
    pub scheduler: Arc<IncidentSyncScheduler>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state with all services wired together
    pub async fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn SnapshotStore> = Arc::new(MemorySnapshotStore::new());
        let source: Arc<dyn IncidentSource> = Arc::new(SecMasterClient::new(&config.secmaster)?);

        let refresher = if config.graph.is_configured() {
            let client = RemoteGraphClient::new(&config.graph)?;
            let orchestrator = Arc::new(GraphBundleOrchestrator::new(
                Arc::new(client),
                &config.graph,
            ));
            Some(Arc::new(GraphRefresher::new(
                orchestrator,
                store.clone(),
                source.clone(),
                Arc::new(BuildCoordinator::new()),
                config.rebuild_queue_capacity,
            )))
        } else {
            tracing::info!("LightRAG base_url not configured, graph intelligence disabled");
            None
        };

        let scheduler = Arc::new(IncidentSyncScheduler::new(
            store.clone(),
            source.clone(),
            refresher.clone(),
            config.sync_interval,
        ));

        Ok(Self {
            store,
            source,
            refresher,
            scheduler,
            config: Arc::new(config),
        })
    }
}

/// Start the console server: spawn the sync job and serve the API.
pub async fn start_server(config: Config) -> Result<()> {
    let port = config.server_port;
    let state = AppState::new(config).await?;

    state.scheduler.clone().spawn();

    let server_state = Arc::new(api::ServerState {
        store: state.store.clone(),
        refresher: state.refresher.clone(),
    });
    let router = api::create_router(server_state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Console API listening on {}", addr);

    axum::serve(listener, router).await.context("Server error")?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_config_loading() {
        let yaml = r#"
server:
  port: 9090

secmaster:
  base_url: https://secmaster.example.com
  project_id: proj-1
  workspace_id: ws-1
  auth_token: tok

lightrag:
  base_url: http://lightrag:9621
  api_key: rag-key
  poll_interval_seconds: 5
  max_retry_attempts: 3

proxy:
  enabled: true
  url: http://proxy.example.com:8080

sync:
  refresh_interval_seconds: 120
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(
            config.secmaster.base_url.as_deref(),
            Some("https://secmaster.example.com")
        );
        assert_eq!(config.secmaster.project_id, "proj-1");
        assert_eq!(config.lightrag.api_key.as_deref(), Some("rag-key"));
        assert_eq!(config.lightrag.poll_interval_seconds, 5);
        assert_eq!(config.lightrag.max_retry_attempts, 3);
        // Unspecified values fall back per-field
        assert_eq!(config.lightrag.track_timeout_seconds, 420);
        assert!(config.proxy.enabled);
        assert_eq!(config.sync.refresh_interval_seconds, 120);
        assert_eq!(config.sync.rebuild_queue_capacity, 16);
    }

    #[test]
    fn test_yaml_defaults() {
        let config = YamlConfig::default();
        assert_eq!(config.server.port, 8080);
        assert!(config.secmaster.base_url.is_none());
        assert!(config.lightrag.base_url.is_none());
        assert_eq!(config.lightrag.workspace_timeout_seconds, 180);
        assert!(!config.proxy.enabled);
        assert_eq!(config.sync.refresh_interval_seconds, 300);
    }

    /// Combined test for YAML file loading, env var overrides, and fallback
    /// to defaults. Runs as a single test to avoid parallel env var races.
    #[test]
    fn test_yaml_and_env_lifecycle() {
        fn clear_env() {
            for var in &[
                "SERVER_PORT",
                "SECMASTER_BASE_URL",
                "SECMASTER_PROJECT_ID",
                "SECMASTER_WORKSPACE_ID",
                "SECMASTER_AUTH_TOKEN",
                "LIGHTRAG_BASE_URL",
                "LIGHTRAG_API_KEY",
                "SYNC_INTERVAL_SECONDS",
            ] {
                std::env::remove_var(var);
            }
        }

        // --- Phase 1: YAML values loaded correctly ---
        let yaml = r#"
server:
  port: 9999
secmaster:
  base_url: https://yaml-siem.example.com
  project_id: yaml-proj
lightrag:
  base_url: http://yaml-rag:9621
sync:
  refresh_interval_seconds: 60
"#;
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        clear_env();

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.server_port, 9999);
        assert_eq!(
            config.secmaster.base_url.as_deref(),
            Some("https://yaml-siem.example.com")
        );
        assert_eq!(config.secmaster.project_id, "yaml-proj");
        assert!(config.graph.is_configured());
        assert_eq!(config.sync_interval, Duration::from_secs(60));

        // --- Phase 2: Env vars override YAML ---
        std::env::set_var("SECMASTER_BASE_URL", "https://env-siem.example.com");
        std::env::set_var("SERVER_PORT", "7777");
        std::env::set_var("SYNC_INTERVAL_SECONDS", "30");

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.server_port, 7777);
        assert_eq!(
            config.secmaster.base_url.as_deref(),
            Some("https://env-siem.example.com")
        );
        assert_eq!(config.sync_interval, Duration::from_secs(30));
        // YAML value still used where no env override
        assert_eq!(config.secmaster.project_id, "yaml-proj");

        clear_env();

        // --- Phase 3: No YAML file → defaults ---
        let nonexistent = Path::new("/tmp/nonexistent-config-54321.yaml");
        let config = Config::from_yaml_and_env(Some(nonexistent)).unwrap();
        assert_eq!(config.server_port, 8080);
        assert!(config.secmaster.base_url.is_none());
        assert!(!config.graph.is_configured());
        assert_eq!(config.sync_interval, Duration::from_secs(300));
    }
}
