//! LightRAG client and orchestrator integration tests.
//!
//! Drives the real `RemoteGraphClient` against a scripted wiremock server so
//! the full HTTP surface — query params, envelopes, retries, label fallback,
//! poll timeouts — is exercised without a live backend.

use serde_json::json;
use soc_console::graph::{
    GraphBundleOrchestrator, GraphConfig, GraphServiceError, RemoteGraphClient,
};
use soc_console::incident::{Alert, Incident};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer) -> GraphConfig {
    GraphConfig {
        base_url: Some(server.uri()),
        poll_interval: Duration::from_millis(25),
        workspace_timeout: Duration::from_millis(300),
        track_timeout: Duration::from_millis(500),
        max_retry_attempts: 2,
        prompts_path: "/nonexistent/prompts.json".into(),
        ..Default::default()
    }
}

fn client(server: &MockServer) -> RemoteGraphClient {
    RemoteGraphClient::new(&test_config(server)).unwrap()
}

fn incident_with_alerts() -> (Incident, Vec<Alert>) {
    let incident = Incident {
        id: "INC-1".to_string(),
        title: Some("ssh brute force".to_string()),
        severity: Some("High".to_string()),
        handle_status: Some("Open".to_string()),
        alert_list: vec!["a-1".to_string(), "a-2".to_string()],
        ..Default::default()
    };
    let alerts = vec![
        Alert {
            id: "a-1".to_string(),
            title: Some("failed logins".to_string()),
            ..Default::default()
        },
        Alert {
            id: "a-2".to_string(),
            title: Some("new admin user".to_string()),
            ..Default::default()
        },
    ];
    (incident, alerts)
}

// ============================================================================
// Full bundle generation
// ============================================================================

#[tokio::test]
async fn test_generate_bundle_happy_path() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/documents/status_counts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status_counts": {}})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/documents/text"))
        .and(body_partial_json(json!({"file_source": "incident::INC-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"track_id": "t-1"})))
        .expect(1)
        .mount(&server)
        .await;

    // First poll still processing, second poll done
    Mock::given(method("GET"))
        .and(path("/documents/track_status/t-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [{"id": "doc-1", "status": "PROCESSING"}]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/documents/track_status/t-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [{"id": "doc-1", "status": "PROCESSED"}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/graph/label/list"))
        .and(query_param("doc_id", "doc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"labels": ["INC-1"]})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/graphs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "graph": {"nodes": [{"id": "n1"}], "edges": []}
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"response": "attackers brute forced ssh"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = GraphBundleOrchestrator::new(
        Arc::new(client(&server)),
        &test_config(&server),
    );
    let (incident, alerts) = incident_with_alerts();

    let (graph_data, graph_summary) = orchestrator
        .generate_graph_bundle(&incident, &alerts)
        .await
        .unwrap();

    assert_eq!(graph_data["nodes"][0]["id"], "n1");
    assert_eq!(graph_summary.as_deref(), Some("attackers brute forced ssh"));
    // expectations (exactly one insert, one query, one delete) verified on drop
}

// ============================================================================
// Label fallback
// ============================================================================

#[tokio::test]
async fn test_fetch_graph_falls_back_through_labels_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/graph/label/list"))
        .and(query_param("doc_id", "doc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"labels": ["doc-title"]})))
        .expect(1)
        .mount(&server)
        .await;

    // Each failing label is hit twice: once plus the request-level retry
    Mock::given(method("GET"))
        .and(path("/graphs"))
        .and(query_param("label", "*"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/graphs"))
        .and(query_param("label", "doc-title"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/graphs"))
        .and(query_param("label", "incident"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"nodes": [], "edges": []})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let graph = client(&server)
        .fetch_graph_data(Some("doc-1"), &["incident".to_string()])
        .await
        .unwrap();

    assert!(graph.get("nodes").is_some());
}

#[tokio::test]
async fn test_fetch_graph_exhausted_labels_carries_last_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/graphs"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_graph_data(None, &["incident".to_string()])
        .await
        .unwrap_err();

    match err {
        GraphServiceError::LabelsExhausted { tried, .. } => {
            assert_eq!(tried, vec!["*".to_string(), "incident".to_string()]);
        }
        other => panic!("expected LabelsExhausted, got {:?}", other),
    }
}

// ============================================================================
// Workspace hygiene
// ============================================================================

#[tokio::test]
async fn test_ensure_workspace_empty_times_out_on_stuck_pipeline() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/documents/status_counts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status_counts": {"PROCESSING": 2}})),
        )
        .mount(&server)
        .await;

    let start = Instant::now();
    let err = client(&server).ensure_workspace_empty().await.unwrap_err();

    assert!(
        start.elapsed() >= Duration::from_millis(300),
        "must not give up before the workspace timeout"
    );
    assert!(matches!(err, GraphServiceError::Timeout { .. }));
}

#[tokio::test]
async fn test_ensure_workspace_empty_clears_terminal_leftovers() {
    let server = MockServer::start().await;

    // First poll sees PROCESSED debris from an earlier job, later polls see
    // an empty workspace.
    Mock::given(method("GET"))
        .and(path("/documents/status_counts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status_counts": {"PROCESSED": 2}})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/documents/status_counts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status_counts": {}})))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).ensure_workspace_empty().await.unwrap();
}

#[tokio::test]
async fn test_clear_documents_retries_on_busy_and_never_fails() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "busy"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    // Returns normally whatever happens
    client(&server).clear_documents().await;
}

// ============================================================================
// Request plumbing
// ============================================================================

#[tokio::test]
async fn test_api_key_attached_and_counts_coerced() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/documents/status_counts"))
        .and(query_param("api_key_header_value", "secret-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status_counts": {"PENDING": "3", "FAILED": null, "PROCESSED": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = GraphConfig {
        api_key: Some("secret-key".to_string()),
        ..test_config(&server)
    };
    let client = RemoteGraphClient::new(&config).unwrap();

    let counts = client.get_status_counts().await.unwrap();
    assert_eq!(counts.get("PENDING"), Some(&3));
    assert_eq!(counts.get("FAILED"), Some(&0));
    assert_eq!(counts.get("PROCESSED"), Some(&1));
}

#[tokio::test]
async fn test_insert_text_without_track_id_is_invalid() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/documents/text"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let err = client(&server)
        .insert_text("payload", None)
        .await
        .unwrap_err();
    assert!(matches!(err, GraphServiceError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_insert_text_reads_nested_track_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/documents/text"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"track_id": "t-9"}})),
        )
        .mount(&server)
        .await;

    let track_id = client(&server).insert_text("payload", None).await.unwrap();
    assert_eq!(track_id, "t-9");
}

#[tokio::test]
async fn test_track_failure_status_fails_fast() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/documents/track_status/t-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [
                {"id": "doc-1", "status": "PROCESSED"},
                {"id": "doc-2", "status": "FAILED"}
            ]
        })))
        .mount(&server)
        .await;

    let start = Instant::now();
    let err = client(&server)
        .wait_for_track_completion("t-1")
        .await
        .unwrap_err();

    assert!(matches!(err, GraphServiceError::DocumentsFailed { .. }));
    assert!(
        start.elapsed() < Duration::from_millis(400),
        "terminal failure must not wait for the track timeout"
    );
}

#[tokio::test]
async fn test_track_wait_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/documents/track_status/t-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [{"id": "doc-1", "status": "PROCESSING"}]
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .wait_for_track_completion("t-1")
        .await
        .unwrap_err();
    assert!(matches!(err, GraphServiceError::Timeout { .. }));
}

#[tokio::test]
async fn test_query_summary_reads_response_then_data_field() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "from data"})))
        .mount(&server)
        .await;

    let summary = client(&server).query_summary("prompt").await.unwrap();
    assert_eq!(summary.as_deref(), Some("from data"));
}
