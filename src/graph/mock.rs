//! In-memory mock implementation of GraphBackend for testing.
//!
//! Records every operation in call order, counts inserts/clears, and can be
//! scripted to fail the first N inserts or fetches. An optional per-op delay
//! widens race windows for the serialization tests.

use super::error::GraphServiceError;
use super::traits::{GraphBackend, TrackDocument};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) struct MockGraphBackend {
    /// Operation names in the order they were called.
    pub ops: Mutex<Vec<String>>,
    pub insert_calls: AtomicU32,
    pub clear_calls: AtomicU32,
    /// Fail this many insert_text calls before succeeding.
    pub fail_inserts: AtomicU32,
    /// Fail this many fetch_graph_data calls before succeeding.
    pub fail_fetches: AtomicU32,
    pub op_delay: Duration,
    pub graph: Value,
    pub summary: Option<String>,
}

impl MockGraphBackend {
    pub fn new() -> Self {
        Self {
            ops: Mutex::new(Vec::new()),
            insert_calls: AtomicU32::new(0),
            clear_calls: AtomicU32::new(0),
            fail_inserts: AtomicU32::new(0),
            fail_fetches: AtomicU32::new(0),
            op_delay: Duration::ZERO,
            graph: json!({
                "nodes": [{"id": "attacker"}, {"id": "host-1"}],
                "edges": [{"source": "attacker", "target": "host-1"}],
            }),
            summary: Some("mock incident summary".to_string()),
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            op_delay: delay,
            ..Self::new()
        }
    }

    pub fn op_log(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    async fn record(&self, op: &str) {
        self.ops.lock().unwrap().push(op.to_string());
        if !self.op_delay.is_zero() {
            tokio::time::sleep(self.op_delay).await;
        }
    }

    fn scripted_failure(counter: &AtomicU32, op: &str) -> Option<GraphServiceError> {
        let mut remaining = counter.load(Ordering::SeqCst);
        while remaining > 0 {
            match counter.compare_exchange(
                remaining,
                remaining - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    return Some(GraphServiceError::Request {
                        method: "MOCK".into(),
                        path: op.into(),
                        message: "scripted failure".into(),
                    })
                }
                Err(actual) => remaining = actual,
            }
        }
        None
    }
}

#[async_trait]
impl GraphBackend for MockGraphBackend {
    async fn ensure_workspace_empty(&self) -> Result<(), GraphServiceError> {
        self.record("ensure_workspace_empty").await;
        Ok(())
    }

    async fn insert_text(
        &self,
        _text: &str,
        _file_source: Option<&str>,
    ) -> Result<String, GraphServiceError> {
        self.record("insert_text").await;
        if let Some(err) = Self::scripted_failure(&self.fail_inserts, "insert_text") {
            return Err(err);
        }
        let n = self.insert_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("track-{}", n))
    }

    async fn wait_for_track_completion(
        &self,
        _track_id: &str,
    ) -> Result<Vec<TrackDocument>, GraphServiceError> {
        self.record("wait_for_track_completion").await;
        Ok(vec![TrackDocument {
            id: Some("doc-1".to_string()),
            status: Some("PROCESSED".to_string()),
        }])
    }

    async fn fetch_graph_data(
        &self,
        _doc_id: Option<&str>,
        _label_candidates: &[String],
    ) -> Result<Value, GraphServiceError> {
        self.record("fetch_graph_data").await;
        if let Some(err) = Self::scripted_failure(&self.fail_fetches, "fetch_graph_data") {
            return Err(err);
        }
        Ok(self.graph.clone())
    }

    async fn query_summary(&self, _prompt: &str) -> Result<Option<String>, GraphServiceError> {
        self.record("query_summary").await;
        Ok(self.summary.clone())
    }

    async fn clear_documents(&self) {
        self.record("clear_documents").await;
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
    }
}
