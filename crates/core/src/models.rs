//! Core domain types shared across adapters, the store, the ingestion service, and the
//! scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Status of a record's vector embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingStatus {
    Pending,
    Completed,
    Failed,
}

impl EmbeddingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingStatus::Pending => "pending",
            EmbeddingStatus::Completed => "completed",
            EmbeddingStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EmbeddingStatus::Pending),
            "completed" => Some(EmbeddingStatus::Completed),
            "failed" => Some(EmbeddingStatus::Failed),
            _ => None,
        }
    }
}

/// The universal unit of ingested data. `id` is always `"{namespace}:{source_id}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub namespace: String,
    pub source_id: String,
    pub content: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub days_date: String,
    pub embedding_status: EmbeddingStatus,
}

impl Record {
    /// Build a new record with `embedding_status = pending`, deriving `id` from
    /// `namespace`/`source_id` per the spec's composite-key contract.
    pub fn new(
        namespace: impl Into<String>,
        source_id: impl Into<String>,
        content: impl Into<String>,
        metadata: Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        let namespace = namespace.into();
        let source_id = source_id.into();
        let id = format!("{namespace}:{source_id}");
        Self {
            id,
            namespace,
            source_id,
            content: content.into(),
            metadata,
            created_at,
            updated_at: created_at,
            days_date: String::new(),
            embedding_status: EmbeddingStatus::Pending,
        }
    }
}

/// Registration of a single provider namespace with the ingestion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRegistration {
    pub namespace: String,
    pub source_type: String,
    pub sync_interval_secs: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_errors: u32,
    pub active: bool,
}

/// Per-namespace sync-state KV, persisted via the store's `settings` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub last_sync_timestamp: Option<DateTime<Utc>>,
    pub last_processed_id: Option<String>,
    pub last_result: Option<IngestSummary>,
}

/// Result of one `ingest_from_source` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSummary {
    pub namespace: String,
    pub items_processed: usize,
    pub items_stored: usize,
    pub items_skipped: usize,
    pub errors: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: i64,
}

impl IngestSummary {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Result of one `process_pending_embeddings` invocation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmbeddingDrainResult {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Status of a single scheduler job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Scheduled,
    Running,
    Paused,
    Cancelled,
}

/// Per-namespace health classification surfaced by the Sync Manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    StaleWarning,
    StaleCritical,
    Critical,
    Paused,
}

/// A namespace's health entry, as surfaced by `SyncManager::check_service_health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceHealth {
    pub namespace: String,
    pub status: HealthStatus,
    pub error_count: u32,
    pub last_error: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
    pub backpressure_warning: bool,
}

/// Aggregate health view across all registered namespaces.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HealthView {
    pub namespaces: HashMap<String, NamespaceHealth>,
}
