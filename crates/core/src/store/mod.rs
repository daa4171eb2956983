//! The transactional relational + vector store (SPEC_FULL §4.D).
//!
//! `Store` is the single façade the rest of the engine talks to; it owns a sqlite
//! connection pool for item/settings data and a [`vector::VectorIndex`] for embeddings,
//! and keeps the two consistent: an item's embedding is only marked `completed` once its
//! vector has actually landed in the index.

pub mod relational;
pub mod settings;
pub mod vector;

use crate::config::StoreConfig;
use crate::models::{EmbeddingStatus, Record};
use anyhow::{Context, Result};
use sqlx::sqlite::{SqlitePoolOptions, SqliteConnectOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use vector::VectorIndex;

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS data_items (
    id TEXT PRIMARY KEY,
    namespace TEXT NOT NULL,
    source_id TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    days_date TEXT NOT NULL,
    embedding_status TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_data_items_namespace ON data_items (namespace);
CREATE INDEX IF NOT EXISTS idx_data_items_namespace_days ON data_items (namespace, days_date);
CREATE INDEX IF NOT EXISTS idx_data_items_embedding_status ON data_items (embedding_status);

CREATE TABLE IF NOT EXISTS data_sources (
    namespace TEXT PRIMARY KEY,
    source_type TEXT NOT NULL,
    sync_interval_secs INTEGER NOT NULL,
    last_success TEXT,
    consecutive_errors INTEGER NOT NULL DEFAULT 0,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS settings (
    namespace TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (namespace, key)
);
"#;

pub struct Store {
    pub(crate) pool: SqlitePool,
    pub(crate) vectors: Arc<VectorIndex>,
}

impl Store {
    #[tracing::instrument(name = "store.open", skip(config))]
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("failed to create data dir '{}'", config.data_dir))?;

        let connect_options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.db_path()))
            .context("invalid sqlite connect options")?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(connect_options)
            .await
            .context("failed to open sqlite pool")?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .context("failed to apply schema")?;

        let vectors = VectorIndex::open(config.vectors_idx_path(), config.vectors_map_path())
            .await
            .context("failed to open vector index")?;

        Ok(Self {
            pool,
            vectors: Arc::new(vectors),
        })
    }

    pub async fn store_item(&self, record: &Record) -> Result<()> {
        relational::store_item(&self.pool, record).await
    }

    pub async fn get_item(&self, id: &str) -> Result<Option<Record>> {
        relational::get_item(&self.pool, id).await
    }

    pub async fn pending_embeddings(&self, namespace: &str, limit: i64) -> Result<Vec<Record>> {
        relational::pending_embeddings(&self.pool, namespace, limit).await
    }

    pub async fn update_embedding_status(
        &self,
        id: &str,
        status: EmbeddingStatus,
        embedding: Option<&[f32]>,
    ) -> Result<()> {
        if let (EmbeddingStatus::Completed, Some(vector)) = (status, embedding) {
            self.vectors.add(id, vector).await?;
        }
        relational::update_embedding_status(&self.pool, id, status).await
    }

    pub async fn delete_item(&self, id: &str) -> Result<()> {
        self.vectors.remove(id).await?;
        relational::delete_item(&self.pool, id).await
    }

    pub async fn clear_namespace(&self, namespace: &str) -> Result<u64> {
        self.vectors.remove_namespace(namespace).await?;
        relational::clear_namespace(&self.pool, namespace).await
    }

    pub async fn get_items_by_date(&self, namespace: &str, days_date: &str) -> Result<Vec<Record>> {
        relational::get_items_by_date(&self.pool, namespace, days_date).await
    }

    pub async fn find_by_fingerprint(&self, namespace: &str, fingerprint: &str) -> Result<Option<Record>> {
        relational::find_by_fingerprint(&self.pool, namespace, fingerprint).await
    }

    pub async fn existing_source_ids(&self, namespace: &str) -> Result<std::collections::HashSet<String>> {
        relational::existing_source_ids(&self.pool, namespace).await
    }

    pub async fn count_pending_embeddings(&self, namespace: &str) -> Result<i64> {
        relational::count_pending_embeddings(&self.pool, namespace).await
    }

    pub async fn reset_failed_embeddings(&self, namespace: &str) -> Result<u64> {
        relational::reset_failed_embeddings(&self.pool, namespace).await
    }

    pub async fn search(&self, query_vector: &[f32], namespace: Option<&str>, top_k: usize) -> Result<Vec<vector::SearchHit>> {
        self.vectors.search(query_vector, namespace, top_k).await
    }

    pub async fn get_setting(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        settings::get_setting(&self.pool, namespace, key).await
    }

    pub async fn set_setting(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        settings::set_setting(&self.pool, namespace, key, value).await
    }
}
