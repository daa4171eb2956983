//! The Ingestion Service (SPEC_FULL §4.E): the integration point binding adapters,
//! processors, the embedder, and the store together.
//!
//! Grounded in `original_source/services/ingestion.py`'s `IngestionService`: fetch, then
//! per-item store with per-item error isolation, then a separate embedding drain pass
//! rather than embedding inline during ingestion.

use crate::adapters::SourceAdapter;
use crate::config::Config;
use crate::embedder::Embedder;
use crate::models::{EmbeddingDrainResult, EmbeddingStatus, IngestSummary, Record};
use crate::processor::chain_for_namespace;
use crate::store::Store;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;

pub struct IngestionService {
    store: Arc<Store>,
    embedder: Arc<dyn Embedder>,
    overlap_window: std::time::Duration,
    default_timezone: String,
}

impl IngestionService {
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn new(store: Arc<Store>, embedder: Arc<dyn Embedder>, config: &Config) -> Self {
        Self {
            store,
            embedder,
            overlap_window: config.scheduler.overlap_window,
            default_timezone: config.timezone.clone(),
        }
    }

    #[tracing::instrument(name = "ingestion.ingest_from_source", skip(self, adapter), fields(namespace = adapter.namespace(), force_full = force_full))]
    pub async fn ingest_from_source(
        &self,
        adapter: &dyn SourceAdapter,
        force_full: bool,
        limit: usize,
    ) -> anyhow::Result<IngestSummary> {
        let namespace = adapter.namespace().to_string();
        let start = Utc::now();

        let since = if force_full {
            None
        } else {
            self.resolve_since(&namespace).await
        };

        let fetched = adapter.fetch_items(since, limit).await;
        let fetched = match fetched {
            Ok(items) => items,
            Err(err) => {
                let end = Utc::now();
                return Ok(IngestSummary {
                    namespace,
                    items_processed: 0,
                    items_stored: 0,
                    items_skipped: 0,
                    errors: vec![err.to_string()],
                    start,
                    end,
                    duration_ms: (end - start).num_milliseconds(),
                });
            }
        };

        let items_processed = fetched.len();
        let mut errors = Vec::new();

        let records: Vec<Record> = fetched
            .into_iter()
            .map(|item| {
                let mut record = Record::new(
                    namespace.clone(),
                    item.source_id,
                    item.content,
                    item.metadata,
                    item.created_at,
                );
                record.days_date = self.derive_days_date(&record, &namespace);
                record
            })
            .collect();

        let chain = chain_for_namespace(&namespace, Arc::clone(&self.store));
        let (processed_records, chain_errors) = chain.run(records).await;
        errors.extend(chain_errors.into_iter().map(|(id, err)| format!("{id}: {err}")));

        let mut items_stored = 0;
        for record in &processed_records {
            match self.store.store_item(record).await {
                Ok(()) => items_stored += 1,
                Err(err) => errors.push(format!("{}: {}", record.id, err)),
            }
        }

        let items_skipped = items_processed - processed_records.len();

        if errors.is_empty() {
            let now = Utc::now();
            let _ = self
                .store
                .set_setting(&namespace, "last_sync_timestamp", &now.to_rfc3339())
                .await;
            if let Some(last) = processed_records.last() {
                let _ = self.store.set_setting(&namespace, "last_processed_id", &last.id).await;
            }
        }

        let end = Utc::now();
        Ok(IngestSummary {
            namespace,
            items_processed,
            items_stored,
            items_skipped,
            errors,
            start,
            end,
            duration_ms: (end - start).num_milliseconds(),
        })
    }

    async fn resolve_since(&self, namespace: &str) -> Option<DateTime<Utc>> {
        let raw = self.store.get_setting(namespace, "last_sync_timestamp").await.ok().flatten()?;
        let parsed = DateTime::parse_from_rfc3339(&raw).ok()?.with_timezone(&Utc);
        Some(parsed - self.overlap_window_as_chrono())
    }

    fn overlap_window_as_chrono(&self) -> ChronoDuration {
        ChronoDuration::from_std(self.overlap_window).unwrap_or_else(|_| ChronoDuration::hours(1))
    }

    /// SPEC_FULL §4.E: metadata timestamp fields first, then `created_at`, then wall
    /// clock; converted to the namespace's timezone and truncated to `YYYY-MM-DD`.
    fn derive_days_date(&self, record: &Record, namespace: &str) -> String {
        let candidate = ["start_time", "forecast_start", "published_datetime_utc", "original_created_at"]
            .iter()
            .find_map(|field| record.metadata.get(field).and_then(|v| v.as_str()))
            .and_then(|s| DateTime::parse_from_rfc3339(&s.replace('Z', "+00:00")).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(record.created_at);

        let tz: chrono_tz::Tz = self.default_timezone.parse().unwrap_or(chrono_tz::UTC);
        let _ = namespace;
        candidate.with_timezone(&tz).format("%Y-%m-%d").to_string()
    }

    #[tracing::instrument(name = "ingestion.process_pending_embeddings", skip(self))]
    pub async fn process_pending_embeddings(&self, namespace: &str, batch_size: i64) -> anyhow::Result<EmbeddingDrainResult> {
        let pending = self.store.pending_embeddings(namespace, batch_size).await?;
        if pending.is_empty() {
            return Ok(EmbeddingDrainResult::default());
        }

        let texts: Vec<String> = pending.iter().map(|r| r.content.clone()).collect();
        let mut result = EmbeddingDrainResult {
            processed: pending.len(),
            ..Default::default()
        };

        match self.embedder.embed_batch(&texts).await {
            Ok(vectors) => {
                for (record, vector) in pending.iter().zip(vectors.into_iter()) {
                    match self
                        .store
                        .update_embedding_status(&record.id, EmbeddingStatus::Completed, Some(&vector))
                        .await
                    {
                        Ok(()) => result.successful += 1,
                        Err(err) => {
                            result.failed += 1;
                            result.errors.push(format!("{}: {}", record.id, err));
                            let _ = self.store.update_embedding_status(&record.id, EmbeddingStatus::Failed, None).await;
                        }
                    }
                }
            }
            Err(err) => {
                result.failed = pending.len();
                result.errors.push(format!("batch embedding failed: {err}"));
                for record in &pending {
                    let _ = self.store.update_embedding_status(&record.id, EmbeddingStatus::Failed, None).await;
                }
            }
        }

        Ok(result)
    }

    /// No per-item retry counter in v1 (DESIGN.md Open Question 1): every `failed` item
    /// in the namespace flips back to `pending` and rejoins the next drain.
    #[tracing::instrument(name = "ingestion.reprocess_failed_embeddings", skip(self))]
    pub async fn reprocess_failed_embeddings(&self, namespace: &str, batch_size: i64) -> anyhow::Result<EmbeddingDrainResult> {
        let reset_count = self.store.reset_failed_embeddings(namespace).await?;
        if reset_count == 0 {
            return Ok(EmbeddingDrainResult::default());
        }
        self.process_pending_embeddings(namespace, batch_size).await
    }
}
