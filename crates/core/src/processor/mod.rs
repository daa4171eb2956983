//! The processor chain (SPEC_FULL §4.C): a sequence of pure `Record -> Record`
//! transforms, with an optional batch form for processors where batching is cheaper than
//! per-item work.
//!
//! A processor can also drop a record entirely (the deduplication stage), modeled as
//! `apply` returning `Ok(None)`.

pub mod cleaning;
pub mod dedup;
pub mod enrichment;
pub mod segmentation;

use crate::errors::IngestError;
use crate::models::Record;
use async_trait::async_trait;

#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(&self, record: Record) -> Result<Option<Record>, IngestError>;

    /// Batch form. Default delegates to `apply` per item; a processor overriding this
    /// (e.g. deduplication, which needs to see the whole batch to fingerprint against
    /// itself) should still keep per-item failures isolated per the SPEC_FULL §4.C
    /// "whole batch MUST NOT poison other batches" rule.
    async fn apply_batch(&self, records: Vec<Record>) -> BatchResult {
        let mut kept = Vec::with_capacity(records.len());
        let mut errors = Vec::new();
        for record in records {
            let id = record.id.clone();
            match self.apply(record).await {
                Ok(Some(record)) => kept.push(record),
                Ok(None) => {}
                Err(err) => errors.push((id, err)),
            }
        }
        BatchResult { kept, errors }
    }
}

pub struct BatchResult {
    pub kept: Vec<Record>,
    pub errors: Vec<(String, IngestError)>,
}

/// An ordered chain of processors for one namespace. Runs `apply_batch` for each stage in
/// turn; a stage's per-item errors are surfaced to the caller, its survivors proceed to
/// the next stage.
pub struct ProcessorChain {
    stages: Vec<Box<dyn Processor>>,
}

impl ProcessorChain {
    pub fn new(stages: Vec<Box<dyn Processor>>) -> Self {
        Self { stages }
    }

    /// The chain applied when a namespace has no dedicated registration: whitespace
    /// cleanup plus metadata enrichment, per SPEC_FULL §4.C.
    pub fn default_chain() -> Self {
        Self::new(vec![
            Box::new(cleaning::BasicCleaning),
            Box::new(enrichment::MetadataEnrichment),
        ])
    }

    /// The lifelog chain: cleaning, then dedup (which may drop records), then
    /// segmentation of long conversational content, then enrichment last so
    /// `processing_history` reflects every stage that actually ran. Dedup needs to check
    /// prior fingerprints against the store, so it's the one stage that takes a handle.
    pub fn lifelog_chain(store: std::sync::Arc<crate::store::Store>) -> Self {
        Self::new(vec![
            Box::new(cleaning::BasicCleaning),
            Box::new(dedup::Deduplication::new(store)),
            Box::new(segmentation::Segmentation::default()),
            Box::new(enrichment::MetadataEnrichment),
        ])
    }

    #[tracing::instrument(name = "processor.run_chain", skip(self, records), fields(stage_count = self.stages.len(), batch_size = records.len()))]
    pub async fn run(&self, mut records: Vec<Record>) -> (Vec<Record>, Vec<(String, IngestError)>) {
        let mut errors = Vec::new();
        for stage in &self.stages {
            let result = stage.apply_batch(records).await;
            records = result.kept;
            errors.extend(result.errors);
        }
        (records, errors)
    }
}

pub fn chain_for_namespace(namespace: &str, store: std::sync::Arc<crate::store::Store>) -> ProcessorChain {
    match namespace {
        "lifelog" => ProcessorChain::lifelog_chain(store),
        _ => ProcessorChain::default_chain(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn default_chain_cleans_and_enriches() {
        let chain = ProcessorChain::default_chain();
        let record = Record::new("news", "1", "  hello   world  ", json!({}), chrono::Utc::now());
        let (kept, errors) = chain.run(vec![record]).await;
        assert!(errors.is_empty());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].content, "hello world");
        assert!(kept[0].metadata["processing_history"].is_array());
    }
}
