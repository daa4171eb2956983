//! Appends a `processing_history` trail and materializes commonly-queried metadata
//! fields (speakers, content types, duration) so downstream consumers don't need to
//! dig into `metadata.original_lifelog` for them.

use super::Processor;
use crate::errors::IngestError;
use crate::models::Record;
use async_trait::async_trait;
use serde_json::json;

pub struct MetadataEnrichment;

#[async_trait]
impl Processor for MetadataEnrichment {
    fn name(&self) -> &'static str {
        "metadata_enrichment"
    }

    async fn apply(&self, mut record: Record) -> Result<Option<Record>, IngestError> {
        let history = record
            .metadata
            .get("processing_history")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let mut history = history;
        history.push(json!({
            "processor": self.name(),
            "applied_at": record.updated_at.to_rfc3339(),
        }));
        record.metadata["processing_history"] = json!(history);

        if record.metadata.get("source_type").and_then(|v| v.as_str()).is_none() {
            record.metadata["source_type"] = json!(record.namespace.clone());
        }

        if let Some(speakers) = record.metadata.get("speakers").cloned() {
            record.metadata["speaker_count"] = json!(speakers.as_array().map(|a| a.len()).unwrap_or(0));
        }

        if let (Some(start), Some(end)) = (
            record.metadata.get("start_time").and_then(|v| v.as_str()),
            record.metadata.get("end_time").and_then(|v| v.as_str()),
        ) {
            if let (Ok(start), Ok(end)) = (
                chrono::DateTime::parse_from_rfc3339(start),
                chrono::DateTime::parse_from_rfc3339(end),
            ) {
                let duration_secs = (end - start).num_seconds().max(0);
                record.metadata["duration_secs"] = json!(duration_secs);
            }
        }

        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn appends_processing_history_and_default_source_type() {
        let record = Record::new("news", "1", "content", json!({}), chrono::Utc::now());
        let result = MetadataEnrichment.apply(record).await.unwrap().unwrap();
        assert_eq!(result.metadata["processing_history"].as_array().unwrap().len(), 1);
        assert_eq!(result.metadata["source_type"], "news");
    }

    #[tokio::test]
    async fn computes_duration_from_start_and_end_time() {
        let record = Record::new(
            "lifelog",
            "1",
            "content",
            json!({"start_time": "2026-07-28T09:00:00Z", "end_time": "2026-07-28T09:05:00Z"}),
            chrono::Utc::now(),
        );
        let result = MetadataEnrichment.apply(record).await.unwrap().unwrap();
        assert_eq!(result.metadata["duration_secs"], 300);
    }
}
