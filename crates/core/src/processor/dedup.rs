//! Lifelog deduplication: fingerprint `content`, drop the incoming record if the store
//! already holds one with the same namespace+fingerprint at a later-or-equal `updated_at`.

use super::Processor;
use crate::errors::IngestError;
use crate::models::Record;
use crate::store::Store;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub struct Deduplication {
    store: Arc<Store>,
}

impl Deduplication {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

pub fn fingerprint(content: &str) -> String {
    let normalized: String = content
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(digest)
}

#[async_trait]
impl Processor for Deduplication {
    fn name(&self) -> &'static str {
        "deduplication"
    }

    async fn apply(&self, mut record: Record) -> Result<Option<Record>, IngestError> {
        let fp = fingerprint(&record.content);

        let existing = self
            .store
            .find_by_fingerprint(&record.namespace, &fp)
            .await
            .map_err(|e| IngestError::Processor {
                processor: self.name().to_string(),
                message: e.to_string(),
            })?;

        if let Some(existing) = existing {
            if existing.updated_at >= record.updated_at && existing.id != record.id {
                return Ok(None);
            }
        }

        record.metadata["fingerprint"] = serde_json::Value::String(fp);
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_normalizes_case_and_whitespace() {
        let a = fingerprint("Hello   World");
        let b = fingerprint("hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_for_different_content() {
        assert_ne!(fingerprint("a"), fingerprint("b"));
    }
}
