//! The embedding provider client: a single batch HTTP call behind a circuit breaker.
//!
//! Grounded in the teacher's embedder client (one `reqwest` batch call, wrapped in
//! `with_circuit_breaker`) but trimmed to the one provider this engine needs instead of
//! the teacher's multi-provider dispatch.

use crate::circuit_breaker::{CircuitBreaker, with_circuit_breaker};
use crate::config::EmbedderConfig;
use crate::http_client::LazyHttpClient;
use crate::retry::{qdrant_retry_policy, retry_with_policy};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in the same order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}

pub struct HttpEmbedder {
    config: EmbedderConfig,
    client: LazyHttpClient,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl HttpEmbedder {
    pub fn new(config: EmbedderConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        Self {
            config,
            client: LazyHttpClient::new(timeout),
            circuit_breaker: CircuitBreaker::for_embedder(),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    #[tracing::instrument(name = "embedder.embed_batch", skip(self, texts), fields(batch_size = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let policy = qdrant_retry_policy();
        let url = format!("{}/v1/embeddings", self.config.base_url);

        let response = with_circuit_breaker(&self.circuit_breaker, || async {
            retry_with_policy(&policy, "embedder.embed_batch", || async {
                let mut request = self.client.get().post(&url).json(&EmbedRequest {
                    model: &self.config.model,
                    input: texts,
                });
                if let Some(api_key) = &self.config.api_key {
                    request = request.bearer_auth(api_key);
                }

                let response = request.send().await.context("embedder request failed")?;
                if response.status().is_success() {
                    response
                        .json::<EmbedResponse>()
                        .await
                        .context("failed to parse embedder response")
                } else {
                    anyhow::bail!("embedder API returned status {}", response.status())
                }
            })
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

        if response.data.len() != texts.len() {
            anyhow::bail!(
                "embedder returned {} vectors for {} inputs",
                response.data.len(),
                texts.len()
            );
        }

        Ok(response.data.into_iter().map(|entry| entry.embedding).collect())
    }
}
