//! Lifelog conversation adapter (Limitless API).
//!
//! Grounded in `original_source/sources/limitless.py`: cursor-paginated `/v1/lifelogs`,
//! content assembled from a tree of content nodes with speaker attribution on blockquotes,
//! the full original payload preserved under `metadata.original_lifelog`.

use super::{FetchedItem, SourceAdapter};
use crate::config::LimitlessConfig;
use crate::http_client::LazyHttpClient;
use crate::retry::{HttpError, parse_retry_after, retry_with_policy, source_retry_policy};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::time::Duration;

pub struct LifelogAdapter {
    config: LimitlessConfig,
    client: LazyHttpClient,
}

impl LifelogAdapter {
    pub fn new(config: LimitlessConfig) -> Self {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        Self {
            config,
            client: LazyHttpClient::new(timeout),
        }
    }

    async fn fetch_page(&self, cursor: Option<&str>, since: Option<DateTime<Utc>>, limit: u32) -> Result<Value> {
        let policy = source_retry_policy("limitless");
        let url = format!("{}/v1/lifelogs", self.config.base_url);

        retry_with_policy(&policy, "limitless.fetch_page", || async {
            let mut query = vec![
                ("limit".to_string(), limit.to_string()),
                ("includeMarkdown".to_string(), "true".to_string()),
                ("includeHeadings".to_string(), "true".to_string()),
                ("timezone".to_string(), self.config.timezone.clone()),
            ];
            if let Some(cursor) = cursor {
                query.push(("cursor".to_string(), cursor.to_string()));
            }
            if let Some(since) = since {
                query.push(("start".to_string(), since.format("%Y-%m-%d %H:%M:%S").to_string()));
            }

            let response = self
                .client
                .get()
                .get(&url)
                .header("X-API-Key", self.config.api_key.clone().unwrap_or_default())
                .query(&query)
                .send()
                .await
                .map_err(|e| HttpError::Transport(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                response.json::<Value>().await.map_err(|e| HttpError::Parse(e.to_string()))
            } else {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after);
                Err(HttpError::Status {
                    status: status.as_u16(),
                    message: format!("limitless API returned status {status}"),
                    retry_after,
                })
            }
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))
    }
}

#[async_trait]
impl SourceAdapter for LifelogAdapter {
    fn namespace(&self) -> &str {
        "lifelog"
    }

    fn source_type(&self) -> &'static str {
        "limitless_api"
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    #[tracing::instrument(name = "adapter.lifelog.fetch_items", skip(self))]
    async fn fetch_items(&self, since: Option<DateTime<Utc>>, limit: usize) -> Result<Vec<FetchedItem>> {
        if !self.is_configured() {
            tracing::warn!("LIMITLESS_API_KEY is not configured; skipping lifelog fetch");
            return Ok(Vec::new());
        }

        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        while items.len() < limit {
            let remaining = (limit - items.len()).min(10) as u32;
            let data = self.fetch_page(cursor.as_deref(), since, remaining).await?;

            let lifelogs = data["data"]["lifelogs"].as_array().cloned().unwrap_or_default();
            if lifelogs.is_empty() {
                break;
            }

            for lifelog in &lifelogs {
                items.push(transform_lifelog(lifelog));
                if items.len() >= limit {
                    break;
                }
            }

            cursor = data["meta"]["lifelogs"]["nextCursor"].as_str().map(String::from);
            if cursor.is_none() {
                break;
            }
        }

        Ok(items)
    }

    #[tracing::instrument(name = "adapter.lifelog.get_item", skip(self))]
    async fn get_item(&self, source_id: &str) -> Result<Option<FetchedItem>> {
        if !self.is_configured() {
            return Ok(None);
        }
        let policy = source_retry_policy("limitless");
        let url = format!("{}/v1/lifelogs/{}", self.config.base_url, source_id);

        let result = retry_with_policy(&policy, "limitless.get_item", || async {
            let response = self
                .client
                .get()
                .get(&url)
                .header("X-API-Key", self.config.api_key.clone().unwrap_or_default())
                .query(&[("includeMarkdown", "true"), ("includeHeadings", "true")])
                .send()
                .await
                .context("limitless request failed")?;

            if response.status().is_success() {
                response.json::<Value>().await.context("failed to parse limitless response")
            } else {
                anyhow::bail!("limitless API returned status {}", response.status())
            }
        })
        .await;

        match result {
            Ok(data) => Ok(data["data"]["lifelog"].as_object().map(|_| transform_lifelog(&data["data"]["lifelog"]))),
            Err(_) => Ok(None),
        }
    }

    async fn test_connection(&self) -> Result<bool> {
        if !self.is_configured() {
            return Ok(false);
        }
        let url = format!("{}/v1/lifelogs", self.config.base_url);
        let response = self
            .client
            .get()
            .get(&url)
            .header("X-API-Key", self.config.api_key.clone().unwrap_or_default())
            .query(&[("limit", "1")])
            .send()
            .await
            .context("limitless connectivity test failed")?;
        Ok(response.status().is_success())
    }
}

fn transform_lifelog(lifelog: &Value) -> FetchedItem {
    let mut content_parts = Vec::new();
    if let Some(title) = lifelog["title"].as_str() {
        content_parts.push(title.to_string());
    }
    let empty = Vec::new();
    let nodes = lifelog["contents"].as_array().unwrap_or(&empty);
    content_parts.extend(extract_content_from_nodes(nodes));
    if content_parts.is_empty() {
        if let Some(markdown) = lifelog["markdown"].as_str() {
            content_parts.push(markdown.to_string());
        }
    }
    let content = content_parts.join("\n\n");

    let speakers = extract_speakers(nodes);
    let content_types = extract_content_types(nodes);

    let metadata = json!({
        "original_lifelog": lifelog,
        "title": lifelog["title"],
        "start_time": lifelog["startTime"],
        "end_time": lifelog["endTime"],
        "is_starred": lifelog["isStarred"].as_bool().unwrap_or(false),
        "updated_at": lifelog["updatedAt"],
        "speakers": speakers,
        "content_types": content_types,
        "has_markdown": lifelog["markdown"].as_str().is_some(),
        "node_count": nodes.len(),
    });

    let created_at = lifelog["startTime"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(&s.replace('Z', "+00:00")).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    FetchedItem {
        source_id: lifelog["id"].as_str().unwrap_or_default().to_string(),
        content,
        metadata,
        created_at,
    }
}

fn extract_content_from_nodes(nodes: &[Value]) -> Vec<String> {
    let mut parts = Vec::new();
    for node in nodes {
        if let Some(text) = node["content"].as_str() {
            if node["type"].as_str() == Some("blockquote") {
                if let Some(speaker_name) = node["speakerName"].as_str() {
                    let speaker = if node["speakerIdentifier"].as_str() == Some("user") {
                        format!("{speaker_name} (You)")
                    } else {
                        speaker_name.to_string()
                    };
                    parts.push(format!("{speaker}: {text}"));
                } else {
                    parts.push(text.to_string());
                }
            } else {
                parts.push(text.to_string());
            }
        }
        if let Some(children) = node["children"].as_array() {
            parts.extend(extract_content_from_nodes(children));
        }
    }
    parts
}

fn extract_speakers(nodes: &[Value]) -> Vec<String> {
    let mut speakers = std::collections::BTreeSet::new();
    collect_speakers(nodes, &mut speakers);
    speakers.into_iter().collect()
}

fn collect_speakers(nodes: &[Value], out: &mut std::collections::BTreeSet<String>) {
    for node in nodes {
        if let Some(name) = node["speakerName"].as_str() {
            out.insert(name.to_string());
        }
        if let Some(children) = node["children"].as_array() {
            collect_speakers(children, out);
        }
    }
}

fn extract_content_types(nodes: &[Value]) -> Vec<String> {
    let mut types = std::collections::BTreeSet::new();
    collect_content_types(nodes, &mut types);
    types.into_iter().collect()
}

fn collect_content_types(nodes: &[Value], out: &mut std::collections::BTreeSet<String>) {
    for node in nodes {
        if let Some(t) = node["type"].as_str() {
            out.insert(t.to_string());
        }
        if let Some(children) = node["children"].as_array() {
            collect_content_types(children, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transform_lifelog_joins_blockquote_speaker() {
        let lifelog = json!({
            "id": "abc123",
            "title": "Standup",
            "startTime": "2026-07-28T09:00:00Z",
            "contents": [
                {"type": "blockquote", "content": "let's ship it", "speakerName": "Alice", "speakerIdentifier": "user"}
            ]
        });
        let item = transform_lifelog(&lifelog);
        assert_eq!(item.source_id, "abc123");
        assert!(item.content.contains("Alice (You): let's ship it"));
        assert!(item.content.starts_with("Standup"));
    }

    #[test]
    fn transform_lifelog_falls_back_to_markdown() {
        let lifelog = json!({
            "id": "m1",
            "markdown": "raw markdown body"
        });
        let item = transform_lifelog(&lifelog);
        assert_eq!(item.content, "raw markdown body");
    }
}
