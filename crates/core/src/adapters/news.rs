//! News headline adapter.
//!
//! Grounded in `original_source/sources/news.py`: one request per sync, capped at
//! `unique_items_per_day`, `source_id` derived from a sha1 hash of the article link since
//! the provider has no stable per-article id. The same-day dedup check
//! (`_has_news_data_for_date`) stays inside the adapter rather than the ingestion service —
//! see `DESIGN.md` Open Question 2.

use super::{FetchedItem, SourceAdapter};
use crate::config::NewsConfig;
use crate::http_client::LazyHttpClient;
use crate::retry::{HttpError, parse_retry_after, retry_with_policy, source_retry_policy};
use crate::store::Store;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use sha1::{Digest, Sha1};
use std::sync::Arc;
use std::time::Duration;

pub struct NewsAdapter {
    config: NewsConfig,
    client: LazyHttpClient,
    store: Arc<Store>,
}

impl NewsAdapter {
    pub fn new(config: NewsConfig, store: Arc<Store>) -> Self {
        Self {
            client: LazyHttpClient::new(Duration::from_secs(30)),
            config,
            store,
        }
    }

    pub async fn fetch_headlines(&self) -> Result<Vec<FetchedItem>> {
        let policy = source_retry_policy("news");
        let url = format!("https://{}/top-headlines", self.config.api_host);

        let data = retry_with_policy(&policy, "news.fetch_headlines", || async {
            let response = self
                .client
                .get()
                .get(&url)
                .header("x-rapidapi-key", self.config.api_key.clone().unwrap_or_default())
                .header("x-rapidapi-host", self.config.api_host.clone())
                .query(&[
                    ("limit", self.config.items_to_retrieve.to_string()),
                    ("country", self.config.country.clone()),
                    ("lang", self.config.lang.clone()),
                ])
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
                    message: format!("news API returned status {status}"),
                    retry_after,
                })
            }
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

        let articles = data["data"].as_array().cloned().unwrap_or_default();
        let items = articles
            .iter()
            .filter_map(transform_article)
            .take(self.config.unique_items_per_day)
            .collect();
        Ok(items)
    }
}

#[async_trait]
impl SourceAdapter for NewsAdapter {
    fn namespace(&self) -> &str {
        "news"
    }

    fn source_type(&self) -> &'static str {
        "news_api"
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured() && !self.config.api_host.is_empty()
    }

    #[tracing::instrument(name = "adapter.news.fetch_items", skip(self, _since))]
    async fn fetch_items(&self, _since: Option<DateTime<Utc>>, _limit: usize) -> Result<Vec<FetchedItem>> {
        if !self.is_configured() {
            tracing::warn!("news source is not configured; skipping fetch");
            return Ok(Vec::new());
        }

        let today = Utc::now().format("%Y-%m-%d").to_string();
        if !self.store.get_items_by_date("news", &today).await?.is_empty() {
            tracing::info!(date = %today, "news already has a record for today; skipping fetch");
            return Ok(Vec::new());
        }

        self.fetch_headlines().await
    }

    async fn test_connection(&self) -> Result<bool> {
        if !self.is_configured() {
            return Ok(false);
        }
        let url = format!("https://{}/top-headlines", self.config.api_host);
        let response = self
            .client
            .get()
            .get(&url)
            .header("x-rapidapi-key", self.config.api_key.clone().unwrap_or_default())
            .header("x-rapidapi-host", self.config.api_host.clone())
            .query(&[("limit", "1"), ("country", &self.config.country), ("lang", &self.config.lang)])
            .send()
            .await
            .context("news connectivity test failed")?;
        Ok(response.status().is_success())
    }
}

fn transform_article(article: &Value) -> Option<FetchedItem> {
    let title = article["title"].as_str().unwrap_or_default();
    let link = article["link"].as_str().unwrap_or_default();
    if title.is_empty() || link.is_empty() {
        return None;
    }
    let snippet = article["snippet"].as_str().unwrap_or_default();

    let mut content_parts = vec![title.to_string()];
    if !snippet.is_empty() {
        content_parts.push(snippet.to_string());
    }
    let content = content_parts.join("\n\n");

    let metadata = json!({
        "title": title,
        "link": link,
        "snippet": snippet,
        "thumbnail_url": article["thumbnail_url"],
        "published_datetime_utc": article["published_datetime_utc"],
        "source_type": "news_api",
    });

    let created_at = article["published_datetime_utc"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(&s.replace('Z', "+00:00")).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let source_id = hex::encode(Sha1::digest(link.as_bytes()));

    Some(FetchedItem {
        source_id,
        content,
        metadata,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_article_hashes_link_for_source_id() {
        let article = json!({
            "title": "Headline",
            "link": "https://example.com/a",
            "snippet": "body",
            "published_datetime_utc": "2026-07-28T00:00:00Z",
        });
        let item = transform_article(&article).unwrap();
        assert_eq!(item.source_id, hex::encode(Sha1::digest(b"https://example.com/a")));
        assert!(item.content.contains("Headline"));
        assert!(item.content.contains("body"));
    }

    #[test]
    fn transform_article_skips_missing_title_or_link() {
        let article = json!({"title": "", "link": "https://example.com/a"});
        assert!(transform_article(&article).is_none());
    }
}
