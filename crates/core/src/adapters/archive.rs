//! Twitter archive importer.
//!
//! Grounded in `original_source/sources/twitter.py`: a one-shot `import_from_zip` that
//! extracts `tweets.js` from the user's Twitter/X data export, strips the
//! `window.YTD.tweets.part0 = [ ... ]` wrapper the export format adds, and parses the
//! remainder as a JSON array. Unlike the other three namespaces this adapter has no
//! recurring sync cadence (SPEC_FULL §4.B/§4.G) — a single `fetch_items` call imports the
//! configured archive once, skipping any tweet whose `source_id` the Store already holds.

use super::{FetchedItem, SourceAdapter};
use crate::config::TwitterConfig;
use crate::store::Store;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Value, json};
use std::io::Read;
use std::sync::Arc;

pub struct ArchiveAdapter {
    config: TwitterConfig,
    store: Arc<Store>,
}

impl ArchiveAdapter {
    pub fn new(config: TwitterConfig, store: Arc<Store>) -> Self {
        Self { config, store }
    }

    #[tracing::instrument(name = "adapter.archive.import_from_zip", skip(self, zip_path))]
    pub fn import_from_zip(&self, zip_path: &str) -> Result<Vec<FetchedItem>> {
        if !self.config.is_configured() {
            tracing::warn!("twitter archive source not enabled; skipping import");
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(zip_path).with_context(|| format!("failed to open archive '{zip_path}'"))?;
        let mut archive = zip::ZipArchive::new(file).context("failed to read zip archive")?;

        let tweets_js_index = (0..archive.len())
            .find(|&i| {
                archive
                    .by_index(i)
                    .map(|f| f.name().ends_with("tweets.js"))
                    .unwrap_or(false)
            })
            .context("tweets.js not found in the extracted archive")?;

        let mut contents = String::new();
        archive
            .by_index(tweets_js_index)
            .context("failed to read tweets.js entry")?
            .read_to_string(&mut contents)
            .context("failed to decode tweets.js as utf-8")?;

        let json_array = unwrap_export_envelope(&contents);
        let tweets: Vec<Value> = serde_json::from_str(&json_array).context("failed to parse tweets.js as JSON")?;

        Ok(parse_tweets(&tweets))
    }
}

fn unwrap_export_envelope(contents: &str) -> String {
    for marker in ["window.YTD.tweets.part0 = [", "window.YTD.tweet.part0 = ["] {
        if let Some(rest) = contents.split_once(marker) {
            if let Some(body) = rest.1.rsplit_once(']') {
                return format!("[{}]", body.0);
            }
        }
    }
    format!("[{contents}]")
}

fn parse_tweets(tweets: &[Value]) -> Vec<FetchedItem> {
    tweets
        .iter()
        .filter_map(|item| {
            let tweet = item.get("tweet")?;
            let tweet_id = tweet["id_str"].as_str()?.to_string();
            let created_at_str = tweet["created_at"].as_str()?;
            let created_at = parse_twitter_timestamp(created_at_str)?;

            let media_urls: Vec<String> = tweet["entities"]["media"]
                .as_array()
                .map(|media| {
                    media
                        .iter()
                        .filter_map(|m| m["media_url_https"].as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();

            let text = tweet["full_text"].as_str().unwrap_or_default().to_string();

            Some(FetchedItem {
                source_id: tweet_id,
                content: text,
                metadata: json!({ "media_urls": media_urls }),
                created_at,
            })
        })
        .collect()
}

/// Twitter's export timestamp format: `"Mon Jan 02 15:04:05 +0000 2006"`.
fn parse_twitter_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, "%a %b %d %H:%M:%S %z %Y").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

#[async_trait]
impl SourceAdapter for ArchiveAdapter {
    fn namespace(&self) -> &str {
        "twitter"
    }

    fn source_type(&self) -> &'static str {
        "twitter_archive"
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    #[tracing::instrument(name = "adapter.archive.fetch_items", skip(self, _since))]
    async fn fetch_items(&self, _since: Option<DateTime<Utc>>, _limit: usize) -> Result<Vec<FetchedItem>> {
        let Some(zip_path) = self.config.archive_path.clone() else {
            return Ok(Vec::new());
        };

        let items = self.import_from_zip(&zip_path)?;
        if items.is_empty() {
            return Ok(items);
        }

        let existing = self.store.existing_source_ids("twitter").await?;
        let parsed = items.len();
        let fresh: Vec<FetchedItem> = items.into_iter().filter(|item| !existing.contains(&item.source_id)).collect();
        tracing::info!(parsed, skipped = parsed - fresh.len(), fresh = fresh.len(), "imported twitter archive");
        Ok(fresh)
    }

    async fn test_connection(&self) -> Result<bool> {
        Ok(self.config.is_configured())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrap_export_envelope_strips_tweets_wrapper() {
        let contents = "window.YTD.tweets.part0 = [{\"tweet\":{}}]";
        assert_eq!(unwrap_export_envelope(contents), "[{\"tweet\":{}}]");
    }

    #[test]
    fn parse_tweets_skips_items_missing_id() {
        let tweets = vec![json!({"tweet": {"created_at": "Mon Jan 02 15:04:05 +0000 2006", "full_text": "hi"}})];
        assert!(parse_tweets(&tweets).is_empty());
    }

    #[test]
    fn parse_tweets_extracts_text_and_media() {
        let tweets = vec![json!({
            "tweet": {
                "id_str": "123",
                "created_at": "Mon Jan 02 15:04:05 +0000 2006",
                "full_text": "hello world",
                "entities": {"media": [{"media_url_https": "https://example.com/a.jpg"}]}
            }
        })];
        let items = parse_tweets(&tweets);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source_id, "123");
        assert_eq!(items[0].content, "hello world");
        assert_eq!(items[0].metadata["media_urls"][0], "https://example.com/a.jpg");
    }
}
