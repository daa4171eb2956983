//! Weather forecast adapter.
//!
//! Grounded in `original_source/sources/weather.py`: a single request per sync storing the
//! full forecast payload keyed by its own `readTime`, rather than one item per data point.

use super::{FetchedItem, SourceAdapter};
use crate::config::WeatherConfig;
use crate::http_client::LazyHttpClient;
use crate::retry::{HttpError, parse_retry_after, retry_with_policy, source_retry_policy};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

pub struct WeatherAdapter {
    config: WeatherConfig,
    client: LazyHttpClient,
}

impl WeatherAdapter {
    pub fn new(config: WeatherConfig) -> Self {
        Self {
            client: LazyHttpClient::new(Duration::from_secs(30)),
            config,
        }
    }
}

#[async_trait]
impl SourceAdapter for WeatherAdapter {
    fn namespace(&self) -> &str {
        "weather"
    }

    fn source_type(&self) -> &'static str {
        "weather_api"
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured() && !self.config.api_host.is_empty()
    }

    #[tracing::instrument(name = "adapter.weather.fetch_items", skip(self, _since))]
    async fn fetch_items(&self, _since: Option<DateTime<Utc>>, _limit: usize) -> Result<Vec<FetchedItem>> {
        if !self.is_configured() {
            tracing::warn!("weather source is not configured; skipping fetch");
            return Ok(Vec::new());
        }

        let policy = source_retry_policy("weather");
        let url = format!("https://{}", self.config.api_host);

        let data = retry_with_policy(&policy, "weather.fetch_forecast", || async {
            let response = self
                .client
                .get()
                .get(&url)
                .header("x-rapidapi-key", self.config.api_key.clone().unwrap_or_default())
                .header("x-rapidapi-host", self.config.api_host.clone())
                .query(&[
                    ("latitude", self.config.latitude.to_string()),
                    ("longitude", self.config.longitude.to_string()),
                    ("units", self.config.units.clone()),
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
                    message: format!("weather API returned status {status}"),
                    retry_after,
                })
            }
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

        let Some(forecast) = data.get("forecastDaily") else {
            tracing::warn!("weather response missing forecastDaily");
            return Ok(Vec::new());
        };

        let read_time = forecast["readTime"].as_str().unwrap_or_default();
        if read_time.is_empty() {
            tracing::warn!("weather response missing readTime");
            return Ok(Vec::new());
        }

        let created_at = DateTime::parse_from_rfc3339(read_time)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(vec![FetchedItem {
            source_id: read_time.to_string(),
            content: "Weather data synced".to_string(),
            metadata: data,
            created_at,
        }])
    }

    async fn test_connection(&self) -> Result<bool> {
        if !self.is_configured() {
            return Ok(false);
        }
        let url = format!("https://{}", self.config.api_host);
        let response = self
            .client
            .get()
            .get(&url)
            .header("x-rapidapi-key", self.config.api_key.clone().unwrap_or_default())
            .header("x-rapidapi-host", self.config.api_host.clone())
            .query(&[
                ("latitude", self.config.latitude.to_string()),
                ("longitude", self.config.longitude.to_string()),
                ("units", self.config.units.clone()),
            ])
            .send()
            .await
            .context("weather connectivity test failed")?;
        Ok(response.status().is_success())
    }
}
