//! Process configuration, assembled once at startup via [`Config::from_env`].
//!
//! Follows the teacher's `AppConfig`/`from_env` idiom: each sub-config owns its own
//! `from_env`, reading `env::var`, applying a typed default, and wrapping parse failures
//! with a field-specific `anyhow::Context` message.

use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub observability: ObservabilityConfig,
    pub scheduler: SchedulerConfig,
    pub embedder: EmbedderConfig,
    pub limitless: LimitlessConfig,
    pub news: NewsConfig,
    pub weather: WeatherConfig,
    pub twitter: TwitterConfig,
    pub timezone: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            store: StoreConfig::from_env()?,
            observability: ObservabilityConfig::from_env()?,
            scheduler: SchedulerConfig::from_env()?,
            embedder: EmbedderConfig::from_env()?,
            limitless: LimitlessConfig::from_env()?,
            news: NewsConfig::from_env()?,
            weather: WeatherConfig::from_env()?,
            twitter: TwitterConfig::from_env()?,
            timezone: std::env::var("DEFAULT_TIMEZONE").unwrap_or_else(|_| "UTC".to_string()),
        })
    }
}

/// Local embedded store location: one working directory holding `data.db`,
/// `vectors.idx`, and `vectors.map` per SPEC_FULL §6.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            data_dir: std::env::var("INGESTORD_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            max_connections: std::env::var("STORE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("STORE_MAX_CONNECTIONS must be a number")?,
            acquire_timeout: Duration::from_secs(
                std::env::var("STORE_ACQUIRE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .context("STORE_ACQUIRE_TIMEOUT_SECS must be a number")?,
            ),
        })
    }

    pub fn db_path(&self) -> String {
        format!("{}/data.db", self.data_dir.trim_end_matches('/'))
    }

    pub fn vectors_idx_path(&self) -> String {
        format!("{}/vectors.idx", self.data_dir.trim_end_matches('/'))
    }

    pub fn vectors_map_path(&self) -> String {
        format!("{}/vectors.map", self.data_dir.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub service_name: String,
    pub log_format: LogFormat,
    pub otlp_endpoint: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> Result<Self> {
        let log_format = match std::env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "json".to_string())
            .to_lowercase()
            .as_str()
        {
            "pretty" | "human" | "text" => LogFormat::Pretty,
            _ => LogFormat::Json,
        };
        Ok(Self {
            service_name: std::env::var("SERVICE_NAME").unwrap_or_else(|_| "ingestord".to_string()),
            log_format,
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub default_timeout: Duration,
    pub max_retries: u32,
    pub overlap_window: Duration,
}

impl SchedulerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            tick_interval: Duration::from_secs(
                std::env::var("SCHEDULER_TICK_INTERVAL_SECS")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()
                    .context("SCHEDULER_TICK_INTERVAL_SECS must be a number")?,
            ),
            default_timeout: Duration::from_secs(
                std::env::var("SCHEDULER_DEFAULT_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .context("SCHEDULER_DEFAULT_TIMEOUT_SECS must be a number")?,
            ),
            max_retries: std::env::var("SCHEDULER_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("SCHEDULER_MAX_RETRIES must be a number")?,
            overlap_window: Duration::from_secs(
                std::env::var("SYNC_OVERLAP_WINDOW_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .context("SYNC_OVERLAP_WINDOW_SECS must be a number")?,
            ),
        })
    }
}

#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl EmbedderConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: std::env::var("EMBEDDER_API_URL")
                .unwrap_or_else(|_| "http://localhost:8090".to_string()),
            api_key: std::env::var("EMBEDDER_API_KEY").ok(),
            model: std::env::var("EMBEDDER_MODEL").unwrap_or_else(|_| "default".to_string()),
            batch_size: std::env::var("EMBEDDER_BATCH_SIZE")
                .unwrap_or_else(|_| "64".to_string())
                .parse()
                .context("EMBEDDER_BATCH_SIZE must be a number")?,
            timeout_secs: std::env::var("EMBEDDER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .context("EMBEDDER_TIMEOUT_SECS must be a number")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LimitlessConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timezone: String,
    pub request_timeout_secs: u64,
    pub sync_interval_secs: u64,
}

impl LimitlessConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: std::env::var("LIMITLESS_BASE_URL")
                .unwrap_or_else(|_| "https://api.limitless.ai".to_string()),
            api_key: std::env::var("LIMITLESS_API_KEY").ok(),
            timezone: std::env::var("LIMITLESS_TIMEZONE").unwrap_or_else(|_| "UTC".to_string()),
            request_timeout_secs: std::env::var("LIMITLESS_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("LIMITLESS_REQUEST_TIMEOUT_SECS must be a number")?,
            sync_interval_secs: std::env::var("LIMITLESS_SYNC_INTERVAL_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .context("LIMITLESS_SYNC_INTERVAL_SECS must be a number")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_host: String,
    pub country: String,
    pub lang: String,
    pub items_to_retrieve: usize,
    pub unique_items_per_day: usize,
    pub sync_interval_secs: u64,
}

impl NewsConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: std::env::var("NEWS_BASE_URL")
                .unwrap_or_else(|_| "https://news-api.example.com".to_string()),
            api_key: std::env::var("NEWS_API_KEY").ok(),
            api_host: std::env::var("NEWS_API_HOST").unwrap_or_default(),
            country: std::env::var("NEWS_COUNTRY").unwrap_or_else(|_| "us".to_string()),
            lang: std::env::var("NEWS_LANG").unwrap_or_else(|_| "en".to_string()),
            items_to_retrieve: std::env::var("NEWS_ITEMS_TO_RETRIEVE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("NEWS_ITEMS_TO_RETRIEVE must be a number")?,
            unique_items_per_day: std::env::var("NEWS_UNIQUE_ITEMS_PER_DAY")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("NEWS_UNIQUE_ITEMS_PER_DAY must be a number")?,
            sync_interval_secs: std::env::var("NEWS_SYNC_INTERVAL_SECS")
                .unwrap_or_else(|_| "21600".to_string())
                .parse()
                .context("NEWS_SYNC_INTERVAL_SECS must be a number")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_host: String,
    pub latitude: f64,
    pub longitude: f64,
    pub units: String,
    pub sync_interval_secs: u64,
}

impl WeatherConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: std::env::var("WEATHER_BASE_URL")
                .unwrap_or_else(|_| "https://weather-api.example.com".to_string()),
            api_key: std::env::var("WEATHER_API_KEY").ok(),
            api_host: std::env::var("WEATHER_API_HOST").unwrap_or_default(),
            latitude: std::env::var("WEATHER_LATITUDE")
                .unwrap_or_else(|_| "0.0".to_string())
                .parse()
                .context("WEATHER_LATITUDE must be a number")?,
            longitude: std::env::var("WEATHER_LONGITUDE")
                .unwrap_or_else(|_| "0.0".to_string())
                .parse()
                .context("WEATHER_LONGITUDE must be a number")?,
            units: std::env::var("WEATHER_UNITS").unwrap_or_else(|_| "standard".to_string()),
            sync_interval_secs: std::env::var("WEATHER_SYNC_INTERVAL_SECS")
                .unwrap_or_else(|_| "21600".to_string())
                .parse()
                .context("WEATHER_SYNC_INTERVAL_SECS must be a number")?,
        })
    }
}

/// The Twitter archive importer has no time-based cadence (SPEC_FULL §4.G step 2); it is
/// configured with the path to the archive zip instead of an interval.
#[derive(Debug, Clone)]
pub struct TwitterConfig {
    pub archive_path: Option<String>,
}

impl TwitterConfig {
    pub fn is_configured(&self) -> bool {
        self.archive_path.is_some()
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self {
            archive_path: std::env::var("TWITTER_ARCHIVE_PATH").ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_config_derives_file_paths_from_data_dir() {
        let cfg = StoreConfig {
            data_dir: "/var/lib/ingestord".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        };
        assert_eq!(cfg.db_path(), "/var/lib/ingestord/data.db");
        assert_eq!(cfg.vectors_idx_path(), "/var/lib/ingestord/vectors.idx");
        assert_eq!(cfg.vectors_map_path(), "/var/lib/ingestord/vectors.map");
    }

    #[test]
    fn log_format_defaults_to_json() {
        // SAFETY-free: reading env only, no mutation in this test.
        let format = match std::env::var("LOG_FORMAT") {
            Ok(v) if v.to_lowercase() == "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        };
        assert_eq!(format, LogFormat::Json);
    }
}
