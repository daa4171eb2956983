//! Tracing/logging initialization.
//!
//! Ported from the teacher's `worker.rs::initialize_opentelemetry`: an `EnvFilter`-driven
//! `tracing-subscriber` registry with a JSON-or-pretty fmt layer, and an optional OTel layer
//! bolted on behind the `otlp` feature so the exporter dependency is opt-in.

use crate::config::{LogFormat, ObservabilityConfig};
use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Guard returned by [`init`]; dropping it flushes any pending OTel spans.
pub struct ObservabilityGuard {
    #[cfg(feature = "otlp")]
    _tracer_provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otlp")]
        if let Some(provider) = self._tracer_provider.take() {
            let _ = provider.shutdown();
        }
    }
}

pub fn init(config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    #[cfg(feature = "otlp")]
    {
        if let Some(endpoint) = &config.otlp_endpoint {
            let tracer_provider = build_otlp_tracer(endpoint, &config.service_name)
                .context("failed to build OTLP tracer provider")?;
            let otel_layer =
                tracing_opentelemetry::layer().with_tracer(tracer_provider.tracer(config.service_name.clone()));

            match config.log_format {
                LogFormat::Json => registry
                    .with(tracing_subscriber::fmt::layer().json())
                    .with(otel_layer)
                    .try_init()
                    .context("failed to install tracing subscriber")?,
                LogFormat::Pretty => registry
                    .with(tracing_subscriber::fmt::layer().pretty())
                    .with(otel_layer)
                    .try_init()
                    .context("failed to install tracing subscriber")?,
            }

            return Ok(ObservabilityGuard {
                _tracer_provider: Some(tracer_provider),
            });
        }
    }

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("failed to install tracing subscriber")?,
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("failed to install tracing subscriber")?,
    }

    Ok(ObservabilityGuard {
        #[cfg(feature = "otlp")]
        _tracer_provider: None,
    })
}

#[cfg(feature = "otlp")]
fn build_otlp_tracer(
    endpoint: &str,
    service_name: &str,
) -> Result<opentelemetry_sdk::trace::SdkTracerProvider> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::Resource;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("failed to build OTLP span exporter")?;

    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder()
                .with_attribute(KeyValue::new("service.name", service_name.to_string()))
                .build(),
        )
        .build();

    Ok(provider)
}
