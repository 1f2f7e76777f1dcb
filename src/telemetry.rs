//! Logging, metrics export and optional trace export.
//!
//! `RUST_LOG` takes precedence over the configured log level. Without it,
//! the Kubernetes client stack is held at `warn` unless the configured level
//! names one of its targets. The Prometheus endpoint and OTLP export are
//! compiled in with the `prometheus` and `otel` features.

#[cfg(feature = "prometheus")]
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;
use crate::metrics;

#[cfg(feature = "otel")]
use std::sync::OnceLock;
#[cfg(feature = "otel")]
static TRACER_PROVIDER: OnceLock<opentelemetry_sdk::trace::SdkTracerProvider> = OnceLock::new();

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Targets from the kube client stack that are chatty below `warn`.
const CLIENT_TARGETS: &[&str] = &[
    "kube_client",
    "kube_runtime",
    "hyper",
    "hyper_util",
    "tower",
    "h2",
    "rustls",
];

/// Filter directives for a configured log level.
///
/// Client targets not mentioned in `log_level` get `=warn` appended.
pub fn filter_directives(log_level: &str) -> String {
    let named: Vec<&str> = log_level
        .split(',')
        .filter_map(|directive| directive.split('=').next())
        .map(str::trim)
        .collect();

    let mut directives = log_level.trim().to_string();
    for target in CLIENT_TARGETS {
        if !named.contains(target) {
            if !directives.is_empty() {
                directives.push(',');
            }
            directives.push_str(target);
            directives.push_str("=warn");
        }
    }
    directives
}

/// Install the global subscriber and, if configured, the metrics exporter.
pub fn init(config: &TelemetryConfig) -> Result<(), BoxError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directives(&config.log_level)))?;

    #[cfg(feature = "otel")]
    let otel_layer = match &config.opentelemetry {
        Some(otel_config) => {
            use opentelemetry::trace::TracerProvider;

            let provider = tracer_provider(otel_config)?;
            let tracer = provider.tracer(otel_config.service_name.clone());
            let _ = TRACER_PROVIDER.set(provider);
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };
    #[cfg(not(feature = "otel"))]
    let otel_layer = None::<tracing_subscriber::layer::Identity>;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .init();

    if let Some(otel_config) = &config.opentelemetry {
        if cfg!(feature = "otel") {
            info!(
                endpoint = %otel_config.endpoint,
                service_name = %otel_config.service_name,
                "OpenTelemetry tracing enabled"
            );
        } else {
            tracing::warn!("opentelemetry configured but built without the `otel` feature");
        }
    }

    metrics::describe();

    #[cfg(feature = "prometheus")]
    if let Some(addr) = config.prometheus_addr {
        start_prometheus_exporter(addr)?;
    }
    #[cfg(not(feature = "prometheus"))]
    if config.prometheus_addr.is_some() {
        tracing::warn!("prometheus_addr configured but built without the `prometheus` feature");
    }

    Ok(())
}

#[cfg(feature = "otel")]
fn tracer_provider(
    config: &crate::config::OpenTelemetryConfig,
) -> Result<opentelemetry_sdk::trace::SdkTracerProvider, BoxError> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.endpoint)
        .build()?;

    let resource = opentelemetry_sdk::Resource::builder()
        .with_attributes([
            KeyValue::new(SERVICE_NAME, config.service_name.clone()),
            KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
        ])
        .build();

    Ok(opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

#[cfg(feature = "prometheus")]
fn start_prometheus_exporter(addr: SocketAddr) -> Result<(), BoxError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!(%addr, "Prometheus metrics exporter started");
    Ok(())
}

/// Flush pending spans before exit.
pub fn shutdown() {
    #[cfg(feature = "otel")]
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            tracing::warn!("error shutting down tracer provider: {}", e);
        }
    }
}
