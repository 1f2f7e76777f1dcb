//! Configuration types for external-mdns.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::SyncError;
use crate::event::SourceKind;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Record synchronization settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Kubernetes client settings.
    #[serde(default)]
    pub kubernetes: KubernetesConfig,

    /// Optional unicast responder serving the published records.
    #[serde(default)]
    pub responder: Option<ResponderConfig>,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Reject configurations the process cannot run with.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.sync.sources.is_empty() {
            return Err(SyncError::Config(
                "specify at least one source to sync records from".to_string(),
            ));
        }
        if self.sync.record_ttl == 0 {
            return Err(SyncError::Config("record_ttl must be positive".to_string()));
        }
        Ok(())
    }
}

/// Settings read by the watchers and the dispatcher.
///
/// Built once at startup and handed to each component by value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Resource kinds to watch.
    #[serde(default)]
    pub sources: Vec<SourceKind>,

    /// Publish every Service, including those without annotations.
    #[serde(default)]
    pub publish_all: bool,

    /// Only consider resources in this namespace. Empty means all namespaces.
    #[serde(default)]
    pub namespace: String,

    /// TTL in seconds stamped on every record.
    #[serde(default = "default_record_ttl")]
    pub record_ttl: u32,

    /// Allow ClusterIP Services to be published with their cluster address.
    #[serde(default)]
    pub publish_internal: bool,

    /// How long a watcher may take to receive its initial snapshot.
    #[serde(default = "default_cache_sync_timeout_secs")]
    pub cache_sync_timeout_secs: u64,
}

impl SyncConfig {
    /// Namespace restriction, if one is set.
    pub fn namespace_filter(&self) -> Option<&str> {
        if self.namespace.is_empty() {
            None
        } else {
            Some(self.namespace.as_str())
        }
    }

    /// Cache sync timeout as a `Duration`.
    pub fn cache_sync_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_sync_timeout_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            publish_all: false,
            namespace: String::new(),
            record_ttl: default_record_ttl(),
            publish_internal: false,
            cache_sync_timeout_secs: default_cache_sync_timeout_secs(),
        }
    }
}

fn default_record_ttl() -> u32 {
    120
}

fn default_cache_sync_timeout_secs() -> u64 {
    60
}

/// Kubernetes client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KubernetesConfig {
    /// Path to a kubeconfig file. Falls back to in-cluster / default inference.
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    /// API server URL overriding the one from the kubeconfig.
    #[serde(default)]
    pub master: Option<String>,
}

/// Unicast responder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// Address to answer queries on (UDP and TCP).
    pub listen_addr: SocketAddr,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "external_mdns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,

    /// OpenTelemetry configuration.
    #[serde(default)]
    pub opentelemetry: Option<OpenTelemetryConfig>,
}

/// OpenTelemetry exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTelemetryConfig {
    /// OTLP endpoint (e.g., "http://localhost:4317").
    pub endpoint: String,

    /// Service name for traces.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
            opentelemetry: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "external-mdns".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.record_ttl, 120);
        assert!(!config.publish_all);
        assert!(config.namespace_filter().is_none());
    }

    #[test]
    fn test_validate_requires_source() {
        let mut config = Config::default();
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));

        config.sync.sources.push(SourceKind::Service);
        assert!(config.validate().is_ok());

        config.sync.record_ttl = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_sources() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"sources": ["service", "ingress"], "namespace": "lan"}"#)
                .unwrap();
        assert_eq!(config.sources, vec![SourceKind::Service, SourceKind::Ingress]);
        assert_eq!(config.namespace_filter(), Some("lan"));
    }
}
