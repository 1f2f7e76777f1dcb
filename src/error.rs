//! Error types for external-mdns.

use thiserror::Error;

/// Errors that can stop the process.
///
/// Nothing inside the record translation path produces one of these: policy
/// outcomes there resolve to fewer or zero records.
#[derive(Debug, Error)]
pub enum SyncError {
    /// IO error (socket binding, config file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Kubernetes client error
    #[error("Kubernetes client error: {0}")]
    Kube(#[from] kube::Error),

    /// Failed to load a kubeconfig file
    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// Failed to infer in-cluster or local kube configuration
    #[error("Kube config inference error: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// The dispatcher is no longer receiving events
    #[error("event channel closed")]
    ChannelClosed,
}
