//! Events passed from the source watchers to the dispatcher.

use hickory_proto::rr::Record;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of cluster resource a watcher follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// `v1/Service`
    Service,
    /// `networking.k8s.io/v1/Ingress`
    Ingress,
}

impl SourceKind {
    /// Lowercase label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Service => "service",
            SourceKind::Ingress => "ingress",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the dispatcher should do with an event's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Announce the records.
    Added,
    /// Retract the records.
    Removed,
}

impl Action {
    /// Lowercase label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Added => "added",
            Action::Removed => "removed",
        }
    }
}

/// Records built from one resource notification.
///
/// An update arrives as two events: `Removed` with the old records, then
/// `Added` with the new ones.
#[derive(Debug, Clone)]
pub struct ResourceEvent {
    /// Watcher that produced the event.
    pub source: SourceKind,
    /// Publish or retract.
    pub action: Action,
    /// Records in build order. May be empty.
    pub records: Vec<Record>,
}

impl ResourceEvent {
    /// Create an event.
    pub fn new(source: SourceKind, action: Action, records: Vec<Record>) -> Self {
        Self {
            source,
            action,
            records,
        }
    }
}
