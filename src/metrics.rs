//! Metrics instrumentation for external-mdns.
//!
//! All metrics are prefixed with `external_mdns.`

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Register descriptions with the installed recorder.
pub fn describe() {
    describe_counter!(
        "external_mdns.notification.count",
        "Informer notifications by source and kind"
    );
    describe_gauge!(
        "external_mdns.cache.synced",
        "Whether the informer cache synced within the timeout"
    );
    describe_counter!("external_mdns.event.count", "Events handed to the dispatcher");
    describe_histogram!("external_mdns.event.records", "Records carried per event");
    describe_counter!(
        "external_mdns.publisher.call.count",
        "Publish and unpublish calls by record type"
    );
    describe_histogram!(
        "external_mdns.publisher.call.duration.seconds",
        Unit::Seconds,
        "Publisher call latency"
    );
    describe_gauge!("external_mdns.store.records.count", "Records currently published");
    describe_gauge!("external_mdns.store.names.count", "Owner names currently published");
    describe_counter!("external_mdns.query.count", "Responder queries by type and result");
    describe_histogram!(
        "external_mdns.query.duration.seconds",
        Unit::Seconds,
        "Responder query latency"
    );
}

/// Kinds of informer notification.
#[derive(Debug, Clone, Copy)]
pub enum NotificationKind {
    /// Object seen for the first time.
    Added,
    /// Known object changed.
    Updated,
    /// Object deleted.
    Removed,
    /// Watch stream error (retried with backoff).
    Error,
}

/// Record an informer notification.
pub fn record_notification(source: &str, kind: NotificationKind) {
    let kind_str = match kind {
        NotificationKind::Added => "added",
        NotificationKind::Updated => "updated",
        NotificationKind::Removed => "removed",
        NotificationKind::Error => "error",
    };

    counter!("external_mdns.notification.count", "source" => source.to_string(), "kind" => kind_str)
        .increment(1);
}

/// Record the outcome of waiting for an informer cache to sync.
pub fn record_cache_synced(source: &str, synced: bool) {
    gauge!("external_mdns.cache.synced", "source" => source.to_string())
        .set(if synced { 1.0 } else { 0.0 });
}

/// Record an event handed to the dispatcher and the size of its record set.
pub fn record_event(source: &str, action: &'static str, records: usize) {
    counter!("external_mdns.event.count", "source" => source.to_string(), "action" => action)
        .increment(1);
    histogram!("external_mdns.event.records", "source" => source.to_string()).record(records as f64);
}

/// Record a single publish or unpublish call.
pub fn record_publish(operation: PublishOperation, record_type: &str, duration: std::time::Duration) {
    let op_str = match operation {
        PublishOperation::Publish => "publish",
        PublishOperation::Unpublish => "unpublish",
    };

    counter!("external_mdns.publisher.call.count", "op" => op_str, "type" => record_type.to_string())
        .increment(1);
    histogram!("external_mdns.publisher.call.duration.seconds", "op" => op_str)
        .record(duration.as_secs_f64());
}

/// Publisher operations.
#[derive(Debug, Clone, Copy)]
pub enum PublishOperation {
    /// Announce a record.
    Publish,
    /// Retract a record.
    Unpublish,
}

/// Record the number of records and owner names currently published.
pub fn record_store_counts(records: usize, names: usize) {
    gauge!("external_mdns.store.records.count").set(records as f64);
    gauge!("external_mdns.store.names.count").set(names as f64);
}

/// Record a query answered by the responder.
pub fn record_query(record_type: &str, result: QueryResult, duration: std::time::Duration) {
    let result_str = match result {
        QueryResult::Success => "success",
        QueryResult::NoData => "nodata",
        QueryResult::NxDomain => "nxdomain",
    };

    counter!("external_mdns.query.count", "type" => record_type.to_string(), "result" => result_str)
        .increment(1);
    histogram!("external_mdns.query.duration.seconds", "type" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// Query result type for metrics.
#[derive(Debug, Clone, Copy)]
pub enum QueryResult {
    /// Query returned records.
    Success,
    /// Name exists but has no records of the requested type.
    NoData,
    /// Name not published.
    NxDomain,
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
