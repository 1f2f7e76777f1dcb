//! Source watchers: turn resource notifications into record events.
//!
//! Each resource kind implements [`RecordSource`], which builds the complete
//! record set for one object. [`SourceWatcher`] wraps a source and implements
//! the informer callbacks, emitting one event per add or remove and a
//! `Removed`/`Added` pair per update.

pub mod ingress;
pub mod service;

pub use ingress::IngressSource;
pub use service::ServiceSource;

use async_trait::async_trait;
use hickory_proto::rr::Record;
use tracing::{debug, warn};

use crate::dispatcher::EventSender;
use crate::event::{Action, ResourceEvent, SourceKind};
use crate::informer::ResourceHandler;

/// Builds records for one kind of cluster object.
pub trait RecordSource: Send + Sync {
    /// Cluster object type delivered by the informer.
    type Object: Send + Sync;

    /// Which watcher this is.
    fn kind(&self) -> SourceKind;

    /// Full record set for `obj`. Empty when the object is not eligible or
    /// cannot be interpreted.
    fn build_records(&self, obj: &Self::Object) -> Vec<Record>;
}

/// Informer callbacks for a [`RecordSource`], sending into the dispatcher.
pub struct SourceWatcher<S> {
    source: S,
    events: EventSender,
}

impl<S: RecordSource> SourceWatcher<S> {
    /// Create a watcher feeding `events`.
    pub fn new(source: S, events: EventSender) -> Self {
        Self { source, events }
    }

    async fn emit(&self, action: Action, obj: &S::Object) {
        let kind = self.source.kind();
        let records = self.source.build_records(obj);
        debug!(
            source = %kind,
            action = action.as_str(),
            records = records.len(),
            "emitting event"
        );
        if let Err(e) = self
            .events
            .send(ResourceEvent::new(kind, action, records))
            .await
        {
            warn!(source = %kind, "dropping event: {}", e);
        }
    }
}

#[async_trait]
impl<S: RecordSource> ResourceHandler<S::Object> for SourceWatcher<S> {
    async fn on_added(&self, obj: &S::Object) {
        self.emit(Action::Added, obj).await;
    }

    async fn on_updated(&self, old: &S::Object, new: &S::Object) {
        self.emit(Action::Removed, old).await;
        self.emit(Action::Added, new).await;
    }

    async fn on_removed(&self, obj: &S::Object) {
        self.emit(Action::Removed, obj).await;
    }
}
