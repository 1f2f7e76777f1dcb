//! Event handoff and the dispatcher loop.
//!
//! Every watcher sends into one shared channel and a single dispatcher drains
//! it. A send completes only once the dispatcher has taken the event, so the
//! dispatcher observes each watcher's events in the order they were sent and
//! a watcher never runs ahead of what has been dispatched.

use hickory_proto::rr::DNSClass;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::SyncError;
use crate::event::{Action, ResourceEvent};
use crate::metrics::{self, PublishOperation, Timer};
use crate::publisher::Publisher;

struct Envelope {
    event: ResourceEvent,
    received: oneshot::Sender<()>,
}

/// Sending half of the handoff. Cheap to clone; one per watcher.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Envelope>,
}

/// Receiving half of the handoff. Owned by the dispatcher.
pub struct EventReceiver {
    rx: mpsc::Receiver<Envelope>,
}

/// Create a rendezvous handoff channel.
pub fn handoff() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (EventSender { tx }, EventReceiver { rx })
}

impl EventSender {
    /// Hand an event to the dispatcher, waiting until it has been received.
    pub async fn send(&self, event: ResourceEvent) -> Result<(), SyncError> {
        let (received, ack) = oneshot::channel();
        self.tx
            .send(Envelope { event, received })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        ack.await.map_err(|_| SyncError::ChannelClosed)
    }
}

impl EventReceiver {
    /// Take the next event, releasing its sender. `None` once every sender
    /// is gone.
    pub async fn recv(&mut self) -> Option<ResourceEvent> {
        let Envelope { event, received } = self.rx.recv().await?;
        let _ = received.send(());
        Some(event)
    }
}

/// Single consumer that stamps records and forwards them to the publisher.
pub struct Dispatcher<P> {
    publisher: P,
    ttl: u32,
}

impl<P: Publisher> Dispatcher<P> {
    /// Create a dispatcher stamping `ttl` seconds on every record.
    pub fn new(publisher: P, ttl: u32) -> Self {
        Self { publisher, ttl }
    }

    /// Process events until the token is cancelled or all senders are gone.
    pub async fn run(self, mut events: EventReceiver, token: CancellationToken) {
        info!(ttl = self.ttl, "dispatcher started");

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    info!("dispatcher received shutdown signal");
                    return;
                }

                event = events.recv() => {
                    match event {
                        Some(event) => self.dispatch(event).await,
                        None => {
                            info!("all event senders closed, dispatcher stopping");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Stamp class and TTL on each record and publish or retract it, in order.
    pub async fn dispatch(&self, event: ResourceEvent) {
        debug!(
            source = %event.source,
            action = event.action.as_str(),
            records = event.records.len(),
            "dispatching event"
        );
        metrics::record_event(event.source.as_str(), event.action.as_str(), event.records.len());

        for mut record in event.records {
            record.set_ttl(self.ttl);
            record.set_dns_class(DNSClass::IN);

            let record_type = record.record_type();
            let timer = Timer::start();
            match event.action {
                Action::Added => {
                    self.publisher.publish(record).await;
                    metrics::record_publish(
                        PublishOperation::Publish,
                        &record_type.to_string(),
                        timer.elapsed(),
                    );
                }
                Action::Removed => {
                    self.publisher.unpublish(record).await;
                    metrics::record_publish(
                        PublishOperation::Unpublish,
                        &record_type.to_string(),
                        timer.elapsed(),
                    );
                }
            }
        }
    }
}
