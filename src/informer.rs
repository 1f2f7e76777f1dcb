//! Cluster change notifications for one resource kind.
//!
//! Wraps a `kube::runtime::watcher` stream with a local cache so that raw
//! watch events become add/update/remove notifications carrying both the old
//! and new object, the way a client-go informer delivers them.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::event::SourceKind;
use crate::metrics::{self, NotificationKind};

/// Callbacks invoked for each change to a watched object.
///
/// Callbacks for one informer run sequentially on its task; `on_updated`
/// finishes before the next notification is delivered. Cancellation is
/// checked between notifications, so a callback in progress runs to
/// completion before the informer stops.
#[async_trait]
pub trait ResourceHandler<K>: Send + Sync {
    /// A new object appeared.
    async fn on_added(&self, obj: &K);
    /// A known object changed.
    async fn on_updated(&self, old: &K, new: &K);
    /// An object went away. `obj` is the last state seen.
    async fn on_removed(&self, obj: &K);
}

/// Change derived from a watch event.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification<K> {
    /// Object not previously in the cache.
    Added(K),
    /// Cached object replaced by a newer version.
    Updated {
        /// Previously cached version.
        old: K,
        /// Incoming version.
        new: K,
    },
    /// Object deleted, with its last cached version.
    Removed(K),
}

/// Last-known state of every object one informer has seen.
///
/// Owned by a single informer task and never shared.
#[derive(Debug)]
pub struct LocalCache<K> {
    objects: HashMap<String, K>,
    synced: bool,
}

impl<K> Default for LocalCache<K> {
    fn default() -> Self {
        Self {
            objects: HashMap::new(),
            synced: false,
        }
    }
}

fn cache_key<K: Resource>(obj: &K) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

impl<K: Resource + Clone> LocalCache<K> {
    /// Create an empty, unsynced cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a full snapshot has been applied.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Number of cached objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Apply a watch event and return the notifications it implies.
    ///
    /// A `Restarted` snapshot first removes cached objects missing from it,
    /// then applies every listed object. Re-applying an object with an
    /// unchanged resource version yields nothing.
    pub fn apply(&mut self, event: Event<K>) -> Vec<Notification<K>> {
        match event {
            Event::Applied(obj) => self.upsert(obj).into_iter().collect(),
            Event::Deleted(obj) => {
                let last_known = self.objects.remove(&cache_key(&obj)).unwrap_or(obj);
                vec![Notification::Removed(last_known)]
            }
            Event::Restarted(snapshot) => {
                let listed: HashMap<String, K> = snapshot
                    .into_iter()
                    .map(|obj| (cache_key(&obj), obj))
                    .collect();

                let mut gone: Vec<String> = self
                    .objects
                    .keys()
                    .filter(|key| !listed.contains_key(*key))
                    .cloned()
                    .collect();
                gone.sort();

                let mut notifications: Vec<Notification<K>> = gone
                    .into_iter()
                    .filter_map(|key| self.objects.remove(&key))
                    .map(Notification::Removed)
                    .collect();

                let mut listed: Vec<(String, K)> = listed.into_iter().collect();
                listed.sort_by(|a, b| a.0.cmp(&b.0));
                notifications.extend(listed.into_iter().filter_map(|(_, obj)| self.upsert(obj)));

                self.synced = true;
                notifications
            }
        }
    }

    fn upsert(&mut self, obj: K) -> Option<Notification<K>> {
        let key = cache_key(&obj);
        match self.objects.insert(key, obj.clone()) {
            None => Some(Notification::Added(obj)),
            Some(old) => {
                let unchanged =
                    old.resource_version().is_some() && old.resource_version() == obj.resource_version();
                if unchanged {
                    None
                } else {
                    Some(Notification::Updated { old, new: obj })
                }
            }
        }
    }
}

/// Deliver one notification to a handler.
pub async fn deliver<K, H>(handler: &H, notification: Notification<K>)
where
    K: Send + Sync,
    H: ResourceHandler<K> + ?Sized,
{
    match notification {
        Notification::Added(obj) => handler.on_added(&obj).await,
        Notification::Updated { old, new } => handler.on_updated(&old, &new).await,
        Notification::Removed(obj) => handler.on_removed(&obj).await,
    }
}

/// Handle to a running informer.
pub struct InformerHandle {
    source: SourceKind,
    synced: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl InformerHandle {
    pub(crate) fn from_parts(
        source: SourceKind,
        synced: watch::Receiver<bool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            source,
            synced,
            task,
        }
    }

    /// Wait until the informer's cache holds a full snapshot.
    ///
    /// Returns `false` if that does not happen within `timeout`; the informer
    /// keeps running either way.
    pub async fn wait_for_sync(&mut self, timeout: Duration) -> bool {
        let synced = tokio::time::timeout(timeout, self.synced.wait_for(|synced| *synced)).await;
        let ok = matches!(synced, Ok(Ok(_)));
        metrics::record_cache_synced(self.source.as_str(), ok);
        ok
    }

    /// True until the informer task exits.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Wait for the informer task to finish.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(source = %self.source, "informer task panicked: {}", e);
        }
    }
}

/// Watch events for `api`, retried with the default backoff after errors.
fn event_stream<K>(
    api: Api<K>,
    config: watcher::Config,
) -> BoxStream<'static, Result<Event<K>, watcher::Error>>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
{
    watcher::watcher(api, config).default_backoff().boxed()
}

/// Watches one resource kind and feeds a handler.
pub struct Informer<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    source: SourceKind,
    api: Api<K>,
    config: watcher::Config,
}

impl<K> Informer<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    /// Create an informer over `api`.
    pub fn new(source: SourceKind, api: Api<K>) -> Self {
        Self {
            source,
            api,
            config: watcher::Config::default(),
        }
    }

    /// Spawn the watch loop. It runs until `token` is cancelled.
    pub fn spawn<H>(self, handler: H, token: CancellationToken) -> InformerHandle
    where
        H: ResourceHandler<K> + 'static,
    {
        let (synced_tx, synced_rx) = watch::channel(false);
        let source = self.source;
        let task = tokio::spawn(self.run(handler, synced_tx, token));
        InformerHandle::from_parts(source, synced_rx, task)
    }

    async fn run<H>(self, handler: H, synced: watch::Sender<bool>, token: CancellationToken)
    where
        H: ResourceHandler<K>,
    {
        let source = self.source;
        let mut cache = LocalCache::<K>::new();
        let mut stream = event_stream(self.api, self.config);

        info!(%source, "starting informer");

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    info!(%source, "informer received shutdown signal");
                    return;
                }

                next = stream.next() => {
                    match next {
                        Some(Ok(event)) => {
                            let notifications = cache.apply(event);
                            for notification in notifications {
                                metrics::record_notification(source.as_str(), notification_kind(&notification));
                                deliver(&handler, notification).await;
                            }
                            if cache.is_synced() && !*synced.borrow() {
                                debug!(%source, objects = cache.len(), "informer cache synced");
                                synced.send_replace(true);
                            }
                        }
                        Some(Err(e)) => {
                            warn!(%source, "watch stream error: {}", e);
                            metrics::record_notification(source.as_str(), NotificationKind::Error);
                        }
                        None => {
                            info!(%source, "watch stream ended");
                            return;
                        }
                    }
                }
            }
        }
    }
}

fn notification_kind<K>(notification: &Notification<K>) -> NotificationKind {
    match notification {
        Notification::Added(_) => NotificationKind::Added,
        Notification::Updated { .. } => NotificationKind::Updated,
        Notification::Removed(_) => NotificationKind::Removed,
    }
}
