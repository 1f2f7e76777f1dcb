//! Process setup and lifecycle management.

use hickory_server::authority::{AuthorityObject, Catalog};
use hickory_server::ServerFuture;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::authority::RecordAuthority;
use crate::config::{Config, KubernetesConfig, ResponderConfig};
use crate::dispatcher::{handoff, Dispatcher, EventSender};
use crate::error::SyncError;
use crate::event::{Action, ResourceEvent, SourceKind};
use crate::informer::{Informer, InformerHandle};
use crate::publisher::RecordStore;
use crate::records::address_records;
use crate::source::{IngressSource, ServiceSource, SourceWatcher};

/// Interval for emitting store metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Host announced in test mode.
const TEST_HOSTNAME: &str = "router.local.";
const TEST_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 254));

/// Periodically emit store metrics.
async fn metrics_loop(store: RecordStore, token: CancellationToken) {
    let mut interval = tokio::time::interval(METRICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                store.emit_metrics();
                debug!(
                    records = store.records_count(),
                    names = store.names_count(),
                    "emitted store metrics"
                );
            }
            _ = token.cancelled() => {
                debug!("metrics loop shutting down");
                return;
            }
        }
    }
}

/// Build a Kubernetes client from explicit settings, falling back to
/// in-cluster or local inference.
pub async fn kube_client(config: &KubernetesConfig) -> Result<Client, SyncError> {
    let mut client_config = match &config.kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
        }
        None => kube::Config::infer().await?,
    };

    if let Some(master) = config.master.as_deref().filter(|m| !m.is_empty()) {
        client_config.cluster_url = master
            .parse()
            .map_err(|e| SyncError::Config(format!("invalid master URL {master:?}: {e}")))?;
    }

    info!(cluster_url = %client_config.cluster_url, "connecting to Kubernetes API");
    Ok(Client::try_from(client_config)?)
}

/// Wait for every informer's first snapshot. A timeout is logged and the
/// informer keeps running; returns how many synced in time.
async fn wait_for_caches(informers: &mut [InformerHandle], timeout: Duration) -> usize {
    info!("waiting for informer caches to sync...");
    let mut synced = 0;
    for informer in informers.iter_mut() {
        if informer.wait_for_sync(timeout).await {
            synced += 1;
        } else {
            warn!("timed out waiting for caches to sync");
        }
    }
    synced
}

fn api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <K as kube::Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Bind the unicast responder over the given store.
async fn start_responder(
    config: &ResponderConfig,
    store: RecordStore,
) -> Result<ServerFuture<Catalog>, SyncError> {
    let authority: Arc<dyn AuthorityObject> = Arc::new(RecordAuthority::new(store));
    let mut catalog = Catalog::new();
    catalog.upsert(authority.origin().clone(), vec![authority]);

    let mut server = ServerFuture::new(catalog);

    let udp_socket = UdpSocket::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "responder UDP listening");
    server.register_socket(udp_socket);

    let tcp_listener = TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "responder TCP listening");
    server.register_listener(tcp_listener, Duration::from_secs(30));

    Ok(server)
}

/// Record sync process: watchers, dispatcher, store and optional responder.
pub struct MdnsServer {
    config: Config,
    store: RecordStore,
}

impl MdnsServer {
    /// Create a server with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: RecordStore::new(),
        }
    }

    /// The store records are published into.
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    fn spawn_dispatcher(&self, token: CancellationToken) -> (EventSender, JoinHandle<()>) {
        let (events, receiver) = handoff();
        let dispatcher = Dispatcher::new(self.store.clone(), self.config.sync.record_ttl);
        let handle = tokio::spawn(dispatcher.run(receiver, token));
        (events, handle)
    }

    /// Run until the token is cancelled.
    pub async fn run(self, token: CancellationToken) -> Result<(), SyncError> {
        let sync = &self.config.sync;
        info!(
            sources = ?sync.sources,
            publish_all = sync.publish_all,
            namespace = sync.namespace_filter().unwrap_or("<all>"),
            record_ttl = sync.record_ttl,
            publish_internal = sync.publish_internal,
            "starting external-mdns"
        );

        let client = kube_client(&self.config.kubernetes).await?;

        // The dispatcher must be consuming before any watcher sends.
        let (events, dispatcher_handle) = self.spawn_dispatcher(token.clone());

        let mut informers: Vec<InformerHandle> = Vec::new();
        for source in &sync.sources {
            let namespace = sync.namespace_filter();
            let handle = match source {
                SourceKind::Service => Informer::new(
                    SourceKind::Service,
                    api::<Service>(client.clone(), namespace),
                )
                .spawn(
                    SourceWatcher::new(ServiceSource::new(sync.clone()), events.clone()),
                    token.clone(),
                ),
                SourceKind::Ingress => Informer::new(
                    SourceKind::Ingress,
                    api::<Ingress>(client.clone(), namespace),
                )
                .spawn(
                    SourceWatcher::new(IngressSource::new(sync.clone()), events.clone()),
                    token.clone(),
                ),
            };
            informers.push(handle);
        }
        drop(events);

        let synced = wait_for_caches(&mut informers, sync.cache_sync_timeout()).await;
        info!(
            synced,
            informers = informers.len(),
            records = self.store.records_count(),
            "initial sync complete"
        );

        self.serve(token).await?;

        info!("waiting for informers to stop...");
        for informer in informers {
            informer.join().await;
        }
        let _ = dispatcher_handle.await;

        info!("external-mdns stopped");
        Ok(())
    }

    /// Publish a fixed record without contacting the cluster, then idle
    /// until the token is cancelled.
    pub async fn run_test(self, token: CancellationToken) -> Result<(), SyncError> {
        info!("running in test mode, no connection to Kubernetes");

        let dispatcher = Dispatcher::new(self.store.clone(), self.config.sync.record_ttl);

        let mut records = address_records(TEST_HOSTNAME, TEST_ADDRESS, true);
        let reverse = records.split_off(1);
        dispatcher
            .dispatch(ResourceEvent::new(SourceKind::Service, Action::Added, records))
            .await;
        dispatcher
            .dispatch(ResourceEvent::new(SourceKind::Service, Action::Removed, reverse))
            .await;

        self.serve(token).await?;

        info!("external-mdns stopped");
        Ok(())
    }

    /// Run the responder (if configured) and the metrics loop until cancelled.
    async fn serve(&self, token: CancellationToken) -> Result<(), SyncError> {
        let metrics_handle = tokio::spawn(metrics_loop(self.store.clone(), token.clone()));
        self.store.emit_metrics();

        match &self.config.responder {
            Some(responder) => {
                let mut server = start_responder(responder, self.store.clone()).await?;
                info!("responder ready to serve queries");

                tokio::select! {
                    _ = token.cancelled() => {
                        info!("shutdown requested");
                    }
                    result = server.block_until_done() => {
                        if let Err(e) = result {
                            error!("responder error: {}", e);
                        }
                        token.cancel();
                    }
                }
            }
            None => {
                token.cancelled().await;
                info!("shutdown requested");
            }
        }

        let _ = metrics_handle.await;
        Ok(())
    }
}
