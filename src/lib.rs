//! external-mdns - advertise Kubernetes Services and Ingresses on the local
//! network over multicast DNS.
//!
//! Watchers observe cluster objects, translate each one into the complete set
//! of DNS records it should be reachable under, and hand those records to a
//! single dispatcher that stamps the configured TTL and announces or retracts
//! them through a [`Publisher`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          external-mdns                           │
//! │                                                                  │
//! │  ┌──────────────┐  ┌──────────────┐                              │
//! │  │   Service    │  │   Ingress    │   kube watchers + caches     │
//! │  │   watcher    │  │   watcher    │                              │
//! │  └──────┬───────┘  └──────┬───────┘                              │
//! │         │  ResourceEvent  │                                      │
//! │         └───────┬─────────┘  rendezvous handoff                  │
//! │                 ▼                                                │
//! │        ┌─────────────────┐      ┌──────────────┐                 │
//! │        │   Dispatcher    │─────▶│  Publisher   │                 │
//! │        │  (TTL, class)   │      │ (RecordStore)│◀── UDP/TCP      │
//! │        └─────────────────┘      └──────────────┘   responder     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Records
//!
//! ```text
//! Service default/example, LoadBalancer 192.0.2.10, port http/TCP/80
//!   example.default.local.             A    192.0.2.10
//!   10.2.0.192.in-addr.arpa.           PTR  example.default.local.
//!   _http._tcp.local.                  PTR  default/example._http._tcp.local.
//!   default/example._http._tcp.local.  SRV  0 0 80 example.default.local.
//!   default/example._http._tcp.local.  TXT  ""
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use external_mdns::{Config, MdnsServer, SourceKind};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut config = Config::default();
//!     config.sync.sources = vec![SourceKind::Service, SourceKind::Ingress];
//!
//!     let token = CancellationToken::new();
//!     let server = MdnsServer::new(config);
//!     server.run(token).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod annotations;
pub mod authority;
pub mod config;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod informer;
pub mod metrics;
pub mod publisher;
pub mod records;
pub mod server;
pub mod source;
pub mod telemetry;

// Re-export main types
pub use authority::RecordAuthority;
pub use config::{Config, KubernetesConfig, ResponderConfig, SyncConfig, TelemetryConfig};
pub use dispatcher::{handoff, Dispatcher, EventReceiver, EventSender};
pub use error::SyncError;
pub use event::{Action, ResourceEvent, SourceKind};
pub use publisher::{Publisher, RecordStore};
pub use server::MdnsServer;
