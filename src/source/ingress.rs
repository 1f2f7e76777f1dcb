//! Records for `networking.k8s.io/v1/Ingress` objects.

use hickory_proto::rr::Record;
use k8s_openapi::api::networking::v1::Ingress;
use std::net::IpAddr;
use tracing::{debug, trace};

use super::RecordSource;
use crate::annotations::{in_namespace, ingress_host_eligible};
use crate::config::SyncConfig;
use crate::descriptor::IngressDescriptor;
use crate::event::SourceKind;
use crate::records::address_records;

/// One forward record per `.local` rule host, pointing at the last non-empty
/// load-balancer IP. No reverse records: several hosts usually share the IP.
pub fn ingress_records(ingress: &IngressDescriptor, config: &SyncConfig) -> Vec<Record> {
    if !in_namespace(config.namespace_filter(), &ingress.namespace) {
        trace!(name = %ingress.name, namespace = %ingress.namespace, "ingress outside namespace filter");
        return Vec::new();
    }

    let ip: Option<IpAddr> = ingress
        .load_balancer_ips
        .iter()
        .rev()
        .find(|ip| !ip.is_empty())
        .and_then(|ip| ip.parse().ok());
    let Some(ip) = ip else {
        debug!(name = %ingress.name, namespace = %ingress.namespace, "no address to publish for ingress");
        return Vec::new();
    };

    ingress
        .hosts
        .iter()
        .filter(|host| ingress_host_eligible(host))
        .flat_map(|host| address_records(&format!("{host}."), ip, false))
        .collect()
}

/// Record source for Ingresses.
pub struct IngressSource {
    config: SyncConfig,
}

impl IngressSource {
    /// Create a source using the given settings.
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }
}

impl RecordSource for IngressSource {
    type Object = Ingress;

    fn kind(&self) -> SourceKind {
        SourceKind::Ingress
    }

    fn build_records(&self, obj: &Ingress) -> Vec<Record> {
        match IngressDescriptor::from_resource(obj) {
            Some(ingress) => ingress_records(&ingress, &self.config),
            None => {
                debug!("ignoring ingress notification without a name");
                Vec::new()
            }
        }
    }
}
