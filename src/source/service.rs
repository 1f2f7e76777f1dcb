//! Records for `v1/Service` objects.

use hickory_proto::rr::Record;
use k8s_openapi::api::core::v1::Service;
use std::net::IpAddr;
use tracing::{debug, trace};

use super::RecordSource;
use crate::annotations::{evaluate_service, in_namespace};
use crate::config::SyncConfig;
use crate::descriptor::{ServiceDescriptor, ServiceType};
use crate::event::SourceKind;
use crate::records::{address_records, service_discovery_records};

/// Pick the address to advertise for a Service.
///
/// LoadBalancer Services use the last non-empty ingress IP. ClusterIP
/// Services use their cluster IP only when `publish_internal` is set. Other
/// types, and addresses that do not parse (e.g. `None` for headless
/// Services), yield nothing.
pub fn select_address(service: &ServiceDescriptor, publish_internal: bool) -> Option<IpAddr> {
    let raw = match service.service_type {
        ServiceType::LoadBalancer => service
            .load_balancer_ips
            .iter()
            .rev()
            .find(|ip| !ip.is_empty())?,
        ServiceType::ClusterIP if publish_internal => service.cluster_ip.as_ref()?,
        _ => return None,
    };
    raw.parse().ok()
}

/// Full record set for one Service: address and reverse records, then one
/// DNS-SD bundle per port.
pub fn service_records(service: &ServiceDescriptor, config: &SyncConfig) -> Vec<Record> {
    if !in_namespace(config.namespace_filter(), &service.namespace) {
        trace!(name = %service.name, namespace = %service.namespace, "service outside namespace filter");
        return Vec::new();
    }

    let decision = evaluate_service(service, config.publish_all);
    if !decision.eligible {
        trace!(name = %service.name, namespace = %service.namespace, "service not eligible");
        return Vec::new();
    }

    let Some(ip) = select_address(service, config.publish_internal) else {
        debug!(
            name = %service.name,
            namespace = %service.namespace,
            service_type = ?service.service_type,
            "no address to publish for service"
        );
        return Vec::new();
    };

    let mut records = address_records(&decision.hostname, ip, true);
    for port in &service.ports {
        records.extend(service_discovery_records(
            &decision.instance_name,
            &port.name,
            &port.protocol,
            &decision.hostname,
            port.port,
            decision.text_for(&port.name),
        ));
    }
    records
}

/// Record source for Services.
pub struct ServiceSource {
    config: SyncConfig,
}

impl ServiceSource {
    /// Create a source using the given settings.
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }
}

impl RecordSource for ServiceSource {
    type Object = Service;

    fn kind(&self) -> SourceKind {
        SourceKind::Service
    }

    fn build_records(&self, obj: &Service) -> Vec<Record> {
        match ServiceDescriptor::from_resource(obj) {
            Some(service) => service_records(&service, &self.config),
            None => {
                debug!("ignoring service notification without a name");
                Vec::new()
            }
        }
    }
}
