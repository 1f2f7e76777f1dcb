//! Read-only projections of the cluster objects the watchers follow.
//!
//! Kubernetes objects carry optional fields everywhere; the descriptors fill
//! in API-server defaults once so the policy and builders work on plain values.

use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use std::collections::BTreeMap;
use std::fmt;

/// Transport protocol of a Service port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protocol {
    /// TCP (the API default).
    Tcp,
    /// UDP.
    Udp,
    /// Anything else, kept verbatim (e.g. "SCTP").
    Other(String),
}

impl Protocol {
    /// Parse a Kubernetes protocol string. A missing protocol means TCP.
    pub fn from_k8s(protocol: Option<&str>) -> Self {
        match protocol {
            None | Some("TCP") => Protocol::Tcp,
            Some("UDP") => Protocol::Udp,
            Some(other) => Protocol::Other(other.to_string()),
        }
    }

    /// Label used in DNS-SD service names, for the protocols DNS-SD knows.
    pub fn dns_sd_label(&self) -> Option<&'static str> {
        match self {
            Protocol::Tcp => Some("tcp"),
            Protocol::Udp => Some("udp"),
            Protocol::Other(_) => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("TCP"),
            Protocol::Udp => f.write_str("UDP"),
            Protocol::Other(other) => f.write_str(other),
        }
    }
}

/// Service `spec.type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceType {
    /// Cluster-internal virtual IP (the API default).
    ClusterIP,
    /// Externally load balanced.
    LoadBalancer,
    /// NodePort, ExternalName, ...
    Other(String),
}

impl ServiceType {
    fn from_k8s(service_type: Option<&str>) -> Self {
        match service_type {
            None | Some("ClusterIP") => ServiceType::ClusterIP,
            Some("LoadBalancer") => ServiceType::LoadBalancer,
            Some(other) => ServiceType::Other(other.to_string()),
        }
    }
}

/// One exposed Service port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    /// Port name; empty when unnamed.
    pub name: String,
    /// Port number; zero when out of range.
    pub port: u16,
    /// Transport protocol.
    pub protocol: Protocol,
}

/// View of a `v1/Service`.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// Object name.
    pub name: String,
    /// Object namespace.
    pub namespace: String,
    /// `spec.type`.
    pub service_type: ServiceType,
    /// `spec.clusterIP`, if set.
    pub cluster_ip: Option<String>,
    /// `status.loadBalancer.ingress[].ip`, in order, empty strings included.
    pub load_balancer_ips: Vec<String>,
    /// `spec.ports`, in order.
    pub ports: Vec<PortDescriptor>,
    /// `metadata.annotations`.
    pub annotations: BTreeMap<String, String>,
}

impl ServiceDescriptor {
    /// Project a Service. Returns `None` when the object has no name.
    pub fn from_resource(service: &Service) -> Option<Self> {
        let name = service.metadata.name.clone()?;
        let namespace = service.metadata.namespace.clone().unwrap_or_default();
        let annotations = service.metadata.annotations.clone().unwrap_or_default();

        let spec = service.spec.as_ref();
        let service_type = ServiceType::from_k8s(spec.and_then(|s| s.type_.as_deref()));
        let cluster_ip = spec.and_then(|s| s.cluster_ip.clone());
        let ports = spec
            .and_then(|s| s.ports.as_ref())
            .map(|ports| {
                ports
                    .iter()
                    .map(|p| PortDescriptor {
                        name: p.name.clone().unwrap_or_default(),
                        port: u16::try_from(p.port).unwrap_or(0),
                        protocol: Protocol::from_k8s(p.protocol.as_deref()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let load_balancer_ips = service
            .status
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .map(|ingress| {
                ingress
                    .iter()
                    .map(|i| i.ip.clone().unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            name,
            namespace,
            service_type,
            cluster_ip,
            load_balancer_ips,
            ports,
            annotations,
        })
    }
}

/// View of a `networking.k8s.io/v1/Ingress`.
#[derive(Debug, Clone)]
pub struct IngressDescriptor {
    /// Object name.
    pub name: String,
    /// Object namespace.
    pub namespace: String,
    /// `status.loadBalancer.ingress[].ip`, in order, empty strings included.
    pub load_balancer_ips: Vec<String>,
    /// `spec.rules[].host`, in order, empty strings included.
    pub hosts: Vec<String>,
}

impl IngressDescriptor {
    /// Project an Ingress. Returns `None` when the object has no name.
    pub fn from_resource(ingress: &Ingress) -> Option<Self> {
        let name = ingress.metadata.name.clone()?;
        let namespace = ingress.metadata.namespace.clone().unwrap_or_default();

        let load_balancer_ips = ingress
            .status
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .map(|ingress| {
                ingress
                    .iter()
                    .map(|i| i.ip.clone().unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();

        let hosts = ingress
            .spec
            .as_ref()
            .and_then(|s| s.rules.as_ref())
            .map(|rules| {
                rules
                    .iter()
                    .map(|r| r.host.clone().unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            name,
            namespace,
            load_balancer_ips,
            hosts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        LoadBalancerIngress, LoadBalancerStatus, ServicePort, ServiceSpec, ServiceStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    #[test]
    fn test_protocol_defaults_to_tcp() {
        assert_eq!(Protocol::from_k8s(None), Protocol::Tcp);
        assert_eq!(Protocol::from_k8s(Some("UDP")), Protocol::Udp);
        assert_eq!(
            Protocol::from_k8s(Some("SCTP")),
            Protocol::Other("SCTP".to_string())
        );
        assert_eq!(Protocol::from_k8s(Some("SCTP")).dns_sd_label(), None);
    }

    #[test]
    fn test_service_projection() {
        let service = Service {
            metadata: ObjectMeta {
                name: Some("example".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some("LoadBalancer".to_string()),
                ports: Some(vec![ServicePort {
                    name: Some("http".to_string()),
                    port: 80,
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            status: Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus {
                    ingress: Some(vec![LoadBalancerIngress {
                        ip: Some("192.0.2.10".to_string()),
                        ..Default::default()
                    }]),
                }),
                ..Default::default()
            }),
        };

        let desc = ServiceDescriptor::from_resource(&service).unwrap();
        assert_eq!(desc.name, "example");
        assert_eq!(desc.namespace, "default");
        assert_eq!(desc.service_type, ServiceType::LoadBalancer);
        assert_eq!(desc.load_balancer_ips, vec!["192.0.2.10".to_string()]);
        assert_eq!(
            desc.ports,
            vec![PortDescriptor {
                name: "http".to_string(),
                port: 80,
                protocol: Protocol::Tcp,
            }]
        );
        assert!(desc.annotations.is_empty());
    }

    #[test]
    fn test_service_without_name_is_rejected() {
        assert!(ServiceDescriptor::from_resource(&Service::default()).is_none());
    }

    #[test]
    fn test_service_type_defaults_to_cluster_ip() {
        let service = Service {
            metadata: ObjectMeta {
                name: Some("a".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let desc = ServiceDescriptor::from_resource(&service).unwrap();
        assert_eq!(desc.service_type, ServiceType::ClusterIP);
        assert!(desc.ports.is_empty());
    }

    #[test]
    fn test_ingress_without_name_is_rejected() {
        assert!(IngressDescriptor::from_resource(&Ingress::default()).is_none());
    }
}
