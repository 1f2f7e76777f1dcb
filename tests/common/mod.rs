//! Shared test infrastructure for pipeline and responder integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{AuthorityObject, Catalog, MessageRequest, MessageResponse};
use hickory_server::proto::rr::Record;
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use k8s_openapi::api::core::v1::{
    LoadBalancerIngress, LoadBalancerStatus, Service, ServicePort, ServiceSpec, ServiceStatus,
};
use k8s_openapi::api::networking::v1::{
    Ingress, IngressLoadBalancerIngress, IngressLoadBalancerStatus, IngressRule, IngressSpec,
    IngressStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use external_mdns::authority::RecordAuthority;
use external_mdns::publisher::{Publisher, RecordStore};
use external_mdns::records::fqdn;

// --- Constants ---

pub const PUBLISH: &str = "external-mdns.blake.github.io/publish";
pub const HOSTNAME: &str = "external-mdns.blake.github.io/hostname";
pub const SERVICE_INSTANCE: &str = "external-mdns.blake.github.io/service-instance";
pub const SERVICE_TXT: &str = "external-mdns.blake.github.io/service-txt";

// --- Cluster object builders ---

/// Builder for `v1/Service` fixtures.
pub struct ServiceBuilder {
    service: Service,
}

impl ServiceBuilder {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            service: Service {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    resource_version: Some("1".to_string()),
                    ..Default::default()
                },
                spec: Some(ServiceSpec {
                    type_: Some("ClusterIP".to_string()),
                    ..Default::default()
                }),
                status: None,
            },
        }
    }

    pub fn annotation(mut self, key: &str, value: &str) -> Self {
        self.service
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn cluster_ip(mut self, ip: &str) -> Self {
        if let Some(spec) = self.service.spec.as_mut() {
            spec.type_ = Some("ClusterIP".to_string());
            spec.cluster_ip = Some(ip.to_string());
        }
        self
    }

    /// Make this a LoadBalancer with the given ingress IPs (empty strings allowed).
    pub fn load_balancer(mut self, ips: &[&str]) -> Self {
        if let Some(spec) = self.service.spec.as_mut() {
            spec.type_ = Some("LoadBalancer".to_string());
        }
        self.service.status = Some(ServiceStatus {
            load_balancer: Some(LoadBalancerStatus {
                ingress: Some(
                    ips.iter()
                        .map(|ip| LoadBalancerIngress {
                            ip: (!ip.is_empty()).then(|| ip.to_string()),
                            ..Default::default()
                        })
                        .collect(),
                ),
            }),
            ..Default::default()
        });
        self
    }

    pub fn port(mut self, name: &str, port: i32, protocol: &str) -> Self {
        if let Some(spec) = self.service.spec.as_mut() {
            spec.ports.get_or_insert_with(Vec::new).push(ServicePort {
                name: (!name.is_empty()).then(|| name.to_string()),
                port,
                protocol: Some(protocol.to_string()),
                ..Default::default()
            });
        }
        self
    }

    pub fn resource_version(mut self, version: &str) -> Self {
        self.service.metadata.resource_version = Some(version.to_string());
        self
    }

    pub fn build(self) -> Service {
        self.service
    }
}

/// Build an Ingress with the given rule hosts and load-balancer IPs.
pub fn ingress(namespace: &str, name: &str, hosts: &[&str], ips: &[&str]) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            rules: Some(
                hosts
                    .iter()
                    .map(|host| IngressRule {
                        host: (!host.is_empty()).then(|| host.to_string()),
                        http: None,
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        status: Some(IngressStatus {
            load_balancer: Some(IngressLoadBalancerStatus {
                ingress: Some(
                    ips.iter()
                        .map(|ip| IngressLoadBalancerIngress {
                            ip: (!ip.is_empty()).then(|| ip.to_string()),
                            ..Default::default()
                        })
                        .collect(),
                ),
            }),
        }),
    }
}

// --- RecordingPublisher ---

/// Publisher call as seen by a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Publish,
    Unpublish,
}

/// Records every publisher call in order.
#[derive(Default)]
pub struct RecordingPublisher {
    calls: Mutex<Vec<(Op, Record)>>,
}

impl RecordingPublisher {
    pub fn calls(&self) -> Vec<(Op, Record)> {
        self.calls.lock().unwrap().clone()
    }

    /// `(op, owner name, type)` for each call, for compact assertions.
    pub fn summary(&self) -> Vec<(Op, String, RecordType)> {
        self.calls()
            .into_iter()
            .map(|(op, r)| (op, r.name().to_string(), r.record_type()))
            .collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, record: Record) {
        self.calls.lock().unwrap().push((Op::Publish, record));
    }

    async fn unpublish(&self, record: Record) {
        self.calls.lock().unwrap().push((Op::Unpublish, record));
    }
}

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// Implements `ResponseHandler` so it can be passed to `Catalog::handle_request()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Parse the captured wire bytes into a `Message` for assertions.
    pub fn into_message(self) -> Message {
        let buf = self.buf.lock().unwrap();
        assert!(!buf.is_empty(), "no response was captured");
        Message::from_vec(&buf).expect("failed to parse captured DNS response")
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(info)
    }
}

// --- Query/Request construction ---

/// Build wire-format bytes for a DNS query.
pub fn build_query_bytes(name: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(false);
    let mut query = Query::new();
    query.set_name(fqdn(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg.to_vec().unwrap()
}

/// Parse wire bytes into a MessageRequest.
pub fn parse_message_request(bytes: &[u8]) -> MessageRequest {
    let mut decoder = BinDecoder::new(bytes);
    MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest")
}

/// Build a full `Request` from a loopback source address.
pub fn build_request(name: &str, record_type: RecordType, id: u16) -> Request {
    let bytes = build_query_bytes(name, record_type, id);
    let msg = parse_message_request(&bytes);
    let src: SocketAddr = "127.0.0.1:12345".parse().unwrap();
    Request::new(msg, src, Protocol::Udp)
}

/// Build a Catalog serving the given store.
pub fn build_catalog(store: RecordStore) -> Catalog {
    let authority = RecordAuthority::new(store);
    let origin = authority.origin().clone();
    let authority: Arc<dyn AuthorityObject> = Arc::new(authority);
    let mut catalog = Catalog::new();
    catalog.upsert(origin, vec![authority]);
    catalog
}

// --- Response helpers ---

/// Execute a query through the catalog and return the parsed response.
pub async fn execute_query(
    catalog: &Catalog,
    name: &str,
    record_type: RecordType,
    id: u16,
) -> Message {
    let request = build_request(name, record_type, id);
    let handler = TestResponseHandler::new();
    catalog.handle_request(&request, handler.clone()).await;
    handler.into_message()
}

/// Extract A/AAAA addresses from a response.
pub fn extract_ips(msg: &Message) -> Vec<IpAddr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
        .collect()
}

/// Extract PTR targets from a response.
pub fn extract_ptr_targets(msg: &Message) -> Vec<String> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::PTR(ptr) => Some(ptr.0.to_string()),
            _ => None,
        })
        .collect()
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}
