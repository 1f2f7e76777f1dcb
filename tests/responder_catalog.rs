//! Catalog-level tests for the unicast responder.
//!
//! Queries go through Hickory's full `Catalog` → `RequestHandler::handle_request()`
//! → `Authority::search()` path against a `RecordStore` filled by the
//! dispatcher. No root or network privileges required.

mod common;

use std::net::IpAddr;

use common::*;
use external_mdns::config::SyncConfig;
use external_mdns::dispatcher::Dispatcher;
use external_mdns::event::{Action, ResourceEvent, SourceKind};
use external_mdns::publisher::RecordStore;
use external_mdns::source::{IngressSource, RecordSource, ServiceSource};
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{RData, RecordType};

fn config() -> SyncConfig {
    SyncConfig {
        record_ttl: 120,
        ..Default::default()
    }
}

/// Store holding the records of one published LoadBalancer Service.
async fn published_service_store() -> RecordStore {
    let store = RecordStore::new();
    let service = ServiceBuilder::new("default", "example")
        .annotation(PUBLISH, "")
        .annotation(SERVICE_INSTANCE, "example")
        .load_balancer(&["192.0.2.10"])
        .port("http", 80, "TCP")
        .build();
    let records = ServiceSource::new(config()).build_records(&service);
    Dispatcher::new(store.clone(), 120)
        .dispatch(ResourceEvent::new(SourceKind::Service, Action::Added, records))
        .await;
    store
}

// =========================================================================
// Answers
// =========================================================================

#[tokio::test]
async fn a_query_returns_service_address() {
    let catalog = build_catalog(published_service_store().await);
    let msg = execute_query(&catalog, "example.default.local.", RecordType::A, 1).await;

    assert_response_code(&msg, ResponseCode::NoError);
    assert_eq!(extract_ips(&msg), vec!["192.0.2.10".parse::<IpAddr>().unwrap()]);
    assert_eq!(msg.answers()[0].ttl(), 120);
}

#[tokio::test]
async fn reverse_query_returns_hostname() {
    let catalog = build_catalog(published_service_store().await);
    let msg = execute_query(&catalog, "10.2.0.192.in-addr.arpa.", RecordType::PTR, 2).await;

    assert_response_code(&msg, ResponseCode::NoError);
    assert_eq!(extract_ptr_targets(&msg), vec!["example.default.local.".to_string()]);
}

#[tokio::test]
async fn service_browse_returns_instance() {
    let catalog = build_catalog(published_service_store().await);
    let msg = execute_query(&catalog, "_http._tcp.local.", RecordType::PTR, 3).await;

    assert_response_code(&msg, ResponseCode::NoError);
    assert_eq!(
        extract_ptr_targets(&msg),
        vec!["example._http._tcp.local.".to_string()]
    );
}

#[tokio::test]
async fn srv_query_returns_port_and_target() {
    let catalog = build_catalog(published_service_store().await);
    let msg = execute_query(&catalog, "example._http._tcp.local.", RecordType::SRV, 4).await;

    assert_response_code(&msg, ResponseCode::NoError);
    assert_eq!(msg.answers().len(), 1);
    match msg.answers()[0].data() {
        RData::SRV(srv) => {
            assert_eq!(srv.port(), 80);
            assert_eq!(srv.target().to_string(), "example.default.local.");
        }
        other => panic!("expected SRV, got {other:?}"),
    }
}

#[tokio::test]
async fn query_is_case_insensitive() {
    let catalog = build_catalog(published_service_store().await);
    let msg = execute_query(&catalog, "Example.Default.LOCAL.", RecordType::A, 5).await;

    assert_response_code(&msg, ResponseCode::NoError);
    assert_eq!(extract_ips(&msg).len(), 1);
}

// =========================================================================
// Negative answers
// =========================================================================

#[tokio::test]
async fn unknown_name_nxdomain() {
    let catalog = build_catalog(published_service_store().await);
    let msg = execute_query(&catalog, "missing.local.", RecordType::A, 6).await;

    assert_response_code(&msg, ResponseCode::NXDomain);
    assert!(msg.answers().is_empty());
}

#[tokio::test]
async fn known_name_other_type_is_empty_noerror() {
    let catalog = build_catalog(published_service_store().await);
    let msg = execute_query(&catalog, "example.default.local.", RecordType::AAAA, 7).await;

    assert_response_code(&msg, ResponseCode::NoError);
    assert!(msg.answers().is_empty());
}

#[tokio::test]
async fn empty_store_nxdomain() {
    let catalog = build_catalog(RecordStore::new());
    let msg = execute_query(&catalog, "example.default.local.", RecordType::A, 8).await;

    assert_response_code(&msg, ResponseCode::NXDomain);
}

// =========================================================================
// Store mutation
// =========================================================================

#[tokio::test]
async fn ingress_host_visible_after_add_and_gone_after_remove() {
    let store = RecordStore::new();
    let catalog = build_catalog(store.clone());
    let dispatcher = Dispatcher::new(store.clone(), 120);
    let source = IngressSource::new(config());
    let web = ingress("default", "web", &["app.local"], &["fd00::20"]);

    let msg = execute_query(&catalog, "app.local.", RecordType::AAAA, 9).await;
    assert_response_code(&msg, ResponseCode::NXDomain);

    dispatcher
        .dispatch(ResourceEvent::new(
            SourceKind::Ingress,
            Action::Added,
            source.build_records(&web),
        ))
        .await;
    let msg = execute_query(&catalog, "app.local.", RecordType::AAAA, 10).await;
    assert_response_code(&msg, ResponseCode::NoError);
    assert_eq!(extract_ips(&msg), vec!["fd00::20".parse::<IpAddr>().unwrap()]);

    dispatcher
        .dispatch(ResourceEvent::new(
            SourceKind::Ingress,
            Action::Removed,
            source.build_records(&web),
        ))
        .await;
    let msg = execute_query(&catalog, "app.local.", RecordType::AAAA, 11).await;
    assert_response_code(&msg, ResponseCode::NXDomain);
}

#[tokio::test]
async fn shared_address_keeps_both_ingress_hosts() {
    let store = RecordStore::new();
    let catalog = build_catalog(store.clone());
    let dispatcher = Dispatcher::new(store.clone(), 120);
    let source = IngressSource::new(config());

    for (name, host) in [("a", "a.local"), ("b", "b.local")] {
        let obj = ingress("default", name, &[host], &["192.0.2.20"]);
        dispatcher
            .dispatch(ResourceEvent::new(
                SourceKind::Ingress,
                Action::Added,
                source.build_records(&obj),
            ))
            .await;
    }

    for (id, host) in [(12, "a.local."), (13, "b.local.")] {
        let msg = execute_query(&catalog, host, RecordType::A, id).await;
        assert_response_code(&msg, ResponseCode::NoError);
        assert_eq!(extract_ips(&msg), vec!["192.0.2.20".parse::<IpAddr>().unwrap()]);
    }
}
