//! Annotation policy: which resources get advertised, and under what names.

use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::descriptor::ServiceDescriptor;

/// Prefix shared by every recognized annotation.
pub const ANNOTATION_PREFIX: &str = "external-mdns.blake.github.io/";

/// Overrides the default `<name>.<namespace>.local.` hostname.
pub const HOSTNAME_ANNOTATION: &str = "external-mdns.blake.github.io/hostname";

/// Overrides the default `<namespace>/<name>` DNS-SD instance name.
pub const SERVICE_INSTANCE_ANNOTATION: &str = "external-mdns.blake.github.io/service-instance";

/// JSON object of per-port TXT key/value pairs.
pub const SERVICE_TXT_ANNOTATION: &str = "external-mdns.blake.github.io/service-txt";

/// Presence marks a Service for publication.
pub const PUBLISH_ANNOTATION: &str = "external-mdns.blake.github.io/publish";

const LOCAL_SUFFIX: &str = ".local";

/// Outcome of evaluating a Service's annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityDecision {
    /// Whether the Service should produce records at all.
    pub eligible: bool,
    /// Normalized hostname, ending in `.local.`.
    pub hostname: String,
    /// DNS-SD instance name.
    pub instance_name: String,
    /// `key=value` TXT strings per port name.
    pub text_by_port: HashMap<String, Vec<String>>,
}

impl EligibilityDecision {
    /// TXT strings for a port; empty when none were configured.
    pub fn text_for(&self, port_name: &str) -> &[String] {
        self.text_by_port
            .get(port_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Ensure exactly one trailing dot and a `.local.` suffix.
///
/// `printer` becomes `printer.local.`; `example.default.local` becomes
/// `example.default.local.`. Idempotent.
pub fn normalize_hostname(hostname: &str) -> String {
    let mut name = hostname.trim_end_matches('.').to_string();
    name.push('.');
    if !name.ends_with(".local.") {
        name.push_str("local.");
    }
    name
}

/// Whether a resource passes the namespace restriction.
pub fn in_namespace(filter: Option<&str>, namespace: &str) -> bool {
    match filter {
        Some(only) => only == namespace,
        None => true,
    }
}

/// Whether an Ingress rule host should be advertised.
pub fn ingress_host_eligible(host: &str) -> bool {
    !host.is_empty() && host.ends_with(LOCAL_SUFFIX)
}

/// Flatten the `service-txt` annotation into sorted `key=value` strings per
/// port. Anything that is not an object of string-valued objects is ignored.
pub fn parse_service_txt(raw: &str) -> HashMap<String, Vec<String>> {
    if raw.is_empty() {
        return HashMap::new();
    }

    match serde_json::from_str::<BTreeMap<String, BTreeMap<String, String>>>(raw) {
        Ok(by_port) => by_port
            .into_iter()
            .map(|(port, pairs)| {
                let strings = pairs.into_iter().map(|(k, v)| format!("{k}={v}")).collect();
                (port, strings)
            })
            .collect(),
        Err(e) => {
            debug!(error = %e, "ignoring malformed service-txt annotation");
            HashMap::new()
        }
    }
}

/// Decide whether a Service is published and with which names.
///
/// A Service is eligible when `publish_all` is set, or when any of the
/// hostname, service-instance, service-txt or publish annotations is present.
/// Presence alone counts; an empty value still makes the Service eligible.
pub fn evaluate_service(service: &ServiceDescriptor, publish_all: bool) -> EligibilityDecision {
    let annotations = &service.annotations;

    let hostname_override = annotations.get(HOSTNAME_ANNOTATION);
    let instance_override = annotations.get(SERVICE_INSTANCE_ANNOTATION);
    let txt = annotations.get(SERVICE_TXT_ANNOTATION);
    let publish_marker = annotations.contains_key(PUBLISH_ANNOTATION);

    let eligible = publish_all
        || hostname_override.is_some()
        || instance_override.is_some()
        || txt.is_some()
        || publish_marker;

    let hostname = match hostname_override {
        Some(hostname) => normalize_hostname(hostname),
        None => normalize_hostname(&format!(
            "{}.{}.local.",
            service.name, service.namespace
        )),
    };

    let instance_name = instance_override
        .cloned()
        .unwrap_or_else(|| format!("{}/{}", service.namespace, service.name));

    let text_by_port = txt.map(|raw| parse_service_txt(raw)).unwrap_or_default();

    EligibilityDecision {
        eligible,
        hostname,
        instance_name,
        text_by_port,
    }
}
