//! Record builders.
//!
//! Pure functions turning names and addresses into the records that get
//! announced:
//! - forward A/AAAA records, optionally paired with a reverse PTR
//! - DNS-SD bundles (PTR, SRV, TXT) for one exposed port
//!
//! Every builder returns a possibly empty `Vec<Record>`. Inputs that cannot be
//! represented (empty required fields, unsupported protocol, invalid names)
//! produce no records rather than an error. TTL is left at zero and the class
//! at `IN`; the dispatcher stamps both before publishing.

use hickory_proto::rr::rdata::{A, AAAA, PTR, SRV, TXT};
use hickory_proto::rr::{Name, RData, Record};
use hickory_proto::ProtoError;
use std::fmt::Write;
use std::net::IpAddr;
use tracing::debug;

use crate::descriptor::Protocol;

/// Domain every advertised name lives under.
pub const LOCAL_DOMAIN: &str = "local.";

const IN_ADDR_ARPA: &str = "in-addr.arpa.";
const IP6_ARPA: &str = "ip6.arpa.";

/// Parse a dotted name into a fully-qualified `Name`.
///
/// Labels are taken as raw bytes so DNS-SD instance names like
/// `default/example` survive intact. A single trailing dot is optional; empty
/// labels are rejected.
pub fn fqdn(name: &str) -> Result<Name, ProtoError> {
    let trimmed = name.strip_suffix('.').unwrap_or(name);
    if trimmed.is_empty() || trimmed.split('.').any(str::is_empty) {
        return Err(ProtoError::from(format!("empty label in name {name:?}")));
    }
    Name::from_labels(trimmed.split('.').map(str::as_bytes))
}

/// IPv4-mapped IPv6 addresses are treated as IPv4.
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

/// Reverse-lookup owner name for an address.
///
/// IPv4 `a.b.c.d` becomes `d.c.b.a.in-addr.arpa.`. IPv6 becomes 32 nibble
/// labels, last byte first and low nibble before high nibble, under
/// `ip6.arpa.`.
pub fn reverse_name(ip: IpAddr) -> String {
    let mut out = String::with_capacity(72);
    match canonical(ip) {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            let _ = write!(out, "{d}.{c}.{b}.{a}.{IN_ADDR_ARPA}");
        }
        IpAddr::V6(v6) => {
            for byte in v6.octets().iter().rev() {
                let _ = write!(out, "{:x}.{:x}.", byte & 0x0f, byte >> 4);
            }
            out.push_str(IP6_ARPA);
        }
    }
    out
}

/// Build the forward record for `name`, followed by the reverse PTR when
/// `reverse` is set.
pub fn address_records(name: &str, ip: IpAddr, reverse: bool) -> Vec<Record> {
    let owner = match fqdn(name) {
        Ok(owner) => owner,
        Err(e) => {
            debug!(name, error = %e, "skipping address records: invalid name");
            return Vec::new();
        }
    };

    let ip = canonical(ip);
    let forward = match ip {
        IpAddr::V4(v4) => RData::A(A::from(v4)),
        IpAddr::V6(v6) => RData::AAAA(AAAA::from(v6)),
    };

    let mut records = vec![Record::from_rdata(owner.clone(), 0, forward)];

    if reverse {
        match fqdn(&reverse_name(ip)) {
            Ok(reverse_owner) => {
                records.push(Record::from_rdata(reverse_owner, 0, RData::PTR(PTR(owner))));
            }
            Err(e) => debug!(%ip, error = %e, "skipping reverse record"),
        }
    }

    records
}

/// Build the DNS-SD bundle for one port: PTR, SRV and TXT, in that order.
///
/// Owner names are `_<service>._<proto>.local.` for the PTR and
/// `<instance>._<service>._<proto>.local.` for the SRV and TXT. The service
/// name is lowercased. Empty text yields a single empty string.
pub fn service_discovery_records(
    instance: &str,
    service: &str,
    protocol: &Protocol,
    hostname: &str,
    port: u16,
    txt: &[String],
) -> Vec<Record> {
    if instance.is_empty() || service.is_empty() || hostname.is_empty() || port == 0 {
        return Vec::new();
    }

    let Some(proto) = protocol.dns_sd_label() else {
        debug!(service, protocol = %protocol, "skipping DNS-SD bundle: unsupported protocol");
        return Vec::new();
    };

    let group = format!("_{}._{}.{}", service.to_lowercase(), proto, LOCAL_DOMAIN);
    let instance_owner = format!("{instance}.{group}");

    let names = fqdn(&group).and_then(|group| {
        let instance = fqdn(&instance_owner)?;
        let target = fqdn(hostname)?;
        Ok((group, instance, target))
    });
    let (group, instance_owner, target) = match names {
        Ok(names) => names,
        Err(e) => {
            debug!(instance, service, hostname, error = %e, "skipping DNS-SD bundle: invalid name");
            return Vec::new();
        }
    };

    let txt = if txt.is_empty() {
        vec![String::new()]
    } else {
        txt.to_vec()
    };

    vec![
        Record::from_rdata(group, 0, RData::PTR(PTR(instance_owner.clone()))),
        Record::from_rdata(
            instance_owner.clone(),
            0,
            RData::SRV(SRV::new(0, 0, port, target)),
        ),
        Record::from_rdata(instance_owner, 0, RData::TXT(TXT::new(txt))),
    ]
}
