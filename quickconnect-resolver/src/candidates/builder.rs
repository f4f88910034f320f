use std::net::Ipv6Addr;
use shared::protocol::{ABSENT_HOST, RELAY_DOMAIN};
use shared::types::{PriorityType, Record, ResolutionResult, TopologyInfo};
use crate::candidates::role::{RoleDescriptor, RELAY, SECURE};

/// Turn the two broker roles into a ranked, deduplicated candidate list.
///
/// Roles with a non-zero errno contribute nothing. An empty result is not
/// an error here; it surfaces later as "cannot access".
pub fn build_candidates(secure: &TopologyInfo, relay: &TopologyInfo, id: &str) -> ResolutionResult {
    let server_id = [secure, relay]
        .into_iter()
        .find(|info| info.is_usable())
        .map(|info| info.server.server_id.clone())
        .unwrap_or_default();

    let mut result = ResolutionResult::new(server_id);
    for (descriptor, info) in [(&SECURE, secure), (&RELAY, relay)] {
        if !info.is_usable() {
            tracing::debug!("Skipping {:?} role with errno {}", descriptor.role, info.err_no);
            continue;
        }
        emit_role(&mut result, descriptor, info, id);
    }
    result
}

fn emit_role(result: &mut ResolutionResult, role: &RoleDescriptor, info: &TopologyInfo, id: &str) {
    let (tunnel_ip, tunnel_port) = (role.tunnel_endpoint)(info);
    if is_present(tunnel_ip) && tunnel_port != 0 {
        let host = tunnel_host(id, &info.env.relay_region, tunnel_ip);
        push(result, &host, tunnel_port, role.tunnel);
    }

    // a device may answer on either its internal or its forwarded port
    let ports = [info.service.port, info.service.ext_port];
    let mut emit = |host: &str, rank: PriorityType| {
        for port in ports {
            push(result, host, port, rank);
        }
    };

    emit(&info.server.ddns, role.ddns);
    emit(&info.server.fqdn, role.fqdn);
    emit(&info.smart_dns.host, role.smart_host);
    emit(&info.smart_dns.externalv6, role.smart_wan_v6);
    emit(&info.smart_dns.external, role.smart_wan_v4);
    for host in &info.service.pingpong_hosts {
        emit(host, role.pingpong_rank(host));
    }
    for host in &info.smart_dns.lan {
        emit(host, role.smart_lan_v4);
    }
    for host in &info.smart_dns.lanv6 {
        emit(host, role.smart_lan_v6);
    }
}

fn push(result: &mut ResolutionResult, host: &str, port: u16, rank: PriorityType) {
    if !is_present(host) || port == 0 {
        return;
    }
    let url = format_url(rank.scheme(), host, port);
    if result.add(Record::new(url.as_str(), rank)) {
        tracing::trace!("Added candidate {} at rank {}", url, rank);
    }
}

fn is_present(host: &str) -> bool {
    let host = host.trim();
    !host.is_empty() && !host.eq_ignore_ascii_case(ABSENT_HOST)
}

/// The relay-region host when a region is known, the raw endpoint IP otherwise
fn tunnel_host(id: &str, relay_region: &str, endpoint_ip: &str) -> String {
    let region = relay_region.trim();
    if region.is_empty() {
        endpoint_ip.trim().to_string()
    } else {
        format!("{id}.{region}.{RELAY_DOMAIN}")
    }
}

/// `scheme://host:port`, with IPv6 literals bracketed
pub fn format_url(scheme: &str, host: &str, port: u16) -> String {
    let host = host.trim();
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("{scheme}://[{host}]:{port}")
    } else {
        format!("{scheme}://{host}:{port}")
    }
}
