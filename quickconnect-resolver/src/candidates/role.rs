use std::net::IpAddr;
use shared::types::{PriorityType, TopologyInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Secure,
    Relay,
}

/// Everything that differs between the two broker roles: which rank each
/// host source lands on and where the tunnel endpoint is read from.
/// Both roles share one emission routine driven by this table.
#[derive(Clone, Copy)]
pub struct RoleDescriptor {
    pub role: Role,
    pub tunnel: PriorityType,
    pub smart_lan_v4: PriorityType,
    pub smart_lan_v6: PriorityType,
    pub lan_v4: PriorityType,
    pub lan_v6: PriorityType,
    pub fqdn: PriorityType,
    pub ddns: PriorityType,
    pub smart_host: PriorityType,
    pub smart_wan_v6: PriorityType,
    pub smart_wan_v4: PriorityType,
    pub wan_v6: PriorityType,
    pub wan_v4: PriorityType,
    pub tunnel_endpoint: fn(&TopologyInfo) -> (&str, u16),
}

pub const SECURE: RoleDescriptor = RoleDescriptor {
    role: Role::Secure,
    tunnel: PriorityType::HttpsTun,
    smart_lan_v4: PriorityType::HttpsSmartLanIpv4,
    smart_lan_v6: PriorityType::HttpsSmartLanIpv6,
    lan_v4: PriorityType::HttpsLanIpv4,
    lan_v6: PriorityType::HttpsLanIpv6,
    fqdn: PriorityType::HttpsFqdn,
    ddns: PriorityType::HttpsDdns,
    smart_host: PriorityType::HttpsSmartHost,
    smart_wan_v6: PriorityType::HttpsSmartWanIpv6,
    smart_wan_v4: PriorityType::HttpsSmartWanIpv4,
    wan_v6: PriorityType::HttpsWanIpv6,
    wan_v4: PriorityType::HttpsWanIpv4,
    tunnel_endpoint: https_endpoint,
};

pub const RELAY: RoleDescriptor = RoleDescriptor {
    role: Role::Relay,
    tunnel: PriorityType::HttpTun,
    smart_lan_v4: PriorityType::HttpLanIpv4,
    smart_lan_v6: PriorityType::HttpLanIpv6,
    lan_v4: PriorityType::HttpLanIpv4,
    lan_v6: PriorityType::HttpLanIpv6,
    fqdn: PriorityType::HttpFqdn,
    ddns: PriorityType::HttpDdns,
    smart_host: PriorityType::HttpDdns,
    smart_wan_v6: PriorityType::HttpWanIpv6,
    smart_wan_v4: PriorityType::HttpWanIpv4,
    wan_v6: PriorityType::HttpWanIpv6,
    wan_v4: PriorityType::HttpWanIpv4,
    tunnel_endpoint: relay_endpoint,
};

fn https_endpoint(info: &TopologyInfo) -> (&str, u16) {
    (&info.service.https_ip, info.service.https_port)
}

fn relay_endpoint(info: &TopologyInfo) -> (&str, u16) {
    (&info.service.relay_ip, info.service.relay_port)
}

impl RoleDescriptor {
    pub fn scheme(&self) -> &'static str {
        self.tunnel.scheme()
    }

    /// Rank for a ping-pong host: LAN ranks for private addresses,
    /// WAN ranks otherwise, split by address family. Hostnames count as WAN IPv4.
    pub fn pingpong_rank(&self, host: &str) -> PriorityType {
        match parse_ip(host) {
            Some(ip @ IpAddr::V6(_)) if is_private_ip(ip) => self.lan_v6,
            Some(IpAddr::V6(_)) => self.wan_v6,
            Some(ip) if is_private_ip(ip) => self.lan_v4,
            _ => self.wan_v4,
        }
    }
}

/// True for RFC 1918 IPv4 and unique-local (fc00::/7) IPv6 literals
pub fn is_private_address(host: &str) -> bool {
    parse_ip(host).is_some_and(is_private_ip)
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

fn parse_ip(host: &str) -> Option<IpAddr> {
    host.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_address_ranges() {
        assert!(is_private_address("10.0.0.8"));
        assert!(is_private_address("172.16.4.1"));
        assert!(is_private_address("172.31.255.255"));
        assert!(is_private_address("192.168.1.20"));
        assert!(is_private_address("fd12:3456::1"));
        assert!(is_private_address("[fc00::1]"));

        assert!(!is_private_address("172.32.0.1"));
        assert!(!is_private_address("8.8.8.8"));
        assert!(!is_private_address("2001:db8::1"));
        assert!(!is_private_address("nas.example.com"));
        assert!(!is_private_address(""));
    }

    #[test]
    fn test_pingpong_rank_by_address_kind() {
        assert_eq!(SECURE.pingpong_rank("192.168.1.20"), PriorityType::HttpsLanIpv4);
        assert_eq!(SECURE.pingpong_rank("fd00::20"), PriorityType::HttpsLanIpv6);
        assert_eq!(SECURE.pingpong_rank("2001:db8::20"), PriorityType::HttpsWanIpv6);
        assert_eq!(SECURE.pingpong_rank("93.184.216.34"), PriorityType::HttpsWanIpv4);
        assert_eq!(SECURE.pingpong_rank("nas.example.com"), PriorityType::HttpsWanIpv4);

        assert_eq!(RELAY.pingpong_rank("10.1.1.1"), PriorityType::HttpLanIpv4);
        assert_eq!(RELAY.pingpong_rank("2001:db8::20"), PriorityType::HttpWanIpv6);
    }

    #[test]
    fn test_every_rank_matches_role_scheme() {
        for role in [SECURE, RELAY] {
            let ranks = [
                role.tunnel,
                role.smart_lan_v4,
                role.smart_lan_v6,
                role.lan_v4,
                role.lan_v6,
                role.fqdn,
                role.ddns,
                role.smart_host,
                role.smart_wan_v6,
                role.smart_wan_v4,
                role.wan_v6,
                role.wan_v4,
            ];
            for rank in ranks {
                assert_eq!(rank.scheme(), role.scheme(), "{rank} in {:?}", role.role);
            }
        }
    }
}
