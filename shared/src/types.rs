use std::collections::HashSet;
use std::fmt;
use serde::{Deserialize, Deserializer, Serialize};

/// The broker sends `null` for fields it has no value for; treat those
/// the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One role's answer from the broker ("secure" or "relay").
/// All fields are zero/empty when `err_no` is non-zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub command: String,

    /// 0 means the role's data is usable
    #[serde(rename = "errno", deserialize_with = "null_as_default")]
    pub err_no: i64,

    #[serde(deserialize_with = "null_as_default")]
    pub env: Env,

    #[serde(deserialize_with = "null_as_default")]
    pub service: Service,

    #[serde(deserialize_with = "null_as_default")]
    pub server: Server,

    #[serde(rename = "smartdns", deserialize_with = "null_as_default")]
    pub smart_dns: SmartDns,
}

impl TopologyInfo {
    /// Placeholder for a role the broker reported as failed
    pub fn absent(command: impl Into<String>, err_no: i64) -> Self {
        Self {
            command: command.into(),
            err_no,
            ..Self::default()
        }
    }

    pub fn is_usable(&self) -> bool {
        self.err_no == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Env {
    #[serde(deserialize_with = "null_as_default")]
    pub control_host: String,
    #[serde(deserialize_with = "null_as_default")]
    pub relay_region: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    #[serde(deserialize_with = "null_as_default")]
    pub port: u16,
    #[serde(deserialize_with = "null_as_default")]
    pub ext_port: u16,
    #[serde(deserialize_with = "null_as_default")]
    pub relay_ip: String,
    #[serde(deserialize_with = "null_as_default")]
    pub relay_ipv6: String,
    #[serde(deserialize_with = "null_as_default")]
    pub relay_port: u16,
    #[serde(deserialize_with = "null_as_default")]
    pub https_ip: String,
    #[serde(deserialize_with = "null_as_default")]
    pub https_port: u16,
    #[serde(rename = "pingpong_desc", deserialize_with = "null_as_default")]
    pub pingpong_hosts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    #[serde(deserialize_with = "null_as_default")]
    pub ddns: String,
    #[serde(deserialize_with = "null_as_default")]
    pub fqdn: String,
    #[serde(deserialize_with = "null_as_default")]
    pub external: ExternalAddress,
    #[serde(rename = "serverID", deserialize_with = "null_as_default")]
    pub server_id: String,
    #[serde(rename = "interface", deserialize_with = "null_as_default")]
    pub interfaces: Vec<Interface>,
}

/// Public addresses the device last reported to the broker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalAddress {
    #[serde(deserialize_with = "null_as_default")]
    pub ip: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ipv6: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Interface {
    #[serde(deserialize_with = "null_as_default")]
    pub ip: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ipv6: Vec<Ipv6Entry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ipv6Entry {
    #[serde(deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(deserialize_with = "null_as_default")]
    pub scope: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartDns {
    #[serde(deserialize_with = "null_as_default")]
    pub host: String,
    #[serde(deserialize_with = "null_as_default")]
    pub external: String,
    #[serde(deserialize_with = "null_as_default")]
    pub externalv6: String,
    #[serde(deserialize_with = "null_as_default")]
    pub lan: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub lanv6: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub hole_punch: String,
}

/// Priority rank of a candidate URL. Lower ordinal is preferred.
///
/// The rank encodes both the scheme and where the address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PriorityType {
    HttpsSmartLanIpv4 = 0,
    HttpsSmartLanIpv6 = 1,
    HttpsLanIpv4 = 2,
    HttpsLanIpv6 = 3,
    HttpsFqdn = 4,
    HttpsDdns = 5,
    HttpsSmartHost = 6,
    HttpsSmartWanIpv6 = 7,
    HttpsSmartWanIpv4 = 8,
    HttpsWanIpv6 = 9,
    HttpsWanIpv4 = 10,
    HttpLanIpv4 = 11,
    HttpLanIpv6 = 12,
    HttpFqdn = 13,
    HttpDdns = 14,
    HttpWanIpv6 = 15,
    HttpWanIpv4 = 16,
    HttpsTun = 17,
    HttpTun = 18,
}

impl PriorityType {
    pub const ALL: [PriorityType; 19] = [
        PriorityType::HttpsSmartLanIpv4,
        PriorityType::HttpsSmartLanIpv6,
        PriorityType::HttpsLanIpv4,
        PriorityType::HttpsLanIpv6,
        PriorityType::HttpsFqdn,
        PriorityType::HttpsDdns,
        PriorityType::HttpsSmartHost,
        PriorityType::HttpsSmartWanIpv6,
        PriorityType::HttpsSmartWanIpv4,
        PriorityType::HttpsWanIpv6,
        PriorityType::HttpsWanIpv4,
        PriorityType::HttpLanIpv4,
        PriorityType::HttpLanIpv6,
        PriorityType::HttpFqdn,
        PriorityType::HttpDdns,
        PriorityType::HttpWanIpv6,
        PriorityType::HttpWanIpv4,
        PriorityType::HttpsTun,
        PriorityType::HttpTun,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal)).copied()
    }

    /// Secure ranks are everything below the first plain-HTTP rank, plus the HTTPS tunnel
    pub fn is_secure(self) -> bool {
        self < PriorityType::HttpLanIpv4 || self == PriorityType::HttpsTun
    }

    pub fn scheme(self) -> &'static str {
        if self.is_secure() {
            "https"
        } else {
            "http"
        }
    }
}

impl fmt::Display for PriorityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.ordinal())
    }
}

/// Outcome of verifying one candidate. Anything but `Unknown` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnState {
    #[default]
    Unknown,
    Ok,
    ConnectFailed,
    InvalidServer,
}

impl ConnState {
    pub fn is_terminal(self) -> bool {
        self != ConnState::Unknown
    }
}

/// A single candidate URL (`scheme://host:port`, no path) with its rank and
/// the result of its verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub url: String,
    pub priority: PriorityType,
    pub state: ConnState,
}

impl Record {
    pub fn new(url: impl Into<String>, priority: PriorityType) -> Self {
        Self {
            url: url.into(),
            priority,
            state: ConnState::Unknown,
        }
    }

    /// Records the verification outcome. Returns false, leaving the record
    /// untouched, if a terminal state was already set or `state` is `Unknown`.
    pub fn set_state(&mut self, state: ConnState) -> bool {
        if self.state.is_terminal() || !state.is_terminal() {
            return false;
        }
        self.state = state;
        true
    }
}

/// Candidates for one resolution, kept sorted by rank with unique URLs.
///
/// The URL set lives inside the value, so deduplication never leaks
/// between unrelated resolutions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    pub server_id: String,
    records: Vec<Record>,
    #[serde(skip)]
    seen_urls: HashSet<String>,
}

impl ResolutionResult {
    pub fn new(server_id: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            ..Self::default()
        }
    }

    /// Inserts a record after every record of equal or better rank.
    /// Returns false if the URL was already present; the first occurrence wins.
    pub fn add(&mut self, record: Record) -> bool {
        if !self.seen_urls.insert(record.url.clone()) {
            return false;
        }
        let at = self
            .records
            .partition_point(|existing| existing.priority <= record.priority);
        self.records.insert(at, record);
        true
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes the outcome for the record at `index`, see [`Record::set_state`]
    pub fn set_state(&mut self, index: usize, state: ConnState) -> bool {
        self.records
            .get_mut(index)
            .is_some_and(|record| record.set_state(state))
    }

    /// URLs verified `Ok`, most preferred first
    pub fn verified_urls(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|record| record.state == ConnState::Ok)
            .map(|record| record.url.clone())
            .collect()
    }
}
