use serde::Serialize;
use shared::protocol::{QUERY_VERSION, RELAY_ROLE_SUFFIX, SECURE_ROLE_SUFFIX};

/// Commands understood by the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerCommand {
    GetServerInfo,
    RequestTunnel,
}

/// One sub-query of the two-element broker request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerQuery {
    pub version: u32,
    pub command: BrokerCommand,
    pub stop_when_error: bool,
    pub stop_when_success: bool,
    pub id: String,
    #[serde(rename = "serverID")]
    pub server_id: String,
    pub is_gofile: bool,
}

impl ServerQuery {
    fn new(command: BrokerCommand, portal_id: String, server_id: &str) -> Self {
        Self {
            version: QUERY_VERSION,
            command,
            stop_when_error: false,
            stop_when_success: false,
            id: portal_id,
            server_id: server_id.to_string(),
            is_gofile: false,
        }
    }
}

/// Builds the request body: the secure-portal query first, the plain-portal
/// query second. The broker answers in the same order.
pub fn build_queries(command: BrokerCommand, server_type: &str, server_id: &str) -> [ServerQuery; 2] {
    [
        ServerQuery::new(command, format!("{server_type}{SECURE_ROLE_SUFFIX}"), server_id),
        ServerQuery::new(command, format!("{server_type}{RELAY_ROLE_SUFFIX}"), server_id),
    ]
}
