use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Nothing listens on port 1, so connections are refused immediately
pub(crate) const UNREACHABLE_URL: &str = "http://127.0.0.1:1/Serv.php";

/// Serve `router` on an ephemeral local port and return its base URL
pub(crate) async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A usable broker role with only the HTTPS tunnel endpoint filled in
pub(crate) fn secure_role(https_ip: &str, https_port: u16, relay_region: &str) -> Value {
    json!({
        "command": "get_server_info",
        "errno": 0,
        "env": {"control_host": "ctl.quickconnect.to", "relay_region": relay_region},
        "service": {"https_ip": https_ip, "https_port": https_port, "port": 0, "ext_port": 0},
        "server": {"serverID": "server-1", "external": {"ip": "", "ipv6": ""}, "interface": []},
        "smartdns": {}
    })
}

pub(crate) fn failed_role(errno: i64) -> Value {
    json!({"command": "get_server_info", "errno": errno})
}
