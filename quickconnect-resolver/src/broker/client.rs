use std::time::Duration;
use serde_json::Value;
use shared::protocol::{DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SERVER_TYPE};
use shared::types::TopologyInfo;
use crate::broker::query::{build_queries, BrokerCommand};
use crate::error::{ResolveError, Result};

/// Issues the two-role topology query against a broker endpoint
#[derive(Debug, Clone)]
pub struct BrokerClient {
    http: reqwest::Client,
    url: String,
    fallback_url: Option<String>,
    server_type: String,
    timeout: Duration,
}

impl BrokerClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            fallback_url: None,
            server_type: DEFAULT_SERVER_TYPE.to_string(),
            timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }

    /// Endpoint queried once if the primary cannot be reached
    pub fn with_fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    pub fn with_server_type(mut self, server_type: impl Into<String>) -> Self {
        self.server_type = server_type.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the (secure, relay) topology for `id`.
    ///
    /// A transport failure against the primary endpoint is retried once
    /// against the fallback; a malformed answer is not.
    pub async fn fetch_topology(&self, id: &str) -> Result<(TopologyInfo, TopologyInfo)> {
        let primary = self.fetch_from(&self.url, id).await;

        match (primary, self.fallback_url.as_deref()) {
            (Err(ResolveError::Transport { url, source }), Some(fallback)) => {
                tracing::warn!("Broker {} unreachable ({}), trying {}", url, source, fallback);
                self.fetch_from(fallback, id).await
            }
            (result, _) => result,
        }
    }

    async fn fetch_from(&self, url: &str, id: &str) -> Result<(TopologyInfo, TopologyInfo)> {
        let queries = build_queries(BrokerCommand::GetServerInfo, &self.server_type, id);
        tracing::debug!("Querying broker {} for {}", url, id);

        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(&queries)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| transport(url, source))?;

        let body = response
            .bytes()
            .await
            .map_err(|source| transport(url, source))?;

        parse_topology(&body)
    }
}

fn transport(url: &str, source: reqwest::Error) -> ResolveError {
    ResolveError::Transport {
        url: url.to_string(),
        source,
    }
}

/// Parse the broker's two-element reply. At least one role must be usable.
pub fn parse_topology(body: &[u8]) -> Result<(TopologyInfo, TopologyInfo)> {
    let items: Vec<Value> = serde_json::from_slice(body)
        .map_err(|e| ResolveError::Parse(format!("reply is not a JSON array: {e}")))?;

    let [secure, relay]: [Value; 2] = items.try_into().map_err(|items: Vec<Value>| {
        ResolveError::Parse(format!("expected 2 role entries, got {}", items.len()))
    })?;

    let secure = parse_role(secure, "secure")?;
    let relay = parse_role(relay, "relay")?;

    if !secure.is_usable() && !relay.is_usable() {
        return Err(ResolveError::Parse(format!(
            "no usable role (errno {} and {})",
            secure.err_no, relay.err_no
        )));
    }

    Ok((secure, relay))
}

fn parse_role(value: Value, role: &str) -> Result<TopologyInfo> {
    let err_no = value
        .get("errno")
        .and_then(Value::as_i64)
        .ok_or_else(|| ResolveError::Parse(format!("{role} entry has no integer errno")))?;

    if err_no != 0 {
        let command = value
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default();
        tracing::warn!("Broker returned errno {} for the {} role", err_no, role);
        return Ok(TopologyInfo::absent(command, err_no));
    }

    serde_json::from_value(value)
        .map_err(|e| ResolveError::Parse(format!("{role} entry is malformed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::json;
    use crate::testing::{secure_role, spawn_server, UNREACHABLE_URL};

    fn reply(secure: Value, relay: Value) -> Router {
        Router::new().route(
            "/Serv.php",
            post(move || {
                let body = json!([secure.clone(), relay.clone()]);
                async move { Json(body) }
            }),
        )
    }

    fn client(url: String) -> BrokerClient {
        BrokerClient::new(reqwest::Client::new(), url).with_timeout(Duration::from_secs(2))
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let body = json!([{"errno": 0}, {"errno": 0}, {"errno": 0}]).to_string();
        let err = parse_topology(body.as_bytes()).unwrap_err();
        assert!(matches!(err, ResolveError::Parse(_)), "got {err:?}");

        let err = parse_topology(b"[]").unwrap_err();
        assert!(matches!(err, ResolveError::Parse(_)), "got {err:?}");
    }

    #[test]
    fn test_parse_rejects_both_roles_failed() {
        let body = json!([
            {"command": "get_server_info", "errno": 4},
            {"command": "get_server_info", "errno": 4}
        ])
        .to_string();

        let err = parse_topology(body.as_bytes()).unwrap_err();
        assert!(matches!(err, ResolveError::Parse(_)), "got {err:?}");
    }

    #[test]
    fn test_parse_keeps_failed_role_as_empty_record() {
        let body = json!([
            secure_role("1.2.3.4", 443, "de"),
            {"command": "get_server_info", "errno": 1, "service": {"port": 5000}}
        ])
        .to_string();

        let (secure, relay) = parse_topology(body.as_bytes()).unwrap();
        assert!(secure.is_usable());
        assert_eq!(secure.service.https_port, 443);
        assert!(!relay.is_usable());
        assert_eq!(relay.err_no, 1);
        assert_eq!(relay.service.port, 0, "failed role must not carry data");
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = parse_topology(b"<html>busy</html>").unwrap_err();
        assert!(matches!(err, ResolveError::Parse(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_fetch_sends_both_role_queries() {
        let captured: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let router = Router::new()
            .route(
                "/Serv.php",
                post(
                    |State(captured): State<Arc<Mutex<Option<Value>>>>, Json(body): Json<Value>| async move {
                        *captured.lock().unwrap() = Some(body);
                        Json(json!([
                            secure_role("1.2.3.4", 443, "de"),
                            {"command": "get_server_info", "errno": 1}
                        ]))
                    },
                ),
            )
            .with_state(captured.clone());
        let base = spawn_server(router).await;

        let (secure, relay) = client(format!("{base}/Serv.php"))
            .fetch_topology("mynas")
            .await
            .unwrap();
        assert!(secure.is_usable());
        assert!(!relay.is_usable());

        let body = captured.lock().unwrap().clone().unwrap();
        assert_eq!(body[0]["id"], "mainapp_https");
        assert_eq!(body[1]["id"], "mainapp_http");
        assert_eq!(body[0]["serverID"], "mynas");
        assert_eq!(body[1]["command"], "get_server_info");
    }

    #[tokio::test]
    async fn test_error_status_is_transport_error() {
        let router = Router::new().route(
            "/Serv.php",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let base = spawn_server(router).await;

        let err = client(format!("{base}/Serv.php"))
            .fetch_topology("mynas")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Transport { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_falls_back_when_primary_unreachable() {
        let router = reply(
            secure_role("1.2.3.4", 443, "de"),
            json!({"command": "get_server_info", "errno": 1}),
        );
        let base = spawn_server(router).await;

        let (secure, _) = client(UNREACHABLE_URL.to_string())
            .with_fallback(format!("{base}/Serv.php"))
            .fetch_topology("mynas")
            .await
            .unwrap();
        assert_eq!(secure.env.relay_region, "de");
    }

    #[tokio::test]
    async fn test_no_fallback_on_parse_error() {
        let primary = Router::new().route("/Serv.php", post(|| async { Json(json!([])) }));
        let primary = spawn_server(primary).await;

        let hits = Arc::new(AtomicUsize::new(0));
        let fallback = Router::new()
            .route(
                "/Serv.php",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!([]))
                }),
            )
            .with_state(hits.clone());
        let fallback = spawn_server(fallback).await;

        let err = client(format!("{primary}/Serv.php"))
            .with_fallback(format!("{fallback}/Serv.php"))
            .fetch_topology("mynas")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Parse(_)), "got {err:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
