use std::future::Future;
use std::time::Duration;
use anyhow::{bail, Result};
use serde::Deserialize;
use shared::protocol::PINGPONG_PATH;
use shared::types::ConnState;
use crate::probe::verify::verify_identity;

/// Verifies one candidate URL. Every failure maps to a `ConnState`;
/// implementations never return `Unknown`.
pub trait Prober: Sync {
    fn probe(&self, url: &str, server_id: &str) -> impl Future<Output = ConnState> + Send;
}

#[derive(Debug, Deserialize)]
struct PingPongReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    ezid: String,
}

/// Ping-pong identity probe over HTTP: one GET per call, no retries
#[derive(Debug, Clone)]
pub struct HttpProber {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// Redirects are not followed, so only a 2xx reply counts as an answer
    async fn fetch(&self, url: &str) -> Result<PingPongReply> {
        let response = self
            .http
            .get(format!("{url}{PINGPONG_PATH}"))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            bail!("unexpected status {}", status);
        }

        Ok(response.json::<PingPongReply>().await?)
    }
}

impl Prober for HttpProber {
    async fn probe(&self, url: &str, server_id: &str) -> ConnState {
        let reply = match self.fetch(url).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!("Ping to {} failed: {:#}", url, e);
                return ConnState::ConnectFailed;
            }
        };

        if !reply.success {
            tracing::debug!("Ping to {} answered without success", url);
            return ConnState::ConnectFailed;
        }

        if verify_identity(server_id, &reply.ezid) {
            ConnState::Ok
        } else {
            tracing::debug!("Ping to {} answered by a different server (ezid {})", url, reply.ezid);
            ConnState::InvalidServer
        }
    }
}
