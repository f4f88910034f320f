use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};
use shared::protocol::{
    DEFAULT_BROKER_URL, DEFAULT_PROBE_CONCURRENCY, DEFAULT_PROBE_DEADLINE_MS,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SERVER_TYPE, FALLBACK_BROKER_URL,
};
use crate::resolver::ResolveOptions;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_url")]
    pub url: String,
    /// Empty string disables the fallback
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,
    #[serde(default = "default_server_type")]
    pub server_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Per-request timeout, applied to the broker query and each probe
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Overall budget for the probing phase
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
}

fn default_broker_url() -> String {
    DEFAULT_BROKER_URL.to_string()
}

fn default_fallback_url() -> String {
    FALLBACK_BROKER_URL.to_string()
}

fn default_server_type() -> String {
    DEFAULT_SERVER_TYPE.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_concurrency() -> usize {
    DEFAULT_PROBE_CONCURRENCY
}

fn default_deadline_ms() -> u64 {
    DEFAULT_PROBE_DEADLINE_MS
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: default_broker_url(),
            fallback_url: default_fallback_url(),
            server_type: default_server_type(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            concurrency: default_concurrency(),
            deadline_ms: default_deadline_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        let fallback = self.broker.fallback_url.trim();
        ResolveOptions {
            broker_url: self.broker.url.clone(),
            fallback_broker_url: (!fallback.is_empty()).then(|| fallback.to_string()),
            server_type: self.broker.server_type.clone(),
            request_timeout: Duration::from_millis(self.probe.timeout_ms),
            overall_deadline: Duration::from_millis(self.probe.deadline_ms),
            concurrency: self.probe.concurrency.max(1),
        }
    }
}
