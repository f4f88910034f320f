use std::fmt;
use std::time::Duration;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use shared::protocol::{
    DEFAULT_BROKER_URL, DEFAULT_PROBE_CONCURRENCY, DEFAULT_PROBE_DEADLINE_MS,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SERVER_TYPE, FALLBACK_BROKER_URL,
};
use shared::types::{ConnState, Record, ResolutionResult};
use crate::broker::BrokerClient;
use crate::candidates::build_candidates;
use crate::error::{ResolveError, Result};
use crate::probe::{HttpProber, Prober};

/// Caller-tunable knobs for one resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    pub broker_url: String,
    pub fallback_broker_url: Option<String>,
    pub server_type: String,
    /// Bounds each HTTP round trip (broker query and every probe)
    pub request_timeout: Duration,
    /// Bounds the whole probing phase
    pub overall_deadline: Duration,
    /// Maximum probes in flight at once
    pub concurrency: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            broker_url: DEFAULT_BROKER_URL.to_string(),
            fallback_broker_url: Some(FALLBACK_BROKER_URL.to_string()),
            server_type: DEFAULT_SERVER_TYPE.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            overall_deadline: Duration::from_millis(DEFAULT_PROBE_DEADLINE_MS),
            concurrency: DEFAULT_PROBE_CONCURRENCY,
        }
    }
}

/// Tally of candidate states after the probing phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    pub ok: usize,
    pub connect_failed: usize,
    pub invalid_server: usize,
    /// Candidates never probed, or abandoned at the deadline
    pub unknown: usize,
    pub timed_out: bool,
}

impl ProbeSummary {
    fn from_records(records: &[Record], timed_out: bool) -> Self {
        let mut summary = Self {
            timed_out,
            ..Self::default()
        };
        for record in records {
            match record.state {
                ConnState::Ok => summary.ok += 1,
                ConnState::ConnectFailed => summary.connect_failed += 1,
                ConnState::InvalidServer => summary.invalid_server += 1,
                ConnState::Unknown => summary.unknown += 1,
            }
        }
        summary
    }
}

impl fmt::Display for ProbeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ok, {} connect failed, {} invalid server, {} unprobed",
            self.ok, self.connect_failed, self.invalid_server, self.unknown
        )?;
        if self.timed_out {
            write!(f, ", deadline reached")?;
        }
        Ok(())
    }
}

/// Lifecycle of a single `resolve` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    FetchingTopology,
    BuildingCandidates,
    Probing,
    Succeeded,
    Failed,
}

fn advance(phase: &mut Phase, next: Phase, id: &str) {
    tracing::debug!("Resolving {}: {:?} -> {:?}", id, *phase, next);
    *phase = next;
}

/// QuickConnect IDs are ASCII letters, digits, '-' and '_'. Anything else
/// could not form a relay host name.
fn validate_id(id: &str) -> Result<&str> {
    let trimmed = id.trim();
    let valid = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(trimmed)
    } else {
        Err(ResolveError::InvalidId(id.to_string()))
    }
}

/// Resolves a QuickConnect ID to verified URLs:
/// topology fetch, candidate building, then a bounded probe fan-out.
pub struct Resolver<P = HttpProber> {
    broker: BrokerClient,
    prober: P,
    options: ResolveOptions,
}

impl Resolver<HttpProber> {
    /// HTTP-backed resolver. Probe targets are usually self-signed devices,
    /// so the probe client skips certificate checks; identity comes from `ezid`.
    pub fn new(options: ResolveOptions) -> Result<Self> {
        let broker_http = reqwest::Client::builder()
            .user_agent(concat!("qc-resolve/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ResolveError::Client)?;
        let probe_http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("qc-resolve/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ResolveError::Client)?;

        let mut broker = BrokerClient::new(broker_http, options.broker_url.as_str())
            .with_server_type(options.server_type.as_str())
            .with_timeout(options.request_timeout);
        if let Some(fallback) = options.fallback_broker_url.as_deref() {
            broker = broker.with_fallback(fallback);
        }
        let prober = HttpProber::new(probe_http, options.request_timeout);

        Ok(Self::with_prober(broker, prober, options))
    }
}

impl<P: Prober> Resolver<P> {
    pub fn with_prober(broker: BrokerClient, prober: P, options: ResolveOptions) -> Self {
        Self {
            broker,
            prober,
            options,
        }
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    /// Verified URLs for `id`, most preferred first.
    ///
    /// Fails with `CannotAccess` when no candidate verifies, and with
    /// `Cancelled` as soon as `cancel` fires.
    pub async fn resolve(&self, id: &str, cancel: &CancellationToken) -> Result<Vec<String>> {
        let mut phase = Phase::Idle;
        let outcome = self.drive(id, cancel, &mut phase).await;

        match &outcome {
            Ok(urls) => {
                advance(&mut phase, Phase::Succeeded, id);
                tracing::info!("Resolved {} to {} verified URLs", id, urls.len());
            }
            Err(e) => {
                advance(&mut phase, Phase::Failed, id);
                tracing::warn!("Failed to resolve {}: {}", id, e);
            }
        }
        outcome
    }

    /// Topology fetch and candidate building only; nothing is probed.
    pub async fn lookup(&self, id: &str, cancel: &CancellationToken) -> Result<ResolutionResult> {
        self.lookup_tracked(id, cancel, &mut Phase::Idle).await
    }

    async fn drive(&self, id: &str, cancel: &CancellationToken, phase: &mut Phase) -> Result<Vec<String>> {
        let mut result = self.lookup_tracked(id, cancel, phase).await?;

        advance(phase, Phase::Probing, id);
        let summary = self.probe_records(&mut result, cancel).await?;
        tracing::info!("Probing {} finished: {}", id, summary);

        let urls = result.verified_urls();
        if urls.is_empty() {
            return Err(ResolveError::CannotAccess { summary });
        }
        Ok(urls)
    }

    async fn lookup_tracked(
        &self,
        id: &str,
        cancel: &CancellationToken,
        phase: &mut Phase,
    ) -> Result<ResolutionResult> {
        let id = validate_id(id)?;

        advance(phase, Phase::FetchingTopology, id);
        let (secure, relay) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            topology = self.broker.fetch_topology(id) => topology?,
        };

        advance(phase, Phase::BuildingCandidates, id);
        let result = build_candidates(&secure, &relay, id);
        tracing::info!("Built {} candidates for {} (server {})", result.len(), id, result.server_id);
        Ok(result)
    }

    /// Probe every record still `Unknown`, at most `concurrency` at a time.
    ///
    /// Stops at the overall deadline; records still in flight stay `Unknown`.
    /// Returns `Cancelled` if `cancel` fires, dropping in-flight probes.
    pub async fn probe_records(
        &self,
        result: &mut ResolutionResult,
        cancel: &CancellationToken,
    ) -> Result<ProbeSummary> {
        let targets: Vec<(usize, String)> = result
            .records()
            .iter()
            .enumerate()
            .filter(|(_, record)| !record.state.is_terminal())
            .map(|(index, record)| (index, record.url.clone()))
            .collect();

        let server_id = result.server_id.clone();
        let server_id = server_id.as_str();
        let prober = &self.prober;

        let mut probes = stream::iter(targets)
            .map(|(index, url)| async move {
                let state = prober.probe(&url, server_id).await;
                (index, url, state)
            })
            .buffer_unordered(self.options.concurrency.max(1));

        let deadline = tokio::time::sleep(self.options.overall_deadline);
        tokio::pin!(deadline);
        let mut timed_out = false;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
                next = probes.next() => match next {
                    Some((index, url, state)) => {
                        tracing::debug!("Probed {}: {:?}", url, state);
                        result.set_state(index, state);
                    }
                    None => break,
                },
                _ = &mut deadline => {
                    tracing::warn!(
                        "Probe deadline of {:?} reached, abandoning outstanding probes",
                        self.options.overall_deadline
                    );
                    timed_out = true;
                    break;
                }
            }
        }

        Ok(ProbeSummary::from_records(result.records(), timed_out))
    }
}
