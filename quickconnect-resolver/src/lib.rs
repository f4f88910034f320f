//! Resolve a QuickConnect ID into the URLs that currently reach the device.
//!
//! The broker is asked for the device's topology, every advertised address
//! becomes a ranked candidate, and each candidate is verified with a
//! ping-pong identity probe. Only verified URLs are returned, best first.

pub mod broker;
pub mod candidates;
pub mod config;
pub mod error;
pub mod probe;
pub mod resolver;

#[cfg(test)]
mod testing;

use tokio_util::sync::CancellationToken;

pub use error::{ResolveError, Result};
pub use probe::{HttpProber, Prober};
pub use resolver::{Phase, ProbeSummary, ResolveOptions, Resolver};

/// Resolve `id` with default options
pub async fn resolve(id: &str) -> Result<Vec<String>> {
    Resolver::new(ResolveOptions::default())?
        .resolve(id, &CancellationToken::new())
        .await
}
