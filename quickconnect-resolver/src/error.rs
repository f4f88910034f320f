use thiserror::Error;
use crate::resolver::ProbeSummary;

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Terminal outcomes of a resolution. Per-candidate failures are recorded
/// as `ConnState` on the candidate and never surface here.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid QuickConnect ID: {0:?}")]
    InvalidId(String),

    #[error("broker request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected broker response: {0}")]
    Parse(String),

    #[error("no candidate could be verified ({summary})")]
    CannotAccess { summary: ProbeSummary },

    #[error("resolution cancelled")]
    Cancelled,

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
