//! The page-fetching seam used by the pipelines.

use async_trait::async_trait;
use scout_common::ScoutError;

use crate::{HttpClient, HttpError, RequestOpts};

/// A source that could not be fetched after all retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fetch failed for {url}: {reason}")]
pub struct FetchFailure {
    pub url: String,
    pub reason: String,
    /// False for failures that were not retried (bad URL, 404, ...).
    pub transient: bool,
}

impl FetchFailure {
    pub fn from_http(url: &str, err: &HttpError) -> Self {
        Self {
            url: url.to_string(),
            reason: err.to_string(),
            transient: err.is_transient(),
        }
    }
}

impl From<FetchFailure> for ScoutError {
    fn from(f: FetchFailure) -> Self {
        ScoutError::Fetch {
            url: f.url,
            reason: f.reason,
        }
    }
}

/// Retrieve raw page content for a URL.
///
/// Implementations carry their own timeout and retry budget; a returned
/// [`FetchFailure`] means the budget is spent.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchFailure>;
}

#[async_trait]
impl Fetch for HttpClient {
    async fn fetch(&self, url: &str) -> Result<String, FetchFailure> {
        self.get_text(url, RequestOpts::default())
            .await
            .map_err(|e| FetchFailure::from_http(url, &e))
    }
}
