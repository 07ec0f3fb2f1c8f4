//! One run of a Scout pipeline: fetch, extract, enrich, dedup, persist and
//! notify, in that order.
//!
//! Source failures degrade to "no data from this source". Configuration and
//! persistence failures end the run with an error. A delivery failure is
//! reported in the [`RunReport`] but the run still counts as complete, since
//! the store has already been written by then.

use std::path::PathBuf;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use scout_common::{Candidate, RecordKind, ScoutError};
use scout_config::{FetchSettings, PipelineSettings, ScoutConfig};
use scout_http::{Fetch, FetchFailure, HttpClient};
use scout_notify::{Notifier, Transport};
use scout_store::Store;
use scout_web::{enrich_job, normalize, Extractor};
use serde::Serialize;

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub kind: RecordKind,
    pub sources: usize,
    pub failed_sources: Vec<FailedSource>,
    /// Candidates extracted across all sources, before deduplication.
    pub candidates: usize,
    pub new_records: usize,
    pub store_size: usize,
    pub persisted_to: PathBuf,
    pub notified: bool,
    pub notify_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedSource {
    pub url: String,
    pub reason: String,
}

impl From<FetchFailure> for FailedSource {
    fn from(f: FetchFailure) -> Self {
        Self {
            url: f.url,
            reason: f.reason,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: ScoutConfig,
    settings: PipelineSettings,
    fetch: FetchSettings,
}

impl Pipeline {
    pub fn new(kind: RecordKind, config: &ScoutConfig) -> Self {
        Self {
            settings: config.pipeline(kind),
            fetch: config.fetch_settings(),
            config: config.clone(),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.settings.kind
    }

    pub fn data_dir(&self) -> PathBuf {
        self.config.data_dir.clone()
    }

    /// HTTP client configured from the fetch settings.
    pub fn http_client(&self) -> Result<HttpClient, ScoutError> {
        let client = HttpClient::new(&self.fetch.user_agent)
            .map_err(|e| ScoutError::Config(e.to_string()))?
            .with_timeout(self.fetch.timeout)
            .with_retries(self.fetch.max_retries);
        Ok(client)
    }

    pub async fn run(
        &self,
        fetcher: &dyn Fetch,
        transport: &dyn Transport,
    ) -> Result<RunReport, ScoutError> {
        let kind = self.kind();
        // Credentials are checked before any network traffic.
        let smtp = self.config.smtp_settings()?;

        tracing::info!(
            kind=%kind,
            sources=self.settings.sources.len(),
            keywords=self.settings.keywords.len(),
            "pipeline.start"
        );

        let (mut candidates, failed) = self.collect(fetcher).await;
        let extracted = candidates.len();

        let store = Store::open(&self.config.data_dir, kind);
        if kind == RecordKind::Job && self.fetch.follow_job_links {
            // Only postings that would be new are worth a detail fetch.
            candidates.retain(|c| normalize(c).is_some_and(|k| !store.contains(&k)));
            candidates = self.enrich(fetcher, candidates).await;
        }

        let (digest, store) = store.diff_and_merge(candidates, Utc::now());
        let persisted_to = store.persist()?;
        tracing::info!(
            kind=%kind,
            new=digest.len(),
            total=store.len(),
            path=%persisted_to.display(),
            "pipeline.persisted"
        );

        let notifier = Notifier::new(transport, smtp, kind, self.settings.subject_prefix.as_str());
        let notify_error = notifier.notify(&digest).await.err().map(|e| e.to_string());

        let report = RunReport {
            kind,
            sources: self.settings.sources.len(),
            failed_sources: failed,
            candidates: extracted,
            new_records: digest.len(),
            store_size: store.len(),
            persisted_to,
            notified: notify_error.is_none(),
            notify_error,
        };
        tracing::info!(
            kind=%kind,
            failed=report.failed_sources.len(),
            candidates=report.candidates,
            new=report.new_records,
            notified=report.notified,
            "pipeline.done"
        );
        Ok(report)
    }

    /// Fetch every source with bounded concurrency and extract candidates.
    /// Results are reassembled in configured source order.
    async fn collect(&self, fetcher: &dyn Fetch) -> (Vec<Candidate>, Vec<FailedSource>) {
        let sources = &self.settings.sources;
        let mut pages: Vec<_> = stream::iter(sources.iter().enumerate().map(|(i, source)| async move {
            (i, fetcher.fetch(source.url()).await)
        }))
        .buffer_unordered(self.fetch.concurrency.max(1))
        .collect()
        .await;
        pages.sort_by_key(|(i, _)| *i);

        let extractor = Extractor::new(self.kind(), &self.settings.keywords);
        let mut candidates = Vec::new();
        let mut failed = Vec::new();
        for (i, page) in pages {
            let source = &sources[i];
            match page {
                Ok(html) => {
                    let found = extractor.extract(&html, source);
                    tracing::debug!(source=%source.url(), found=found.len(), "pipeline.extracted");
                    candidates.extend(found);
                }
                Err(failure) => {
                    tracing::warn!(source=%failure.url, reason=%failure.reason, "pipeline.fetch.failed");
                    failed.push(failure.into());
                }
            }
        }
        (candidates, failed)
    }

    async fn enrich(&self, fetcher: &dyn Fetch, candidates: Vec<Candidate>) -> Vec<Candidate> {
        if candidates.is_empty() {
            return candidates;
        }
        tracing::debug!(count=candidates.len(), "pipeline.enrich");
        stream::iter(candidates.into_iter().map(|c| enrich_job(fetcher, c)))
            .buffered(self.fetch.concurrency.max(1))
            .collect()
            .await
    }
}
