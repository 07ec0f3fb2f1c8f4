//! Minimal page-fetching HTTP client with safe logging and retries.
//!
//! - Request options: headers, query params, timeout, retries
//! - Redacts sensitive query params and headers in every log line
//! - Retries timeouts, network errors, 429 and 5xx with exponential backoff
//!   and `Retry-After` support; malformed URLs and other 4xx fail at once
//! - Optional *raw* request/response logging via `SCOUT_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), scout_http::HttpError> {
//! let client = scout_http::HttpClient::new("Mozilla/5.0")?;
//! let html = client
//!     .get_text("https://jobs.example.com/design", scout_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, body snippets (truncated), retries and final errors, and
//! (optionally) raw request/response lines under target `http.raw`.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use std::borrow::Cow;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

mod fetch;

pub use fetch::{Fetch, FetchFailure};

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "SCOUT_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024; // cap raw body logs (64 KiB)

/// Upper bound on a server-requested `Retry-After` wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);
/// Minimum wait after a 429 without `Retry-After`.
const RATE_LIMIT_FLOOR: Duration = Duration::from_millis(1100);

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn is_secret_param(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "access_token"
            | "authorization"
            | "auth"
            | "key"
            | "api_key"
            | "token"
            | "secret"
            | "client_secret"
            | "password"
            | "session"
    )
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(url: &Url, headers: &HeaderMap, user_agent: &str) -> String {
    let (host_path, query) = redact_query(url);
    let mut parts = vec![
        "curl".to_string(),
        "-XGET".to_string(),
        format!("-A '{}'", user_agent.replace('\'', r"'\''")),
    ];
    for (name, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    let qs = query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let target = if qs.is_empty() {
        format!("{}://{}", url.scheme(), host_path)
    } else {
        format!("{}://{}?{}", url.scheme(), host_path, qs)
    };
    parts.push(format!("'{target}'"));
    parts.join(" ")
}

/// Redact sensitive headers for logging
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let val = if key.eq_ignore_ascii_case("authorization")
                || key.eq_ignore_ascii_case("cookie")
                || key.eq_ignore_ascii_case("set-cookie")
            {
                "<redacted>".to_string()
            } else {
                v.to_str().unwrap_or("").to_string()
            };
            (key, val)
        })
        .collect()
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("client build failed: {0}")]
    Build(String),
    #[error("network error: {message}")]
    Network { message: String, timeout: bool },
    #[error("server returned {status}: {message}")]
    Status { status: StatusCode, message: String },
}

impl HttpError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            HttpError::Network { .. } => true,
            HttpError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            HttpError::Url(_) | HttpError::Build(_) => false,
        }
    }
}

// ==============================
// Request Options
// ==============================

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use scout_http::RequestOpts;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(1),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(opts.headers.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>, // e.g. [("page", "2".into())]
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    user_agent: String,
    pub default_timeout: Duration,
    pub max_retries: usize,
    /// First retry delay; doubles on each further attempt.
    pub backoff: Duration,
}

impl HttpClient {
    /// Construct a client that identifies itself with `user_agent`.
    ///
    /// ```no_run
    /// use scout_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("Mozilla/5.0")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(user_agent: &str) -> Result<Self, HttpError> {
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(user_agent)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            inner,
            user_agent: user_agent.to_string(),
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
            backoff: Duration::from_millis(200),
        })
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the retry budget (attempts after the first).
    ///
    /// ```no_run
    /// use scout_http::{HttpClient, HttpError};
    ///
    /// let client = HttpClient::new("Mozilla/5.0")?.with_retries(5);
    /// assert_eq!(client.max_retries, 5);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// Override the base backoff delay.
    pub fn with_backoff(mut self, dur: Duration) -> Self {
        self.backoff = dur;
        self
    }

    /// GET a page and return its body as text (lossy UTF-8).
    pub async fn get_text(&self, url: &str, opts: RequestOpts<'_>) -> Result<String, HttpError> {
        let url = parse_page_url(url)?;
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let req_id = format!("r{}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed));
        let (host_path, redacted_q) = redact_query(&url);

        let mut attempt = 0usize;
        loop {
            // ----- Build request -----
            let mut rb = self.inner.get(url.clone()).timeout(timeout);
            if let Some(q) = &opts.query {
                let pairs: Vec<(&str, &str)> = q.iter().map(|(k, v)| (*k, v.as_ref())).collect();
                rb = rb.query(&pairs);
            }
            if let Some(hdrs) = &opts.headers {
                rb = rb.headers(hdrs.clone());
            }

            tracing::debug!(
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries,
                host_path=%host_path,
                query=?redacted_q,
                timeout_ms=timeout.as_millis() as u64,
                "http.request.start"
            );

            if raw_enabled() {
                let empty = HeaderMap::new();
                let curl = make_curl(&url, opts.headers.as_ref().unwrap_or(&empty), &self.user_agent);
                tracing::debug!(target: "http.raw", %req_id, %curl, "request");
            }

            // ----- Send -----
            let t0 = std::time::Instant::now();
            let outcome = match rb.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let headers = resp.headers().clone();
                    resp.bytes().await.map(|bytes| (status, headers, bytes))
                }
                Err(err) => Err(err),
            };
            let (status, headers, bytes) = match outcome {
                Ok(parts) => parts,
                Err(err) => {
                    let message = err.to_string();
                    let timed_out = err.is_timeout();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = self.backoff_for(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            timed_out,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(
                        req_id=%req_id,
                        attempt,
                        max_retries,
                        timed_out,
                        message=%message,
                        "http.network_error"
                    );
                    return Err(HttpError::Network {
                        message,
                        timeout: timed_out,
                    });
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=dur_ms,
                body_len=bytes.len(),
                content_type=?headers.get(reqwest::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
                "http.response.headers"
            );

            if raw_enabled() {
                let hdrs = redact_headers(&headers);
                let end = bytes.len().min(RAW_MAX_BODY);
                let text = String::from_utf8_lossy(&bytes[..end]);
                tracing::info!(
                    target:"http.raw",
                    %req_id,
                    status=%status,
                    duration_ms=dur_ms,
                    headers=?hdrs,
                    body=%text,
                    truncated=bytes.len() > RAW_MAX_BODY
                );
            }

            let snippet = snip_body(&bytes);
            tracing::trace!(req_id=%req_id, body_snippet=%snippet, "http.response.body_snippet");

            // ----- Success path -----
            if status.is_success() {
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }

            // ----- Non-success: maybe retry -----
            let is_429 = status == StatusCode::TOO_MANY_REQUESTS;
            let is_5xx = status.is_server_error();

            if (is_429 || is_5xx) && attempt < max_retries {
                attempt += 1;
                let retry_after = retry_after_delay(&headers);
                let delay = match retry_after {
                    Some(requested) => requested.min(MAX_RETRY_AFTER),
                    None if is_429 => self.backoff_for(attempt).max(RATE_LIMIT_FLOOR),
                    None => self.backoff_for(attempt),
                };
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    retry_after_secs=?retry_after.map(|d| d.as_secs()),
                    body_snippet=%snippet,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id=%req_id,
                %status,
                attempt,
                body_snippet=%snippet,
                "http.error"
            );
            return Err(HttpError::Status {
                status,
                message: snippet,
            });
        }
    }

    fn backoff_for(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        self.backoff.saturating_mul(1u32 << shift)
    }
}

// ==============================
// Helpers
// ==============================

fn parse_page_url(raw: &str) -> Result<Url, HttpError> {
    let url = Url::parse(raw.trim()).map_err(|e| HttpError::Url(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(HttpError::Url(format!("{raw}: unsupported scheme {other}"))),
    }
}

fn retry_after_delay(h: &HeaderMap) -> Option<Duration> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
        .map(Duration::from_secs)
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(&body[..body.len().min(500)]).into_owned();
    if body.len() > 500 {
        snip.push_str("...");
    }
    snip
}

/// "host + path" and a redacted query list for logging.
fn redact_query(url: &Url) -> (String, Vec<(String, String)>) {
    let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
    let redacted = url
        .query_pairs()
        .map(|(k, v)| {
            let k = k.to_string();
            let v = if is_secret_param(&k) {
                "<redacted>".to_string()
            } else {
                v.to_string()
            };
            (k, v)
        })
        .collect::<Vec<_>>();
    (host_path, redacted)
}
