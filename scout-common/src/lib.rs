//! Common types and utilities shared across Scout crates.
//!
//! This crate defines the record model passed between pipeline stages, the
//! pipeline-level error type, and observability helpers. It is intentionally
//! lightweight so that every crate can depend on it without introducing heavy
//! transitive costs.
//!
//! # Overview
//!
//! - [`RecordKind`]: which pipeline a record belongs to (jobs or leads)
//! - [`Candidate`]: a raw item found on a page, before it has an identity
//! - [`Record`]: a keyed, timestamped item as kept in the store
//! - [`Digest`]: the records that are new in the current run
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`ScoutError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! ```rust
//! use scout_common::{Candidate, RecordKind};
//!
//! let c = Candidate::new(RecordKind::Lead, "https://acme.test/contact")
//!     .with_field("email", "hr@acme.test")
//!     .with_field("company", "Acme");
//! assert_eq!(c.field("email"), "hr@acme.test");
//! assert_eq!(c.field("title"), "");
//! ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod observability;

/// Named attributes of a candidate or record.
pub type Fields = BTreeMap<String, String>;

/// The two pipelines: job postings and company contact leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    #[serde(rename = "jobs", alias = "job")]
    Job,
    #[serde(rename = "leads", alias = "lead")]
    Lead,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::Job, RecordKind::Lead];

    /// Recognized field names, in the column order used for persistence.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            RecordKind::Job => &["title", "company", "link", "snippet"],
            RecordKind::Lead => &["company", "email"],
        }
    }

    /// The field the identity key is derived from.
    pub fn key_field(self) -> &'static str {
        match self {
            RecordKind::Job => "link",
            RecordKind::Lead => "email",
        }
    }

    /// File name of the persisted store for this kind.
    pub fn store_file(self) -> &'static str {
        match self {
            RecordKind::Job => "job_alerts.csv",
            RecordKind::Lead => "company_leads.csv",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Job => "jobs",
            RecordKind::Lead => "leads",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jobs" | "job" => Ok(RecordKind::Job),
            "leads" | "lead" => Ok(RecordKind::Lead),
            other => Err(ScoutError::Config(format!("unknown pipeline kind: {other}"))),
        }
    }
}

/// An item found on a page that has not yet been keyed or stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub kind: RecordKind,
    pub fields: Fields,
    pub source_url: String,
}

impl Candidate {
    pub fn new(kind: RecordKind, source_url: impl Into<String>) -> Self {
        Self {
            kind,
            fields: Fields::new(),
            source_url: source_url.into(),
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Field value, or `""` when absent.
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }
}

/// One stored item with a stable identity.
///
/// `first_seen_at` is set when the record is created and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub identity_key: String,
    pub kind: RecordKind,
    pub fields: Fields,
    pub first_seen_at: DateTime<Utc>,
    pub source_url: String,
}

impl Record {
    pub fn from_candidate(
        candidate: Candidate,
        identity_key: String,
        first_seen_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identity_key,
            kind: candidate.kind,
            fields: candidate.fields,
            first_seen_at,
            source_url: candidate.source_url,
        }
    }

    /// Field value, or `""` when absent.
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Records first seen in the current run. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub kind: RecordKind,
    pub records: Vec<Record>,
}

impl Digest {
    pub fn empty(kind: RecordKind) -> Self {
        Self {
            kind,
            records: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.identity_key.as_str()).collect()
    }
}

/// Error types used across the Scout pipelines.
#[derive(thiserror::Error, Debug)]
pub enum ScoutError {
    /// Configuration was incomplete, invalid, or unreadable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The updated store could not be written.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The digest could not be delivered.
    #[error("Notification error: {0}")]
    Notify(String),

    /// A source could not be fetched.
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },
}

/// Convenient alias for results that use [`ScoutError`].
pub type Result<T> = std::result::Result<T, ScoutError>;
