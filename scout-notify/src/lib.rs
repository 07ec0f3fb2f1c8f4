//! Digest delivery.
//!
//! Every run sends exactly one message, including when nothing new was
//! found, so recipients get a daily heartbeat.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use scout_common::{Digest, RecordKind, ScoutError};
use scout_config::{ConfigError, SmtpSettings};

mod email;
mod smtp;

pub use email::DigestEmail;
pub use smtp::SmtpTransport;

#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    /// Channel settings are missing or unusable. Nothing was sent.
    #[error("notification channel misconfigured: {0}")]
    Config(String),

    #[error("invalid mailbox {value:?}: {reason}")]
    Address { value: String, reason: String },

    #[error("could not build message: {0}")]
    Build(String),

    /// The server refused the message or could not be reached.
    #[error("delivery failed: {0}")]
    Transport(String),
}

impl From<ConfigError> for NotifyError {
    fn from(e: ConfigError) -> Self {
        NotifyError::Config(e.to_string())
    }
}

impl From<NotifyError> for ScoutError {
    fn from(e: NotifyError) -> Self {
        match e {
            NotifyError::Config(msg) => ScoutError::Config(msg),
            other => ScoutError::Notify(other.to_string()),
        }
    }
}

/// Delivers one composed message over some channel.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, settings: &SmtpSettings, email: &DigestEmail) -> Result<(), NotifyError>;
}

/// Composes the digest for one pipeline and hands it to a [`Transport`].
pub struct Notifier<'t> {
    transport: &'t dyn Transport,
    settings: SmtpSettings,
    kind: RecordKind,
    subject_prefix: String,
}

impl<'t> Notifier<'t> {
    pub fn new(
        transport: &'t dyn Transport,
        settings: SmtpSettings,
        kind: RecordKind,
        subject_prefix: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            settings,
            kind,
            subject_prefix: subject_prefix.into(),
        }
    }

    /// Send today's digest (UTC date in the subject).
    pub async fn notify(&self, digest: &Digest) -> Result<DigestEmail, NotifyError> {
        self.notify_on(digest, Utc::now().date_naive()).await
    }

    pub async fn notify_on(
        &self,
        digest: &Digest,
        date: NaiveDate,
    ) -> Result<DigestEmail, NotifyError> {
        let email = DigestEmail::compose(self.kind, digest, date, &self.subject_prefix);
        tracing::info!(
            kind=%self.kind,
            items=digest.len(),
            subject=%email.subject,
            to=%self.settings.recipient,
            "notify.sending"
        );
        match self.transport.send(&self.settings, &email).await {
            Ok(()) => {
                tracing::info!(kind=%self.kind, "notify.sent");
                Ok(email)
            }
            Err(e) => {
                tracing::warn!(kind=%self.kind, error=%e, "notify.failed");
                Err(e)
            }
        }
    }
}

/// Keeps every message instead of sending it. Useful for dry runs and tests.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<DigestEmail>>,
    fail_with: Option<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose every send fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(reason.into()),
        }
    }

    pub fn sent(&self) -> Vec<DigestEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, _settings: &SmtpSettings, email: &DigestEmail) -> Result<(), NotifyError> {
        if let Some(reason) = &self.fail_with {
            return Err(NotifyError::Transport(reason.clone()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }
}
