use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use scout_config::{SmtpSettings, SmtpTls};

use crate::{DigestEmail, NotifyError, Transport};

/// Authenticated SMTP delivery via `lettre`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpTransport;

impl SmtpTransport {
    pub fn new() -> Self {
        Self
    }
}

fn mailbox(value: &str) -> Result<Mailbox, NotifyError> {
    value.trim().parse().map_err(|e: lettre::address::AddressError| NotifyError::Address {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Build the multipart message. Recipients may be comma separated.
pub(crate) fn build_message(settings: &SmtpSettings, email: &DigestEmail) -> Result<Message, NotifyError> {
    let mut builder = Message::builder()
        .from(mailbox(&settings.sender)?)
        .subject(email.subject.as_str());
    let mut any = false;
    for to in settings.recipient.split(',').filter(|s| !s.trim().is_empty()) {
        builder = builder.to(mailbox(to)?);
        any = true;
    }
    if !any {
        return Err(NotifyError::Config("no recipient".into()));
    }
    builder
        .multipart(MultiPart::alternative_plain_html(
            email.plain.clone(),
            email.html.clone(),
        ))
        .map_err(|e| NotifyError::Build(e.to_string()))
}

fn mailer(settings: &SmtpSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
    let host = settings.host.as_str();
    let builder = match settings.tls {
        SmtpTls::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
        SmtpTls::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
        SmtpTls::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)),
    }
    .map_err(|e| NotifyError::Config(format!("smtp host {host}: {e}")))?;
    Ok(builder
        .port(settings.port)
        .credentials(Credentials::new(
            settings.sender.clone(),
            settings.secret.clone(),
        ))
        .timeout(Some(settings.timeout))
        .build())
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send(&self, settings: &SmtpSettings, email: &DigestEmail) -> Result<(), NotifyError> {
        let message = build_message(settings, email)?;
        let mailer = mailer(settings)?;
        tracing::debug!(host=%settings.host, port=settings.port, tls=?settings.tls, "smtp.connect");
        mailer
            .send(message)
            .await
            .map(|response| {
                tracing::debug!(code=%response.code(), "smtp.accepted");
            })
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings(recipient: &str) -> SmtpSettings {
        SmtpSettings {
            host: "127.0.0.1".into(),
            port: 1,
            tls: SmtpTls::None,
            sender: "bot@scout.test".into(),
            secret: "pw".into(),
            recipient: recipient.into(),
            timeout: Duration::from_millis(200),
        }
    }

    fn email() -> DigestEmail {
        DigestEmail {
            subject: "Daily Job Alerts - 01 Jan 2025".into(),
            plain: "plain body".into(),
            html: "<p>html body</p>".into(),
        }
    }

    #[test]
    fn message_is_multipart_alternative() {
        let msg = build_message(&settings("me@scout.test, you@scout.test"), &email()).unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(raw.contains("Subject: Daily Job Alerts - 01 Jan 2025"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("you@scout.test"));
    }

    #[test]
    fn bad_addresses_are_rejected_before_sending() {
        let err = build_message(&settings("not an address"), &email()).unwrap_err();
        assert!(matches!(err, NotifyError::Address { .. }));
        let err = build_message(&settings(" , "), &email()).unwrap_err();
        assert!(matches!(err, NotifyError::Config(_)));
    }

    #[tokio::test]
    async fn refused_connections_are_transport_errors() {
        let err = SmtpTransport::new()
            .send(&settings("me@scout.test"), &email())
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Transport(_)));
    }
}
