use std::fmt::Write;

use chrono::NaiveDate;
use html_escape::{encode_double_quoted_attribute, encode_text};
use scout_common::{Digest, Record, RecordKind};
use scout_config::default_subject_prefix;

/// A rendered digest: subject plus plain-text and HTML alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEmail {
    pub subject: String,
    pub plain: String,
    pub html: String,
}

impl DigestEmail {
    pub fn compose(kind: RecordKind, digest: &Digest, date: NaiveDate, subject_prefix: &str) -> Self {
        let prefix = match subject_prefix.trim() {
            "" => default_subject_prefix(kind),
            p => p,
        };
        let subject = format!("{prefix} - {}", date.format("%d %b %Y"));

        if digest.is_empty() {
            let line = empty_line(kind);
            return Self {
                subject,
                plain: line.to_string(),
                html: format!("<p>{line}</p>"),
            };
        }

        let mut plain = String::new();
        let mut html = format!("<h2>{}</h2><ol>", heading(kind));
        for record in digest.iter() {
            match kind {
                RecordKind::Job => job_entry(record, &mut plain, &mut html),
                RecordKind::Lead => lead_entry(record, &mut plain, &mut html),
            }
        }
        html.push_str("</ol>");
        Self {
            subject,
            plain: plain.trim_end().to_string(),
            html,
        }
    }
}

fn heading(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Job => "New Job Matches",
        RecordKind::Lead => "New Company Contacts",
    }
}

fn empty_line(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Job => "No new matching jobs found today.",
        RecordKind::Lead => "No new company contacts (emails) found today.",
    }
}

fn job_entry(r: &Record, plain: &mut String, html: &mut String) {
    let (title, company, link, snippet) = (
        r.field("title"),
        r.field("company"),
        r.field("link"),
        r.field("snippet"),
    );
    let title = if title.is_empty() { link } else { title };
    let _ = writeln!(plain, "{title}{}\n{link}\n", dash(company));
    let _ = write!(
        html,
        "<li><strong>{}</strong>{}<br><a href=\"{}\">Apply / Details</a>",
        encode_text(title),
        encode_text(&dash(company)),
        encode_double_quoted_attribute(link),
    );
    if !snippet.is_empty() {
        let _ = write!(html, "<p>{}</p>", encode_text(snippet));
    }
    html.push_str("</li>");
}

fn lead_entry(r: &Record, plain: &mut String, html: &mut String) {
    let (company, email, source) = (r.field("company"), r.field("email"), r.source_url.as_str());
    let _ = writeln!(plain, "{company} - {email} - {source}");
    let _ = write!(
        html,
        "<li><strong>{}</strong> - {} <br><em>Source:</em> <a href=\"{}\">{}</a></li>",
        encode_text(company),
        encode_text(email),
        encode_double_quoted_attribute(source),
        encode_text(source),
    );
}

fn dash(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        format!(" - {value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scout_common::Candidate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 5).unwrap()
    }

    fn digest(kind: RecordKind, candidates: Vec<Candidate>) -> Digest {
        Digest {
            kind,
            records: candidates
                .into_iter()
                .enumerate()
                .map(|(i, c)| Record::from_candidate(c, format!("k{i}"), Utc::now()))
                .collect(),
        }
    }

    #[test]
    fn subject_carries_prefix_and_date() {
        let e = DigestEmail::compose(RecordKind::Job, &Digest::empty(RecordKind::Job), date(), "");
        assert_eq!(e.subject, "Daily Job Alerts - 05 Nov 2024");
        let e = DigestEmail::compose(RecordKind::Job, &Digest::empty(RecordKind::Job), date(), "Design Roles");
        assert_eq!(e.subject, "Design Roles - 05 Nov 2024");
    }

    #[test]
    fn empty_digests_say_so() {
        let e = DigestEmail::compose(RecordKind::Job, &Digest::empty(RecordKind::Job), date(), "");
        assert_eq!(e.plain, "No new matching jobs found today.");
        assert_eq!(e.html, "<p>No new matching jobs found today.</p>");
    }

    #[test]
    fn jobs_render_in_both_parts() {
        let c = Candidate::new(RecordKind::Job, "https://board.test/")
            .with_field("title", "Brand <Lead>")
            .with_field("company", "Oak & Ink")
            .with_field("link", "https://board.test/jobs/1?a=1&b=2")
            .with_field("snippet", "Remote");
        let e = DigestEmail::compose(RecordKind::Job, &digest(RecordKind::Job, vec![c]), date(), "");
        assert_eq!(e.plain, "Brand <Lead> - Oak & Ink\nhttps://board.test/jobs/1?a=1&b=2");
        assert!(e.html.starts_with("<h2>New Job Matches</h2><ol><li>"));
        assert!(e.html.contains("<strong>Brand &lt;Lead&gt;</strong> - Oak &amp; Ink"));
        assert!(e.html.contains("href=\"https://board.test/jobs/1?a=1&amp;b=2\""));
        assert!(e.html.contains("<p>Remote</p>"));
    }

    #[test]
    fn untitled_jobs_fall_back_to_the_link() {
        let c = Candidate::new(RecordKind::Job, "https://board.test/").with_field("link", "https://board.test/j/9");
        let e = DigestEmail::compose(RecordKind::Job, &digest(RecordKind::Job, vec![c]), date(), "");
        assert!(e.plain.starts_with("https://board.test/j/9\nhttps://board.test/j/9"));
    }

    #[test]
    fn leads_list_company_email_and_source() {
        let c = Candidate::new(RecordKind::Lead, "https://acme.test/contact")
            .with_field("company", "Acme")
            .with_field("email", "hr@acme.test");
        let e = DigestEmail::compose(RecordKind::Lead, &digest(RecordKind::Lead, vec![c]), date(), "");
        assert_eq!(e.subject, "Hiring Companies - 05 Nov 2024");
        assert_eq!(e.plain, "Acme - hr@acme.test - https://acme.test/contact");
        assert!(e.html.contains("<em>Source:</em> <a href=\"https://acme.test/contact\">"));
    }
}
