//! Job detail enrichment: follow a posting's link and fill in blanks.

use scout_common::Candidate;
use scout_http::Fetch;
use scraper::Html;

use crate::html::{company_element_text, first_text, meta_content, page_text, truncate_chars};

const SNIPPET_CHARS: usize = 400;

/// Fetch the candidate's link and fill any empty `title`, `company` or
/// `snippet`. The link is never changed, so the identity key stays put. A
/// failed fetch returns the candidate as it was.
pub async fn enrich_job<F: Fetch + ?Sized>(fetcher: &F, candidate: Candidate) -> Candidate {
    let link = candidate.field("link").to_string();
    if link.is_empty() {
        return candidate;
    }
    match fetcher.fetch(&link).await {
        Ok(html) => apply_details(candidate, &html),
        Err(failure) => {
            tracing::debug!(link=%link, reason=%failure.reason, "details.fetch.failed");
            candidate
        }
    }
}

/// Fill empty fields of `candidate` from a posting page.
pub fn apply_details(mut candidate: Candidate, html: &str) -> Candidate {
    let doc = Html::parse_document(html);
    let mut fill = |name: &str, value: Option<String>| {
        if candidate.field(name).is_empty() {
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                candidate.fields.insert(name.to_string(), v);
            }
        }
    };
    fill("title", first_text(&doc, "h1"));
    fill(
        "company",
        company_element_text(&doc).or_else(|| meta_content(&doc, "og:site_name")),
    );
    fill("snippet", Some(truncate_chars(&page_text(&doc), SNIPPET_CHARS)));
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scout_common::RecordKind;
    use scout_http::FetchFailure;

    struct OnePage(&'static str);

    #[async_trait]
    impl Fetch for OnePage {
        async fn fetch(&self, url: &str) -> Result<String, FetchFailure> {
            if url.ends_with("/missing") {
                return Err(FetchFailure {
                    url: url.to_string(),
                    reason: "404".into(),
                    transient: false,
                });
            }
            Ok(self.0.to_string())
        }
    }

    const POSTING: &str = r#"<html><head><meta property="og:site_name" content="Board"></head>
        <body><h1>Packaging Designer</h1><span class="company">Oak &amp; Ink</span>
        <p>We are looking for a packaging designer.</p></body></html>"#;

    fn bare(link: &str) -> Candidate {
        Candidate::new(RecordKind::Job, "https://board.test/")
            .with_field("title", "")
            .with_field("company", "")
            .with_field("link", link)
            .with_field("snippet", "")
    }

    #[tokio::test]
    async fn fills_blank_fields() {
        let c = enrich_job(&OnePage(POSTING), bare("https://board.test/jobs/1")).await;
        assert_eq!(c.field("title"), "Packaging Designer");
        assert_eq!(c.field("company"), "Oak & Ink");
        assert!(c.field("snippet").contains("looking for a packaging designer"));
        assert_eq!(c.field("link"), "https://board.test/jobs/1");
    }

    #[tokio::test]
    async fn keeps_existing_values() {
        let c = bare("https://board.test/jobs/1").with_field("title", "From listing");
        let c = enrich_job(&OnePage(POSTING), c).await;
        assert_eq!(c.field("title"), "From listing");
    }

    #[tokio::test]
    async fn failed_fetch_is_harmless() {
        let c = bare("https://board.test/missing");
        let out = enrich_job(&OnePage(POSTING), c.clone()).await;
        assert_eq!(out, c);
    }

    #[test]
    fn site_name_is_the_company_fallback() {
        let html = r#"<head><meta name="og:site_name" content="Studio Nine"></head><body>text</body>"#;
        let c = apply_details(bare("https://board.test/jobs/2"), html);
        assert_eq!(c.field("company"), "Studio Nine");
    }
}
