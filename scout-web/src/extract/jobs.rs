use scout_common::{Candidate, RecordKind};

use super::{matches_any, resolve_link, Page};
use crate::html::{element_text, selector, truncate_chars};

const SNIPPET_CHARS: usize = 400;

pub(crate) struct ListingSelectors<'a> {
    pub item: &'a str,
    pub title: Option<&'a str>,
    pub link: Option<&'a str>,
    pub company: Option<&'a str>,
}

fn job(page: &Page<'_>, title: &str, company: &str, link: &str, snippet: &str) -> Candidate {
    Candidate::new(RecordKind::Job, page.source_url)
        .with_field("title", title)
        .with_field("company", company)
        .with_field("link", link)
        .with_field("snippet", snippet)
}

/// Every link whose text or target mentions a keyword.
pub(crate) fn anchors(page: &Page<'_>, keywords: &[String]) -> Vec<Candidate> {
    let Some(sel) = selector("a[href]") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for a in page.doc.select(&sel) {
        let href = a.value().attr("href").unwrap_or_default();
        let text = element_text(&a);
        if !(matches_any(&text, keywords) || matches_any(href, keywords)) {
            continue;
        }
        let Some(link) = resolve_link(page.base, href) else {
            continue;
        };
        out.push(job(page, &text, "", link.as_str(), &text));
    }
    out
}

/// Listing containers matched by CSS; fields come from the optional
/// sub-selectors.
pub(crate) fn listing(
    page: &Page<'_>,
    keywords: &[String],
    sels: &ListingSelectors<'_>,
) -> Vec<Candidate> {
    let Some(item_sel) = selector(sels.item) else {
        return Vec::new();
    };
    // A configured but unparsable sub-selector disables the strategy.
    let sub = |css: Option<&str>| css.map(selector);
    let (title_sel, link_sel, company_sel) = (sub(sels.title), sub(sels.link), sub(sels.company));
    if [&title_sel, &link_sel, &company_sel]
        .iter()
        .any(|s| matches!(s, Some(None)))
    {
        return Vec::new();
    }
    let Some(anchor_sel) = selector("a[href]") else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for item in page.doc.select(&item_sel) {
        let item_text = element_text(&item);
        let title = match &title_sel {
            Some(Some(s)) => item.select(s).next().map(|e| element_text(&e)).unwrap_or_default(),
            _ => item_text.clone(),
        };
        let href = match &link_sel {
            Some(Some(s)) => item.select(s).next(),
            _ if item.value().name() == "a" => Some(item),
            _ => item.select(&anchor_sel).next(),
        }
        .and_then(|e| e.value().attr("href"))
        .unwrap_or_default();
        let company = match &company_sel {
            Some(Some(s)) => item.select(s).next().map(|e| element_text(&e)).unwrap_or_default(),
            _ => String::new(),
        };

        if !(matches_any(&title, keywords)
            || matches_any(&item_text, keywords)
            || matches_any(href, keywords))
        {
            continue;
        }
        let Some(link) = resolve_link(page.base, href) else {
            continue;
        };
        let snippet = truncate_chars(&item_text, SNIPPET_CHARS);
        out.push(job(page, &title, &company, link.as_str(), &snippet));
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::extract::{extract, Extractor};
    use scout_common::RecordKind;
    use scout_config::StrategySpec;

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn anchor_text_match_yields_one_absolute_candidate() {
        let html = r#"<html><body>
            <nav><a href="/about">About us</a></nav>
            <a href="/jobs/42">Senior Graphic Design Lead</a>
        </body></html>"#;
        let found = extract(
            RecordKind::Job,
            html,
            "https://board.example.com/careers",
            &kw(&["graphic design"]),
        );
        assert_eq!(found.len(), 1);
        let c = &found[0];
        assert_eq!(c.field("link"), "https://board.example.com/jobs/42");
        assert_eq!(c.field("title"), "Senior Graphic Design Lead");
        assert_eq!(c.field("snippet"), "Senior Graphic Design Lead");
        assert_eq!(c.source_url, "https://board.example.com/careers");
    }

    #[test]
    fn href_alone_can_match() {
        let html = r#"<a href="https://other.test/branding-role">Apply here</a>"#;
        let found = extract(RecordKind::Job, html, "https://board.test/", &kw(&["branding"]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field("link"), "https://other.test/branding-role");
    }

    #[test]
    fn no_keywords_means_no_jobs() {
        let html = r#"<a href="/jobs/1">Graphic Designer</a>"#;
        assert!(extract(RecordKind::Job, html, "https://board.test/", &[]).is_empty());
    }

    #[test]
    fn listing_reads_sub_selectors() {
        let html = r#"
        <ul>
          <li class="job">
            <h3>Brand Identity Designer</h3>
            <span class="co">Northwind</span>
            <a class="apply" href="/postings/9">Apply</a>
            <a href="/share">Share</a>
          </li>
          <li class="job"><h3>Backend Engineer</h3><a class="apply" href="/postings/10">Apply</a></li>
        </ul>"#;
        let strategy = StrategySpec::Listing {
            item: "li.job".into(),
            title: Some("h3".into()),
            link: Some("a.apply".into()),
            company: Some(".co".into()),
        };
        let ex = Extractor::new(RecordKind::Job, &kw(&["brand"]));
        let found = ex.extract_with(html, "https://careers.test/open", &[strategy]);
        assert_eq!(found.len(), 1);
        let c = &found[0];
        assert_eq!(c.field("title"), "Brand Identity Designer");
        assert_eq!(c.field("company"), "Northwind");
        assert_eq!(c.field("link"), "https://careers.test/postings/9");
        assert!(c.field("snippet").starts_with("Brand Identity Designer Northwind"));
    }

    #[test]
    fn listing_with_bad_sub_selector_is_skipped() {
        let html = r#"<li class="job"><a href="/p/1">Logo work</a></li>"#;
        let strategy = StrategySpec::Listing {
            item: "li.job".into(),
            title: Some("h3[".into()),
            link: None,
            company: None,
        };
        let ex = Extractor::new(RecordKind::Job, &kw(&["logo"]));
        // Falls back to the default anchors strategy only when none is configured,
        // so an explicit broken listing yields nothing here.
        let found = ex.extract_with(html, "https://careers.test/", &[strategy]);
        assert!(found.is_empty());
    }
}
