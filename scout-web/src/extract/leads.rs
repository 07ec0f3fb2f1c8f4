use std::sync::LazyLock;

use regex::Regex;
use scout_common::{Candidate, RecordKind};

use super::Page;
use crate::html::{company_element_text, first_text, meta_content, page_text, selector};

static EMAIL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b[a-z0-9][a-z0-9._%+-]*@[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*\.[a-z]{2,24}\b",
    )
    .ok()
});

/// Suffixes that show up in `name@2x.png`-style asset names.
const ASSET_SUFFIXES: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "css", "js"];

/// Email addresses from page text and `mailto:` links, each paired with the
/// best company name the page offers.
pub(crate) fn emails(page: &Page<'_>) -> Vec<Candidate> {
    let Some(re) = EMAIL_RE.as_ref() else {
        return Vec::new();
    };

    let mut found: Vec<String> = re
        .find_iter(&page_text(page.doc))
        .filter_map(|m| clean_email(m.as_str()))
        .collect();

    if let Some(sel) = selector("a[href]") {
        for a in page.doc.select(&sel) {
            let href = a.value().attr("href").unwrap_or_default().trim();
            let Some(scheme) = href.get(..7) else {
                continue;
            };
            if !scheme.eq_ignore_ascii_case("mailto:") {
                continue;
            }
            let addrs = href[7..].split('?').next().unwrap_or_default();
            for addr in addrs.split(',') {
                let addr = addr.replace("%40", "@").replace("%20", "");
                if let Some(email) = clean_email(&addr) {
                    if re
                        .find(&email)
                        .is_some_and(|m| m.start() == 0 && m.end() == email.len())
                    {
                        found.push(email);
                    }
                }
            }
        }
    }

    if found.is_empty() {
        return Vec::new();
    }
    let company = company_name(page);
    found
        .into_iter()
        .map(|email| {
            Candidate::new(RecordKind::Lead, page.source_url)
                .with_field("company", company.as_str())
                .with_field("email", email)
        })
        .collect()
}

fn clean_email(raw: &str) -> Option<String> {
    let email = raw.trim().trim_end_matches('.').to_lowercase();
    let (_, domain) = email.rsplit_once('@')?;
    let tld = domain.rsplit('.').next()?;
    if ASSET_SUFFIXES.contains(&tld) {
        return None;
    }
    Some(email)
}

/// `og:site_name`, then a "company" element, then `<title>`, then the host.
fn company_name(page: &Page<'_>) -> String {
    meta_content(page.doc, "og:site_name")
        .or_else(|| company_element_text(page.doc))
        .or_else(|| first_text(page.doc, "title"))
        .or_else(|| page.base.and_then(|u| u.host_str()).map(str::to_string))
        .unwrap_or_else(|| page.source_url.to_string())
}
