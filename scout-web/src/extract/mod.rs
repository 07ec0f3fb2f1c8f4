//! Candidate extraction from fetched pages.
//!
//! A source carries a prioritized list of [`StrategySpec`]s. They are tried in
//! order and the first one that yields anything wins; a source without its
//! own list uses the defaults for the pipeline kind. Markup that does not
//! look the way a strategy expects simply produces fewer candidates.

use std::collections::HashSet;

use scout_common::{Candidate, RecordKind};
use scout_config::{SourceSpec, StrategySpec};
use scraper::Html;
use url::Url;

mod jobs;
mod leads;

/// Applies keyword-driven strategies to page content.
#[derive(Debug, Clone)]
pub struct Extractor {
    kind: RecordKind,
    keywords: Vec<String>,
}

impl Extractor {
    /// `keywords` are matched as case-insensitive substrings.
    pub fn new(kind: RecordKind, keywords: &[String]) -> Self {
        let keywords = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { kind, keywords }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Extract with the strategies configured for `source`.
    pub fn extract(&self, content: &str, source: &SourceSpec) -> Vec<Candidate> {
        self.extract_with(content, source.url(), source.strategies())
    }

    /// Extract with an explicit strategy list (empty means defaults).
    pub fn extract_with(
        &self,
        content: &str,
        source_url: &str,
        strategies: &[StrategySpec],
    ) -> Vec<Candidate> {
        let mut chain: Vec<StrategySpec> = strategies
            .iter()
            .filter(|s| s.applies_to(self.kind))
            .cloned()
            .collect();
        if chain.is_empty() {
            chain = StrategySpec::defaults_for(self.kind);
        }

        let doc = Html::parse_document(content);
        let base = Url::parse(source_url).ok();
        let page = Page {
            doc: &doc,
            base: base.as_ref(),
            source_url,
        };

        for strategy in &chain {
            let mut found = self.run(strategy, &page);
            if found.is_empty() {
                tracing::debug!(source=%source_url, strategy=strategy.name(), "extract.strategy.empty");
                continue;
            }
            let raw = found.len();
            let mut seen = HashSet::new();
            found.retain(|c| seen.insert(c.fields.clone()));
            tracing::debug!(
                source=%source_url,
                strategy=strategy.name(),
                raw,
                unique=found.len(),
                "extract.strategy.hit"
            );
            return found;
        }
        Vec::new()
    }

    fn run(&self, strategy: &StrategySpec, page: &Page<'_>) -> Vec<Candidate> {
        match strategy {
            StrategySpec::Anchors => jobs::anchors(page, &self.keywords),
            StrategySpec::Listing {
                item,
                title,
                link,
                company,
            } => jobs::listing(
                page,
                &self.keywords,
                &jobs::ListingSelectors {
                    item,
                    title: title.as_deref(),
                    link: link.as_deref(),
                    company: company.as_deref(),
                },
            ),
            StrategySpec::Emails => leads::emails(page),
        }
    }
}

/// Extract job or lead candidates from `content` with the default strategies.
pub fn extract(
    kind: RecordKind,
    content: &str,
    source_url: &str,
    keywords: &[String],
) -> Vec<Candidate> {
    Extractor::new(kind, keywords).extract_with(content, source_url, &[])
}

pub(crate) struct Page<'a> {
    pub doc: &'a Html,
    pub base: Option<&'a Url>,
    pub source_url: &'a str,
}

pub(crate) fn matches_any(text: &str, keywords: &[String]) -> bool {
    if text.is_empty() {
        return false;
    }
    let lower = text.to_lowercase();
    keywords.iter().any(|k| lower.contains(k.as_str()))
}

/// Resolve an `href` against the page URL, dropping fragments and anything
/// that is not an http(s) link.
pub(crate) fn resolve_link(base: Option<&Url>, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("mailto:") || lower.starts_with("tel:")
    {
        return None;
    }
    let mut url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}
