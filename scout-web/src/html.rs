//! Small DOM helpers shared by the extraction strategies.

use scraper::{ElementRef, Html, Selector};

/// Parse a CSS selector, logging instead of failing on bad input.
pub(crate) fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(err) => {
            tracing::warn!(selector=%css, error=?err, "extract.selector.invalid");
            None
        }
    }
}

pub(crate) fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an element with whitespace collapsed.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    collapse_ws(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text of the whole page, skipping script-like containers.
pub(crate) fn page_text(doc: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript" | "template"))
        });
        if !hidden {
            parts.push(&**text);
        }
    }
    collapse_ws(&parts.join(" "))
}

/// `content` of the first `<meta>` whose `property` or `name` equals `key`.
pub(crate) fn meta_content(doc: &Html, key: &str) -> Option<String> {
    let sel = selector("meta")?;
    doc.select(&sel)
        .filter(|m| {
            let v = m.value();
            v.attr("property") == Some(key) || v.attr("name") == Some(key)
        })
        .filter_map(|m| m.value().attr("content"))
        .map(collapse_ws)
        .find(|c| !c.is_empty())
}

/// Text of the first element matching `css` that is not blank.
pub(crate) fn first_text(doc: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    doc.select(&sel)
        .map(|e| element_text(&e))
        .find(|t| !t.is_empty())
}

/// First `div`/`span` whose class mentions "company".
pub(crate) fn company_element_text(doc: &Html) -> Option<String> {
    let sel = selector("div[class*='company'], span[class*='company']")?;
    doc.select(&sel)
        .map(|e| element_text(&e))
        .find(|t| !t.is_empty() && t.chars().count() <= 120)
}

/// First `max_chars` characters of `s`.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
