//! Identity keys for deduplication.
//!
//! Keys depend only on stable candidate fields, never on when or in which
//! order a candidate was seen.

use scout_common::{Candidate, Fields, RecordKind};
use url::Url;

/// Hex characters kept from the link digest.
const JOB_KEY_LEN: usize = 16;

/// Identity key of a candidate, or `None` when its keyed field is missing or
/// unusable.
pub fn normalize(candidate: &Candidate) -> Option<String> {
    identity_key(candidate.kind, &candidate.fields, &candidate.source_url)
}

/// Identity key from raw fields; also used to re-key stored rows that were
/// written without one.
pub fn identity_key(kind: RecordKind, fields: &Fields, source_url: &str) -> Option<String> {
    let value = fields.get(kind.key_field())?;
    match kind {
        RecordKind::Lead => email_key(value),
        RecordKind::Job => canonical_link(value, source_url).map(|url| link_key(&url)),
    }
}

pub fn email_key(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(email)
}

/// Absolute form of `link` with the fragment removed.
pub fn canonical_link(link: &str, source_url: &str) -> Option<Url> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    let mut url = match Url::parse(link) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(source_url).ok()?.join(link).ok()?,
        Err(_) => return None,
    };
    url.set_fragment(None);
    Some(url)
}

fn link_key(url: &Url) -> String {
    let digest = blake3::hash(url.as_str().as_bytes());
    let mut key = hex::encode(digest.as_bytes());
    key.truncate(JOB_KEY_LEN);
    key
}
