//! Page understanding for the Scout pipelines.
//!
//! - Candidate extraction driven by per-source strategy chains (`extract`)
//! - Identity keys for deduplication (`normalize`)
//! - Job detail enrichment from posting pages (`details`)

pub mod details;
pub mod extract;
mod html;
pub mod normalize;

pub use details::{apply_details, enrich_job};
pub use extract::{extract, Extractor};
pub use normalize::{identity_key, normalize};
