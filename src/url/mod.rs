//! URL handling module for Care-Crawl
//!
//! This module provides domain extraction, the normalized keys used by the
//! visited-URL set, and filename sanitization for step checkpoints.

mod domain;
mod normalize;
mod sanitize;

// Re-export main functions
pub use domain::{extract_domain, origin_of};
pub use normalize::{normalize_url, visit_key};
pub use sanitize::sanitize_filename;
