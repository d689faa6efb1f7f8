//! URL handling module for Tousu-Crawler
//!
//! This module builds list page URLs from the configured template and
//! resolves the pagination links found on fetched pages.

mod resolve;
mod template;

// Re-export main functions
pub use resolve::{page_number_from_href, resolve_link};
pub use template::PageUrlTemplate;

/// Query parameter that carries the page number on list page URLs
pub const PAGE_QUERY_PARAM: &str = "page";
