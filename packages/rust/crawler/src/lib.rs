//! Breadth-first site crawler and content extraction.
//!
//! This crate provides:
//! - [`engine`] — the scope-aware BFS crawl engine
//! - [`extract`] — visible-text extraction from HTML
//!
//! The crawler walks a site from a seed URL, visiting each distinct
//! normalized URL at most once, and produces one [`PageRecord`] per page
//! successfully fetched and extracted.
//!
//! [`PageRecord`]: siterag_shared::PageRecord

pub mod engine;
pub mod extract;
mod settle;

pub use engine::{CrawlSummary, Crawler, normalize_url};
pub use extract::extract_text;
