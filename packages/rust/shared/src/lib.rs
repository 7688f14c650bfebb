//! Shared types, error model, and configuration for siterag.
//!
//! This crate is the foundation depended on by all other siterag crates.
//! It provides:
//! - [`SiteragError`] — the unified error type
//! - Domain types ([`PageRecord`], [`IndexId`], [`RunStatus`])
//! - Configuration ([`AppConfig`], [`CrawlConfig`], [`IndexConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlConfig, IndexConfig, SiteConfig, StorageConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{Result, SiteragError};
pub use types::{INDEX_SCHEMA_VERSION, IndexId, PageRecord, RunStatus};
