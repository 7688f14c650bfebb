//! Core pipeline orchestration for siterag.
//!
//! This crate ties crawling, knowledge persistence, and index building into
//! the refresh workflow, guards it behind the run [`Coordinator`], and
//! serves admin and retrieval operations over the stored indexes.

pub mod admin;
pub mod coordinator;
pub mod refresh;
pub mod retrieve;

use std::sync::Arc;

use siterag_index::{Embedder, FastEmbedder, HashedEmbedder};
use siterag_shared::{IndexConfig, Result, SiteragError};

pub use coordinator::{Coordinator, StartOutcome};
pub use refresh::{
    ProgressReporter, RefreshConfig, RefreshOutcome, RefreshSummary, SilentProgress, run_refresh,
};
pub use retrieve::{combine_chunks, retrieve};

/// Construct the embedding provider named by the config.
pub fn embedder_from_config(index: &IndexConfig) -> Result<Arc<dyn Embedder>> {
    match index.embedder.as_str() {
        "fastembed" => Ok(Arc::new(FastEmbedder::new()?)),
        "hashed" => Ok(Arc::new(HashedEmbedder::default())),
        other => Err(SiteragError::config(format!(
            "unknown embedder '{other}': expected 'fastembed' or 'hashed'"
        ))),
    }
}
