//! End-to-end refresh workflow: crawl → persist knowledge → build index.
//!
//! One refresh is one run: the crawl and the index build execute
//! sequentially to completion. The run mints a fresh index identifier from
//! its start time and never activates its own output — promotion is a
//! separate administrative action.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, instrument};
use url::Url;

use siterag_crawler::Crawler;
use siterag_index::{Chunker, Embedder, VectorIndex};
use siterag_shared::{
    AppConfig, CrawlConfig, IndexConfig, IndexId, Result, SiteragError,
};
use siterag_storage::Storage;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything one refresh run needs.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Seed URL the crawl starts from.
    pub seed_url: Url,
    /// Crawl policies.
    pub crawl: CrawlConfig,
    /// Chunking policy.
    pub index: IndexConfig,
    /// Relational database path.
    pub db_path: PathBuf,
    /// Directory holding one subdirectory per vector index.
    pub index_root: PathBuf,
}

impl RefreshConfig {
    /// Build a run config from the application config, optionally
    /// overriding the seed URL.
    pub fn from_app_config(config: &AppConfig, seed_override: Option<&str>) -> Result<Self> {
        let seed_raw = seed_override.unwrap_or(&config.site.seed_url);
        if seed_raw.is_empty() {
            return Err(SiteragError::config(
                "no seed URL configured: set [site].seed_url or pass --url",
            ));
        }
        let seed_url = Url::parse(seed_raw)
            .map_err(|e| SiteragError::config(format!("invalid seed URL '{seed_raw}': {e}")))?;

        Ok(Self {
            seed_url,
            crawl: config.crawl.clone(),
            index: config.index.clone(),
            db_path: config.storage.db_path()?,
            index_root: config.storage.index_root()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting refresh status.
pub trait ProgressReporter: Send + Sync {
    /// Called with a free-text description when the run advances.
    fn phase(&self, message: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _message: &str) {}
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of one refresh run.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// The crawl produced no pages; nothing was persisted.
    NoPages,
    /// Pages were persisted but chunking produced nothing to embed, so no
    /// vector index was written. A no-op, not an error.
    NoChunks {
        /// Identifier the knowledge rows were stored under.
        index_id: IndexId,
        /// Number of pages persisted.
        pages: usize,
    },
    /// A new vector index was persisted and awaits activation.
    Indexed(RefreshSummary),
}

/// Summary of a refresh that produced an index.
#[derive(Debug, Clone)]
pub struct RefreshSummary {
    /// Identifier of the new index.
    pub index_id: IndexId,
    /// Number of pages crawled and persisted.
    pub pages: usize,
    /// Number of chunks embedded into the index.
    pub chunks: usize,
    /// Total elapsed time.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// The refresh run
// ---------------------------------------------------------------------------

/// Run one crawl → persist → build cycle.
///
/// The new index is left inactive; an admin promotes it explicitly.
#[instrument(skip_all, fields(seed = %config.seed_url))]
pub async fn run_refresh(
    config: &RefreshConfig,
    embedder: &dyn Embedder,
    progress: &dyn ProgressReporter,
) -> Result<RefreshOutcome> {
    let start = Instant::now();
    let started_at = Utc::now();

    // Chunk policy problems should fail the run before any crawling.
    let chunker = Chunker::new(config.index.chunk_max_chars, config.index.chunk_overlap_chars)?;

    progress.phase("Starting crawl");
    let crawler = Crawler::new(config.crawl.clone())?;
    let (summary, pages) = crawler.crawl(&config.seed_url).await?;

    if pages.is_empty() {
        info!("crawl produced no pages, nothing to persist");
        progress.phase("Crawl completed, but no pages were found");
        return Ok(RefreshOutcome::NoPages);
    }

    let index_id = IndexId::from_start_time(started_at);

    progress.phase(&format!(
        "Saving {} pages under index {index_id}",
        pages.len()
    ));
    let storage = Storage::open(&config.db_path).await?;
    storage.insert_knowledge(&index_id, &pages).await?;

    progress.phase(&format!("Building vector index {index_id}"));
    let index_path = config.index_root.join(index_id.as_str());
    let built = VectorIndex::build(&index_path, &pages, &chunker, embedder)?;

    match built {
        None => {
            progress.phase(&format!(
                "Completed: no text chunks generated, no index written for {index_id}"
            ));
            Ok(RefreshOutcome::NoChunks {
                index_id,
                pages: pages.len(),
            })
        }
        Some(build) => {
            let result = RefreshSummary {
                index_id: index_id.clone(),
                pages: pages.len(),
                chunks: build.chunk_count,
                elapsed: start.elapsed(),
            };

            progress.phase(&format!(
                "Completed: new index {index_id} created; an admin must set it active"
            ));
            info!(
                index_id = %result.index_id,
                pages = result.pages,
                pages_failed = summary.pages_failed,
                chunks = result.chunks,
                elapsed_ms = result.elapsed.as_millis(),
                "refresh complete"
            );

            Ok(RefreshOutcome::Indexed(result))
        }
    }
}
