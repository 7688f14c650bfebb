//! Scope-aware breadth-first crawl engine.
//!
//! The crawler starts from a seed URL and walks same-origin hyperlinks in
//! BFS order, producing one page record per distinct normalized URL. Link
//! exclusion patterns are evaluated before the origin check; both must pass
//! for a link to be enqueued.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use siterag_shared::{CrawlConfig, PageRecord, Result, SiteragError};

use crate::extract::extract_text;
use crate::settle::fetch_settled;

/// User-Agent string for crawl requests.
const USER_AGENT: &str = concat!("siterag/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// CrawlSummary
// ---------------------------------------------------------------------------

/// Summary of a completed crawl run.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    /// Number of pages successfully fetched and extracted.
    pub pages_fetched: usize,
    /// Number of frontier entries that failed to fetch or parse.
    pub pages_failed: usize,
    /// Total duration of the run.
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Sequential breadth-first site crawler.
///
/// One call to [`Crawler::crawl`] is one run: the frontier and visited set
/// are local to the run, and the run executes to completion with no
/// internal parallelism.
pub struct Crawler {
    config: CrawlConfig,
    client: Client,
}

impl Crawler {
    /// Create a new crawler with the given configuration.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SiteragError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Crawl the site reachable from `seed`, breadth-first.
    ///
    /// Returns the run summary and the accumulated page records in visit
    /// order. A page that fails to fetch is logged and skipped; it never
    /// aborts the run and is never retried.
    #[instrument(skip_all, fields(seed = %seed))]
    pub async fn crawl(&self, seed: &Url) -> Result<(CrawlSummary, Vec<PageRecord>)> {
        let start_time = std::time::Instant::now();

        let mut frontier: VecDeque<Url> = VecDeque::new();
        // Every URL ever enqueued, by normalized form. Insertion returning
        // false is the enqueue-at-most-once check.
        let mut queued: HashSet<String> = HashSet::new();
        // URLs already popped and processed. Only grows within a run.
        let mut visited: HashSet<String> = HashSet::new();

        frontier.push_back(seed.clone());
        queued.insert(normalize_url(seed));

        let mut pages: Vec<PageRecord> = Vec::new();
        let mut pages_failed: usize = 0;

        info!(
            skip_patterns = ?self.config.skip_patterns,
            settle_max_polls = self.config.settle_max_polls,
            "starting crawl"
        );

        while let Some(url) = frontier.pop_front() {
            let normalized = normalize_url(&url);
            if !visited.insert(normalized) {
                continue;
            }

            debug!(%url, "fetching page");
            let body = match fetch_settled(
                &self.client,
                &url,
                self.config.settle_poll_ms,
                self.config.settle_max_polls,
            )
            .await
            {
                Ok(body) => body,
                Err(e) => {
                    warn!(%url, error = %e, "page fetch failed, skipping");
                    pages_failed += 1;
                    continue;
                }
            };

            let content = extract_text(&body);
            pages.push(PageRecord {
                url: url.to_string(),
                content,
            });

            for link in extract_links(&body, &url) {
                // Exclusion patterns run before the origin check; both must
                // pass for the link to be enqueued.
                if self.is_excluded(link.as_str()) {
                    debug!(link = %link, "link matches skip pattern");
                    continue;
                }
                if !link.as_str().starts_with(seed.as_str()) {
                    continue;
                }

                let key = normalize_url(&link);
                if visited.contains(&key) || !queued.insert(key) {
                    continue;
                }
                frontier.push_back(link);
            }
        }

        let summary = CrawlSummary {
            pages_fetched: pages.len(),
            pages_failed,
            duration: start_time.elapsed(),
        };

        info!(
            pages_fetched = summary.pages_fetched,
            pages_failed = summary.pages_failed,
            duration_ms = summary.duration.as_millis(),
            "crawl completed"
        );

        Ok((summary, pages))
    }

    /// Whether a resolved URL matches any configured skip pattern.
    fn is_excluded(&self, url: &str) -> bool {
        self.config.skip_patterns.iter().any(|p| url.contains(p))
    }
}

// ---------------------------------------------------------------------------
// Link extraction
// ---------------------------------------------------------------------------

/// Extract hyperlink targets from a page, resolved against its URL.
///
/// Fragment-only, `javascript:`, `mailto:` and `tel:` hrefs are discarded;
/// surviving links are resolved to absolute URLs with fragments stripped.
fn extract_links(html: &str, base_url: &Url) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let link_sel = Selector::parse("a[href]").unwrap();
    let mut links = Vec::new();

    for el in doc.select(&link_sel) {
        if let Some(href) = el.value().attr("href") {
            if href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
                || href.starts_with("tel:")
            {
                continue;
            }

            if let Ok(mut resolved) = base_url.join(href) {
                resolved.set_fragment(None);
                links.push(resolved);
            }
        }
    }

    links
}

/// Normalize a URL for deduplication (strip fragment, trailing slash).
///
/// Two hrefs resolving to the same normalized form are one page; the
/// trailing slash is kept only on origin roots.
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let mut s = normalized.to_string();
    if s.ends_with('/') && s.matches('/').count() > 3 {
        s.pop();
    }
    s
}
