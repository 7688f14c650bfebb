//! Content-stability fetch: poll a page until its body stops changing.
//!
//! Pages rendered or mutated client-side can return different bodies across
//! closely spaced fetches. Instead of a fixed sleep, the fetch re-requests
//! the page on a bounded schedule and stops as soon as two consecutive
//! bodies hash identically.

use std::time::Duration;

use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use siterag_shared::{Result, SiteragError};

/// Fetch `url` and wait for its body to settle.
///
/// Re-fetches up to `max_polls` times with `poll_ms` between requests,
/// returning early once two consecutive bodies match. When the poll budget
/// runs out, the most recent body is taken as-is. `max_polls == 0`
/// disables polling entirely.
pub(crate) async fn fetch_settled(
    client: &Client,
    url: &Url,
    poll_ms: u64,
    max_polls: u32,
) -> Result<String> {
    let mut body = fetch_once(client, url).await?;
    if max_polls == 0 {
        return Ok(body);
    }

    let mut prev_hash = content_hash(&body);

    for poll in 1..=max_polls {
        tokio::time::sleep(Duration::from_millis(poll_ms)).await;

        let next = fetch_once(client, url).await?;
        let next_hash = content_hash(&next);

        if next_hash == prev_hash {
            debug!(%url, poll, "page content settled");
            return Ok(next);
        }

        body = next;
        prev_hash = next_hash;
    }

    debug!(%url, max_polls, "settle budget exhausted, taking latest body");
    Ok(body)
}

/// Single GET returning the response body, failing on non-2xx status.
async fn fetch_once(client: &Client, url: &Url) -> Result<String> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| SiteragError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SiteragError::Network(format!("{url}: HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| SiteragError::Network(format!("{url}: body read failed: {e}")))
}

/// SHA-256 hash of a body, hex-encoded.
fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
