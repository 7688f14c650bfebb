//! Query-time retrieval against the active index.
//!
//! Retrieval is read-only. Every failure mode — no active pointer, a
//! missing or corrupt artifact, an embedding error — surfaces as
//! [`SiteragError::RetrievalUnavailable`] so the caller can substitute its
//! fallback behavior instead of crashing.

use std::path::Path;

use tracing::debug;

use siterag_index::{Embedder, ScoredChunk, VectorIndex};
use siterag_shared::{Result, SiteragError};
use siterag_storage::Storage;

/// Return the `k` chunks most similar to `query` from the active index.
pub async fn retrieve(
    storage: &Storage,
    index_root: &Path,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
) -> Result<Vec<ScoredChunk>> {
    let active = storage.active_index().await.map_err(|e| {
        SiteragError::RetrievalUnavailable(format!("active index lookup failed: {e}"))
    })?;

    let Some(active) = active else {
        return Err(SiteragError::RetrievalUnavailable(
            "no active index is set".into(),
        ));
    };

    let path = index_root.join(active.as_str());
    let index = VectorIndex::load(&path).map_err(|e| {
        SiteragError::RetrievalUnavailable(format!("failed to load index {active}: {e}"))
    })?;

    debug!(index_id = %active, chunks = index.len(), k, "querying active index");

    index
        .query(embedder, query, k)
        .map_err(|e| SiteragError::RetrievalUnavailable(format!("query failed: {e}")))
}

/// Join retrieved chunk texts into one context string.
pub fn combine_chunks(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_joins_with_newlines() {
        let chunks = vec![
            ScoredChunk {
                text: "first chunk".into(),
                score: 0.9,
            },
            ScoredChunk {
                text: "second chunk".into(),
                score: 0.5,
            },
        ];
        assert_eq!(combine_chunks(&chunks), "first chunk\nsecond chunk");
        assert_eq!(combine_chunks(&[]), "");
    }
}
