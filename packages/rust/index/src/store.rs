//! On-disk vector index: build, load, and nearest-neighbor query.
//!
//! Each index lives in its own directory named by the index identifier:
//! `meta.json` (model + layout), `chunks.json` (chunk texts in order), and
//! `vectors.bin` (little-endian f32 vectors, one row per chunk). Builds
//! write into a temp directory first and rename into place, so a failed
//! build never leaves a queryable artifact.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use siterag_shared::{INDEX_SCHEMA_VERSION, PageRecord, Result, SiteragError};

use crate::chunk::Chunker;
use crate::embedder::Embedder;

const META_FILE: &str = "meta.json";
const CHUNKS_FILE: &str = "chunks.json";
const VECTORS_FILE: &str = "vectors.bin";

// ---------------------------------------------------------------------------
// Artifact metadata
// ---------------------------------------------------------------------------

/// `meta.json` — layout and provenance of one index directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexMeta {
    /// Schema version of the artifact layout.
    schema_version: u32,
    /// Embedding model that produced the vectors.
    model_id: String,
    /// Vector length.
    dimension: usize,
    /// Number of chunk/vector rows.
    chunk_count: usize,
    /// When the index was built.
    created_at: DateTime<Utc>,
}

/// Summary of a successful index build.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    /// Directory the index was persisted to.
    pub path: PathBuf,
    /// Number of chunks embedded and stored.
    pub chunk_count: usize,
}

/// One retrieval hit: a chunk and its similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// Chunk text.
    pub text: String,
    /// Cosine similarity to the query embedding.
    pub score: f32,
}

// ---------------------------------------------------------------------------
// VectorIndex
// ---------------------------------------------------------------------------

/// A loaded vector index supporting nearest-neighbor lookup.
pub struct VectorIndex {
    meta: IndexMeta,
    chunks: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Build an index from crawled page records and persist it at `path`.
    ///
    /// Returns `Ok(None)` — a valid no-op, not an error — when the input
    /// list is empty or chunking produces no chunks; no artifact is
    /// created in that case.
    pub fn build(
        path: &Path,
        records: &[PageRecord],
        chunker: &Chunker,
        embedder: &dyn Embedder,
    ) -> Result<Option<BuildSummary>> {
        if records.is_empty() {
            debug!(?path, "no page records, skipping index build");
            return Ok(None);
        }

        let mut chunks: Vec<String> = Vec::new();
        for record in records {
            chunks.extend(chunker.split(&record.content));
        }
        if chunks.is_empty() {
            debug!(?path, "no chunks produced, skipping index build");
            return Ok(None);
        }

        let vectors = embedder.embed(&chunks)?;
        let dimension = embedder.dimension();
        if vectors.len() != chunks.len() || vectors.iter().any(|v| v.len() != dimension) {
            return Err(SiteragError::Index(format!(
                "embedder returned a malformed batch for model {}",
                embedder.model_id()
            )));
        }

        let meta = IndexMeta {
            schema_version: INDEX_SCHEMA_VERSION,
            model_id: embedder.model_id().to_string(),
            dimension,
            chunk_count: chunks.len(),
            created_at: Utc::now(),
        };

        write_artifact(path, &meta, &chunks, &vectors)?;

        info!(
            ?path,
            chunk_count = meta.chunk_count,
            model = %meta.model_id,
            "vector index built"
        );

        Ok(Some(BuildSummary {
            path: path.to_path_buf(),
            chunk_count: chunks.len(),
        }))
    }

    /// Load an index from its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let meta_raw = std::fs::read_to_string(path.join(META_FILE))
            .map_err(|e| SiteragError::Index(format!("{}: {e}", path.display())))?;
        let meta: IndexMeta = serde_json::from_str(&meta_raw)
            .map_err(|e| SiteragError::Index(format!("invalid index metadata: {e}")))?;

        if meta.schema_version != INDEX_SCHEMA_VERSION {
            return Err(SiteragError::Index(format!(
                "unsupported index schema version {}",
                meta.schema_version
            )));
        }
        if meta.dimension == 0 {
            return Err(SiteragError::Index("index dimension is zero".into()));
        }

        let chunks_raw = std::fs::read_to_string(path.join(CHUNKS_FILE))
            .map_err(|e| SiteragError::Index(format!("{}: {e}", path.display())))?;
        let chunks: Vec<String> = serde_json::from_str(&chunks_raw)
            .map_err(|e| SiteragError::Index(format!("invalid chunk list: {e}")))?;

        let bytes = std::fs::read(path.join(VECTORS_FILE))
            .map_err(|e| SiteragError::Index(format!("{}: {e}", path.display())))?;

        let expected = meta.chunk_count * meta.dimension * 4;
        if chunks.len() != meta.chunk_count || bytes.len() != expected {
            return Err(SiteragError::Index(format!(
                "index at {} is corrupt: expected {} chunks / {} vector bytes, found {} / {}",
                path.display(),
                meta.chunk_count,
                expected,
                chunks.len(),
                bytes.len()
            )));
        }

        let mut vectors = Vec::with_capacity(meta.chunk_count);
        for row in bytes.chunks_exact(meta.dimension * 4) {
            let vector: Vec<f32> = row
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            vectors.push(vector);
        }

        Ok(Self {
            meta,
            chunks,
            vectors,
        })
    }

    /// Return the `k` chunks most similar to `text`, best first.
    ///
    /// Read-only; the index is never mutated by queries.
    pub fn query(
        &self,
        embedder: &dyn Embedder,
        text: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if embedder.model_id() != self.meta.model_id {
            return Err(SiteragError::Index(format!(
                "index was built with model {} but queried with {}",
                self.meta.model_id,
                embedder.model_id()
            )));
        }

        let query = embedder
            .embed(std::slice::from_ref(&text.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| SiteragError::Embedding("no query embedding returned".into()))?;

        let mut scored: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .zip(&self.vectors)
            .map(|(chunk, vector)| ScoredChunk {
                text: chunk.clone(),
                score: cosine_similarity(&query, vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Number of chunk rows in the index.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Model identifier the index was built with.
    pub fn model_id(&self) -> &str {
        &self.meta.model_id
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Write the artifact into a temp sibling directory, then rename into place.
fn write_artifact(
    path: &Path,
    meta: &IndexMeta,
    chunks: &[String],
    vectors: &[Vec<f32>],
) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| SiteragError::Index(format!("{} has no parent directory", path.display())))?;
    std::fs::create_dir_all(parent).map_err(|e| SiteragError::io(parent, e))?;

    let staging = parent.join(format!(".build-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&staging).map_err(|e| SiteragError::io(&staging, e))?;

    let result = (|| -> Result<()> {
        let meta_json = serde_json::to_string_pretty(meta)
            .map_err(|e| SiteragError::Index(e.to_string()))?;
        std::fs::write(staging.join(META_FILE), meta_json)
            .map_err(|e| SiteragError::io(staging.join(META_FILE), e))?;

        let chunks_json =
            serde_json::to_string(chunks).map_err(|e| SiteragError::Index(e.to_string()))?;
        std::fs::write(staging.join(CHUNKS_FILE), chunks_json)
            .map_err(|e| SiteragError::io(staging.join(CHUNKS_FILE), e))?;

        let mut bytes = Vec::with_capacity(meta.chunk_count * meta.dimension * 4);
        for vector in vectors {
            for value in vector {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        std::fs::write(staging.join(VECTORS_FILE), bytes)
            .map_err(|e| SiteragError::io(staging.join(VECTORS_FILE), e))?;

        // A leftover target can only come from an aborted earlier build of
        // the same identifier.
        if path.exists() {
            std::fs::remove_dir_all(path).map_err(|e| SiteragError::io(path, e))?;
        }
        std::fs::rename(&staging, path).map_err(|e| SiteragError::io(path, e))?;
        Ok(())
    })();

    if result.is_err() {
        let _ = std::fs::remove_dir_all(&staging);
    }
    result
}

/// Cosine similarity between two vectors of equal length.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashedEmbedder;

    fn temp_index_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("siterag_index_test_{}", Uuid::now_v7()))
            .join("idx-1714564800")
    }

    fn sample_records() -> Vec<PageRecord> {
        vec![
            PageRecord {
                url: "https://www.example-firm.com/services".into(),
                content: "We provide tax advisory and compliance services.".into(),
            },
            PageRecord {
                url: "https://www.example-firm.com/about".into(),
                content: "Our team has decades of capital markets experience.".into(),
            },
        ]
    }

    #[test]
    fn empty_input_builds_nothing() {
        let path = temp_index_path();
        let chunker = Chunker::new(1000, 200).unwrap();
        let embedder = HashedEmbedder::default();

        let summary = VectorIndex::build(&path, &[], &chunker, &embedder).unwrap();
        assert!(summary.is_none());
        assert!(!path.exists());
    }

    #[test]
    fn blank_content_builds_nothing() {
        let path = temp_index_path();
        let chunker = Chunker::new(1000, 200).unwrap();
        let embedder = HashedEmbedder::default();

        let records = vec![PageRecord {
            url: "https://www.example-firm.com/empty".into(),
            content: "   \n  ".into(),
        }];
        let summary = VectorIndex::build(&path, &records, &chunker, &embedder).unwrap();
        assert!(summary.is_none());
        assert!(!path.exists());
    }

    #[test]
    fn build_load_query_roundtrip() {
        let path = temp_index_path();
        let chunker = Chunker::new(1000, 200).unwrap();
        let embedder = HashedEmbedder::default();

        let summary = VectorIndex::build(&path, &sample_records(), &chunker, &embedder)
            .unwrap()
            .expect("index should be built");
        assert_eq!(summary.chunk_count, 2);
        assert!(path.join("meta.json").exists());
        assert!(path.join("chunks.json").exists());
        assert!(path.join("vectors.bin").exists());

        let index = VectorIndex::load(&path).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.model_id(), "hashed-v1");

        // Querying with text identical to a stored chunk returns it first.
        let hits = index
            .query(
                &embedder,
                "We provide tax advisory and compliance services.",
                2,
            )
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(
            hits[0].text,
            "We provide tax advisory and compliance services."
        );
        assert!((hits[0].score - 1.0).abs() < 1e-4);
        assert!(hits[0].score >= hits[1].score);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn query_k_larger_than_index_returns_all() {
        let path = temp_index_path();
        let chunker = Chunker::new(1000, 200).unwrap();
        let embedder = HashedEmbedder::default();

        VectorIndex::build(&path, &sample_records(), &chunker, &embedder)
            .unwrap()
            .unwrap();
        let index = VectorIndex::load(&path).unwrap();

        let hits = index.query(&embedder, "advisory", 10).unwrap();
        assert_eq!(hits.len(), 2);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn query_rejects_model_mismatch() {
        let path = temp_index_path();
        let chunker = Chunker::new(1000, 200).unwrap();
        let embedder = HashedEmbedder::default();

        VectorIndex::build(&path, &sample_records(), &chunker, &embedder)
            .unwrap()
            .unwrap();
        let index = VectorIndex::load(&path).unwrap();

        struct OtherModel;
        impl Embedder for OtherModel {
            fn model_id(&self) -> &str {
                "other-model"
            }
            fn dimension(&self) -> usize {
                8
            }
            fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![0.0; 8]).collect())
            }
        }

        let err = index.query(&OtherModel, "advisory", 3).unwrap_err();
        assert!(err.to_string().contains("other-model"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn load_missing_index_fails() {
        let path = temp_index_path();
        let err = VectorIndex::load(&path).unwrap_err();
        assert!(matches!(err, SiteragError::Index(_)));
    }

    #[test]
    fn load_rejects_truncated_vectors() {
        let path = temp_index_path();
        let chunker = Chunker::new(1000, 200).unwrap();
        let embedder = HashedEmbedder::default();

        VectorIndex::build(&path, &sample_records(), &chunker, &embedder)
            .unwrap()
            .unwrap();

        std::fs::write(path.join("vectors.bin"), b"short").unwrap();
        let err = VectorIndex::load(&path).unwrap_err();
        assert!(err.to_string().contains("corrupt"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn failed_build_leaves_no_artifact() {
        let path = temp_index_path();
        let chunker = Chunker::new(1000, 200).unwrap();

        struct FailingEmbedder;
        impl Embedder for FailingEmbedder {
            fn model_id(&self) -> &str {
                "failing"
            }
            fn dimension(&self) -> usize {
                8
            }
            fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Err(SiteragError::Embedding("model unavailable".into()))
            }
        }

        let result = VectorIndex::build(&path, &sample_records(), &chunker, &FailingEmbedder);
        assert!(result.is_err());
        assert!(!path.exists());
    }
}
