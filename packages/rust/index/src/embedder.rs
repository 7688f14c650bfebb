//! Embedding providers.
//!
//! An [`Embedder`] maps text to a fixed-dimensionality vector; the same
//! text always yields the same vector for a given model version. The
//! default provider runs the MiniLM sentence-transformer locally via
//! `fastembed`; [`HashedEmbedder`] is a model-free fallback that needs no
//! downloads and is used by the test suites.

use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use siterag_shared::{Result, SiteragError};

/// Maps text to fixed-length embedding vectors.
///
/// Implementations must be deterministic: identical input text yields an
/// identical vector for the same `model_id`.
pub trait Embedder: Send + Sync {
    /// Identifier of the underlying model, persisted with each index.
    fn model_id(&self) -> &str;

    /// Output vector length.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

// ---------------------------------------------------------------------------
// FastEmbedder
// ---------------------------------------------------------------------------

/// Local ONNX embedding via `fastembed` (all-MiniLM-L6-v2, 384 dims).
pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
    model_id: String,
}

impl FastEmbedder {
    /// Vector length of the MiniLM model.
    pub const DIMENSION: usize = 384;

    /// Initialize the MiniLM model, downloading it on first use.
    pub fn new() -> Result<Self> {
        let options =
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false);

        let model = TextEmbedding::try_new(options).map_err(|e| {
            SiteragError::Embedding(format!("failed to initialize embedding model: {e}"))
        })?;

        Ok(Self {
            model: Mutex::new(model),
            model_id: "all-MiniLM-L6-v2".into(),
        })
    }
}

impl Embedder for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        Self::DIMENSION
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();

        let mut model = self
            .model
            .lock()
            .map_err(|_| SiteragError::Embedding("embedding model lock poisoned".into()))?;

        model
            .embed(inputs, None)
            .map_err(|e| SiteragError::Embedding(format!("embedding failed: {e}")))
    }
}

// ---------------------------------------------------------------------------
// HashedEmbedder
// ---------------------------------------------------------------------------

/// Deterministic feature-hashing embedder.
///
/// Projects word and character-trigram features into a fixed number of
/// signed buckets and L2-normalizes the result. No model files, no
/// network; identical text always maps to the identical vector, so exact
/// chunk matches score 1.0 under cosine similarity.
pub struct HashedEmbedder {
    dimension: usize,
}

impl HashedEmbedder {
    /// Default bucket count.
    pub const DEFAULT_DIMENSION: usize = 256;

    /// Create an embedder with `dimension` buckets.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text.split_whitespace() {
            let token = token.to_lowercase();
            self.bump(&mut vector, token.as_bytes());

            let chars: Vec<char> = token.chars().collect();
            for window in chars.windows(3) {
                let tri: String = window.iter().collect();
                self.bump(&mut vector, tri.as_bytes());
            }
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    fn bump(&self, vector: &mut [f32], feature: &[u8]) {
        let hash = fnv1a(feature);
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }
}

impl Default for HashedEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

impl Embedder for HashedEmbedder {
    fn model_id(&self) -> &str {
        "hashed-v1"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// FNV-1a, stable across processes (unlike the std hasher's random keys).
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn hashed_embedder_is_deterministic() {
        let embedder = HashedEmbedder::default();
        let texts = vec!["We provide tax advisory services.".to_string()];
        let first = embedder.embed(&texts).unwrap();
        let second = embedder.embed(&texts).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].len(), HashedEmbedder::DEFAULT_DIMENSION);
    }

    #[test]
    fn hashed_embedder_normalizes() {
        let embedder = HashedEmbedder::default();
        let vectors = embedder
            .embed(&["capital markets advisory".to_string()])
            .unwrap();
        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn identical_text_scores_highest() {
        let embedder = HashedEmbedder::default();
        let vectors = embedder
            .embed(&[
                "business growth strategy for small firms".to_string(),
                "payroll tax credit filing deadlines".to_string(),
            ])
            .unwrap();

        let query = embedder
            .embed(&["business growth strategy for small firms".to_string()])
            .unwrap();

        let same = cosine(&query[0], &vectors[0]);
        let other = cosine(&query[0], &vectors[1]);
        assert!((same - 1.0).abs() < 1e-5);
        assert!(same > other);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = HashedEmbedder::default();
        let vectors = embedder.embed(&["".to_string()]).unwrap();
        assert!(vectors[0].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn fnv1a_matches_reference_values() {
        // Reference vectors for the 64-bit FNV-1a parameters.
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }
}
