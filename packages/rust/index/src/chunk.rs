//! Deterministic overlapping text chunking.
//!
//! Pages are split into bounded-size chunks with a fixed overlap between
//! neighbors; the chunk is the unit of embedding and retrieval. The same
//! input with the same policy always yields the same ordered chunks.

use siterag_shared::{Result, SiteragError};

/// Splits text into overlapping chunks by a sliding character window.
///
/// The window prefers to break at the last whitespace it contains so words
/// stay whole; overlap is measured back from the break point. Windowing
/// works on char boundaries, so multi-byte content never splits a
/// character.
#[derive(Debug, Clone)]
pub struct Chunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl Chunker {
    /// Create a chunker. `overlap_chars` must be smaller than `max_chars`.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(SiteragError::validation("chunk size must be non-zero"));
        }
        if overlap_chars >= max_chars {
            return Err(SiteragError::validation(format!(
                "chunk overlap ({overlap_chars}) must be smaller than chunk size ({max_chars})"
            )));
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }

    /// Split `text` into its ordered chunk sequence.
    ///
    /// Empty or whitespace-only input yields no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();

        let mut chunks: Vec<String> = Vec::new();
        let mut start = 0usize;

        while start < len {
            let hard_end = (start + self.max_chars).min(len);
            let mut end = hard_end;

            // Break at the last whitespace inside the window, unless the
            // window already reaches the end of the text.
            if hard_end < len {
                if let Some(ws) = chars[start..hard_end]
                    .iter()
                    .rposition(|c| c.is_whitespace())
                {
                    if ws > 0 {
                        end = start + ws;
                    }
                }
            }

            let piece: String = chars[start..end].iter().collect();
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }

            if end >= len {
                break;
            }
            // Step back by the overlap, always making forward progress.
            start = (end.saturating_sub(self.overlap_chars)).max(start + 1);
        }

        chunks
    }
}
