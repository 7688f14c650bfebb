//! Core domain types for the siterag knowledge pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SiteragError;

/// Current schema version for the on-disk vector index format.
pub const INDEX_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// PageRecord
// ---------------------------------------------------------------------------

/// One crawled page: its resolved URL and extracted visible text.
///
/// Produced exactly once per distinct normalized URL per crawl run and
/// immutable afterwards; handed by value to the index builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Resolved absolute URL the page was fetched from.
    pub url: String,
    /// Visible text content, blocks joined by newlines.
    pub content: String,
}

// ---------------------------------------------------------------------------
// IndexId
// ---------------------------------------------------------------------------

/// Identifier naming one crawl/build cycle's output.
///
/// Used both as the partition key for knowledge rows and as the directory
/// name of the corresponding vector index. Derived from the run's start
/// time; unique because at most one run is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexId(String);

impl IndexId {
    /// Generate an identifier from a run start time (`idx-<unix-seconds>`).
    pub fn from_start_time(started_at: DateTime<Utc>) -> Self {
        Self(format!("idx-{}", started_at.timestamp()))
    }

    /// Generate an identifier for a run starting now.
    pub fn generate() -> Self {
        Self::from_start_time(Utc::now())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IndexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for IndexId {
    type Err = SiteragError;

    /// Accepts tokens safe to use as a single path component.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(SiteragError::validation("index identifier is empty"));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            || s.starts_with('.')
        {
            return Err(SiteragError::validation(format!(
                "invalid index identifier '{s}'"
            )));
        }
        Ok(Self(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// RunStatus
// ---------------------------------------------------------------------------

/// Snapshot of the refresh pipeline's run state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    /// Whether a crawl+build cycle is currently in flight.
    pub running: bool,
    /// Free-text progress description of the latest run.
    pub progress: String,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            running: false,
            progress: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_id_roundtrip() {
        let id = IndexId::generate();
        let s = id.to_string();
        let parsed: IndexId = s.parse().expect("parse IndexId");
        assert_eq!(id, parsed);
        assert!(s.starts_with("idx-"));
    }

    #[test]
    fn index_id_from_start_time_is_deterministic() {
        let t = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let a = IndexId::from_start_time(t);
        let b = IndexId::from_start_time(t);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), format!("idx-{}", t.timestamp()));
    }

    #[test]
    fn index_id_rejects_path_escapes() {
        assert!("".parse::<IndexId>().is_err());
        assert!("../etc".parse::<IndexId>().is_err());
        assert!("a/b".parse::<IndexId>().is_err());
        assert!(".hidden".parse::<IndexId>().is_err());
        assert!("idx-1714564800".parse::<IndexId>().is_ok());
    }

    #[test]
    fn page_record_serialization() {
        let record = PageRecord {
            url: "https://example.com/about".into(),
            content: "About us\nWe help businesses grow.".into(),
        };
        let json = serde_json::to_string(&record).expect("serialize");
        let parsed: PageRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, record);
    }

    #[test]
    fn run_status_default_is_idle() {
        let status = RunStatus::default();
        assert!(!status.running);
        assert!(status.progress.is_empty());
    }
}
