//! Application configuration for siterag.
//!
//! User config lives at `~/.siterag/siterag.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiteragError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "siterag.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".siterag";

// ---------------------------------------------------------------------------
// Config structs (matching siterag.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Site being crawled.
    #[serde(default)]
    pub site: SiteConfig,

    /// Crawl policies.
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Chunking, embedding, and retrieval settings.
    #[serde(default)]
    pub index: IndexConfig,

    /// Database and index storage locations.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Seed URL the crawl starts from. Also the origin prefix that every
    /// crawled page must match.
    #[serde(default)]
    pub seed_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            seed_url: String::new(),
        }
    }
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Substring rules excluding links from the crawl, evaluated before
    /// the origin check.
    #[serde(default = "default_skip_patterns")]
    pub skip_patterns: Vec<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Delay between content-stability polls, in milliseconds.
    #[serde(default = "default_settle_poll_ms")]
    pub settle_poll_ms: u64,

    /// Maximum number of stability re-fetches per page. Zero disables the
    /// settle wait and takes the first body as-is.
    #[serde(default = "default_settle_max_polls")]
    pub settle_max_polls: u32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            skip_patterns: default_skip_patterns(),
            request_timeout_secs: default_request_timeout(),
            settle_poll_ms: default_settle_poll_ms(),
            settle_max_polls: default_settle_max_polls(),
        }
    }
}

fn default_skip_patterns() -> Vec<String> {
    vec!["/blog/".into(), "/podcasts".into()]
}
fn default_request_timeout() -> u64 {
    30
}
fn default_settle_poll_ms() -> u64 {
    250
}
fn default_settle_max_polls() -> u32 {
    2
}

/// `[index]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Maximum chunk length in characters.
    #[serde(default = "default_chunk_max_chars")]
    pub chunk_max_chars: usize,

    /// Overlap between consecutive chunks, in characters.
    #[serde(default = "default_chunk_overlap_chars")]
    pub chunk_overlap_chars: usize,

    /// Embedding provider: "fastembed" or "hashed".
    #[serde(default = "default_embedder")]
    pub embedder: String,

    /// Number of chunks returned per retrieval query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_max_chars: default_chunk_max_chars(),
            chunk_overlap_chars: default_chunk_overlap_chars(),
            embedder: default_embedder(),
            top_k: default_top_k(),
        }
    }
}

fn default_chunk_max_chars() -> usize {
    1000
}
fn default_chunk_overlap_chars() -> usize {
    200
}
fn default_embedder() -> String {
    "fastembed".into()
}
fn default_top_k() -> usize {
    3
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding the database and the vector indexes.
    /// A leading `~` expands to the user's home directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "~/.siterag/data".into()
}

impl StorageConfig {
    /// The data directory with `~` expanded.
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        if let Some(rest) = self.data_dir.strip_prefix("~") {
            let home = dirs::home_dir()
                .ok_or_else(|| SiteragError::config("could not determine home directory"))?;
            return Ok(home.join(rest.trim_start_matches('/')));
        }
        Ok(PathBuf::from(&self.data_dir))
    }

    /// Path of the relational database file.
    pub fn db_path(&self) -> Result<PathBuf> {
        Ok(self.resolved_data_dir()?.join("siterag.db"))
    }

    /// Root directory under which each vector index lives in its own
    /// subdirectory named by its index identifier.
    pub fn index_root(&self) -> Result<PathBuf> {
        Ok(self.resolved_data_dir()?.join("indexes"))
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.siterag/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SiteragError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.siterag/siterag.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SiteragError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SiteragError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SiteragError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SiteragError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SiteragError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("skip_patterns"));
        assert!(toml_str.contains("chunk_max_chars"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.index.chunk_max_chars, 1000);
        assert_eq!(parsed.index.chunk_overlap_chars, 200);
        assert_eq!(parsed.index.top_k, 3);
        assert_eq!(parsed.crawl.skip_patterns, vec!["/blog/", "/podcasts"]);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[site]
seed_url = "https://www.example-firm.com/"

[crawl]
skip_patterns = ["/news/"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.site.seed_url, "https://www.example-firm.com/");
        assert_eq!(config.crawl.skip_patterns, vec!["/news/"]);
        assert_eq!(config.crawl.request_timeout_secs, 30);
        assert_eq!(config.index.embedder, "fastembed");
    }

    #[test]
    fn data_dir_expansion() {
        let storage = StorageConfig {
            data_dir: "/tmp/siterag-data".into(),
        };
        assert_eq!(
            storage.db_path().unwrap(),
            PathBuf::from("/tmp/siterag-data/siterag.db")
        );
        assert_eq!(
            storage.index_root().unwrap(),
            PathBuf::from("/tmp/siterag-data/indexes")
        );

        let home_relative = StorageConfig {
            data_dir: "~/.siterag/data".into(),
        };
        let resolved = home_relative.resolved_data_dir().unwrap();
        assert!(!resolved.to_string_lossy().contains('~'));
    }
}
