//! libSQL storage layer for crawled knowledge and pipeline configuration.
//!
//! The [`Storage`] struct wraps a libSQL database holding the crawled page
//! records (partitioned by index identifier) and the active-index pointer
//! used to answer retrieval queries.
//!
//! **Access rules:**
//! - Pipeline and admin operations: read-write via [`Storage::open`]
//! - Query-time retrieval: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use tracing::debug;

use siterag_shared::{IndexId, PageRecord, Result, SiteragError};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SiteragError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SiteragError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| SiteragError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SiteragError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| SiteragError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    SiteragError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(SiteragError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Knowledge operations
    // -----------------------------------------------------------------------

    /// Insert all page records of a crawl run under `index_id`, in one
    /// transaction.
    pub async fn insert_knowledge(
        &self,
        index_id: &IndexId,
        records: &[PageRecord],
    ) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| SiteragError::Storage(e.to_string()))?;

        for record in records {
            tx.execute(
                "INSERT INTO knowledge (index_name, page_url, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    index_id.as_str(),
                    record.url.as_str(),
                    record.content.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| SiteragError::Storage(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| SiteragError::Storage(e.to_string()))?;

        debug!(index_id = %index_id, rows = records.len(), "knowledge rows inserted");
        Ok(())
    }

    /// Delete all knowledge rows stored under `index_id`.
    pub async fn delete_knowledge(&self, index_id: &IndexId) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "DELETE FROM knowledge WHERE index_name = ?1",
                params![index_id.as_str()],
            )
            .await
            .map_err(|e| SiteragError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List the distinct index identifiers present, newest first.
    pub async fn list_index_ids(&self) -> Result<Vec<IndexId>> {
        let mut rows = self
            .conn
            .query(
                "SELECT DISTINCT index_name FROM knowledge ORDER BY index_name DESC",
                params![],
            )
            .await
            .map_err(|e| SiteragError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let name: String = row
                .get(0)
                .map_err(|e| SiteragError::Storage(e.to_string()))?;
            let id: IndexId = name
                .parse()
                .map_err(|_| SiteragError::Storage(format!("invalid index name '{name}'")))?;
            results.push(id);
        }
        Ok(results)
    }

    /// Number of knowledge rows stored under `index_id`.
    pub async fn knowledge_count(&self, index_id: &IndexId) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM knowledge WHERE index_name = ?1",
                params![index_id.as_str()],
            )
            .await
            .map_err(|e| SiteragError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<u64>(0)
                .map_err(|e| SiteragError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(SiteragError::Storage(e.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Active-index pointer
    // -----------------------------------------------------------------------

    /// Read the active-index pointer. `None` means no retrieval available.
    pub async fn active_index(&self) -> Result<Option<IndexId>> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM config WHERE key = 'active_index'",
                params![],
            )
            .await
            .map_err(|e| SiteragError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value: String = row
                    .get(0)
                    .map_err(|e| SiteragError::Storage(e.to_string()))?;
                if value.is_empty() {
                    return Ok(None);
                }
                let id: IndexId = value.parse().map_err(|_| {
                    SiteragError::Storage(format!("invalid active index value '{value}'"))
                })?;
                Ok(Some(id))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(SiteragError::Storage(e.to_string())),
        }
    }

    /// Swap the active-index pointer in a single statement. Readers observe
    /// either the previous or the new value, never a half-updated one.
    pub async fn set_active_index(&self, index_id: Option<&IndexId>) -> Result<()> {
        self.check_writable()?;
        let value = index_id.map(IndexId::as_str).unwrap_or("");
        self.conn
            .execute(
                "REPLACE INTO config (key, value) VALUES ('active_index', ?1)",
                params![value],
            )
            .await
            .map_err(|e| SiteragError::Storage(e.to_string()))?;
        Ok(())
    }
}
