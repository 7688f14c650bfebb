//! Administrative index operations: list, activate, delete.

use std::path::Path;

use tracing::{info, instrument};

use siterag_shared::{IndexId, Result, SiteragError};
use siterag_storage::Storage;

/// One row in the index listing.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Index identifier.
    pub id: IndexId,
    /// Number of knowledge rows stored under it.
    pub pages: u64,
    /// Whether this is the active index.
    pub active: bool,
}

/// List stored indexes, newest first, with the active one marked.
pub async fn list_indexes(storage: &Storage) -> Result<Vec<IndexEntry>> {
    let active = storage.active_index().await?;
    let ids = storage.list_index_ids().await?;

    let mut entries = Vec::with_capacity(ids.len());
    for id in ids {
        let pages = storage.knowledge_count(&id).await?;
        let is_active = active.as_ref() == Some(&id);
        entries.push(IndexEntry {
            id,
            pages,
            active: is_active,
        });
    }
    Ok(entries)
}

/// Promote `id` to be the active index.
///
/// The swap is a single pointer write: queries observe either the previous
/// or the new index, never a mixture.
#[instrument(skip(storage))]
pub async fn activate(storage: &Storage, id: &IndexId) -> Result<()> {
    let known = storage.list_index_ids().await?;
    if !known.contains(id) {
        return Err(SiteragError::validation(format!(
            "unknown index '{id}'"
        )));
    }

    storage.set_active_index(Some(id)).await?;
    info!(index_id = %id, "index activated");
    Ok(())
}

/// Clear the active-index pointer ("no retrieval available").
pub async fn deactivate(storage: &Storage) -> Result<()> {
    storage.set_active_index(None).await?;
    info!("active index cleared");
    Ok(())
}

/// Delete an index: its knowledge rows and its on-disk artifact.
///
/// If the index is active, the pointer is cleared first, so no reader can
/// resolve the pointer to a partially deleted index. Rows go before the
/// directory: an interrupted delete leaves an unlisted orphan directory,
/// never a listed identifier without data.
#[instrument(skip(storage, index_root))]
pub async fn delete_index(storage: &Storage, index_root: &Path, id: &IndexId) -> Result<()> {
    if storage.active_index().await?.as_ref() == Some(id) {
        storage.set_active_index(None).await?;
        info!(index_id = %id, "active pointer reset before delete");
    }

    storage.delete_knowledge(id).await?;

    let dir = index_root.join(id.as_str());
    if dir.exists() {
        std::fs::remove_dir_all(&dir).map_err(|e| SiteragError::io(&dir, e))?;
    }

    info!(index_id = %id, "index deleted");
    Ok(())
}
