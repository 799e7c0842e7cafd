use std::sync::Arc;

use tokio::sync::RwLock;

use crate::registry::RegistryResult;
use crate::utils::repo_identifier::{image_name, project_prefix};

/// Source of truth for the full repository catalog.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self) -> RegistryResult<Vec<String>>;
}

/// Last-known-good snapshot of the registry's repository catalog.
///
/// Reads never wait on a live catalog call once the first population has
/// happened. Refreshes replace the snapshot wholesale, so concurrent readers
/// observe either the old list or the new one, never a partial update.
/// Staleness between a mutation and the refresh it schedules is accepted.
pub struct CatalogCache {
    source: Arc<dyn CatalogSource>,
    snapshot: RwLock<Option<Arc<Vec<String>>>>,
}

impl CatalogCache {
    pub fn new(source: Arc<dyn CatalogSource>) -> CatalogCache {
        CatalogCache {
            source,
            snapshot: RwLock::new(None),
        }
    }

    /// Current snapshot; only the very first caller pays for a live fetch.
    pub async fn list(&self) -> RegistryResult<Arc<Vec<String>>> {
        if let Some(snapshot) = self.snapshot.read().await.as_ref() {
            return Ok(snapshot.clone());
        }

        let mut slot = self.snapshot.write().await;
        // another caller may have filled it while we waited for the lock
        if let Some(snapshot) = slot.as_ref() {
            return Ok(snapshot.clone());
        }
        let fresh = Arc::new(self.source.fetch().await?);
        *slot = Some(fresh.clone());
        Ok(fresh)
    }

    /// Re-fetches the catalog and swaps the snapshot in one step.
    pub async fn refresh(&self) -> RegistryResult<()> {
        let fresh = Arc::new(self.source.fetch().await?);
        *self.snapshot.write().await = Some(fresh);
        Ok(())
    }
}

/// Whether a catalog entry matches a project-scoped free-text search: the
/// last path segment must contain the query and the project prefix must
/// equal the project name. Entries without a `/` never match.
pub fn matches_project_query(repo_name: &str, project_name: &str, query: &str) -> bool {
    repo_name.contains('/')
        && image_name(repo_name).contains(query)
        && project_prefix(repo_name) == project_name
}
