use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use shopfloor_domain::GrantAssignment;

use crate::role_graph::RoleGraph;

/// In-process resolution cache shared by the engine and every access writer.
///
/// Writers call an `invalidate_*` method after their store write succeeds and
/// before returning. Loaders capture [`AccessCache::generation`] before
/// reading the store and only publish their result when no invalidation
/// happened in between, so a load racing a write never repopulates stale data.
#[derive(Debug)]
pub struct AccessCache {
    enabled: bool,
    generation: AtomicU64,
    grants: RwLock<HashMap<String, Arc<Vec<GrantAssignment>>>>,
    graph: RwLock<Option<Arc<RoleGraph>>>,
}

impl Default for AccessCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessCache {
    /// Creates an empty, enabled cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: true,
            generation: AtomicU64::new(0),
            grants: RwLock::new(HashMap::new()),
            graph: RwLock::new(None),
        }
    }

    /// Creates a cache that never retains anything.
    ///
    /// Used when several processes write to the same store and no cross
    /// process invalidation exists.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    /// Returns the invalidation counter a loader must capture before reading.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Returns cached grants of a principal.
    pub async fn grants_for(&self, principal: &str) -> Option<Arc<Vec<GrantAssignment>>> {
        if !self.enabled {
            return None;
        }

        self.grants.read().await.get(principal).cloned()
    }

    /// Publishes grants loaded at `generation`, unless invalidated since.
    pub async fn store_grants(
        &self,
        principal: &str,
        grants: Arc<Vec<GrantAssignment>>,
        generation: u64,
    ) {
        if !self.enabled {
            return;
        }

        let mut entries = self.grants.write().await;
        if self.generation() == generation {
            entries.insert(principal.to_owned(), grants);
        }
    }

    /// Returns the cached role graph snapshot.
    pub async fn role_graph(&self) -> Option<Arc<RoleGraph>> {
        if !self.enabled {
            return None;
        }

        self.graph.read().await.clone()
    }

    /// Publishes a role graph loaded at `generation`, unless invalidated since.
    pub async fn store_role_graph(&self, graph: Arc<RoleGraph>, generation: u64) {
        if !self.enabled {
            return;
        }

        let mut slot = self.graph.write().await;
        if self.generation() == generation {
            *slot = Some(graph);
        }
    }

    /// Drops cached grants of one principal.
    pub async fn invalidate_principal(&self, principal: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.grants.write().await.remove(principal);
        tracing::debug!(principal, "invalidated cached grants");
    }

    /// Drops the cached role graph after a role or catalog write.
    pub async fn invalidate_definitions(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.graph.write().await = None;
        tracing::debug!("invalidated cached role graph");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::AccessCache;
    use crate::role_graph::RoleGraph;

    #[tokio::test]
    async fn stale_load_is_not_published_after_invalidation() {
        let cache = AccessCache::new();
        let generation = cache.generation();

        cache.invalidate_principal("alice").await;
        cache
            .store_grants("alice", Arc::new(Vec::new()), generation)
            .await;

        assert!(cache.grants_for("alice").await.is_none());
    }

    #[tokio::test]
    async fn fresh_load_is_published_until_invalidated() {
        let cache = AccessCache::new();
        let generation = cache.generation();
        cache
            .store_role_graph(Arc::new(RoleGraph::default()), generation)
            .await;
        assert!(cache.role_graph().await.is_some());

        cache.invalidate_definitions().await;
        assert!(cache.role_graph().await.is_none());
    }

    #[tokio::test]
    async fn disabled_cache_never_retains() {
        let cache = AccessCache::disabled();
        let generation = cache.generation();
        cache
            .store_grants("alice", Arc::new(Vec::new()), generation)
            .await;

        assert!(cache.grants_for("alice").await.is_none());
    }
}
