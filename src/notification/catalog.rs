//! Type catalog resolver with a process-lifetime cache.
//!
//! Only active hits are cached. Misses and store failures are re-queried on
//! the next lookup, so a type activated out of band becomes visible without a
//! restart; edits to an already cached type need [`TypeCatalog::invalidate`].

use std::sync::Arc;

use dashmap::DashMap;

use crate::metrics::{CatalogMetrics, StoreMetrics};
use crate::store::NotificationStore;

use super::types::NotificationType;

/// Cached view of the `notification_types` catalog.
///
/// Entries are written once per key and read many times; concurrent misses
/// for the same key keep whichever row landed first.
pub struct TypeCatalog {
    store: Arc<dyn NotificationStore>,
    cache: DashMap<String, NotificationType>,
}

impl TypeCatalog {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    /// Active catalog row for `type_key`, or `None` when the type is unknown,
    /// inactive, or the store could not be reached.
    pub async fn get_type_config(&self, type_key: &str) -> Option<NotificationType> {
        if let Some(cached) = self.cache.get(type_key) {
            CatalogMetrics::record_hit();
            return Some(cached.clone());
        }
        CatalogMetrics::record_miss();

        match self.store.find_active_type(type_key).await {
            Ok(Some(row)) if row.is_active => {
                let entry = self
                    .cache
                    .entry(type_key.to_string())
                    .or_insert(row)
                    .clone();
                CatalogMetrics::set_cache_size(self.cache.len());
                Some(entry)
            }
            Ok(_) => {
                CatalogMetrics::record_absent();
                tracing::debug!(type_key = %type_key, "No active notification type");
                None
            }
            Err(e) => {
                StoreMetrics::record_error("find_active_type");
                tracing::warn!(
                    type_key = %type_key,
                    error = %e,
                    "Failed to load notification type, using caller defaults"
                );
                None
            }
        }
    }

    /// Drop one cached entry so the next lookup re-reads the store.
    pub fn invalidate(&self, type_key: &str) -> bool {
        let removed = self.cache.remove(type_key).is_some();
        CatalogMetrics::set_cache_size(self.cache.len());
        removed
    }

    pub fn invalidate_all(&self) {
        self.cache.clear();
        CatalogMetrics::set_cache_size(0);
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Priority;
    use crate::store::MemoryStore;

    fn catalog_with(types: &[NotificationType]) -> (Arc<MemoryStore>, TypeCatalog) {
        let store = Arc::new(MemoryStore::new());
        for t in types {
            store.put_type(t.clone());
        }
        let catalog = TypeCatalog::new(store.clone());
        (store, catalog)
    }

    #[tokio::test]
    async fn test_hit_is_cached() {
        let (store, catalog) = catalog_with(&[
            NotificationType::new("session_reminder").with_delay_seconds(3600)
        ]);

        let first = catalog.get_type_config("session_reminder").await.unwrap();
        assert_eq!(first.default_delay_seconds, 3600);
        assert_eq!(catalog.cached_len(), 1);

        // Catalog edits are invisible until invalidated
        store.put_type(NotificationType::new("session_reminder").with_delay_seconds(60));
        let cached = catalog.get_type_config("session_reminder").await.unwrap();
        assert_eq!(cached.default_delay_seconds, 3600);

        assert!(catalog.invalidate("session_reminder"));
        let fresh = catalog.get_type_config("session_reminder").await.unwrap();
        assert_eq!(fresh.default_delay_seconds, 60);
    }

    #[tokio::test]
    async fn test_inactive_and_unknown_resolve_to_none() {
        let (_store, catalog) = catalog_with(&[
            NotificationType::new("system_update").inactive()
        ]);

        assert!(catalog.get_type_config("system_update").await.is_none());
        assert!(catalog.get_type_config("nope").await.is_none());
        assert_eq!(catalog.cached_len(), 0);
    }

    #[tokio::test]
    async fn test_misses_are_not_cached() {
        let (store, catalog) = catalog_with(&[]);
        assert!(catalog.get_type_config("message_received").await.is_none());

        store.put_type(NotificationType::new("message_received").with_priority(Priority::High));
        let found = catalog.get_type_config("message_received").await.unwrap();
        assert_eq!(found.default_priority, Priority::High);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let (_store, catalog) = catalog_with(&[
            NotificationType::new("a"),
            NotificationType::new("b"),
        ]);
        catalog.get_type_config("a").await;
        catalog.get_type_config("b").await;
        assert_eq!(catalog.cached_len(), 2);

        catalog.invalidate_all();
        assert_eq!(catalog.cached_len(), 0);
        assert!(!catalog.invalidate("a"));
    }
}
