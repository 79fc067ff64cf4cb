//! Store backend factory

use std::sync::Arc;
use std::time::Duration;

use crate::config::StoreConfig;
use crate::postgres::PostgresPool;

use super::backend::{NotificationStore, StoreError};
use super::memory_backend::MemoryStore;
use super::postgres_backend::PostgresStore;
use super::timeout::TimeoutStore;

/// Create a store backend based on configuration.
///
/// Returns the appropriate backend implementation based on the `backend` setting:
/// - `"postgres"`: a `PostgresStore` over the provided pool; without a pool
///   this is an error, never a silent switch to a volatile store
/// - `"memory"` (default): an empty `MemoryStore`
///
/// Every backend is wrapped in a [`TimeoutStore`] using `call_timeout_ms`
/// (a value of 0 disables the timeout).
pub fn create_store(
    settings: &StoreConfig,
    postgres_pool: Option<Arc<PostgresPool>>,
) -> Result<Arc<dyn NotificationStore>, StoreError> {
    let backend: Arc<dyn NotificationStore> = match settings.backend.as_str() {
        "postgres" => {
            let Some(pool) = postgres_pool else {
                tracing::error!("PostgreSQL store requested but no pool provided");
                return Err(StoreError::Unavailable("postgres".to_string()));
            };
            tracing::info!(
                backend = "postgres",
                database = %pool.database_url_masked(),
                "Creating PostgreSQL store"
            );
            Arc::new(PostgresStore::new(pool.pool().clone()))
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory store");
            Arc::new(MemoryStore::new())
        }
    };

    Ok(wrap_with_timeout(backend, settings.call_timeout_ms))
}

/// Wrap an existing backend with the per-call timeout.
pub fn wrap_with_timeout(
    backend: Arc<dyn NotificationStore>,
    call_timeout_ms: u64,
) -> Arc<dyn NotificationStore> {
    if call_timeout_ms == 0 {
        return backend;
    }
    Arc::new(TimeoutStore::new(
        backend,
        Duration::from_millis(call_timeout_ms),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_without_pool_is_rejected() {
        let settings = StoreConfig {
            backend: "postgres".to_string(),
            call_timeout_ms: 1000,
        };
        let err = create_store(&settings, None).err().unwrap();
        assert!(matches!(err, StoreError::Unavailable(ref name) if name == "postgres"));
    }

    #[test]
    fn test_memory_backend_by_default() {
        let settings = StoreConfig {
            backend: "memory".to_string(),
            call_timeout_ms: 1000,
        };
        let store = create_store(&settings, None).unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_zero_timeout_returns_backend_unwrapped() {
        let store = wrap_with_timeout(Arc::new(MemoryStore::new()), 0);
        assert_eq!(store.backend_name(), "memory");
        assert!(store.ping().await.is_ok());
    }
}
