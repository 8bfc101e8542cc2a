//! Response cache backend implementations.
//!
//! The proxy layer caches fetched representations keyed by canonical
//! resource URL. Storage is pluggable: the contract is plain
//! get/set/delete at single-key granularity. The proxy layer never sets a
//! TTL itself — entries live until a write to the same URL evicts them.

use crate::error::Result;
use std::time::Duration;

pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use redis::{RedisBackend, RedisConfig};

/// Trait for response cache backend implementations.
///
/// Abstracts storage operations, allowing swappable backends: in-memory
/// (default), Redis, or any external shared cache service.
///
/// **IMPORTANT:** All methods use `&self` instead of `&mut self` to allow
/// concurrent access. Implementations should use interior mutability
/// (sharded maps, pools, or external storage).
///
/// Get/set/delete are assumed atomic at the single-key level; there is no
/// cross-key transaction.
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    /// Retrieve a cached payload by canonical resource URL.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - Payload found in cache
    /// - `Ok(None)` - Cache miss (key not found)
    ///
    /// # Errors
    /// Returns `Err` if a backend error occurs (connection lost, etc.)
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a payload with optional TTL.
    ///
    /// The proxy layer always passes `ttl = None`; the parameter exists
    /// for backends with their own retention policies.
    ///
    /// # Errors
    /// Returns `Err` if a backend error occurs
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove a cached payload.
    ///
    /// Deleting an absent key is not an error.
    ///
    /// # Errors
    /// Returns `Err` if a backend error occurs
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists in cache (optional optimization).
    ///
    /// # Errors
    /// Returns `Err` if a backend error occurs
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Health check - verify the backend is accessible.
    ///
    /// # Errors
    /// Returns `Err` if the backend is not accessible
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_backend_exists_default() {
        let backend = InMemoryBackend::new();
        backend
            .set("http://h/api/v1/item/1/", vec![1, 2, 3], None)
            .await
            .expect("Failed to set key");
        assert!(backend
            .exists("http://h/api/v1/item/1/")
            .await
            .expect("Failed to check exists"));
        assert!(!backend
            .exists("http://h/api/v1/item/2/")
            .await
            .expect("Failed to check exists"));
    }
}
