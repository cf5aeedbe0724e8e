// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Connector implementation cache.
//!
//! Parsed descriptors are cached per `(process definition, connector id,
//! version)`. The cache is a derived view of the `.impl` resources in the
//! [`ResourceStore`](crate::store::ResourceStore) and can be dropped at any
//! time; the service refills a whole process definition on the next miss.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::descriptor::ConnectorImplementationDescriptor;

/// Errors from a cache backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    /// The named cache does not exist (not yet initialized).
    #[error("No cache named '{0}'")]
    NoSuchCache(String),

    /// The backend failed.
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Key of a cached connector implementation.
///
/// The process definition is an explicit field so a whole process can be
/// selected without string matching. `Display` renders the historical
/// `"<processDefinitionId>:<connectorId>-<version>"` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImplementationKey {
    /// Process definition the implementation is deployed with.
    pub process_definition_id: i64,
    /// Connector definition id.
    pub connector_id: String,
    /// Connector definition version.
    pub version: String,
}

impl ImplementationKey {
    /// Create a key.
    pub fn new(
        process_definition_id: i64,
        connector_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            process_definition_id,
            connector_id: connector_id.into(),
            version: version.into(),
        }
    }

    /// Key under which a descriptor deployed with a process is cached.
    pub fn for_descriptor(
        process_definition_id: i64,
        descriptor: &ConnectorImplementationDescriptor,
    ) -> Self {
        Self::new(
            process_definition_id,
            descriptor.definition_id.clone(),
            descriptor.definition_version.clone(),
        )
    }
}

impl fmt::Display for ImplementationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}",
            self.process_definition_id, self.connector_id, self.version
        )
    }
}

/// A named key-value cache.
///
/// Implementations must be safe to share between tasks; callers add no
/// locking of their own.
#[async_trait]
pub trait CacheService<K, V>: Send + Sync
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Get a value, `None` on miss or unknown cache.
    async fn get(&self, cache_name: &str, key: &K) -> Result<Option<V>, CacheError>;

    /// Store a value, creating the cache if needed.
    async fn store(&self, cache_name: &str, key: K, value: V) -> Result<(), CacheError>;

    /// Remove a value. Returns whether it was present.
    async fn remove(&self, cache_name: &str, key: &K) -> Result<bool, CacheError>;

    /// All keys of a cache. Fails with [`CacheError::NoSuchCache`] for an
    /// unknown cache.
    async fn keys(&self, cache_name: &str) -> Result<Vec<K>, CacheError>;

    /// Number of entries. Fails with [`CacheError::NoSuchCache`] for an
    /// unknown cache.
    async fn size(&self, cache_name: &str) -> Result<usize, CacheError>;
}

/// In-process cache service backed by concurrent hash maps.
pub struct InMemoryCacheService<K, V> {
    caches: DashMap<String, DashMap<K, V>>,
}

impl<K, V> Default for InMemoryCacheService<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            caches: DashMap::new(),
        }
    }
}

impl<K, V> InMemoryCacheService<K, V>
where
    K: Eq + Hash,
{
    /// Create a cache service without any cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty named cache if it does not exist.
    pub fn create_cache(&self, cache_name: &str) {
        self.caches.entry(cache_name.to_string()).or_default();
    }
}

#[async_trait]
impl<K, V> CacheService<K, V> for InMemoryCacheService<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, cache_name: &str, key: &K) -> Result<Option<V>, CacheError> {
        Ok(self
            .caches
            .get(cache_name)
            .and_then(|cache| cache.get(key).map(|v| v.value().clone())))
    }

    async fn store(&self, cache_name: &str, key: K, value: V) -> Result<(), CacheError> {
        self.caches
            .entry(cache_name.to_string())
            .or_default()
            .insert(key, value);
        Ok(())
    }

    async fn remove(&self, cache_name: &str, key: &K) -> Result<bool, CacheError> {
        Ok(self
            .caches
            .get(cache_name)
            .is_some_and(|cache| cache.remove(key).is_some()))
    }

    async fn keys(&self, cache_name: &str) -> Result<Vec<K>, CacheError> {
        let cache = self
            .caches
            .get(cache_name)
            .ok_or_else(|| CacheError::NoSuchCache(cache_name.to_string()))?;
        Ok(cache.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn size(&self, cache_name: &str) -> Result<usize, CacheError> {
        self.caches
            .get(cache_name)
            .map(|cache| cache.len())
            .ok_or_else(|| CacheError::NoSuchCache(cache_name.to_string()))
    }
}

/// Shared cache service type used for connector implementations.
pub type DescriptorCacheService =
    dyn CacheService<ImplementationKey, Arc<ConnectorImplementationDescriptor>>;

/// Typed view over the connector implementation cache.
#[derive(Clone)]
pub struct ConnectorImplementationCache {
    service: Arc<DescriptorCacheService>,
    cache_name: String,
}

impl ConnectorImplementationCache {
    /// Wrap a cache service; entries live in the cache named `cache_name`.
    pub fn new(service: Arc<DescriptorCacheService>, cache_name: impl Into<String>) -> Self {
        Self {
            service,
            cache_name: cache_name.into(),
        }
    }

    /// In-process cache, for tests and single-node deployments.
    pub fn in_memory(cache_name: impl Into<String>) -> Self {
        let service: InMemoryCacheService<
            ImplementationKey,
            Arc<ConnectorImplementationDescriptor>,
        > = InMemoryCacheService::new();
        Self::new(Arc::new(service), cache_name)
    }

    /// Name of the underlying cache.
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Get a cached descriptor.
    pub async fn get(
        &self,
        key: &ImplementationKey,
    ) -> Result<Option<Arc<ConnectorImplementationDescriptor>>, CacheError> {
        self.service.get(&self.cache_name, key).await
    }

    /// Cache a descriptor.
    pub async fn store(
        &self,
        key: ImplementationKey,
        descriptor: Arc<ConnectorImplementationDescriptor>,
    ) -> Result<(), CacheError> {
        self.service.store(&self.cache_name, key, descriptor).await
    }

    /// Evict one descriptor.
    pub async fn remove(&self, key: &ImplementationKey) -> Result<bool, CacheError> {
        self.service.remove(&self.cache_name, key).await
    }

    /// Keys cached for one process definition.
    ///
    /// An unknown cache means nothing has been cached yet and yields no keys.
    pub async fn keys_for_process(
        &self,
        process_definition_id: i64,
    ) -> Result<Vec<ImplementationKey>, CacheError> {
        let keys = match self.service.keys(&self.cache_name).await {
            Ok(keys) => keys,
            // Cache not initialized yet
            Err(CacheError::NoSuchCache(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(keys
            .into_iter()
            .filter(|key| key.process_definition_id == process_definition_id)
            .collect())
    }

    /// Descriptors cached for one process definition.
    pub async fn descriptors_for_process(
        &self,
        process_definition_id: i64,
    ) -> Result<Vec<Arc<ConnectorImplementationDescriptor>>, CacheError> {
        let mut descriptors = Vec::new();
        for key in self.keys_for_process(process_definition_id).await? {
            if let Some(descriptor) = self.get(&key).await? {
                descriptors.push(descriptor);
            }
        }
        Ok(descriptors)
    }

    /// Evict every descriptor of a process definition. Returns how many were
    /// removed.
    pub async fn evict_process(&self, process_definition_id: i64) -> Result<usize, CacheError> {
        let mut removed = 0;
        for key in self.keys_for_process(process_definition_id).await? {
            if self.remove(&key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, version: &str) -> Arc<ConnectorImplementationDescriptor> {
        Arc::new(ConnectorImplementationDescriptor {
            definition_id: id.to_string(),
            definition_version: version.to_string(),
            implementation_id: format!("{id}-impl"),
            implementation_version: "1.0".to_string(),
            implementation_class_name: "org.acme.Impl".to_string(),
            description: None,
            jar_dependencies: Vec::new(),
        })
    }

    #[test]
    fn test_key_display_uses_legacy_format() {
        let key = ImplementationKey::new(42, "conn1", "1.0");
        assert_eq!(key.to_string(), "42:conn1-1.0");
    }

    #[tokio::test]
    async fn test_unknown_cache_behaviour() {
        let service: InMemoryCacheService<String, u32> = InMemoryCacheService::new();

        assert_eq!(service.get("missing", &"k".to_string()).await.unwrap(), None);
        assert!(!service.remove("missing", &"k".to_string()).await.unwrap());
        assert!(matches!(
            service.keys("missing").await,
            Err(CacheError::NoSuchCache(name)) if name == "missing"
        ));
        assert!(matches!(
            service.size("missing").await,
            Err(CacheError::NoSuchCache(_))
        ));

        service.create_cache("missing");
        assert_eq!(service.size("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_get_remove() {
        let service: InMemoryCacheService<String, u32> = InMemoryCacheService::new();
        service.store("c", "a".to_string(), 1).await.unwrap();
        service.store("c", "a".to_string(), 2).await.unwrap();

        assert_eq!(service.get("c", &"a".to_string()).await.unwrap(), Some(2));
        assert_eq!(service.size("c").await.unwrap(), 1);
        assert!(service.remove("c", &"a".to_string()).await.unwrap());
        assert_eq!(service.get("c", &"a".to_string()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_for_process_is_partitioned() {
        let cache = ConnectorImplementationCache::in_memory("CONNECTOR");

        // Without a structured key "1" would prefix-match "12".
        cache
            .store(ImplementationKey::new(1, "a", "1.0"), descriptor("a", "1.0"))
            .await
            .unwrap();
        cache
            .store(ImplementationKey::new(12, "b", "1.0"), descriptor("b", "1.0"))
            .await
            .unwrap();

        let keys = cache.keys_for_process(1).await.unwrap();
        assert_eq!(keys, vec![ImplementationKey::new(1, "a", "1.0")]);
    }

    #[tokio::test]
    async fn test_keys_for_process_before_first_store() {
        let cache = ConnectorImplementationCache::in_memory("CONNECTOR");
        assert!(cache.keys_for_process(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_evict_process_leaves_other_processes() {
        let cache = ConnectorImplementationCache::in_memory("CONNECTOR");
        cache
            .store(ImplementationKey::new(1, "a", "1.0"), descriptor("a", "1.0"))
            .await
            .unwrap();
        cache
            .store(ImplementationKey::new(1, "b", "2.0"), descriptor("b", "2.0"))
            .await
            .unwrap();
        cache
            .store(ImplementationKey::new(2, "a", "1.0"), descriptor("a", "1.0"))
            .await
            .unwrap();

        assert_eq!(cache.evict_process(1).await.unwrap(), 2);
        assert!(cache.keys_for_process(1).await.unwrap().is_empty());
        assert_eq!(cache.descriptors_for_process(2).await.unwrap().len(), 1);
    }
}
