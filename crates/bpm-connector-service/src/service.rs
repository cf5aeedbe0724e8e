// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Connector service.
//!
//! Entry point for everything connector-related: descriptor lookups through
//! the implementation cache, implementation replacement, listing, export and
//! execution.

use std::collections::HashMap;
use std::sync::Arc;

use bpm_connector_api::{ConnectorOutputs, EngineInput};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::archive::ConnectorArchive;
use crate::cache::{ConnectorImplementationCache, ImplementationKey};
use crate::config::{ConfigError, ServiceConfig};
use crate::descriptor::{ConnectorImplementationDescriptor, is_descriptor_file};
use crate::error::{Error, Result};
use crate::executor::{
    ConnectorExecutor, ConnectorLoader, ConnectorResult, DependencyScope, RegistryConnectorLoader,
};
use crate::redeploy::Redeployment;
use crate::store::{
    BarResource, BarResourceType, DependencyStore, ResourceStore, ScopeType, all_resources,
};

/// Field to sort implementations by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImplementationSortField {
    /// Connector definition id.
    #[default]
    DefinitionId,
    /// Connector definition version.
    DefinitionVersion,
    /// Implementation id.
    ImplementationId,
    /// Implementation version.
    ImplementationVersion,
    /// Implementation class name.
    ClassName,
}

impl ImplementationSortField {
    fn value<'a>(&self, descriptor: &'a ConnectorImplementationDescriptor) -> &'a str {
        match self {
            Self::DefinitionId => &descriptor.definition_id,
            Self::DefinitionVersion => &descriptor.definition_version,
            Self::ImplementationId => &descriptor.implementation_id,
            Self::ImplementationVersion => &descriptor.implementation_version,
            Self::ClassName => &descriptor.implementation_class_name,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// Builder for creating a [`ConnectorService`].
#[derive(Default)]
pub struct ConnectorServiceBuilder {
    resources: Option<Arc<dyn ResourceStore>>,
    dependencies: Option<Arc<dyn DependencyStore>>,
    cache: Option<ConnectorImplementationCache>,
    loader: Option<Arc<dyn ConnectorLoader>>,
    config: ServiceConfig,
}

impl ConnectorServiceBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the resource store (required).
    pub fn resources(mut self, resources: Arc<dyn ResourceStore>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Set the dependency store (required).
    pub fn dependencies(mut self, dependencies: Arc<dyn DependencyStore>) -> Self {
        self.dependencies = Some(dependencies);
        self
    }

    /// Use one store for both resources and dependencies.
    pub fn store<S>(self, store: Arc<S>) -> Self
    where
        S: ResourceStore + DependencyStore + 'static,
    {
        self.resources(store.clone()).dependencies(store)
    }

    /// Set the implementation cache.
    ///
    /// Default: in-process cache named after [`ServiceConfig::cache_name`]
    pub fn cache(mut self, cache: ConnectorImplementationCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the connector loader.
    ///
    /// Default: [`RegistryConnectorLoader`] over link-time registrations
    pub fn loader(mut self, loader: Arc<dyn ConnectorLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Set the service settings.
    ///
    /// Default: [`ServiceConfig::default`]
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the service.
    ///
    /// Returns an error if a store is missing.
    pub fn build(self) -> Result<ConnectorService> {
        let resources = self.resources.ok_or(ConfigError::Missing("resource store"))?;
        let dependencies = self
            .dependencies
            .ok_or(ConfigError::Missing("dependency store"))?;
        let cache = self
            .cache
            .unwrap_or_else(|| ConnectorImplementationCache::in_memory(&self.config.cache_name));
        let loader = self
            .loader
            .unwrap_or_else(|| Arc::new(RegistryConnectorLoader::new()));

        Ok(ConnectorService {
            executor: ConnectorExecutor::new(loader, self.config.execution_timeout),
            cache,
            resources,
            dependencies,
            config: self.config,
            redeploy_locks: DashMap::new(),
        })
    }
}

/// Connector implementation registry, cache and executor.
pub struct ConnectorService {
    cache: ConnectorImplementationCache,
    resources: Arc<dyn ResourceStore>,
    dependencies: Arc<dyn DependencyStore>,
    executor: ConnectorExecutor,
    config: ServiceConfig,
    redeploy_locks: DashMap<ImplementationKey, Arc<Mutex<()>>>,
}

impl ConnectorService {
    /// Create a builder.
    pub fn builder() -> ConnectorServiceBuilder {
        ConnectorServiceBuilder::new()
    }

    /// The implementation cache.
    pub fn cache(&self) -> &ConnectorImplementationCache {
        &self.cache
    }

    /// Service settings.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Descriptor of the implementation deployed for a connector.
    ///
    /// A cache miss triggers one reload of the whole process definition; a
    /// second miss is [`Error::ImplementationNotFound`].
    pub async fn get_implementation_descriptor(
        &self,
        process_definition_id: i64,
        connector_id: &str,
        version: &str,
    ) -> Result<Arc<ConnectorImplementationDescriptor>> {
        let key = ImplementationKey::new(process_definition_id, connector_id, version);
        if let Some(descriptor) = self.cache.get(&key).await? {
            return Ok(descriptor);
        }

        debug!(key = %key, "Implementation cache miss, reloading process");
        self.load_connectors(process_definition_id).await?;

        self.cache
            .get(&key)
            .await?
            .ok_or(Error::ImplementationNotFound { key })
    }

    /// Parse every deployed `.impl` of a process definition into the cache.
    /// Returns how many descriptors were cached.
    pub async fn load_connectors(&self, process_definition_id: i64) -> Result<usize> {
        load_descriptors(
            self.resources.as_ref(),
            &self.cache,
            process_definition_id,
            self.config.scan_page_size,
        )
        .await
    }

    /// Replace the implementation of a connector with the one in a zip
    /// archive and reload the cache. Returns the new descriptor.
    ///
    /// Redeploys of the same implementation key run one at a time.
    pub async fn set_connector_implementation(
        &self,
        process_definition_id: i64,
        connector_id: &str,
        version: &str,
        archive_bytes: &[u8],
    ) -> Result<Arc<ConnectorImplementationDescriptor>> {
        let key = ImplementationKey::new(process_definition_id, connector_id, version);
        let lock = self.redeploy_locks.entry(key.clone()).or_default().clone();

        let result = {
            let _guard = lock.lock().await;
            Redeployment::new(
                key.clone(),
                self.resources.as_ref(),
                self.dependencies.as_ref(),
                &self.cache,
                self.config.scan_page_size,
            )
            .run(archive_bytes)
            .await
        };

        // The map and this call hold the only references when nobody waits.
        self.redeploy_locks
            .remove_if(&key, |_, held| Arc::strong_count(held) == 2);
        result
    }

    /// A page of the implementations deployed for a process definition.
    pub async fn list_implementations(
        &self,
        process_definition_id: i64,
        from: usize,
        count: usize,
        sort_field: ImplementationSortField,
        sort_order: SortOrder,
    ) -> Result<Vec<Arc<ConnectorImplementationDescriptor>>> {
        self.load_connectors(process_definition_id).await?;
        let mut descriptors = self
            .cache
            .descriptors_for_process(process_definition_id)
            .await?;

        descriptors.sort_by(|a, b| {
            (&a.definition_id, &a.definition_version)
                .cmp(&(&b.definition_id, &b.definition_version))
        });
        descriptors.sort_by(|a, b| {
            let ordering = sort_field.value(a).cmp(sort_field.value(b));
            match sort_order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });

        Ok(descriptors.into_iter().skip(from).take(count).collect())
    }

    /// Number of implementations deployed for a process definition.
    pub async fn count_implementations(&self, process_definition_id: i64) -> Result<usize> {
        self.load_connectors(process_definition_id).await?;
        Ok(self
            .cache
            .keys_for_process(process_definition_id)
            .await?
            .len())
    }

    /// Drop the cached descriptors of a process definition. The stores are
    /// left untouched. Returns how many entries were evicted.
    pub async fn unload_connectors(&self, process_definition_id: i64) -> Result<usize> {
        let evicted = self.cache.evict_process(process_definition_id).await?;
        info!(process_definition_id, evicted, "Connector implementations unloaded");
        Ok(evicted)
    }

    /// Rebuild the zip archive of the implementation currently deployed for
    /// a connector.
    pub async fn export_implementation(
        &self,
        process_definition_id: i64,
        connector_id: &str,
        version: &str,
    ) -> Result<Vec<u8>> {
        let key = ImplementationKey::new(process_definition_id, connector_id, version);
        let (resource, descriptor) = self
            .find_deployed(&key)
            .await?
            .ok_or_else(|| Error::ImplementationNotFound { key: key.clone() })?;

        let mut archive = ConnectorArchive::new(resource.name, resource.content);
        for file_name in &descriptor.jar_dependencies {
            match self
                .dependencies
                .get_dependency_of_artifact(process_definition_id, ScopeType::Process, file_name)
                .await?
            {
                Some(dependency) => archive.add_dependency(dependency.file_name, dependency.content),
                None => warn!(
                    key = %key,
                    file_name = %file_name,
                    "Declared jar is not deployed, exporting without it"
                ),
            }
        }

        archive.to_zip_bytes()
    }

    /// Run the implementation deployed for a connector.
    ///
    /// On success the connector stays connected; finish it with
    /// [`disconnect`](Self::disconnect).
    pub async fn execute_connector(
        &self,
        process_definition_id: i64,
        connector_id: &str,
        version: &str,
        inputs: HashMap<String, EngineInput>,
    ) -> Result<ConnectorResult> {
        let descriptor = self
            .get_implementation_descriptor(process_definition_id, connector_id, version)
            .await?;

        let jars = self
            .dependencies
            .list_dependencies(process_definition_id, ScopeType::Process)
            .await?
            .into_iter()
            .map(|dependency| dependency.file_name);
        let scope = DependencyScope::new(process_definition_id, jars);

        Ok(self
            .executor
            .execute_in_scope(&descriptor, &scope, inputs)
            .await?)
    }

    /// End the lifecycle of a successful execution and return its outputs.
    pub async fn disconnect(&self, result: ConnectorResult) -> Result<ConnectorOutputs> {
        Ok(self.executor.disconnect(result).await?)
    }

    async fn find_deployed(
        &self,
        key: &ImplementationKey,
    ) -> Result<Option<(BarResource, ConnectorImplementationDescriptor)>> {
        let resources = all_resources(
            self.resources.as_ref(),
            key.process_definition_id,
            BarResourceType::Connector,
            self.config.scan_page_size,
        )
        .await?;

        for resource in resources {
            if !is_descriptor_file(&resource.name) {
                continue;
            }
            let descriptor = parse_resource(&resource)?;
            if descriptor.implements(&key.connector_id, &key.version) {
                return Ok(Some((resource, descriptor)));
            }
        }
        Ok(None)
    }
}

fn parse_resource(resource: &BarResource) -> Result<ConnectorImplementationDescriptor> {
    ConnectorImplementationDescriptor::parse(&resource.content).map_err(|source| {
        Error::Descriptor {
            file_name: resource.name.clone(),
            source,
        }
    })
}

/// Parse every `.impl` resource of a process definition and cache it.
///
/// A malformed descriptor aborts the reload; descriptors cached before it
/// stay cached.
pub(crate) async fn load_descriptors(
    resources: &dyn ResourceStore,
    cache: &ConnectorImplementationCache,
    process_definition_id: i64,
    page_size: usize,
) -> Result<usize> {
    let deployed = all_resources(
        resources,
        process_definition_id,
        BarResourceType::Connector,
        page_size,
    )
    .await?;

    let mut loaded = 0;
    for resource in deployed.iter().filter(|r| is_descriptor_file(&r.name)) {
        let descriptor = parse_resource(resource)?;
        let key = ImplementationKey::for_descriptor(process_definition_id, &descriptor);
        cache.store(key, Arc::new(descriptor)).await?;
        loaded += 1;
    }

    debug!(process_definition_id, loaded, "Connector implementations loaded");
    Ok(loaded)
}
