// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory stores.
//!
//! Keep everything in ordered maps behind async locks. Used by tests and by
//! embedders that persist resources elsewhere.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::*;

type ResourceKey = (i64, BarResourceType, String);

/// In-memory [`ResourceStore`].
#[derive(Default)]
pub struct InMemoryResourceStore {
    resources: RwLock<BTreeMap<ResourceKey, Vec<u8>>>,
}

impl InMemoryResourceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn add(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
        name: &str,
        content: &[u8],
    ) -> Result<(), StoreError> {
        self.resources.write().await.insert(
            (process_definition_id, resource_type, name.to_string()),
            content.to_vec(),
        );
        Ok(())
    }

    async fn get(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
        name: &str,
    ) -> Result<Option<BarResource>, StoreError> {
        let resources = self.resources.read().await;
        Ok(resources
            .get(&(process_definition_id, resource_type, name.to_string()))
            .map(|content| BarResource {
                process_definition_id,
                resource_type,
                name: name.to_string(),
                content: content.clone(),
            }))
    }

    async fn list(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
        from: usize,
        count: usize,
    ) -> Result<Vec<BarResource>, StoreError> {
        let resources = self.resources.read().await;
        Ok(resources
            .iter()
            .filter(|((pd, ty, _), _)| *pd == process_definition_id && *ty == resource_type)
            .skip(from)
            .take(count)
            .map(|((_, _, name), content)| BarResource {
                process_definition_id,
                resource_type,
                name: name.clone(),
                content: content.clone(),
            })
            .collect())
    }

    async fn count(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
    ) -> Result<usize, StoreError> {
        let resources = self.resources.read().await;
        Ok(resources
            .keys()
            .filter(|(pd, ty, _)| *pd == process_definition_id && *ty == resource_type)
            .count())
    }

    async fn remove(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
        name: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .resources
            .write()
            .await
            .remove(&(process_definition_id, resource_type, name.to_string()))
            .is_some())
    }

    async fn remove_all(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
    ) -> Result<usize, StoreError> {
        let mut resources = self.resources.write().await;
        let before = resources.len();
        resources.retain(|(pd, ty, _), _| !(*pd == process_definition_id && *ty == resource_type));
        Ok(before - resources.len())
    }
}

#[derive(Default)]
struct DependencyTable {
    next_id: i64,
    rows: BTreeMap<i64, Dependency>,
}

/// In-memory [`DependencyStore`].
#[derive(Default)]
pub struct InMemoryDependencyStore {
    table: RwLock<DependencyTable>,
}

impl InMemoryDependencyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DependencyStore for InMemoryDependencyStore {
    async fn create_mapped_dependency(
        &self,
        name: &str,
        content: &[u8],
        file_name: &str,
        scope_id: i64,
        scope_type: ScopeType,
    ) -> Result<Dependency, StoreError> {
        let mut table = self.table.write().await;
        if table.rows.values().any(|d| {
            d.name == name
                || (d.scope_id == scope_id && d.scope_type == scope_type && d.file_name == file_name)
        }) {
            return Err(StoreError::Conflict(format!(
                "dependency '{name}' ({file_name}) already exists in {} scope {scope_id}",
                scope_type.as_str()
            )));
        }

        table.next_id += 1;
        let dependency = Dependency {
            id: table.next_id,
            name: name.to_string(),
            file_name: file_name.to_string(),
            content: content.to_vec(),
            scope_id,
            scope_type,
        };
        table.rows.insert(dependency.id, dependency.clone());
        Ok(dependency)
    }

    async fn get_dependency_of_artifact(
        &self,
        scope_id: i64,
        scope_type: ScopeType,
        file_name: &str,
    ) -> Result<Option<Dependency>, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .find(|d| d.scope_id == scope_id && d.scope_type == scope_type && d.file_name == file_name)
            .cloned())
    }

    async fn list_dependencies(
        &self,
        scope_id: i64,
        scope_type: ScopeType,
    ) -> Result<Vec<Dependency>, StoreError> {
        let table = self.table.read().await;
        let mut dependencies: Vec<Dependency> = table
            .rows
            .values()
            .filter(|d| d.scope_id == scope_id && d.scope_type == scope_type)
            .cloned()
            .collect();
        dependencies.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(dependencies)
    }

    async fn delete_dependency(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }
}
