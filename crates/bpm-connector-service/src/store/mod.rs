// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persisted BAR resources and dependencies.
//!
//! Connector descriptors are stored as BAR resources of type
//! [`BarResourceType::Connector`], scoped to the process definition they were
//! deployed with. The jars they need are stored as dependencies mapped to the
//! same process definition. Both stores are the source of truth; the
//! implementation cache is rebuilt from them.

pub mod memory;
pub mod sqlite;

pub use self::memory::{InMemoryDependencyStore, InMemoryResourceStore};
pub use self::sqlite::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the resource and dependency stores.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The record already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored value could not be interpreted.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Kind of resource shipped inside a business archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BarResourceType {
    /// Connector implementation descriptor (`.impl`).
    Connector,
    /// User filter implementation descriptor.
    UserFilter,
    /// Document attached to the process.
    Document,
    /// Any other resource.
    External,
}

impl BarResourceType {
    /// Returns the string representation of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connector => "connector",
            Self::UserFilter => "userfilter",
            Self::Document => "document",
            Self::External => "external",
        }
    }
}

impl std::fmt::Display for BarResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BarResourceType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connector" => Ok(Self::Connector),
            "userfilter" => Ok(Self::UserFilter),
            "document" => Ok(Self::Document),
            "external" => Ok(Self::External),
            _ => Err(StoreError::Corrupt(format!("unknown resource type '{s}'"))),
        }
    }
}

/// A named resource deployed with a process definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarResource {
    /// Owning process definition.
    pub process_definition_id: i64,
    /// Resource kind.
    pub resource_type: BarResourceType,
    /// File name, unique per process definition and type.
    pub name: String,
    /// Raw content.
    pub content: Vec<u8>,
}

/// Scope a dependency is mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeType {
    /// Visible to one process definition.
    Process,
    /// Visible to a whole tenant.
    Tenant,
    /// Visible everywhere.
    Global,
}

impl ScopeType {
    /// Returns the string representation of the scope.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Tenant => "tenant",
            Self::Global => "global",
        }
    }
}

impl std::str::FromStr for ScopeType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "process" => Ok(Self::Process),
            "tenant" => Ok(Self::Tenant),
            "global" => Ok(Self::Global),
            _ => Err(StoreError::Corrupt(format!("unknown scope type '{s}'"))),
        }
    }
}

/// A jar file mapped to a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Store-assigned id.
    pub id: i64,
    /// Unique dependency name.
    pub name: String,
    /// Original file name (the artifact name).
    pub file_name: String,
    /// Raw jar content.
    pub content: Vec<u8>,
    /// Id of the owning scope (process definition id for process scope).
    pub scope_id: i64,
    /// Kind of the owning scope.
    pub scope_type: ScopeType,
}

/// Unique name of a jar mapped to a process definition.
pub fn process_dependency_name(process_definition_id: i64, file_name: &str) -> String {
    format!("{process_definition_id}_{file_name}")
}

/// Store of BAR resources scoped by process definition.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Add a resource, replacing one with the same name.
    async fn add(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
        name: &str,
        content: &[u8],
    ) -> Result<(), StoreError>;

    /// Get a resource by name.
    async fn get(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
        name: &str,
    ) -> Result<Option<BarResource>, StoreError>;

    /// List resources ordered by name, skipping `from` and returning at most
    /// `count`.
    async fn list(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
        from: usize,
        count: usize,
    ) -> Result<Vec<BarResource>, StoreError>;

    /// Number of resources of a type.
    async fn count(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
    ) -> Result<usize, StoreError>;

    /// Remove a resource. Returns whether it existed.
    async fn remove(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
        name: &str,
    ) -> Result<bool, StoreError>;

    /// Remove every resource of a type. Returns how many were removed.
    async fn remove_all(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
    ) -> Result<usize, StoreError>;
}

/// Read every resource of a type, one page of `page_size` at a time.
pub async fn all_resources(
    store: &dyn ResourceStore,
    process_definition_id: i64,
    resource_type: BarResourceType,
    page_size: usize,
) -> Result<Vec<BarResource>, StoreError> {
    let page_size = page_size.max(1);
    let mut resources = Vec::new();
    loop {
        let page = store
            .list(process_definition_id, resource_type, resources.len(), page_size)
            .await?;
        let last_page = page.len() < page_size;
        resources.extend(page);
        if last_page {
            return Ok(resources);
        }
    }
}

/// Store of jar dependencies mapped to scopes.
#[async_trait]
pub trait DependencyStore: Send + Sync {
    /// Create a dependency and map it to a scope.
    ///
    /// Fails with [`StoreError::Conflict`] if the name is taken or the scope
    /// already has an artifact with the same file name.
    async fn create_mapped_dependency(
        &self,
        name: &str,
        content: &[u8],
        file_name: &str,
        scope_id: i64,
        scope_type: ScopeType,
    ) -> Result<Dependency, StoreError>;

    /// Find the dependency a scope maps under a file name.
    async fn get_dependency_of_artifact(
        &self,
        scope_id: i64,
        scope_type: ScopeType,
        file_name: &str,
    ) -> Result<Option<Dependency>, StoreError>;

    /// All dependencies of a scope, ordered by file name.
    async fn list_dependencies(
        &self,
        scope_id: i64,
        scope_type: ScopeType,
    ) -> Result<Vec<Dependency>, StoreError>;

    /// Delete a dependency and its mapping. Returns whether it existed.
    async fn delete_dependency(&self, id: i64) -> Result<bool, StoreError>;
}
