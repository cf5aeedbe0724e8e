// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed resource and dependency store.

use std::path::Path;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::debug;

use super::*;
use crate::migrations;

/// SQLite-backed [`ResourceStore`] and [`DependencyStore`].
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct ResourceRow {
    process_definition_id: i64,
    resource_type: String,
    name: String,
    content: Vec<u8>,
}

impl TryFrom<ResourceRow> for BarResource {
    type Error = StoreError;

    fn try_from(row: ResourceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            process_definition_id: row.process_definition_id,
            resource_type: row.resource_type.parse()?,
            name: row.name,
            content: row.content,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DependencyRow {
    id: i64,
    name: String,
    file_name: String,
    content: Vec<u8>,
    scope_id: i64,
    scope_type: String,
}

impl TryFrom<DependencyRow> for Dependency {
    type Error = StoreError;

    fn try_from(row: DependencyRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            file_name: row.file_name,
            content: row.content,
            scope_id: row.scope_id,
            scope_type: row.scope_type.parse()?,
        })
    }
}

impl SqliteStore {
    /// Create a store from an existing pool. The schema must already be
    /// migrated, see [`crate::migrations::run_sqlite`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `path` and run migrations.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        migrations::run_sqlite(&pool).await?;
        debug!(path = %path.display(), "Connector store ready");

        Ok(Self { pool })
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn conflict_or_database(err: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(what()),
        _ => StoreError::Database(err),
    }
}

fn row_count<T>(value: T, what: &str) -> Result<usize, StoreError>
where
    T: TryInto<usize> + std::fmt::Display + Copy,
{
    value
        .try_into()
        .map_err(|_| StoreError::Corrupt(format!("{what} out of range: {value}")))
}

#[async_trait]
impl ResourceStore for SqliteStore {
    async fn add(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
        name: &str,
        content: &[u8],
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bar_resources (process_definition_id, resource_type, name, content)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (process_definition_id, resource_type, name)
            DO UPDATE SET content = excluded.content
            "#,
        )
        .bind(process_definition_id)
        .bind(resource_type.as_str())
        .bind(name)
        .bind(content)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
        name: &str,
    ) -> Result<Option<BarResource>, StoreError> {
        let row = sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT process_definition_id, resource_type, name, content
            FROM bar_resources
            WHERE process_definition_id = ? AND resource_type = ? AND name = ?
            "#,
        )
        .bind(process_definition_id)
        .bind(resource_type.as_str())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(BarResource::try_from).transpose()
    }

    async fn list(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
        from: usize,
        count: usize,
    ) -> Result<Vec<BarResource>, StoreError> {
        let rows = sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT process_definition_id, resource_type, name, content
            FROM bar_resources
            WHERE process_definition_id = ? AND resource_type = ?
            ORDER BY name ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(process_definition_id)
        .bind(resource_type.as_str())
        .bind(i64::try_from(count).unwrap_or(i64::MAX))
        .bind(i64::try_from(from).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BarResource::try_from).collect()
    }

    async fn count(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
    ) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM bar_resources
            WHERE process_definition_id = ? AND resource_type = ?
            "#,
        )
        .bind(process_definition_id)
        .bind(resource_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        row_count(count, "resource count")
    }

    async fn remove(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
        name: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM bar_resources
            WHERE process_definition_id = ? AND resource_type = ? AND name = ?
            "#,
        )
        .bind(process_definition_id)
        .bind(resource_type.as_str())
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_all(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
    ) -> Result<usize, StoreError> {
        let result = sqlx::query(
            "DELETE FROM bar_resources WHERE process_definition_id = ? AND resource_type = ?",
        )
        .bind(process_definition_id)
        .bind(resource_type.as_str())
        .execute(&self.pool)
        .await?;

        row_count(result.rows_affected(), "removed resources")
    }
}

#[async_trait]
impl DependencyStore for SqliteStore {
    async fn create_mapped_dependency(
        &self,
        name: &str,
        content: &[u8],
        file_name: &str,
        scope_id: i64,
        scope_type: ScopeType,
    ) -> Result<Dependency, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO dependencies (name, file_name, content, scope_id, scope_type)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(file_name)
        .bind(content)
        .bind(scope_id)
        .bind(scope_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_or_database(e, || {
                format!(
                    "dependency '{name}' ({file_name}) already exists in {} scope {scope_id}",
                    scope_type.as_str()
                )
            })
        })?;

        Ok(Dependency {
            id,
            name: name.to_string(),
            file_name: file_name.to_string(),
            content: content.to_vec(),
            scope_id,
            scope_type,
        })
    }

    async fn get_dependency_of_artifact(
        &self,
        scope_id: i64,
        scope_type: ScopeType,
        file_name: &str,
    ) -> Result<Option<Dependency>, StoreError> {
        let row = sqlx::query_as::<_, DependencyRow>(
            r#"
            SELECT id, name, file_name, content, scope_id, scope_type
            FROM dependencies
            WHERE scope_id = ? AND scope_type = ? AND file_name = ?
            "#,
        )
        .bind(scope_id)
        .bind(scope_type.as_str())
        .bind(file_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Dependency::try_from).transpose()
    }

    async fn list_dependencies(
        &self,
        scope_id: i64,
        scope_type: ScopeType,
    ) -> Result<Vec<Dependency>, StoreError> {
        let rows = sqlx::query_as::<_, DependencyRow>(
            r#"
            SELECT id, name, file_name, content, scope_id, scope_type
            FROM dependencies
            WHERE scope_id = ? AND scope_type = ?
            ORDER BY file_name ASC
            "#,
        )
        .bind(scope_id)
        .bind(scope_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Dependency::try_from).collect()
    }

    async fn delete_dependency(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM dependencies WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
