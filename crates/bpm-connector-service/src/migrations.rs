// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Database migrations for the connector stores.
//!
//! Embedders that manage their own pool can apply the schema with
//! [`run_sqlite`] before handing the pool to [`crate::store::SqliteStore::new`].
//!
//! # Example
//!
//! ```ignore
//! use sqlx::SqlitePool;
//! use bpm_connector_service::migrations;
//!
//! let pool = SqlitePool::connect("sqlite:.data/connectors.db?mode=rwc").await?;
//! migrations::run_sqlite(&pool).await?;
//! ```

use sqlx::migrate::MigrateError;

/// SQLite migrator with all store migrations embedded.
pub static SQLITE: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// Run SQLite migrations.
///
/// Applies all pending migrations to the database. Safe to call multiple times;
/// already-applied migrations are skipped.
pub async fn run_sqlite(pool: &sqlx::SqlitePool) -> Result<(), MigrateError> {
    SQLITE.run(pool).await
}
