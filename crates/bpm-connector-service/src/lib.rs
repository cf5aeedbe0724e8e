// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! BPM Connector Service - Connector Implementation Registry
//!
//! This crate keeps track of the connector implementations deployed with each
//! process definition, caches their parsed descriptors, replaces them when a
//! new implementation archive is uploaded, and runs them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          ConnectorService                            │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌──────────┐  │
//! │  │   Archive    │  │  Redeploy    │  │ Implement.   │  │ Executor │  │
//! │  │  validation  │  │  protocol    │  │    cache     │  │ (loader) │  │
//! │  └──────────────┘  └──────────────┘  └──────────────┘  └──────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//!            │                  │                 │
//!            ▼                  ▼                 ▼
//!   ┌─────────────────┐ ┌─────────────────┐ ┌──────────────────┐
//!   │  ResourceStore  │ │ DependencyStore │ │   CacheService   │
//!   │  (.impl files)  │ │  (.jar files)   │ │  ("CONNECTOR")   │
//!   └─────────────────┘ └─────────────────┘ └──────────────────┘
//! ```
//!
//! The stores are the source of truth. The cache is a derived view keyed by
//! `(process definition, connector id, version)` that is rebuilt for a whole
//! process definition whenever a lookup misses.
//!
//! # Redeploy State Machine
//!
//! ```text
//!   Validate ─► Extract ─► DeleteOld ─► DeployNew ─► InvalidateCache ─► Reload ─► Completed
//!                                           │
//!                                      on failure
//!                                           ▼
//!                               compensate (restore old)
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `BPM_CONNECTORS_DATABASE_PATH` | No | `.data/connectors.db` | SQLite database file |
//! | `BPM_CONNECTORS_CACHE_NAME` | No | `CONNECTOR` | Name of the implementation cache |
//! | `BPM_CONNECTORS_SCAN_PAGE_SIZE` | No | `1000` | Page size when scanning resources |
//! | `BPM_CONNECTORS_EXECUTION_TIMEOUT_SECS` | No | `300` | Execution timeout, `0` disables |
//!
//! # Modules
//!
//! - [`archive`]: Connector archive extraction and validation
//! - [`cache`]: Connector implementation cache
//! - [`config`]: Configuration from environment variables
//! - [`descriptor`]: `.impl` descriptor parsing
//! - [`error`]: Error types
//! - [`executor`]: Connector loading and execution
//! - [`redeploy`]: Replace-and-reload protocol
//! - [`service`]: The connector service
//! - [`store`]: Resource and dependency stores

#![warn(missing_docs)]

/// Database migrations for the SQLite store.
pub mod migrations;

/// Configuration loaded from environment variables.
pub mod config;

/// Error types for connector service operations.
pub mod error;

/// Parsing of `.impl` connector implementation descriptors.
pub mod descriptor;

/// Connector implementation archive extraction and validation.
pub mod archive;

/// Connector implementation cache.
pub mod cache;

/// Persisted BAR resources and dependencies.
pub mod store;

/// Connector loading and execution.
pub mod executor;

/// Replace-and-reload protocol for connector implementations.
pub mod redeploy;

/// The connector service.
pub mod service;

pub use config::{Config, ServiceConfig};
pub use descriptor::ConnectorImplementationDescriptor;
pub use error::{Error, Result};
pub use service::{ConnectorService, ConnectorServiceBuilder, ImplementationSortField, SortOrder};
