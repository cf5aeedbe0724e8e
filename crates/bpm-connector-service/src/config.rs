// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for bpm-connector-service.

use std::path::PathBuf;
use std::time::Duration;

/// Default name of the connector implementation cache.
pub const DEFAULT_CACHE_NAME: &str = "CONNECTOR";

/// Default number of resources read per page when scanning a process.
pub const DEFAULT_SCAN_PAGE_SIZE: usize = 1000;

/// Default timeout for a single connector execution.
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(300);

/// Settings of the connector service itself, independent of storage.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Name of the cache holding parsed descriptors.
    pub cache_name: String,
    /// Resources read per page when scanning a process definition.
    pub scan_page_size: usize,
    /// Upper bound on `execute()`; `None` waits forever.
    pub execution_timeout: Option<Duration>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
            execution_timeout: Some(DEFAULT_EXECUTION_TIMEOUT),
        }
    }
}

/// Configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file holding resources and dependencies
    pub database_path: PathBuf,
    /// Service settings
    pub service: ServiceConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `BPM_CONNECTORS_DATABASE_PATH`: SQLite file (default: .data/connectors.db)
    /// - `BPM_CONNECTORS_CACHE_NAME`: cache name (default: CONNECTOR)
    /// - `BPM_CONNECTORS_SCAN_PAGE_SIZE`: resources per page (default: 1000)
    /// - `BPM_CONNECTORS_EXECUTION_TIMEOUT_SECS`: execution timeout, 0 disables (default: 300)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_path = PathBuf::from(
            std::env::var("BPM_CONNECTORS_DATABASE_PATH")
                .unwrap_or_else(|_| ".data/connectors.db".to_string()),
        );

        let cache_name = std::env::var("BPM_CONNECTORS_CACHE_NAME")
            .unwrap_or_else(|_| DEFAULT_CACHE_NAME.to_string());
        if cache_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "BPM_CONNECTORS_CACHE_NAME",
                "must not be empty",
            ));
        }

        let scan_page_size: usize = std::env::var("BPM_CONNECTORS_SCAN_PAGE_SIZE")
            .unwrap_or_else(|_| DEFAULT_SCAN_PAGE_SIZE.to_string())
            .parse()
            .ok()
            .filter(|size| *size > 0)
            .ok_or(ConfigError::Invalid(
                "BPM_CONNECTORS_SCAN_PAGE_SIZE",
                "must be a positive integer",
            ))?;

        let timeout_secs: u64 = std::env::var("BPM_CONNECTORS_EXECUTION_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_EXECUTION_TIMEOUT.as_secs().to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid(
                    "BPM_CONNECTORS_EXECUTION_TIMEOUT_SECS",
                    "must be a non-negative integer",
                )
            })?;
        let execution_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        Ok(Self {
            database_path,
            service: ServiceConfig {
                cache_name,
                scan_page_size,
                execution_timeout,
            },
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),

    /// A required setting was not provided.
    #[error("{0} is required")]
    Missing(&'static str),
}
