// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for bpm-connector-service.

use thiserror::Error;

use crate::archive::InvalidImplementation;
use crate::cache::{CacheError, ImplementationKey};
use crate::descriptor::DescriptorError;
use crate::executor::ExecutionError;
use crate::redeploy::RedeployStage;
use crate::store::StoreError;

/// Connector service errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip archive could not be read or written.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Cache backend failed.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Resource or dependency store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Uploaded archive is not a valid implementation of the target connector.
    #[error("Invalid connector implementation: {0}")]
    InvalidImplementation(#[from] InvalidImplementation),

    /// A `.impl` descriptor could not be parsed.
    #[error("Failed to parse connector descriptor '{file_name}': {source}")]
    Descriptor {
        /// Name of the offending `.impl` file.
        file_name: String,
        /// Parse failure.
        #[source]
        source: DescriptorError,
    },

    /// No implementation is deployed for the connector, even after a reload.
    #[error("Connector implementation not found: {key}")]
    ImplementationNotFound {
        /// The key that was looked up.
        key: ImplementationKey,
    },

    /// Loading or running a connector failed.
    #[error("Connector execution failed: {0}")]
    Execution(#[from] ExecutionError),

    /// Replacing an implementation failed part-way.
    #[error(
        "Redeploy of {key} failed during {stage} (previous implementation restored: {compensated}): {source}"
    )]
    Redeploy {
        /// Implementation being replaced.
        key: ImplementationKey,
        /// Stage that failed.
        stage: RedeployStage,
        /// Whether the previous implementation was restored.
        compensated: bool,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },
}

/// Result type using the connector service Error.
pub type Result<T> = std::result::Result<T, Error>;
