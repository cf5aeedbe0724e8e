// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Client connector trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::context::{ApiAccessor, EngineExecutionContext};

/// Output values produced by a connector execution, keyed by output name.
pub type ConnectorOutputs = HashMap<String, Value>;

/// Error raised by a connector during connect, execute or disconnect.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConnectorError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConnectorError {
    /// Create an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The error message, without the cause.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Input parameters were rejected by the connector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid input parameters: {}", .problems.join("; "))]
pub struct ConnectorValidationError {
    /// One entry per rejected parameter or rule.
    pub problems: Vec<String>,
}

impl ConnectorValidationError {
    /// Create a validation error from a list of problems.
    pub fn new(problems: Vec<String>) -> Self {
        Self { problems }
    }

    /// Create a validation error for a single problem.
    pub fn single(problem: impl Into<String>) -> Self {
        Self {
            problems: vec![problem.into()],
        }
    }
}

/// Trait for connector implementations.
///
/// The engine owns one instance per execution and calls the methods in
/// lifecycle order. Calling `execute` before `connect` is the caller's
/// mistake; implementations do not need to guard against it.
///
/// `set_api_accessor` and `set_execution_context` are the richer lifecycle:
/// connectors that need engine access override them, the rest ignore them.
#[async_trait]
pub trait Connector: Send {
    /// Receive the input parameters, with the engine-reserved keys removed.
    fn set_input_parameters(&mut self, parameters: HashMap<String, Value>);

    /// Check the input parameters before any connection is opened.
    fn validate_input_parameters(&self) -> Result<(), ConnectorValidationError> {
        Ok(())
    }

    /// Open connections or acquire resources.
    async fn connect(&mut self) -> Result<(), ConnectorError> {
        Ok(())
    }

    /// Do the work and return the outputs.
    async fn execute(&mut self) -> Result<ConnectorOutputs, ConnectorError>;

    /// Release whatever `connect` acquired.
    async fn disconnect(&mut self) -> Result<(), ConnectorError> {
        Ok(())
    }

    /// Receive an accessor to the engine APIs.
    fn set_api_accessor(&mut self, accessor: Arc<dyn ApiAccessor>) {
        let _ = accessor;
    }

    /// Receive the execution context of the calling activity.
    fn set_execution_context(&mut self, context: EngineExecutionContext) {
        let _ = context;
    }
}
