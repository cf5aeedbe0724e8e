// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Connector execution.
//!
//! The executor resolves the class named by a descriptor through a
//! [`ConnectorLoader`], wraps it in a [`ConnectorAdapter`] and drives the
//! lifecycle:
//!
//! ```text
//! load ─► set inputs ─► validate ─► connect ─► execute ─┬─► ConnectorResult ─► disconnect
//!                                                       └─► (failure) disconnect, error
//! ```

pub mod adapter;

pub use self::adapter::{ConnectorAdapter, EngineConnector};

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bpm_connector_api::{Connector, ConnectorError, ConnectorOutputs, EngineInput};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::descriptor::ConnectorImplementationDescriptor;

/// Lifecycle phase in which a connector failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    /// Opening connections.
    Connect,
    /// Doing the work.
    Execute,
    /// Releasing resources.
    Disconnect,
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPhase::Connect => write!(f, "connect"),
            ExecutionPhase::Execute => write!(f, "execute"),
            ExecutionPhase::Disconnect => write!(f, "disconnect"),
        }
    }
}

/// Errors from loading or running a connector.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecutionError {
    /// No connector is registered under the class name.
    #[error("Connector class '{class_name}' not found")]
    ClassNotFound {
        /// Implementation class.
        class_name: String,
    },

    /// The connector could not be instantiated.
    #[error("Cannot instantiate connector '{class_name}': {reason}")]
    Instantiation {
        /// Implementation class.
        class_name: String,
        /// What prevented instantiation.
        reason: String,
    },

    /// The connector rejected its input parameters.
    #[error("Invalid input for connector '{class_name}': {}", .problems.join("; "))]
    Validation {
        /// Implementation class.
        class_name: String,
        /// Rejected parameters or rules.
        problems: Vec<String>,
    },

    /// The connector failed while running.
    #[error("Connector '{class_name}' failed during {phase}: {source}")]
    Runtime {
        /// Implementation class.
        class_name: String,
        /// Phase that failed.
        phase: ExecutionPhase,
        /// Error raised by the connector.
        #[source]
        source: ConnectorError,
    },

    /// `execute` did not finish in time.
    #[error("Connector '{class_name}' timed out after {timeout:?}")]
    Timeout {
        /// Implementation class.
        class_name: String,
        /// Configured limit.
        timeout: Duration,
    },
}

impl ExecutionError {
    /// Implementation class the error is about.
    pub fn class_name(&self) -> &str {
        match self {
            ExecutionError::ClassNotFound { class_name }
            | ExecutionError::Instantiation { class_name, .. }
            | ExecutionError::Validation { class_name, .. }
            | ExecutionError::Runtime { class_name, .. }
            | ExecutionError::Timeout { class_name, .. } => class_name,
        }
    }
}

/// Jar files visible to a process definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyScope {
    process_definition_id: i64,
    jars: BTreeSet<String>,
}

impl DependencyScope {
    /// Create a scope from the jar file names mapped to a process.
    pub fn new(process_definition_id: i64, jars: impl IntoIterator<Item = String>) -> Self {
        Self {
            process_definition_id,
            jars: jars.into_iter().collect(),
        }
    }

    /// Process definition owning the scope.
    pub fn process_definition_id(&self) -> i64 {
        self.process_definition_id
    }

    /// Whether a jar is present.
    pub fn contains(&self, file_name: &str) -> bool {
        self.jars.contains(file_name)
    }

    /// Jar file names, sorted.
    pub fn jars(&self) -> impl Iterator<Item = &str> {
        self.jars.iter().map(String::as_str)
    }
}

/// Resolves an implementation class to a fresh connector instance.
pub trait ConnectorLoader: Send + Sync {
    /// Instantiate the connector a descriptor names, within a process scope.
    fn load(
        &self,
        descriptor: &ConnectorImplementationDescriptor,
        scope: &DependencyScope,
    ) -> Result<Box<dyn Connector>, ExecutionError>;
}

type LoaderFactory = Arc<dyn Fn() -> Box<dyn Connector> + Send + Sync>;

/// Loader backed by `register_connector!` registrations plus explicit ones.
///
/// Explicit registrations take precedence over link-time ones with the same
/// class name.
#[derive(Clone, Default)]
pub struct RegistryConnectorLoader {
    explicit: HashMap<String, LoaderFactory>,
}

impl RegistryConnectorLoader {
    /// Create a loader seeing only link-time registrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a class name.
    pub fn register<F>(&mut self, class_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Connector> + Send + Sync + 'static,
    {
        self.explicit.insert(class_name.into(), Arc::new(factory));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_connector<F>(mut self, class_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Connector> + Send + Sync + 'static,
    {
        self.register(class_name, factory);
        self
    }
}

impl ConnectorLoader for RegistryConnectorLoader {
    fn load(
        &self,
        descriptor: &ConnectorImplementationDescriptor,
        scope: &DependencyScope,
    ) -> Result<Box<dyn Connector>, ExecutionError> {
        let class_name = &descriptor.implementation_class_name;

        let missing: Vec<&str> = descriptor
            .jar_dependencies
            .iter()
            .map(String::as_str)
            .filter(|jar| !scope.contains(jar))
            .collect();
        if !missing.is_empty() {
            return Err(ExecutionError::Instantiation {
                class_name: class_name.clone(),
                reason: format!(
                    "missing dependencies in process {}: {}",
                    scope.process_definition_id(),
                    missing.join(", ")
                ),
            });
        }

        if let Some(factory) = self.explicit.get(class_name) {
            return Ok(factory());
        }

        bpm_connector_api::find_registration(class_name)
            .map(|registration| (registration.factory)())
            .ok_or_else(|| ExecutionError::ClassNotFound {
                class_name: class_name.clone(),
            })
    }
}

/// A successful execution: the outputs and the still-connected connector.
pub struct ConnectorResult {
    /// Outputs returned by `execute`.
    pub outputs: ConnectorOutputs,
    connector: ConnectorAdapter,
}

impl ConnectorResult {
    /// Implementation class that produced the result.
    pub fn class_name(&self) -> &str {
        self.connector.class_name()
    }
}

impl fmt::Debug for ConnectorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorResult")
            .field("class_name", &self.connector.class_name())
            .field("outputs", &self.outputs)
            .finish()
    }
}

/// Runs connectors through a loader, with an optional execution timeout.
#[derive(Clone)]
pub struct ConnectorExecutor {
    loader: Arc<dyn ConnectorLoader>,
    timeout: Option<Duration>,
}

impl ConnectorExecutor {
    /// Create an executor. `None` disables the timeout.
    pub fn new(loader: Arc<dyn ConnectorLoader>, timeout: Option<Duration>) -> Self {
        Self { loader, timeout }
    }

    /// Configured execution timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Instantiate, configure, validate, connect and execute a connector.
    ///
    /// If `execute` fails or times out the connector is disconnected before
    /// the error is returned. On success the caller owns the connected
    /// connector and ends it with [`disconnect`](Self::disconnect).
    pub async fn execute_in_scope(
        &self,
        descriptor: &ConnectorImplementationDescriptor,
        scope: &DependencyScope,
        inputs: HashMap<String, EngineInput>,
    ) -> Result<ConnectorResult, ExecutionError> {
        let class_name = descriptor.implementation_class_name.as_str();
        let connector = self.loader.load(descriptor, scope)?;
        let mut adapter = ConnectorAdapter::new(class_name, connector);

        debug!(
            class_name,
            process_definition_id = scope.process_definition_id(),
            input_count = inputs.len(),
            "Executing connector"
        );

        adapter.set_input_parameters(inputs);
        adapter.validate()?;
        adapter.connect().await?;

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, adapter.execute()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ExecutionError::Timeout {
                    class_name: class_name.to_string(),
                    timeout: limit,
                }),
            },
            None => adapter.execute().await,
        };

        match outcome {
            Ok(outputs) => {
                info!(
                    class_name,
                    output_count = outputs.len(),
                    "Connector executed"
                );
                Ok(ConnectorResult {
                    outputs,
                    connector: adapter,
                })
            }
            Err(e) => {
                warn!(class_name, error = %e, "Connector execution failed");
                if let Err(disconnect_err) = adapter.disconnect().await {
                    warn!(
                        class_name,
                        error = %disconnect_err,
                        "Disconnect after failed execution also failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Disconnect the connector of a successful execution and hand back its
    /// outputs.
    pub async fn disconnect(
        &self,
        result: ConnectorResult,
    ) -> Result<ConnectorOutputs, ExecutionError> {
        let ConnectorResult {
            outputs,
            mut connector,
        } = result;
        connector.disconnect().await?;
        debug!(class_name = connector.class_name(), "Connector disconnected");
        Ok(outputs)
    }
}
