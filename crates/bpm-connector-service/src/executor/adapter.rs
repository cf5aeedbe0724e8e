// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Adapter from client connectors to the engine-side contract.

use std::collections::HashMap;

use async_trait::async_trait;
use bpm_connector_api::{
    API_ACCESSOR_KEY, Connector, ConnectorOutputs, EXECUTION_CONTEXT_KEY, EngineExecutionContext,
    EngineInput,
};
use tracing::warn;

use super::{ExecutionError, ExecutionPhase};

/// Connector contract as the engine drives it.
#[async_trait]
pub trait EngineConnector: Send {
    /// Hand over the full engine input map, reserved keys included.
    fn set_input_parameters(&mut self, inputs: HashMap<String, EngineInput>);

    /// Validate the inputs.
    fn validate(&self) -> Result<(), ExecutionError>;

    /// Open connections.
    async fn connect(&mut self) -> Result<(), ExecutionError>;

    /// Do the work.
    async fn execute(&mut self) -> Result<ConnectorOutputs, ExecutionError>;

    /// Release resources.
    async fn disconnect(&mut self) -> Result<(), ExecutionError>;
}

/// Wraps a client [`Connector`] as an [`EngineConnector`].
///
/// The adapter strips the reserved keys from the input map and injects them
/// through the richer lifecycle. It does not enforce call order.
pub struct ConnectorAdapter {
    class_name: String,
    connector: Box<dyn Connector>,
}

impl ConnectorAdapter {
    /// Wrap a connector instantiated from `class_name`.
    pub fn new(class_name: impl Into<String>, connector: Box<dyn Connector>) -> Self {
        Self {
            class_name: class_name.into(),
            connector,
        }
    }

    /// Implementation class of the wrapped connector.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Unwrap the client connector.
    pub fn into_inner(self) -> Box<dyn Connector> {
        self.connector
    }

    fn runtime_error(
        &self,
        phase: ExecutionPhase,
        source: bpm_connector_api::ConnectorError,
    ) -> ExecutionError {
        ExecutionError::Runtime {
            class_name: self.class_name.clone(),
            phase,
            source,
        }
    }
}

#[async_trait]
impl EngineConnector for ConnectorAdapter {
    fn set_input_parameters(&mut self, inputs: HashMap<String, EngineInput>) {
        let mut parameters = HashMap::with_capacity(inputs.len());

        for (key, input) in inputs {
            match input {
                EngineInput::ApiAccessor(accessor) if key == API_ACCESSOR_KEY => {
                    self.connector.set_api_accessor(accessor);
                }
                EngineInput::ExecutionContext(context) if key == EXECUTION_CONTEXT_KEY => {
                    self.connector.set_execution_context(context);
                }
                EngineInput::Parameter(value) if key == EXECUTION_CONTEXT_KEY => {
                    match serde_json::from_value::<EngineExecutionContext>(value) {
                        Ok(context) => self.connector.set_execution_context(context),
                        Err(e) => warn!(
                            class_name = %self.class_name,
                            error = %e,
                            "Ignoring malformed execution context"
                        ),
                    }
                }
                other if key == API_ACCESSOR_KEY || key == EXECUTION_CONTEXT_KEY => {
                    warn!(
                        class_name = %self.class_name,
                        key = %key,
                        input = ?other,
                        "Ignoring reserved input with unexpected value"
                    );
                }
                EngineInput::Parameter(value) => {
                    parameters.insert(key, value);
                }
                other => {
                    warn!(
                        class_name = %self.class_name,
                        key = %key,
                        input = ?other,
                        "Ignoring engine object under a non-reserved key"
                    );
                }
            }
        }

        self.connector.set_input_parameters(parameters);
    }

    fn validate(&self) -> Result<(), ExecutionError> {
        self.connector
            .validate_input_parameters()
            .map_err(|e| ExecutionError::Validation {
                class_name: self.class_name.clone(),
                problems: e.problems,
            })
    }

    async fn connect(&mut self) -> Result<(), ExecutionError> {
        match self.connector.connect().await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.runtime_error(ExecutionPhase::Connect, e)),
        }
    }

    async fn execute(&mut self) -> Result<ConnectorOutputs, ExecutionError> {
        match self.connector.execute().await {
            Ok(outputs) => Ok(outputs),
            Err(e) => Err(self.runtime_error(ExecutionPhase::Execute, e)),
        }
    }

    async fn disconnect(&mut self) -> Result<(), ExecutionError> {
        match self.connector.disconnect().await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.runtime_error(ExecutionPhase::Disconnect, e)),
        }
    }
}
