// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! BPM Connector API
//!
//! The contract a connector implementation fulfils so the engine can run it
//! during process execution.
//!
//! A connector is a user-pluggable integration unit (call a REST API, send an
//! email, query a database). Each implementation is described by a `.impl`
//! descriptor that names its class; the engine resolves that name against the
//! connectors registered with [`register_connector!`] and drives the
//! lifecycle:
//!
//! ```text
//! set_input_parameters ─► validate_input_parameters ─► connect ─► execute ─► disconnect
//! ```
//!
//! # Example
//!
//! ```ignore
//! use bpm_connector_api::{Connector, ConnectorError, ConnectorOutputs, register_connector};
//!
//! #[derive(Default)]
//! struct Echo { input: HashMap<String, Value> }
//!
//! #[async_trait::async_trait]
//! impl Connector for Echo {
//!     fn set_input_parameters(&mut self, parameters: HashMap<String, Value>) {
//!         self.input = parameters;
//!     }
//!     async fn execute(&mut self) -> Result<ConnectorOutputs, ConnectorError> {
//!         Ok(self.input.clone())
//!     }
//! }
//!
//! register_connector!("org.acme.Echo", Echo);
//! ```

#![warn(missing_docs)]

/// Client connector trait and its error types.
pub mod connector;

/// Engine-provided execution context and API accessor.
pub mod context;

/// Static registration of connector implementations.
pub mod registry;

pub use connector::{Connector, ConnectorError, ConnectorOutputs, ConnectorValidationError};
pub use context::{
    API_ACCESSOR_KEY, ApiAccessor, EXECUTION_CONTEXT_KEY, EngineExecutionContext, EngineInput,
};
pub use registry::{ConnectorFactory, ConnectorRegistration, find_registration};

#[doc(hidden)]
pub use inventory;
