// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engine-provided execution context.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved input key carrying the [`ApiAccessor`].
pub const API_ACCESSOR_KEY: &str = "connectorApiAccessor";

/// Reserved input key carrying the [`EngineExecutionContext`].
pub const EXECUTION_CONTEXT_KEY: &str = "engineExecutionContext";

/// Where in the process the connector is being executed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineExecutionContext {
    /// Process definition the connector belongs to.
    pub process_definition_id: i64,
    /// Process instance running the connector.
    pub process_instance_id: Option<i64>,
    /// Root of the process instance tree (differs for call activities).
    pub root_process_instance_id: Option<i64>,
    /// Activity instance the connector is attached to, if any.
    pub activity_instance_id: Option<i64>,
    /// User the current task is assigned to, if any.
    pub task_assignee_id: Option<i64>,
}

/// Access to the engine APIs on behalf of a running connector.
pub trait ApiAccessor: Send + Sync + fmt::Debug {
    /// Tenant the connector runs in.
    fn tenant_id(&self) -> i64;

    /// Base URL of the engine API.
    fn engine_url(&self) -> &str;
}

/// A value in the engine-side input map.
///
/// Plain parameters are JSON values; the two reserved keys carry typed
/// engine objects that the adapter injects through the richer lifecycle.
#[derive(Clone)]
pub enum EngineInput {
    /// Ordinary input parameter.
    Parameter(Value),
    /// Engine API accessor (expected under [`API_ACCESSOR_KEY`]).
    ApiAccessor(Arc<dyn ApiAccessor>),
    /// Execution context (expected under [`EXECUTION_CONTEXT_KEY`]).
    ExecutionContext(EngineExecutionContext),
}

impl fmt::Debug for EngineInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineInput::Parameter(value) => f.debug_tuple("Parameter").field(value).finish(),
            EngineInput::ApiAccessor(accessor) => {
                f.debug_tuple("ApiAccessor").field(accessor).finish()
            }
            EngineInput::ExecutionContext(context) => {
                f.debug_tuple("ExecutionContext").field(context).finish()
            }
        }
    }
}

impl From<Value> for EngineInput {
    fn from(value: Value) -> Self {
        EngineInput::Parameter(value)
    }
}

impl From<EngineExecutionContext> for EngineInput {
    fn from(context: EngineExecutionContext) -> Self {
        EngineInput::ExecutionContext(context)
    }
}
