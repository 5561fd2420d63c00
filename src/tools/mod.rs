//! # Tools
//!
//! What the language model can call, and how each call is answered.
//!
//! ```text
//! ToolInvocation ──► ToolRouter::classify ──► Specialized ──► gds / render
//!                                         └─► PassThrough ──► QueryPassThrough
//!                          │
//!                          ▼
//!                     ToolOutcome (same correlation id, success xor failure)
//! ```

pub mod catalog;
pub mod passthrough;
pub mod router;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{Error, Result};

pub use catalog::{ToolDeclaration, sanitize_schema, specialized_declarations};
pub use passthrough::{QueryPassThrough, StorePassThrough};
pub use router::{SpecializedTool, ToolRoute, ToolRouter};

// ============================================================================
// Invocation / outcome
// ============================================================================

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Correlation id, echoed on the outcome.
    pub id: String,
    pub name: String,
    /// JSON object of arguments.
    #[serde(default)]
    pub arguments: JsonValue,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: JsonValue) -> Self {
        Self { id: id.into(), name: name.into(), arguments }
    }
}

/// Category of a failed tool call, as reported to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    InvalidWeight,
    Projection,
    UnknownNode,
    NoPath,
    Render,
    TurnLimitExceeded,
    InvalidArgument,
    Cancelled,
    Storage,
    Internal,
}

/// Why a tool call did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ToolFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl From<&Error> for ToolFailure {
    fn from(err: &Error) -> Self {
        let kind = match err {
            Error::NotFound(_) => FailureKind::NotFound,
            Error::InvalidWeight { .. } => FailureKind::InvalidWeight,
            Error::Projection(_) => FailureKind::Projection,
            Error::UnknownNode { .. } => FailureKind::UnknownNode,
            Error::NoPath { .. } => FailureKind::NoPath,
            Error::Render(_) => FailureKind::Render,
            Error::TurnLimitExceeded => FailureKind::TurnLimitExceeded,
            Error::InvalidArgument(_) | Error::Json(_) => FailureKind::InvalidArgument,
            Error::Cancelled => FailureKind::Cancelled,
            Error::Storage(_) => FailureKind::Storage,
            _ => FailureKind::Internal,
        };
        Self::new(kind, err.to_string())
    }
}

/// Lifecycle of one invocation.
///
/// ```text
/// Received ──► Validated ──► Dispatched ──► Succeeded
///    │             │              └───────► Failed
///    └─────────────┴──────────────────────► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Received,
    Validated,
    Dispatched,
    Succeeded,
    Failed,
}

impl InvocationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, InvocationState::Succeeded | InvocationState::Failed)
    }

    pub fn can_advance_to(self, next: InvocationState) -> bool {
        use InvocationState::*;
        matches!(
            (self, next),
            (Received, Validated)
                | (Received, Failed)
                | (Validated, Dispatched)
                | (Validated, Failed)
                | (Dispatched, Succeeded)
                | (Dispatched, Failed)
        )
    }

    /// Move to `next`, refusing any transition outside the lifecycle.
    pub fn advance(&mut self, next: InvocationState) -> Result<()> {
        if !self.can_advance_to(next) {
            return Err(Error::InvalidArgument(format!(
                "invalid invocation transition {self:?} -> {next:?}"
            )));
        }
        *self = next;
        Ok(())
    }
}

/// Answer to exactly one [`ToolInvocation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub correlation_id: String,
    pub tool: String,
    pub result: std::result::Result<JsonValue, ToolFailure>,
    /// Terminal state the invocation reached.
    pub state: InvocationState,
}

impl ToolOutcome {
    pub fn success(invocation: &ToolInvocation, payload: JsonValue) -> Self {
        Self {
            correlation_id: invocation.id.clone(),
            tool: invocation.name.clone(),
            result: Ok(payload),
            state: InvocationState::Succeeded,
        }
    }

    pub fn failure(invocation: &ToolInvocation, failure: ToolFailure) -> Self {
        Self {
            correlation_id: invocation.id.clone(),
            tool: invocation.name.clone(),
            result: Err(failure),
            state: InvocationState::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.result.as_ref().err().map(|f| f.kind)
    }

    /// JSON the model sees for this outcome.
    pub fn to_model_payload(&self) -> JsonValue {
        match &self.result {
            Ok(payload) => serde_json::json!({ "status": "ok", "result": payload }),
            Err(failure) => serde_json::json!({
                "status": "error",
                "kind": failure.kind,
                "message": failure.message,
            }),
        }
    }
}
