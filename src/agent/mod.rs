//! # Agent
//!
//! The conversation side: the language-model boundary, user confirmation
//! of writes, and the bounded loop that ties them to the tool router.

pub mod conversation;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::tools::{ToolDeclaration, ToolInvocation, ToolOutcome};

pub use conversation::{Answer, ConversationLoop};

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User { content: String },
    Assistant { content: String },
    /// Calls requested by the model in one turn, in order.
    ToolCalls { calls: Vec<ToolInvocation> },
    ToolResult { outcome: ToolOutcome },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant { content: content.into() }
    }
}

/// What the model produced for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelReply {
    Text(String),
    ToolCalls(Vec<ToolInvocation>),
}

/// The language-model client.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Next reply given the full history and the callable tools.
    ///
    /// Transport failures should be reported as `Error::Model`.
    async fn respond(&self, history: &[Message], tools: &[ToolDeclaration]) -> Result<ModelReply>;
}

/// Asks the user before a graph-modifying tool runs.
#[async_trait]
pub trait Confirmation: Send + Sync {
    async fn confirm(&self, invocation: &ToolInvocation) -> bool;
}

/// Approves everything. For unattended use and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl Confirmation for AutoApprove {
    async fn confirm(&self, _invocation: &ToolInvocation) -> bool {
        true
    }
}

/// Refuses everything: a read-only session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnly;

#[async_trait]
impl Confirmation for ReadOnly {
    async fn confirm(&self, _invocation: &ToolInvocation) -> bool {
        false
    }
}
