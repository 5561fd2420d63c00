//! # netgraph-agent — Tool routing and path computation for a network-topology agent
//!
//! A language model answers questions about a router topology held in a
//! graph store. This crate is the part between the model and the graph:
//! it decides which tool a call goes to, builds weighted projections over
//! live relationship data, finds shortest paths, and renders them as text
//! or as device-provisioning documents.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphStore`, `LanguageModel` and `QueryPassThrough` are the only seams
//! 2. **Closed routing**: specialized tools are an enum, resolved before any side effect
//! 3. **Scoped state**: projections and paths belong to one conversation and die with its query
//! 4. **One outcome per call**: tool errors are answers, not aborts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use netgraph_agent::{Agent, AgentConfig, AutoApprove, LanguageModel};
//!
//! # async fn example(model: Arc<dyn LanguageModel>) -> netgraph_agent::Result<()> {
//! let agent = Agent::open_memory(AgentConfig::default()).await?;
//! let mut conversation = agent.conversation(model, Arc::new(AutoApprove));
//!
//! let answer = conversation.process_query("What is the best path from R1 to R3?").await?;
//! println!("{}", answer.text());
//!
//! agent.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Role |
//! |--------|------|
//! | `model` | Node, Relationship, Value, PathResult |
//! | `storage` | `GraphStore` trait and the in-memory `MemoryStore` |
//! | `gds` | Weight discovery, projections, Dijkstra |
//! | `render` | Text, provisioning and traffic-engineering documents |
//! | `tools` | Invocations, outcomes, routing, pass-through |
//! | `agent` | Model boundary and the bounded conversation loop |
//! | `config` | `AgentConfig` from TOML and `NETGRAPH_*` variables |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod gds;
pub mod render;
pub mod tools;
pub mod agent;
pub mod config;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Node, Relationship, Value, PropertyMap,
    NodeId, RelId, PathResult, PathNode, Hop,
};

// ============================================================================
// Re-exports: Storage, algorithms, tools
// ============================================================================

pub use storage::{GraphStore, MemoryStore, AccessMode, QueryRows};
pub use gds::{Orientation, ProjectionCatalog, ProjectionInfo, RelationshipDescriptor};
pub use render::{RenderMode, RenderOptions};
pub use tools::{
    ToolInvocation, ToolOutcome, ToolFailure, FailureKind, InvocationState,
    ToolRouter, ToolRoute, SpecializedTool, ToolDeclaration, QueryPassThrough,
};
pub use agent::{
    Answer, AutoApprove, Confirmation, ConversationLoop, LanguageModel, Message, ModelReply, ReadOnly,
};
pub use config::AgentConfig;

use std::sync::Arc;

// ============================================================================
// Top-level Agent handle
// ============================================================================

/// The primary entry point. An `Agent` owns the store handle for its
/// lifetime and hands out independent conversations over it.
pub struct Agent<S: GraphStore> {
    store: Arc<S>,
    config: AgentConfig,
}

impl<S: GraphStore> Agent<S> {
    /// Create an agent over an open store.
    pub fn with_store(store: S, config: AgentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store: Arc::new(store), config })
    }

    /// Start a conversation with its own router and projection catalog.
    pub fn conversation(
        &self,
        model: Arc<dyn LanguageModel>,
        confirmation: Arc<dyn Confirmation>,
    ) -> ConversationLoop<S> {
        ConversationLoop::new(self.router(), model, confirmation)
    }

    /// A fresh router, for driving tools without a model.
    pub fn router(&self) -> ToolRouter<S> {
        ToolRouter::new(Arc::clone(&self.store), self.config.clone())
    }

    /// Access the underlying store (for loading data and advanced use).
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Close the store. Conversations still holding it see `Unavailable`.
    pub async fn close(self) -> Result<()> {
        self.store.shutdown().await
    }
}

/// In-memory agent for testing and embedding.
impl Agent<MemoryStore> {
    pub async fn open_memory(config: AgentConfig) -> Result<Self> {
        Self::with_store(MemoryStore::new(), config)
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("'{property}' is not a numeric property of {relationship_type} (numeric: {available:?})")]
    InvalidWeight {
        property: String,
        relationship_type: String,
        available: Vec<String>,
    },

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Node '{node}' is not in projection {projection}")]
    UnknownNode { node: String, projection: String },

    #[error("No path from '{from}' to '{to}'")]
    NoPath { from: String, to: String },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Tool call limit exceeded for this query")]
    TurnLimitExceeded,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cancelled by user")]
    Cancelled,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the conversation can carry on after this error. Recoverable
    /// errors become tool failures; the rest end the query.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Error::Unavailable(_) | Error::Model(_) | Error::Config(_) | Error::Toml(_) | Error::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::NoPath { from: "R1".into(), to: "R2".into() }.is_recoverable());
        assert!(Error::Render("x".into()).is_recoverable());
        assert!(!Error::Unavailable("closed".into()).is_recoverable());
        assert!(!Error::Model("timeout".into()).is_recoverable());
    }

    #[tokio::test]
    async fn test_agent_rejects_bad_config() {
        let config = AgentConfig { max_tool_calls: 0, ..AgentConfig::default() };
        assert!(matches!(Agent::open_memory(config).await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_close_shuts_store() {
        let agent = Agent::open_memory(AgentConfig::default()).await.unwrap();
        let router = agent.router();
        agent.close().await.unwrap();
        let call = ToolInvocation::new("1", "discover_weight_properties", serde_json::json!({}));
        assert!(matches!(router.dispatch(&call).await, Err(Error::Unavailable(_))));
    }
}
