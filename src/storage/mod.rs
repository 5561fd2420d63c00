//! # Graph Store Boundary
//!
//! The contract between the agent core and whatever holds the live
//! topology. The core only relies on the success/failure behaviour of
//! these calls, never on their transport.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory reference store for tests and embedding |
//!
//! A Neo4j client lives outside this crate and implements the same trait.

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::{Error, Result};

pub use memory::MemoryStore;

// ============================================================================
// Access mode
// ============================================================================

/// Whether a raw query may mutate the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    Read,
    Write,
}

// ============================================================================
// Raw query rows
// ============================================================================

/// Result of a raw query forwarded to the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<HashMap<String, Value>>,
}

// ============================================================================
// GraphStore Trait
// ============================================================================

/// The graph store contract.
///
/// Stores that lose their connection must answer with
/// `Error::Unavailable`; that is the one failure the agent does not turn
/// into a tool result.
#[async_trait]
pub trait GraphStore: Send + Sync + 'static {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Close the store. Later calls fail with `Error::Unavailable`.
    async fn shutdown(&self) -> Result<()>;

    // ========================================================================
    // Writes (used by collectors and test fixtures)
    // ========================================================================

    /// Create a node with the given labels and properties.
    async fn create_node(&self, labels: &[&str], props: PropertyMap) -> Result<NodeId>;

    /// Create a relationship between two existing nodes.
    async fn create_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId>;

    // ========================================================================
    // Reads
    // ========================================================================

    /// Get a node by ID. Returns None if not found.
    async fn get_node(&self, id: NodeId) -> Result<Option<Node>>;

    /// Fetch several nodes at once. Missing ids are skipped.
    ///
    /// Default falls back to sequential `get_node` calls.
    async fn get_nodes(&self, ids: &[NodeId]) -> Result<Vec<Node>> {
        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = self.get_node(*id).await? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    /// Find all nodes with a given label.
    async fn nodes_by_label(&self, label: &str) -> Result<Vec<Node>>;

    /// All relationships of a type in ascending id order, at most `limit`.
    async fn relationships_by_type(
        &self,
        rel_type: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Relationship>>;

    // ========================================================================
    // Schema introspection
    // ========================================================================

    /// Total number of nodes.
    async fn node_count(&self) -> Result<u64>;

    /// Total number of relationships.
    async fn relationship_count(&self) -> Result<u64>;

    /// All distinct labels in the graph, sorted.
    async fn labels(&self) -> Result<Vec<String>>;

    /// All relationship types known to the graph, sorted.
    ///
    /// Like Neo4j's token store, a type stays known after its last
    /// instance is deleted.
    async fn relationship_types(&self) -> Result<Vec<String>>;

    // ========================================================================
    // Escape hatch
    // ========================================================================

    /// Pass-through for store-native queries (Cypher on Neo4j).
    ///
    /// Default: not supported.
    async fn execute_raw(
        &self,
        _query: &str,
        _params: PropertyMap,
        _mode: AccessMode,
    ) -> Result<QueryRows> {
        Err(Error::Storage("raw query execution not supported".into()))
    }
}
