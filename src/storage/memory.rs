//! In-memory graph store.
//!
//! This is the reference implementation of `GraphStore`.
//! It uses simple maps protected by RwLock.
//!
//! ## Limitations
//!
//! - **No query language**: `execute_raw()` is not supported. Generic
//!   Cypher pass-through needs a real Neo4j client.
//! - **Per-collection locks**: multi-step writes are not atomic. Fine for
//!   fixtures and read-heavy agent sessions.
//!
//! Use this store for:
//! - Testing projection, path and routing logic without a database
//! - Embedding a small, static topology in an application

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::*;
use crate::{Error, Result};
use super::GraphStore;

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory property graph storage.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    nodes: RwLock<HashMap<NodeId, Node>>,
    /// Ordered so scans come back in ascending id order.
    relationships: RwLock<BTreeMap<RelId, Relationship>>,
    /// label → node IDs (poor man's label index)
    label_index: RwLock<HashMap<String, Vec<NodeId>>>,
    /// Every relationship type ever created.
    rel_type_tokens: RwLock<BTreeSet<String>>,
    open: AtomicBool,
    next_node_id: AtomicU64,
    next_rel_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                nodes: RwLock::new(HashMap::new()),
                relationships: RwLock::new(BTreeMap::new()),
                label_index: RwLock::new(HashMap::new()),
                rel_type_tokens: RwLock::new(BTreeSet::new()),
                open: AtomicBool::new(true),
                next_node_id: AtomicU64::new(1),
                next_rel_id: AtomicU64::new(1),
            }),
        }
    }

    /// Delete a relationship. Returns true if it existed.
    /// Its type stays registered.
    pub fn delete_relationship(&self, id: RelId) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.inner.relationships.write().remove(&id).is_some())
    }

    /// Set a property on a relationship (upsert).
    pub fn set_relationship_property(&self, id: RelId, key: &str, val: Value) -> Result<()> {
        self.ensure_open()?;
        let mut rels = self.inner.relationships.write();
        let rel = rels.get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Relationship {id}")))?;
        rel.properties.insert(key.to_string(), val);
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::Unavailable("memory store has been shut down".into()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// GraphStore impl
// ============================================================================

#[async_trait]
impl GraphStore for MemoryStore {
    async fn shutdown(&self) -> Result<()> {
        self.inner.open.store(false, Ordering::Release);
        Ok(())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    async fn create_node(&self, labels: &[&str], props: PropertyMap) -> Result<NodeId> {
        self.ensure_open()?;
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        let node = Node {
            id,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            properties: props,
        };

        {
            let mut idx = self.inner.label_index.write();
            for label in &node.labels {
                idx.entry(label.clone()).or_default().push(id);
            }
        }

        self.inner.nodes.write().insert(id, node);
        Ok(id)
    }

    async fn create_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId> {
        self.ensure_open()?;
        {
            let nodes = self.inner.nodes.read();
            if !nodes.contains_key(&src) {
                return Err(Error::NotFound(format!("Source node {src}")));
            }
            if !nodes.contains_key(&dst) {
                return Err(Error::NotFound(format!("Target node {dst}")));
            }
        }

        let id = RelId(self.inner.next_rel_id.fetch_add(1, Ordering::Relaxed));
        let rel = Relationship {
            id,
            src,
            dst,
            rel_type: rel_type.to_string(),
            properties: props,
        };

        self.inner.relationships.write().insert(id, rel);
        self.inner.rel_type_tokens.write().insert(rel_type.to_string());
        Ok(id)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    async fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        self.ensure_open()?;
        Ok(self.inner.nodes.read().get(&id).cloned())
    }

    async fn get_nodes(&self, ids: &[NodeId]) -> Result<Vec<Node>> {
        self.ensure_open()?;
        let nodes = self.inner.nodes.read();
        Ok(ids.iter().filter_map(|id| nodes.get(id).cloned()).collect())
    }

    async fn nodes_by_label(&self, label: &str) -> Result<Vec<Node>> {
        self.ensure_open()?;
        let idx = self.inner.label_index.read();
        let nodes = self.inner.nodes.read();

        let ids = idx.get(label).cloned().unwrap_or_default();
        Ok(ids.iter().filter_map(|id| nodes.get(id).cloned()).collect())
    }

    async fn relationships_by_type(
        &self,
        rel_type: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Relationship>> {
        self.ensure_open()?;
        let rels = self.inner.relationships.read();
        Ok(rels.values()
            .filter(|r| r.rel_type == rel_type)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    // ========================================================================
    // Schema introspection
    // ========================================================================

    async fn node_count(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.inner.nodes.read().len() as u64)
    }

    async fn relationship_count(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.inner.relationships.read().len() as u64)
    }

    async fn labels(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut labels: Vec<String> = self.inner.label_index.read()
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(label, _)| label.clone())
            .collect();
        labels.sort();
        Ok(labels)
    }

    async fn relationship_types(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.inner.rel_type_tokens.read().iter().cloned().collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
