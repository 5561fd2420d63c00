//! Named weighted projections and the catalog that holds them.
//!
//! ```text
//! relationships_by_type(T) ──► weights from property P ──► Projection
//!                                                         │
//!        ProjectionCatalog["netgraph.T.P"] ◄── swap-in ───┘
//! ```
//!
//! A projection is only visible in the catalog once it is complete.
//! Rebuilding under the same name replaces the old entry in one write.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use hashbrown::{HashMap as FastMap, HashSet as FastSet};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{Node, NodeId, Relationship};
use crate::storage::GraphStore;
use crate::{Error, Result};
use super::discovery::{describe, ensure_type_exists};

// ============================================================================
// Orientation
// ============================================================================

/// How stored relationship direction maps to traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// As stored: `(a)-[r]->(b)` is traversable from a to b only.
    #[default]
    Natural,
    /// Against the stored direction.
    Reverse,
    /// Both ways.
    Undirected,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Natural => "natural",
            Orientation::Reverse => "reverse",
            Orientation::Undirected => "undirected",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "natural" => Ok(Orientation::Natural),
            "reverse" => Ok(Orientation::Reverse),
            "undirected" => Ok(Orientation::Undirected),
            other => Err(Error::InvalidArgument(format!(
                "unknown orientation '{other}' (expected natural, reverse or undirected)"
            ))),
        }
    }
}

// ============================================================================
// Projection
// ============================================================================

/// A traversable edge of a projection. `source`/`target` index into
/// `Projection::nodes` and already account for orientation.
#[derive(Debug, Clone)]
pub struct ProjectedEdge {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
    pub relationship: Relationship,
}

/// An in-memory weighted view over one relationship type.
#[derive(Debug, Clone)]
pub struct Projection {
    pub name: String,
    pub relationship_type: String,
    pub weight_property: String,
    pub orientation: Orientation,
    /// Node identifier (`node_key` value) and the node itself.
    pub nodes: Vec<(String, Node)>,
    pub edges: Vec<ProjectedEdge>,
    /// Outgoing edge indices per node, sorted by (weight, target, edge).
    adjacency: Vec<Vec<usize>>,
    index: FastMap<String, usize>,
}

impl Projection {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Stored relationships projected (undirected ones count once).
    pub fn relationship_count(&self) -> usize {
        match self.orientation {
            Orientation::Undirected => self.edges.len() / 2,
            _ => self.edges.len(),
        }
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Outgoing edges of a node in relaxation order, with their indices.
    pub fn outgoing_indexed(&self, node: usize) -> impl Iterator<Item = (usize, &ProjectedEdge)> {
        self.adjacency[node].iter().map(move |&e| (e, &self.edges[e]))
    }

    pub fn info(&self) -> ProjectionInfo {
        ProjectionInfo {
            name: self.name.clone(),
            relationship_type: self.relationship_type.clone(),
            weight_property: self.weight_property.clone(),
            orientation: self.orientation,
            node_count: self.node_count(),
            relationship_count: self.relationship_count(),
        }
    }
}

/// Summary returned to callers after a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionInfo {
    pub name: String,
    pub relationship_type: String,
    pub weight_property: String,
    pub orientation: Orientation,
    pub node_count: usize,
    pub relationship_count: usize,
}

/// Deterministic projection name for a (type, property, orientation) triple.
pub fn projection_name(prefix: &str, rel_type: &str, weight: &str, orientation: Orientation) -> String {
    match orientation {
        Orientation::Natural => format!("{prefix}.{rel_type}.{weight}"),
        other => format!("{prefix}.{rel_type}.{weight}.{other}"),
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Projections currently alive for one conversation.
#[derive(Debug, Default)]
pub struct ProjectionCatalog {
    entries: RwLock<HashMap<String, Arc<Projection>>>,
}

impl ProjectionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Projection>> {
        self.entries.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Insert or replace. Returns true if an older projection was replaced.
    pub fn insert(&self, projection: Projection) -> bool {
        let name = projection.name.clone();
        self.entries.write().insert(name, Arc::new(projection)).is_some()
    }

    /// Drop a projection. Returns true if it existed.
    pub fn drop_projection(&self, name: &str) -> bool {
        let removed = self.entries.write().remove(name).is_some();
        if removed {
            debug!(projection = name, "projection dropped");
        }
        removed
    }

    /// Drop every projection, returning their names.
    pub fn clear(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.write().drain().map(|(k, _)| k).collect();
        names.sort();
        names
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Drops its projection from the catalog when it goes out of scope,
/// whether the work in between succeeded or not.
pub struct ProjectionGuard<'a> {
    catalog: &'a ProjectionCatalog,
    name: String,
}

impl<'a> ProjectionGuard<'a> {
    pub fn new(catalog: &'a ProjectionCatalog, name: impl Into<String>) -> Self {
        Self { catalog, name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ProjectionGuard<'_> {
    fn drop(&mut self) {
        self.catalog.drop_projection(&self.name);
    }
}

// ============================================================================
// Builder
// ============================================================================

/// What to project.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionRequest {
    pub relationship_type: String,
    pub weight_property: String,
    pub orientation: Orientation,
}

/// Builds projections from live store data into a catalog.
#[derive(Debug, Clone)]
pub struct ProjectionBuilder {
    pub prefix: String,
    pub node_key: String,
    pub node_label: Option<String>,
    pub default_weight: f64,
    pub discovery_sample: Option<usize>,
}

impl ProjectionBuilder {
    pub fn from_config(config: &crate::AgentConfig) -> Self {
        Self {
            prefix: config.projection_prefix.clone(),
            node_key: config.node_key.clone(),
            node_label: config.node_label.clone(),
            default_weight: config.default_weight,
            discovery_sample: config.discovery_sample,
        }
    }

    pub fn name_for(&self, request: &ProjectionRequest) -> String {
        projection_name(&self.prefix, &request.relationship_type, &request.weight_property, request.orientation)
    }

    /// Build a projection and register it. Safe to repeat: an existing
    /// projection of the same name is replaced only after the new one is
    /// fully built.
    pub async fn build<S: GraphStore + ?Sized>(
        &self,
        store: &S,
        catalog: &ProjectionCatalog,
        request: &ProjectionRequest,
    ) -> Result<ProjectionInfo> {
        let projection = self.materialize(store, request).await?;
        let info = projection.info();
        let replaced = catalog.insert(projection);
        info!(
            projection = %info.name,
            nodes = info.node_count,
            relationships = info.relationship_count,
            replaced,
            "projection built"
        );
        Ok(info)
    }

    /// Build without registering.
    pub async fn materialize<S: GraphStore + ?Sized>(
        &self,
        store: &S,
        request: &ProjectionRequest,
    ) -> Result<Projection> {
        let rel_type = request.relationship_type.as_str();
        let weight_property = request.weight_property.as_str();

        ensure_type_exists(store, rel_type).await?;
        let rels = store.relationships_by_type(rel_type, None).await?;
        if rels.is_empty() {
            return Err(Error::Projection(format!(
                "relationship type '{rel_type}' has no instances"
            )));
        }

        // Validate against the same sample discovery would report.
        let sample_len = self.discovery_sample.unwrap_or(rels.len()).min(rels.len());
        let descriptor = describe(rel_type, &rels[..sample_len]);
        if !descriptor.has(weight_property) {
            return Err(Error::InvalidWeight {
                property: weight_property.to_string(),
                relationship_type: rel_type.to_string(),
                available: descriptor.numeric_properties.to_vec(),
            });
        }

        let mut weights = Vec::with_capacity(rels.len());
        for rel in &rels {
            let weight = match rel.get(weight_property) {
                None => self.default_weight,
                Some(v) => v.as_float().ok_or_else(|| Error::Projection(format!(
                    "relationship {} has non-numeric {weight_property} = {v}", rel.id
                )))?,
            };
            if !(weight >= 0.0) || !weight.is_finite() {
                return Err(Error::Projection(format!(
                    "relationship {} has unusable weight {weight_property} = {weight}", rel.id
                )));
            }
            weights.push(weight);
        }

        // Node table: labelled nodes first, then any endpoint not yet seen.
        let mut node_ids: Vec<NodeId> = Vec::new();
        let mut seen: FastSet<NodeId> = FastSet::new();
        if let Some(label) = &self.node_label {
            let mut labelled: Vec<NodeId> = store.nodes_by_label(label).await?
                .into_iter()
                .map(|n| n.id)
                .collect();
            labelled.sort();
            for id in labelled {
                if seen.insert(id) {
                    node_ids.push(id);
                }
            }
        }
        for rel in &rels {
            for id in [rel.src, rel.dst] {
                if seen.insert(id) {
                    node_ids.push(id);
                }
            }
        }
        let fetched = store.get_nodes(&node_ids).await?;
        let by_id: HashMap<NodeId, Node> = fetched.into_iter().map(|n| (n.id, n)).collect();

        let mut nodes: Vec<(String, Node)> = Vec::with_capacity(node_ids.len());
        let mut index: FastMap<String, usize> = FastMap::with_capacity(node_ids.len());
        let mut position: HashMap<NodeId, usize> = HashMap::with_capacity(node_ids.len());
        for id in &node_ids {
            let node = by_id.get(id).cloned().ok_or_else(|| {
                Error::Projection(format!("relationship endpoint {id} is missing from the store"))
            })?;
            let key = node.identifier(&self.node_key);
            if index.contains_key(&key) {
                return Err(Error::Projection(format!(
                    "node identifier '{key}' is not unique under key '{}'", self.node_key
                )));
            }
            index.insert(key.clone(), nodes.len());
            position.insert(*id, nodes.len());
            nodes.push((key, node));
        }

        let mut edges = Vec::with_capacity(rels.len() * 2);
        for (rel, weight) in rels.into_iter().zip(weights) {
            let (src, dst) = (position[&rel.src], position[&rel.dst]);
            match request.orientation {
                Orientation::Natural => edges.push(ProjectedEdge { source: src, target: dst, weight, relationship: rel }),
                Orientation::Reverse => edges.push(ProjectedEdge { source: dst, target: src, weight, relationship: rel }),
                Orientation::Undirected => {
                    edges.push(ProjectedEdge { source: src, target: dst, weight, relationship: rel.clone() });
                    edges.push(ProjectedEdge { source: dst, target: src, weight, relationship: rel });
                }
            }
        }

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        for (i, edge) in edges.iter().enumerate() {
            adjacency[edge.source].push(i);
        }
        for out in &mut adjacency {
            out.sort_by(|&a, &b| {
                edges[a].weight.total_cmp(&edges[b].weight)
                    .then(edges[a].target.cmp(&edges[b].target))
                    .then(a.cmp(&b))
            });
        }

        Ok(Projection {
            name: self.name_for(request),
            relationship_type: rel_type.to_string(),
            weight_property: weight_property.to_string(),
            orientation: request.orientation,
            nodes,
            edges,
            adjacency,
            index,
        })
    }
}
