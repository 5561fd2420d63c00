//! Path result: the weighted route between two nodes of a projection.

use serde::{Deserialize, Serialize};
use super::{PropertyMap, Value};

/// A node on a computed path, with the properties it carried in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    pub id: String,
    pub properties: PropertyMap,
}

impl PathNode {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// One traversed edge. `from`/`to` follow the travel direction, which for
/// reverse or undirected projections may differ from the stored direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    pub from: String,
    pub to: String,
    pub rel_type: String,
    pub weight: f64,
    pub properties: PropertyMap,
}

impl Hop {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// Result of a shortest-path computation.
///
/// `nodes` always has one more element than `hops`, hop `i` connects
/// `nodes[i]` to `nodes[i + 1]`, and `total_cost` is the sum of hop weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub projection: String,
    pub relationship_type: String,
    pub weight_property: String,
    pub nodes: Vec<PathNode>,
    pub hops: Vec<Hop>,
    pub total_cost: f64,
}

impl PathResult {
    /// The zero-length path from a node to itself.
    pub fn single(
        projection: impl Into<String>,
        relationship_type: impl Into<String>,
        weight_property: impl Into<String>,
        node: PathNode,
    ) -> Self {
        Self {
            projection: projection.into(),
            relationship_type: relationship_type.into(),
            weight_property: weight_property.into(),
            nodes: vec![node],
            hops: Vec::new(),
            total_cost: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn source(&self) -> &PathNode {
        self.nodes.first().expect("PathResult always has at least one node")
    }

    pub fn destination(&self) -> &PathNode {
        self.nodes.last().expect("PathResult always has at least one node")
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    /// Extend with a hop and the node it reaches.
    pub fn append(&mut self, hop: Hop, node: PathNode) {
        self.total_cost += hop.weight;
        self.hops.push(hop);
        self.nodes.push(node);
    }

    /// Check the structural invariants. Cost is compared with a relative
    /// tolerance because the sum is accumulated in a different order than
    /// Dijkstra's distances.
    pub fn is_consistent(&self) -> bool {
        if self.nodes.len() != self.hops.len() + 1 {
            return false;
        }
        let connected = self.hops.iter().enumerate().all(|(i, hop)| {
            hop.from == self.nodes[i].id && hop.to == self.nodes[i + 1].id
        });
        let sum: f64 = self.hops.iter().map(|h| h.weight).sum();
        let tolerance = 1e-9 * sum.abs().max(1.0);
        connected && (sum - self.total_cost).abs() <= tolerance
    }
}
