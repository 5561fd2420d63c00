//! Weighted shortest path over a projection (Dijkstra).
//!
//! ## Tie-break
//!
//! Equal-cost alternatives are resolved the same way every run:
//! - the frontier pops the lowest distance first, and among equal
//!   distances the entry pushed first;
//! - a node's outgoing edges are relaxed in ascending
//!   (weight, target index, edge index) order;
//! - a node's predecessor only changes on a strictly shorter distance.
//!
//! So the path kept is the first one found at the minimal distance.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::model::{Hop, PathNode, PathResult};
use crate::{Error, Result};
use super::projection::{Projection, ProjectionCatalog};

#[derive(Debug, Clone, Copy)]
struct Frontier {
    cost: f64,
    seq: u64,
    node: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    // Reversed: BinaryHeap is a max-heap and we want the cheapest, oldest entry.
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Shortest path between two node identifiers of a registered projection.
pub fn shortest_path(
    catalog: &ProjectionCatalog,
    projection: &str,
    source: &str,
    target: &str,
) -> Result<PathResult> {
    let projection = catalog.get(projection)
        .ok_or_else(|| Error::NotFound(format!("projection '{projection}'")))?;
    dijkstra(&projection, source, target)
}

/// Shortest path inside one projection.
pub fn dijkstra(projection: &Projection, source: &str, target: &str) -> Result<PathResult> {
    let s = projection.node_index(source).ok_or_else(|| unknown(projection, source))?;
    let t = projection.node_index(target).ok_or_else(|| unknown(projection, target))?;

    if s == t {
        return Ok(PathResult::single(
            &projection.name,
            &projection.relationship_type,
            &projection.weight_property,
            path_node(projection, s),
        ));
    }

    let n = projection.node_count();
    let mut dist = vec![f64::INFINITY; n];
    let mut via: Vec<Option<usize>> = vec![None; n];
    let mut settled = vec![false; n];
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;

    dist[s] = 0.0;
    heap.push(Frontier { cost: 0.0, seq, node: s });

    while let Some(Frontier { cost, node, .. }) = heap.pop() {
        if settled[node] {
            continue;
        }
        settled[node] = true;
        if node == t {
            break;
        }

        for (edge_idx, edge) in projection.outgoing_indexed(node) {
            if settled[edge.target] {
                continue;
            }
            let candidate = cost + edge.weight;
            if candidate < dist[edge.target] {
                dist[edge.target] = candidate;
                via[edge.target] = Some(edge_idx);
                seq += 1;
                heap.push(Frontier { cost: candidate, seq, node: edge.target });
            }
        }
    }

    if !settled[t] {
        return Err(Error::NoPath {
            from: source.to_string(),
            to: target.to_string(),
        });
    }

    // Walk predecessors back to the source, then replay forwards.
    let mut edge_chain = Vec::new();
    let mut cursor = t;
    while cursor != s {
        let edge_idx = via[cursor].ok_or_else(|| Error::NoPath {
            from: source.to_string(),
            to: target.to_string(),
        })?;
        edge_chain.push(edge_idx);
        cursor = projection.edges[edge_idx].source;
    }
    edge_chain.reverse();

    let mut path = PathResult::single(
        &projection.name,
        &projection.relationship_type,
        &projection.weight_property,
        path_node(projection, s),
    );
    for edge_idx in edge_chain {
        let edge = &projection.edges[edge_idx];
        let hop = Hop {
            from: projection.nodes[edge.source].0.clone(),
            to: projection.nodes[edge.target].0.clone(),
            rel_type: edge.relationship.rel_type.clone(),
            weight: edge.weight,
            properties: edge.relationship.properties.clone(),
        };
        path.append(hop, path_node(projection, edge.target));
    }

    debug!(
        projection = %projection.name,
        source,
        target,
        hops = path.len(),
        cost = path.total_cost,
        "shortest path computed"
    );
    Ok(path)
}

fn path_node(projection: &Projection, idx: usize) -> PathNode {
    let (id, node) = &projection.nodes[idx];
    PathNode { id: id.clone(), properties: node.properties.clone() }
}

fn unknown(projection: &Projection, node: &str) -> Error {
    Error::UnknownNode {
        node: node.to_string(),
        projection: projection.name.clone(),
    }
}
