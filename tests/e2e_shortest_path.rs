//! End-to-end tests for discovery -> projection -> Dijkstra through the router.
//!
//! Each test drives tool invocations against a `MemoryStore` topology, the
//! way the conversation loop would.

use std::sync::Arc;

use netgraph_agent::gds::{dijkstra, ProjectionBuilder, ProjectionRequest};
use netgraph_agent::{
    AgentConfig, FailureKind, GraphStore, MemoryStore, NodeId, Orientation, PropertyMap,
    ToolInvocation, ToolRouter, Value,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Helpers
// ============================================================================

async fn router_named(store: &MemoryStore, name: &str) -> NodeId {
    let mut props = PropertyMap::new();
    props.insert("name".into(), Value::from(name));
    store.create_node(&["PROD_ROUTER"], props).await.unwrap()
}

async fn link(store: &MemoryStore, a: NodeId, b: NodeId, rel_type: &str, props: &[(&str, Value)]) {
    let props: PropertyMap = props.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
    store.create_relationship(a, b, rel_type, props).await.unwrap();
}

/// R1 -[10]-> R2 -[5]-> R3 and a direct R1 -[20]-> R3, weighted by `distance`.
async fn routing_triangle() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    let r1 = router_named(&store, "R1").await;
    let r2 = router_named(&store, "R2").await;
    let r3 = router_named(&store, "R3").await;
    link(&store, r1, r2, "ROUTING_LINK", &[("distance", Value::Int(10))]).await;
    link(&store, r2, r3, "ROUTING_LINK", &[("distance", Value::Int(5))]).await;
    link(&store, r1, r3, "ROUTING_LINK", &[("distance", Value::Int(20))]).await;
    Arc::new(store)
}

fn call(id: &str, name: &str, args: serde_json::Value) -> ToolInvocation {
    ToolInvocation::new(id, name, args)
}

// ============================================================================
// 1. The routing triangle
// ============================================================================

#[tokio::test]
async fn test_two_hop_route_beats_direct_link() {
    let router = ToolRouter::new(routing_triangle().await, AgentConfig::default());

    let outcome = router
        .dispatch(&call("1", "find_shortest_path", json!({
            "start_node": "R1",
            "end_node": "R3",
            "relationship_type": "ROUTING_LINK",
            "weight_property": "distance",
        })))
        .await
        .unwrap();

    let payload = outcome.result.unwrap();
    assert_eq!(payload["nodes"], json!(["R1", "R2", "R3"]));
    assert_eq!(payload["total_cost"], json!(15.0));
    assert_eq!(payload["projection"], "netgraph.ROUTING_LINK.distance");

    let path = router.path(payload["path_id"].as_str().unwrap()).unwrap();
    assert_eq!(path.hops.len(), 2);
    assert!(path.is_consistent());
}

#[tokio::test]
async fn test_weight_is_discovered_when_not_named() {
    let router = ToolRouter::new(routing_triangle().await, AgentConfig::default());

    // igp_metric (the configured preference) is absent, so the first
    // discovered numeric property is used.
    let outcome = router
        .dispatch(&call("1", "discover_weight_properties", json!({ "relationship_type": "ROUTING_LINK" })))
        .await
        .unwrap();
    let payload = outcome.result.unwrap();
    assert_eq!(payload["numeric_properties"], json!(["distance"]));
    assert_eq!(payload["suggested"], "distance");

    let outcome = router
        .dispatch(&call("2", "find_shortest_path", json!({
            "start_node": "R1", "end_node": "R3", "relationship_type": "ROUTING_LINK",
        })))
        .await
        .unwrap();
    assert_eq!(outcome.result.unwrap()["total_cost"], json!(15.0));
}

#[tokio::test]
async fn test_same_source_and_destination() {
    let router = ToolRouter::new(routing_triangle().await, AgentConfig::default());
    let outcome = router
        .dispatch(&call("1", "find_shortest_path", json!({
            "start_node": "R2", "end_node": "R2",
            "relationship_type": "ROUTING_LINK", "weight_property": "distance",
        })))
        .await
        .unwrap();

    let payload = outcome.result.unwrap();
    assert_eq!(payload["nodes"], json!(["R2"]));
    assert_eq!(payload["hops"], 0);
    assert_eq!(payload["total_cost"], json!(0.0));
}

// ============================================================================
// 2. Failures become outcomes, and never leak projections
// ============================================================================

#[tokio::test]
async fn test_failures_release_projection() {
    let router = ToolRouter::new(routing_triangle().await, AgentConfig::default());

    let cases = [
        (json!({ "start_node": "R3", "end_node": "R1" }), FailureKind::NoPath),
        (json!({ "start_node": "R1", "end_node": "R42" }), FailureKind::UnknownNode),
    ];
    for (mut args, expected) in cases {
        args["relationship_type"] = json!("ROUTING_LINK");
        args["weight_property"] = json!("distance");
        let outcome = router.dispatch(&call("x", "find_shortest_path", args)).await.unwrap();
        assert_eq!(outcome.failure_kind(), Some(expected));
        assert_eq!(router.projections().names(), Vec::<String>::new());
    }
}

#[tokio::test]
async fn test_unknown_weight_lists_alternatives() {
    let router = ToolRouter::new(routing_triangle().await, AgentConfig::default());
    let outcome = router
        .dispatch(&call("1", "build_projection", json!({
            "relationship_type": "ROUTING_LINK", "weight_property": "latency",
        })))
        .await
        .unwrap();

    let failure = outcome.result.unwrap_err();
    assert_eq!(failure.kind, FailureKind::InvalidWeight);
    assert!(failure.message.contains("distance"));
    assert!(router.projections().is_empty());
}

#[tokio::test]
async fn test_unknown_relationship_type() {
    let router = ToolRouter::new(routing_triangle().await, AgentConfig::default());
    let outcome = router
        .dispatch(&call("1", "discover_weight_properties", json!({ "relationship_type": "PEERS_WITH" })))
        .await
        .unwrap();
    assert_eq!(outcome.failure_kind(), Some(FailureKind::NotFound));
}

#[tokio::test]
async fn test_type_without_numeric_properties() {
    let store = MemoryStore::new();
    let a = router_named(&store, "R1").await;
    let b = router_named(&store, "R2").await;
    link(&store, a, b, "CONNECTED_TO", &[("state", Value::from("up")), ("delete", Value::Bool(false))]).await;
    let router = ToolRouter::new(Arc::new(store), AgentConfig::default());

    let outcome = router
        .dispatch(&call("1", "discover_weight_properties", json!({ "relationship_type": "CONNECTED_TO" })))
        .await
        .unwrap();
    let payload = outcome.result.unwrap();
    assert_eq!(payload["numeric_properties"], json!([]));
    assert_eq!(payload["suggested"], serde_json::Value::Null);
}

// ============================================================================
// 3. Projection lifecycle
// ============================================================================

#[tokio::test]
async fn test_repeated_builds_are_idempotent() {
    let router = ToolRouter::new(routing_triangle().await, AgentConfig::default());
    let args = json!({ "relationship_type": "ROUTING_LINK", "weight_property": "distance" });

    let first = router.dispatch(&call("1", "build_projection", args.clone())).await.unwrap();
    let second = router.dispatch(&call("2", "build_projection", args)).await.unwrap();

    assert_eq!(first.result.unwrap(), second.result.unwrap());
    assert_eq!(router.projections().len(), 1);
}

#[tokio::test]
async fn test_drop_projection() {
    let router = ToolRouter::new(routing_triangle().await, AgentConfig::default());
    let built = router
        .dispatch(&call("1", "build_projection", json!({
            "relationship_type": "ROUTING_LINK", "weight_property": "distance", "orientation": "undirected",
        })))
        .await
        .unwrap();
    let name = built.result.unwrap()["name"].as_str().unwrap().to_string();
    assert_eq!(name, "netgraph.ROUTING_LINK.distance.undirected");

    let dropped = router.dispatch(&call("2", "drop_projection", json!({ "name": name }))).await.unwrap();
    assert!(dropped.is_success());
    let again = router.dispatch(&call("3", "drop_projection", json!({ "name": name }))).await.unwrap();
    assert_eq!(again.failure_kind(), Some(FailureKind::NotFound));
}

#[tokio::test]
async fn test_conversations_do_not_share_projections() {
    let store = routing_triangle().await;
    let a = ToolRouter::new(Arc::clone(&store), AgentConfig::default());
    let b = ToolRouter::new(store, AgentConfig::default());

    a.dispatch(&call("1", "build_projection", json!({
        "relationship_type": "ROUTING_LINK", "weight_property": "distance",
    }))).await.unwrap();

    assert_eq!(a.projections().len(), 1);
    assert!(b.projections().is_empty());
}

// ============================================================================
// 4. Path invariants on random topologies
// ============================================================================

const INF: u64 = u64::MAX;

/// All-pairs reference distances.
fn floyd_warshall(n: usize, edges: &[(usize, usize, u64)]) -> Vec<Vec<u64>> {
    let mut d = vec![vec![INF; n]; n];
    for (i, row) in d.iter_mut().enumerate() {
        row[i] = 0;
    }
    for &(a, b, w) in edges {
        d[a][b] = d[a][b].min(w);
    }
    for k in 0..n {
        for i in 0..n {
            for j in 0..n {
                if d[i][k] != INF && d[k][j] != INF {
                    d[i][j] = d[i][j].min(d[i][k] + d[k][j]);
                }
            }
        }
    }
    d
}

fn topology() -> impl Strategy<Value = (usize, Vec<(usize, usize, u64)>)> {
    (2usize..8).prop_flat_map(|n| {
        let edge = (0..n, 0..n, 0u64..50);
        (Just(n), proptest::collection::vec(edge, 0..20))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_paths_are_consistent_and_optimal((n, edges) in topology()) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let projection = rt.block_on(async {
            let store = MemoryStore::new();
            let mut ids = Vec::new();
            for i in 0..n {
                ids.push(router_named(&store, &format!("R{i}")).await);
            }
            // Keep the type known even when the edge list is empty.
            link(&store, ids[0], ids[0], "L", &[("w", Value::Int(0))]).await;
            for &(a, b, w) in &edges {
                link(&store, ids[a], ids[b], "L", &[("w", Value::Int(w as i64))]).await;
            }
            let builder = ProjectionBuilder::from_config(&AgentConfig::default());
            builder.materialize(&store, &ProjectionRequest {
                relationship_type: "L".into(),
                weight_property: "w".into(),
                orientation: Orientation::Natural,
            }).await.unwrap()
        });

        let reference = floyd_warshall(n, &edges);
        for s in 0..n {
            for t in 0..n {
                let result = dijkstra(&projection, &format!("R{s}"), &format!("R{t}"));
                match result {
                    Ok(path) => {
                        prop_assert!(path.is_consistent());
                        prop_assert_eq!(path.nodes.len(), path.hops.len() + 1);
                        let sum: f64 = path.hops.iter().map(|h| h.weight).sum();
                        prop_assert_eq!(sum, path.total_cost);
                        prop_assert_eq!(path.total_cost, reference[s][t] as f64);
                        if s == t {
                            prop_assert!(path.hops.is_empty());
                        }
                    }
                    Err(netgraph_agent::Error::NoPath { .. }) => {
                        prop_assert_eq!(reference[s][t], INF);
                    }
                    Err(other) => {
                        prop_assert!(false, "unexpected error {}", other);
                    }
                }
            }
        }
    }
}
