//! End-to-end tests for the conversation loop: model turns, the tool-call
//! limit, pass-through forwarding and write confirmation.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use netgraph_agent::tools::ToolDeclaration;
use netgraph_agent::{
    Agent, AgentConfig, Answer, AutoApprove, ConversationLoop, FailureKind, GraphStore,
    LanguageModel, MemoryStore, Message, ModelReply, PropertyMap, QueryPassThrough, ReadOnly,
    Result, ToolInvocation, ToolOutcome, ToolRouter, Value,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value as JsonValue};

// ============================================================================
// Fakes
// ============================================================================

/// Replays canned replies and records what it was shown.
#[derive(Default)]
struct ScriptedModel {
    replies: Mutex<VecDeque<ModelReply>>,
    seen_tools: Mutex<Vec<String>>,
    turns: Mutex<usize>,
}

impl ScriptedModel {
    fn new(replies: Vec<ModelReply>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies.into()), ..Default::default() })
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn respond(&self, _history: &[Message], tools: &[ToolDeclaration]) -> Result<ModelReply> {
        *self.turns.lock() += 1;
        *self.seen_tools.lock() = tools.iter().map(|t| t.name.clone()).collect();
        Ok(self.replies.lock().pop_front().unwrap_or_else(|| ModelReply::Text("no further steps".into())))
    }
}

/// Records every forwarded call verbatim.
#[derive(Default)]
struct RecordingPassThrough {
    calls: Mutex<Vec<(String, JsonValue)>>,
}

#[async_trait]
impl QueryPassThrough for RecordingPassThrough {
    async fn list_tools(&self) -> Result<Vec<ToolDeclaration>> {
        Ok(vec![
            ToolDeclaration::new("read_neo4j_cypher", "Read query", json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "params": { "anyOf": [{ "type": "null" }, { "type": "object" }] },
                },
                "$defs": {},
            })),
            // Collides with a specialized tool and must not reach the model twice.
            ToolDeclaration::new("find_shortest_path", "Shadow", json!({ "type": "object" })),
        ])
    }

    async fn call_tool(&self, name: &str, arguments: JsonValue) -> Result<JsonValue> {
        self.calls.lock().push((name.to_string(), arguments));
        Ok(json!([{ "n.name": "R1" }]))
    }
}

async fn topology() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    let mut ids = Vec::new();
    for name in ["R1", "R2", "R3"] {
        let mut props = PropertyMap::new();
        props.insert("name".into(), Value::from(name));
        ids.push(store.create_node(&["PROD_ROUTER"], props).await.unwrap());
    }
    for (a, b, metric) in [(0, 1, 10), (1, 2, 5), (0, 2, 20)] {
        let mut props = PropertyMap::new();
        props.insert("igp_metric".into(), Value::Int(metric));
        store.create_relationship(ids[a], ids[b], "PROD_ROUTING_LINK", props).await.unwrap();
    }
    Arc::new(store)
}

fn shortest(id: &str) -> ToolInvocation {
    ToolInvocation::new(id, "find_shortest_path", json!({ "start_node": "R1", "end_node": "R3" }))
}

fn outcomes(history: &[Message]) -> Vec<&ToolOutcome> {
    history.iter()
        .filter_map(|m| match m {
            Message::ToolResult { outcome } => Some(outcome),
            _ => None,
        })
        .collect()
}

// ============================================================================
// 1. Tool-call limit
// ============================================================================

#[tokio::test]
async fn test_limit_of_one_with_two_calls() {
    let config = AgentConfig { max_tool_calls: 1, ..AgentConfig::default() };
    let passthrough = Arc::new(RecordingPassThrough::default());
    let router = ToolRouter::with_passthrough(topology().await, config, Box::new(ForwardTo(Arc::clone(&passthrough))));

    let read = ToolInvocation::new("second", "read_neo4j_cypher", json!({ "query": "MATCH (n) RETURN n" }));
    let model = ScriptedModel::new(vec![ModelReply::ToolCalls(vec![shortest("first"), read])]);
    let mut convo = ConversationLoop::new(router, model.clone(), Arc::new(AutoApprove));

    let answer = convo.process_query("best path R1 to R3, then list routers").await.unwrap();

    assert!(matches!(answer, Answer::Degraded { tool_calls: 1, .. }));
    let results = outcomes(convo.history());
    assert_eq!(results.len(), 2);
    assert!(results[0].is_success());
    assert_eq!(results[1].failure_kind(), Some(FailureKind::TurnLimitExceeded));
    // The refused call never reached the pass-through.
    assert!(passthrough.calls.lock().is_empty());
    assert_eq!(*model.turns.lock(), 1);
}

#[tokio::test]
async fn test_limit_counts_across_turns() {
    let config = AgentConfig { max_tool_calls: 2, ..AgentConfig::default() };
    let model = ScriptedModel::new(vec![
        ModelReply::ToolCalls(vec![shortest("a")]),
        ModelReply::ToolCalls(vec![shortest("b")]),
        ModelReply::ToolCalls(vec![shortest("c")]),
    ]);
    let mut convo = ConversationLoop::new(ToolRouter::new(topology().await, config), model, Arc::new(AutoApprove));

    let answer = convo.process_query("q").await.unwrap();
    assert!(answer.is_degraded());
    let kinds: Vec<Option<FailureKind>> = outcomes(convo.history()).iter().map(|o| o.failure_kind()).collect();
    assert_eq!(kinds, vec![None, None, Some(FailureKind::TurnLimitExceeded)]);
}

// ============================================================================
// 2. Pass-through
// ============================================================================

/// Lets the test keep a handle on the recorder the router owns.
struct ForwardTo(Arc<RecordingPassThrough>);

#[async_trait]
impl QueryPassThrough for ForwardTo {
    async fn list_tools(&self) -> Result<Vec<ToolDeclaration>> {
        self.0.list_tools().await
    }

    async fn call_tool(&self, name: &str, arguments: JsonValue) -> Result<JsonValue> {
        self.0.call_tool(name, arguments).await
    }
}

#[tokio::test]
async fn test_pass_through_arguments_untouched() {
    let passthrough = Arc::new(RecordingPassThrough::default());
    let router = ToolRouter::with_passthrough(
        topology().await,
        AgentConfig::default(),
        Box::new(ForwardTo(Arc::clone(&passthrough))),
    );

    let args = json!({
        "query": "MATCH (r:PROD_ROUTER) WHERE r.name = $name RETURN r",
        "params": { "name": "R1", "nested": [1, 2.5, null, { "deep": true }] },
        "extra": "kept as-is",
    });
    let outcome = router.dispatch(&ToolInvocation::new("p1", "read_neo4j_cypher", args.clone())).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.correlation_id, "p1");
    assert_eq!(*passthrough.calls.lock(), vec![("read_neo4j_cypher".to_string(), args)]);
}

#[tokio::test]
async fn test_catalog_is_sanitized_and_unshadowed() {
    let passthrough = Arc::new(RecordingPassThrough::default());
    let router = ToolRouter::with_passthrough(
        topology().await,
        AgentConfig::default(),
        Box::new(ForwardTo(passthrough)),
    );

    let catalog = router.catalog().await.unwrap();
    let shortest: Vec<&ToolDeclaration> = catalog.iter().filter(|d| d.name == "find_shortest_path").collect();
    assert_eq!(shortest.len(), 1);
    assert_ne!(shortest[0].description, "Shadow");

    let read = catalog.iter().find(|d| d.name == "read_neo4j_cypher").unwrap();
    assert_eq!(read.parameters, json!({
        "type": "object",
        "properties": {
            "query": { "type": "string" },
            "params": { "type": "object" },
        },
    }));
}

// ============================================================================
// 3. Confirmation and the Agent handle
// ============================================================================

#[tokio::test]
async fn test_write_needs_confirmation() {
    let agent = Agent::open_memory(AgentConfig::default()).await.unwrap();
    let write = ToolInvocation::new("w1", "write_neo4j_cypher", json!({ "query": "CREATE (:PROD_ROUTER {name: 'R9'})" }));

    // Refused: cancelled, and the store is never asked.
    let model = ScriptedModel::new(vec![ModelReply::ToolCalls(vec![write.clone()])]);
    let mut refused = agent.conversation(model, Arc::new(ReadOnly));
    refused.process_query("add R9").await.unwrap();
    assert_eq!(outcomes(refused.history())[0].failure_kind(), Some(FailureKind::Cancelled));

    // Approved: forwarded; the memory store has no query engine.
    let model = ScriptedModel::new(vec![ModelReply::ToolCalls(vec![write])]);
    let mut approved = agent.conversation(model, Arc::new(AutoApprove));
    approved.process_query("add R9").await.unwrap();
    assert_eq!(outcomes(approved.history())[0].failure_kind(), Some(FailureKind::Storage));

    assert_eq!(agent.store().node_count().await.unwrap(), 0);
    agent.close().await.unwrap();
}

#[tokio::test]
async fn test_model_sees_specialized_tools() {
    let agent = Agent::with_store(MemoryStore::new(), AgentConfig::default()).unwrap();
    let model = ScriptedModel::new(vec![ModelReply::Text("Nothing to compute.".into())]);
    let mut convo = agent.conversation(model.clone(), Arc::new(AutoApprove));

    let answer = convo.process_query("hello").await.unwrap();
    assert_eq!(answer, Answer::Final("Nothing to compute.".into()));

    let seen = model.seen_tools.lock().clone();
    for name in [
        "discover_weight_properties", "build_projection", "drop_projection",
        "find_shortest_path", "render_path", "perform_traffic_engineering",
        "get_neo4j_schema", "read_neo4j_cypher", "write_neo4j_cypher",
    ] {
        assert!(seen.iter().any(|s| s == name), "{name} missing from catalog");
    }
}

#[tokio::test]
async fn test_closed_store_aborts_query() {
    let agent = Agent::open_memory(AgentConfig::default()).await.unwrap();
    let store = agent.store().clone();
    let discover = ToolInvocation::new("d1", "discover_weight_properties", json!({}));
    let model = ScriptedModel::new(vec![ModelReply::ToolCalls(vec![discover])]);
    let mut convo = agent.conversation(model, Arc::new(AutoApprove));

    store.shutdown().await.unwrap();
    let err = convo.process_query("anything").await.unwrap_err();
    assert!(matches!(err, netgraph_agent::Error::Unavailable(_)));
}
