//! Generic query tools forwarded to the graph store untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::model::{PropertyMap, Value};
use crate::storage::{AccessMode, GraphStore, QueryRows};
use crate::{Error, Result};
use super::catalog::ToolDeclaration;

/// Tools served by someone other than the router: a query server, a
/// remote tool host, or the store itself.
#[async_trait]
pub trait QueryPassThrough: Send + Sync {
    /// Declarations as the provider publishes them (unsanitized).
    async fn list_tools(&self) -> Result<Vec<ToolDeclaration>>;

    /// Run a tool. Arguments arrive exactly as the model produced them.
    async fn call_tool(&self, name: &str, arguments: JsonValue) -> Result<JsonValue>;
}

pub const GET_SCHEMA: &str = "get_neo4j_schema";
pub const READ_CYPHER: &str = "read_neo4j_cypher";
pub const WRITE_CYPHER: &str = "write_neo4j_cypher";

/// Relationships or nodes inspected per type/label when describing the schema.
const SCHEMA_SAMPLE: usize = 100;

/// Schema and raw-query tools over any [`GraphStore`].
pub struct StorePassThrough<S: GraphStore> {
    store: Arc<S>,
}

impl<S: GraphStore> StorePassThrough<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn schema(&self) -> Result<JsonValue> {
        let mut labels = serde_json::Map::new();
        for label in self.store.labels().await? {
            let nodes = self.store.nodes_by_label(&label).await?;
            let props = property_types(nodes.iter().take(SCHEMA_SAMPLE).map(|n| &n.properties));
            labels.insert(label, json!({ "count": nodes.len(), "properties": props }));
        }

        let mut relationships = serde_json::Map::new();
        for rel_type in self.store.relationship_types().await? {
            let rels = self.store.relationships_by_type(&rel_type, Some(SCHEMA_SAMPLE)).await?;
            let props = property_types(rels.iter().map(|r| &r.properties));
            relationships.insert(rel_type, json!({ "sampled": rels.len(), "properties": props }));
        }

        Ok(json!({
            "node_count": self.store.node_count().await?,
            "relationship_count": self.store.relationship_count().await?,
            "labels": labels,
            "relationship_types": relationships,
        }))
    }

    async fn query(&self, arguments: JsonValue, mode: AccessMode) -> Result<JsonValue> {
        let args: CypherArgs = serde_json::from_value(arguments)
            .map_err(|e| Error::InvalidArgument(format!("cypher tool arguments: {e}")))?;
        let params: PropertyMap = match args.params {
            None | Some(JsonValue::Null) => PropertyMap::new(),
            Some(p) => serde_json::from_value(p)
                .map_err(|e| Error::InvalidArgument(format!("params must be an object: {e}")))?,
        };
        debug!(?mode, query = %args.query, "forwarding raw query");
        let rows = self.store.execute_raw(&args.query, params, mode).await?;
        Ok(rows_to_json(&rows))
    }
}

#[derive(Debug, Deserialize)]
struct CypherArgs {
    query: String,
    #[serde(default)]
    params: Option<JsonValue>,
}

#[async_trait]
impl<S: GraphStore> QueryPassThrough for StorePassThrough<S> {
    async fn list_tools(&self) -> Result<Vec<ToolDeclaration>> {
        // Published the way schema generators emit them; the router
        // sanitizes before the model sees them.
        let query_schema = |what: &str| json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": format!("The Cypher query to {what}") },
                "params": {
                    "anyOf": [{ "type": "object", "additionalProperties": true }, { "type": "null" }],
                    "default": null,
                    "description": "Parameters bound into the query",
                },
            },
            "required": ["query"],
        });
        Ok(vec![
            ToolDeclaration::new(
                GET_SCHEMA,
                "List node labels, relationship types and their properties.",
                json!({ "type": "object", "properties": {} }),
            ),
            ToolDeclaration::new(READ_CYPHER, "Execute a read-only Cypher query.", query_schema("execute")),
            ToolDeclaration::new(
                WRITE_CYPHER,
                "Execute a Cypher query that modifies the graph.",
                query_schema("execute (may write)"),
            ),
        ])
    }

    async fn call_tool(&self, name: &str, arguments: JsonValue) -> Result<JsonValue> {
        match name {
            GET_SCHEMA => self.schema().await,
            READ_CYPHER => self.query(arguments, AccessMode::Read).await,
            WRITE_CYPHER => self.query(arguments, AccessMode::Write).await,
            other => Err(Error::NotFound(format!("tool '{other}'"))),
        }
    }
}

/// Property name -> sorted type names seen on it.
fn property_types<'a>(maps: impl Iterator<Item = &'a PropertyMap>) -> BTreeMap<String, Vec<&'static str>> {
    let mut out: BTreeMap<String, Vec<&'static str>> = BTreeMap::new();
    for map in maps {
        for (key, value) in map {
            let types = out.entry(key.clone()).or_default();
            let name = value.type_name();
            if !types.contains(&name) {
                types.push(name);
                types.sort_unstable();
            }
        }
    }
    out
}

fn rows_to_json(rows: &QueryRows) -> JsonValue {
    let rows: Vec<JsonValue> = rows.rows.iter()
        .map(|row| {
            let mut obj = serde_json::Map::new();
            for column in &rows.columns {
                let value = row.get(column).unwrap_or(&Value::Null);
                obj.insert(column.clone(), value.into());
            }
            JsonValue::Object(obj)
        })
        .collect();
    JsonValue::Array(rows)
}
