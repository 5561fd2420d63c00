//! Tool declarations offered to the language model.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

use crate::AgentConfig;
use super::router::SpecializedTool;

/// A callable tool as the model sees it: name, description and a JSON
/// schema of its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: JsonValue,
}

impl ToolDeclaration {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: JsonValue) -> Self {
        Self { name: name.into(), description: description.into(), parameters }
    }

    /// Copy with the parameter schema reduced to what function-calling
    /// models accept.
    pub fn sanitized(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: sanitize_schema(&self.parameters),
        }
    }
}

/// Schema keywords function-calling models reject.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "prefixItems", "$ref", "$defs", "const", "allOf", "oneOf", "not", "$schema", "$id",
];

/// Strip unsupported keywords recursively and collapse `anyOf` to its
/// first non-null alternative.
pub fn sanitize_schema(schema: &JsonValue) -> JsonValue {
    match schema {
        JsonValue::Object(map) => {
            if let Some(JsonValue::Array(options)) = map.get("anyOf") {
                let chosen = options
                    .iter()
                    .find(|o| o.get("type").and_then(JsonValue::as_str) != Some("null"))
                    .or_else(|| options.first());
                let mut merged = match chosen.map(sanitize_schema) {
                    Some(JsonValue::Object(inner)) => inner,
                    _ => Map::new(),
                };
                // Sibling keys (description, default) survive the collapse.
                for (key, value) in map {
                    if key != "anyOf" && !UNSUPPORTED_KEYWORDS.contains(&key.as_str()) {
                        merged.entry(key.clone()).or_insert_with(|| sanitize_schema(value));
                    }
                }
                return JsonValue::Object(merged);
            }
            JsonValue::Object(
                map.iter()
                    .filter(|(k, _)| !UNSUPPORTED_KEYWORDS.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), sanitize_schema(v)))
                    .collect(),
            )
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}

/// Declarations of the specialized graph tools, with defaults taken from
/// the configuration.
pub fn specialized_declarations(config: &AgentConfig) -> Vec<ToolDeclaration> {
    SpecializedTool::ALL.iter().map(|tool| declare(*tool, config)).collect()
}

fn declare(tool: SpecializedTool, config: &AgentConfig) -> ToolDeclaration {
    let rel_type = json!({
        "type": "string",
        "description": format!(
            "Relationship type to traverse (default {})", config.default_relationship_type
        ),
    });
    let weight_help = match &config.default_weight_property {
        Some(p) => format!(
            "Numeric relationship property used as edge weight, e.g. igp_metric or distance \
             (default {p} when present)"
        ),
        None => "Numeric relationship property used as edge weight (default: first discovered)".to_string(),
    };
    let weight = json!({ "type": "string", "description": weight_help });
    let orientation = json!({
        "type": "string",
        "enum": ["natural", "reverse", "undirected"],
        "description": format!("Traversal direction (default {})", config.orientation),
    });
    let node = |what: &str| json!({ "type": "string", "description": format!("{what} router name, e.g. R1") });

    match tool {
        SpecializedTool::DiscoverWeightProperties => ToolDeclaration::new(
            tool.name(),
            "List the numeric properties of a relationship type that can serve as path weights.",
            json!({
                "type": "object",
                "properties": { "relationship_type": rel_type },
            }),
        ),
        SpecializedTool::BuildProjection => ToolDeclaration::new(
            tool.name(),
            "Build a named weighted graph projection over one relationship type. \
             Projections are released when the current question is answered.",
            json!({
                "type": "object",
                "properties": {
                    "relationship_type": rel_type,
                    "weight_property": weight,
                    "orientation": orientation,
                },
            }),
        ),
        SpecializedTool::DropProjection => ToolDeclaration::new(
            tool.name(),
            "Release a projection built earlier in this conversation.",
            json!({
                "type": "object",
                "properties": { "name": { "type": "string", "description": "Projection name" } },
                "required": ["name"],
            }),
        ),
        SpecializedTool::FindShortestPath => ToolDeclaration::new(
            tool.name(),
            "Find the lowest-cost path between two routers. Returns a text description \
             and a path_id that render_path accepts.",
            json!({
                "type": "object",
                "properties": {
                    "start_node": node("Start"),
                    "end_node": node("End"),
                    "relationship_type": rel_type,
                    "weight_property": weight,
                    "orientation": orientation,
                    "projection": {
                        "type": "string",
                        "description": "Existing projection to search instead of building one",
                    },
                },
                "required": ["start_node", "end_node"],
            }),
        ),
        SpecializedTool::RenderPath => ToolDeclaration::new(
            tool.name(),
            "Render a computed path as text, a customer provisioning document, or a \
             traffic-engineering document.",
            json!({
                "type": "object",
                "properties": {
                    "path_id": { "type": "string", "description": "Id returned by find_shortest_path" },
                    "mode": {
                        "type": "string",
                        "enum": ["text", "provisioning-xml", "traffic-engineering-xml"],
                    },
                    "customer_name": { "type": "string", "description": "Required for provisioning-xml" },
                    "service_type": { "type": "string", "description": "e.g. vprn, evpn" },
                    "service_name": { "type": "string", "description": "e.g. TSP" },
                },
                "required": ["path_id", "mode"],
            }),
        ),
        SpecializedTool::PerformTrafficEngineering => ToolDeclaration::new(
            tool.name(),
            "Compute a path and generate the provisioning configuration for a service \
             (e.g. VPRN, EVPN) along it.",
            json!({
                "type": "object",
                "properties": {
                    "start_node": node("Source"),
                    "end_node": node("Destination"),
                    "customer_name": { "type": "string", "description": "Customer the service belongs to" },
                    "service_type": { "type": "string", "description": "Service type (vprn, evpn)" },
                    "service_name": { "type": "string", "description": "Service name or suffix (e.g. TSP)" },
                    "relationship_type": rel_type,
                    "weight_property": weight,
                    "orientation": orientation,
                },
                "required": ["start_node", "end_node", "customer_name"],
            }),
        ),
    }
}
