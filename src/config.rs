//! Agent configuration.
//!
//! Defaults match the production topology: routers are `PROD_ROUTER`
//! nodes keyed by `name`, joined by `PROD_ROUTING_LINK` relationships that
//! carry `igp_metric` and `distance`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::gds::Orientation;
use crate::{Error, Result};

/// Prefix of every environment override (`NETGRAPH_MAX_TOOL_CALLS`, ...).
pub const ENV_PREFIX: &str = "NETGRAPH_";

/// Settings for routing, projections and the conversation loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Tool calls allowed per user query before the answer degrades.
    pub max_tool_calls: usize,
    /// Relationship type used when a tool call does not name one.
    pub default_relationship_type: String,
    /// Label whose nodes are always part of a projection, connected or not.
    pub node_label: Option<String>,
    /// Node property used as the public node identifier.
    pub node_key: String,
    /// Preferred weight when the caller does not name one and it is numeric.
    pub default_weight_property: Option<String>,
    /// Weight of a relationship that lacks the weight property.
    pub default_weight: f64,
    /// Orientation of projections built without an explicit one.
    pub orientation: Orientation,
    /// Relationships inspected by property discovery; `None` scans all.
    pub discovery_sample: Option<usize>,
    /// Namespace of projection names.
    pub projection_prefix: String,
    /// Pass-through tools that need user confirmation before running.
    pub write_tools: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_calls: 8,
            default_relationship_type: "PROD_ROUTING_LINK".into(),
            node_label: Some("PROD_ROUTER".into()),
            node_key: "name".into(),
            default_weight_property: Some("igp_metric".into()),
            default_weight: 1.0,
            orientation: Orientation::Natural,
            discovery_sample: None,
            projection_prefix: "netgraph".into(),
            write_tools: vec!["write_neo4j_cypher".into()],
        }
    }
}

impl AgentConfig {
    /// Parse from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Defaults overridden by `NETGRAPH_*` process environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from any key lookup. Empty values clear optional
    /// settings.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = get("MAX_TOOL_CALLS") {
            self.max_tool_calls = parse_env("MAX_TOOL_CALLS", &v)?;
        }
        if let Some(v) = get("RELATIONSHIP_TYPE") {
            self.default_relationship_type = v;
        }
        if let Some(v) = get("NODE_LABEL") {
            self.node_label = non_empty(v);
        }
        if let Some(v) = get("NODE_KEY") {
            self.node_key = v;
        }
        if let Some(v) = get("WEIGHT_PROPERTY") {
            self.default_weight_property = non_empty(v);
        }
        if let Some(v) = get("DEFAULT_WEIGHT") {
            self.default_weight = parse_env("DEFAULT_WEIGHT", &v)?;
        }
        if let Some(v) = get("ORIENTATION") {
            self.orientation = v.parse()?;
        }
        if let Some(v) = get("DISCOVERY_SAMPLE") {
            self.discovery_sample = match non_empty(v) {
                Some(v) => Some(parse_env("DISCOVERY_SAMPLE", &v)?),
                None => None,
            };
        }
        if let Some(v) = get("PROJECTION_PREFIX") {
            self.projection_prefix = v;
        }
        if let Some(v) = get("WRITE_TOOLS") {
            self.write_tools = v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(())
    }

    /// Reject settings the agent cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_tool_calls == 0 {
            return Err(Error::Config("max_tool_calls must be at least 1".into()));
        }
        if !(self.default_weight >= 0.0) {
            return Err(Error::Config(format!(
                "default_weight must be non-negative, got {}", self.default_weight
            )));
        }
        if self.projection_prefix.trim().is_empty() {
            return Err(Error::Config("projection_prefix must not be empty".into()));
        }
        if self.node_key.trim().is_empty() {
            return Err(Error::Config("node_key must not be empty".into()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        Error::Config(format!("{ENV_PREFIX}{name}={raw:?}: {e}"))
    })
}

fn non_empty(v: String) -> Option<String> {
    if v.trim().is_empty() { None } else { Some(v) }
}
