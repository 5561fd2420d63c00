//! Tool routing: specialized graph tools versus pass-through queries.
//!
//! Every invocation walks the same lifecycle:
//!
//! 1. **Classify** by name into a [`ToolRoute`]. Nothing has happened yet.
//! 2. **Validate** specialized arguments into a typed request. A bad
//!    argument fails here, before any component runs.
//! 3. **Dispatch** to discovery / projection / path / render, or forward
//!    the untouched arguments to the [`QueryPassThrough`].
//! 4. **Settle** into exactly one [`ToolOutcome`]. Recoverable errors
//!    become failure outcomes; only unrecoverable ones propagate.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::gds::{
    discover, shortest_path, Orientation, ProjectionBuilder, ProjectionCatalog, ProjectionGuard,
    ProjectionRequest,
};
use crate::model::PathResult;
use crate::render::{render, render_text, RenderMode, RenderOptions};
use crate::storage::GraphStore;
use crate::{AgentConfig, Error, Result};
use super::catalog::{specialized_declarations, ToolDeclaration};
use super::passthrough::{QueryPassThrough, StorePassThrough};
use super::{InvocationState, ToolFailure, ToolInvocation, ToolOutcome};

// ============================================================================
// Routes
// ============================================================================

/// The closed set of tools the router answers itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecializedTool {
    DiscoverWeightProperties,
    BuildProjection,
    DropProjection,
    FindShortestPath,
    RenderPath,
    PerformTrafficEngineering,
}

impl SpecializedTool {
    pub const ALL: [SpecializedTool; 6] = [
        SpecializedTool::DiscoverWeightProperties,
        SpecializedTool::BuildProjection,
        SpecializedTool::DropProjection,
        SpecializedTool::FindShortestPath,
        SpecializedTool::RenderPath,
        SpecializedTool::PerformTrafficEngineering,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SpecializedTool::DiscoverWeightProperties => "discover_weight_properties",
            SpecializedTool::BuildProjection => "build_projection",
            SpecializedTool::DropProjection => "drop_projection",
            SpecializedTool::FindShortestPath => "find_shortest_path",
            SpecializedTool::RenderPath => "render_path",
            SpecializedTool::PerformTrafficEngineering => "perform_traffic_engineering",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

impl fmt::Display for SpecializedTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where an invocation goes. Decided from the name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolRoute {
    Specialized(SpecializedTool),
    PassThrough,
}

impl ToolRoute {
    pub fn classify(name: &str) -> Self {
        match SpecializedTool::from_name(name) {
            Some(tool) => ToolRoute::Specialized(tool),
            None => ToolRoute::PassThrough,
        }
    }
}

// ============================================================================
// Typed requests
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct DiscoverArgs {
    relationship_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BuildArgs {
    relationship_type: Option<String>,
    weight_property: Option<String>,
    orientation: Option<Orientation>,
}

#[derive(Debug, Deserialize)]
struct DropArgs {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PathArgs {
    start_node: String,
    end_node: String,
    #[serde(flatten)]
    build: BuildArgs,
    /// Search an existing projection instead of building one.
    #[serde(rename = "projection")]
    existing: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RenderArgs {
    path_id: String,
    mode: RenderMode,
    #[serde(flatten)]
    options: RenderOptions,
}

#[derive(Debug, Deserialize)]
struct TrafficArgs {
    start_node: String,
    end_node: String,
    customer_name: String,
    service_type: Option<String>,
    service_name: Option<String>,
    #[serde(flatten)]
    build: BuildArgs,
}

#[derive(Debug)]
enum Request {
    Discover(DiscoverArgs),
    Build(BuildArgs),
    Drop(DropArgs),
    ShortestPath(PathArgs),
    Render(RenderArgs),
    TrafficEngineering(TrafficArgs),
}

impl Request {
    fn parse(tool: SpecializedTool, arguments: &JsonValue) -> Result<Self> {
        let request = match tool {
            SpecializedTool::DiscoverWeightProperties => Request::Discover(args(tool, arguments)?),
            SpecializedTool::BuildProjection => Request::Build(args(tool, arguments)?),
            SpecializedTool::DropProjection => Request::Drop(args(tool, arguments)?),
            SpecializedTool::FindShortestPath => Request::ShortestPath(args(tool, arguments)?),
            SpecializedTool::RenderPath => Request::Render(args(tool, arguments)?),
            SpecializedTool::PerformTrafficEngineering => Request::TrafficEngineering(args(tool, arguments)?),
        };
        request.validate(tool)?;
        Ok(request)
    }

    fn validate(&self, tool: SpecializedTool) -> Result<()> {
        let non_empty = |field: &str, value: &str| {
            if value.trim().is_empty() {
                Err(Error::InvalidArgument(format!("{tool}: {field} must not be empty")))
            } else {
                Ok(())
            }
        };
        match self {
            Request::Discover(_) | Request::Build(_) => Ok(()),
            Request::Drop(a) => non_empty("name", &a.name),
            Request::ShortestPath(a) => {
                non_empty("start_node", &a.start_node)?;
                non_empty("end_node", &a.end_node)
            }
            Request::Render(a) => non_empty("path_id", &a.path_id),
            Request::TrafficEngineering(a) => {
                non_empty("start_node", &a.start_node)?;
                non_empty("end_node", &a.end_node)?;
                non_empty("customer_name", &a.customer_name)?;
                if a.service_type.is_some() != a.service_name.is_some() {
                    return Err(Error::InvalidArgument(format!(
                        "{tool}: service_type and service_name go together"
                    )));
                }
                Ok(())
            }
        }
    }
}

fn args<T: DeserializeOwned>(tool: SpecializedTool, arguments: &JsonValue) -> Result<T> {
    let value = match arguments {
        JsonValue::Null => json!({}),
        other => other.clone(),
    };
    serde_json::from_value(value)
        .map_err(|e| Error::InvalidArgument(format!("{tool}: {e}")))
}

// ============================================================================
// Router
// ============================================================================

#[derive(Debug, Default)]
struct PathStore {
    next: u64,
    paths: HashMap<String, PathResult>,
}

/// Routes one conversation's tool calls.
///
/// Owns that conversation's projections and computed paths; shares only
/// the store with other conversations.
pub struct ToolRouter<S: GraphStore> {
    store: Arc<S>,
    config: AgentConfig,
    builder: ProjectionBuilder,
    catalog: ProjectionCatalog,
    paths: Mutex<PathStore>,
    passthrough: Box<dyn QueryPassThrough>,
}

impl<S: GraphStore> ToolRouter<S> {
    /// Router whose pass-through tools run against the same store.
    pub fn new(store: Arc<S>, config: AgentConfig) -> Self {
        let passthrough = Box::new(StorePassThrough::new(Arc::clone(&store)));
        Self::with_passthrough(store, config, passthrough)
    }

    pub fn with_passthrough(store: Arc<S>, config: AgentConfig, passthrough: Box<dyn QueryPassThrough>) -> Self {
        Self {
            builder: ProjectionBuilder::from_config(&config),
            store,
            config,
            catalog: ProjectionCatalog::new(),
            paths: Mutex::new(PathStore::default()),
            passthrough,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Projections currently alive in this conversation.
    pub fn projections(&self) -> &ProjectionCatalog {
        &self.catalog
    }

    /// A stored path by id.
    pub fn path(&self, path_id: &str) -> Option<PathResult> {
        self.paths.lock().paths.get(path_id).cloned()
    }

    pub fn stored_paths(&self) -> usize {
        self.paths.lock().paths.len()
    }

    /// Pass-through tools that must be confirmed before they run.
    pub fn requires_confirmation(&self, name: &str) -> bool {
        ToolRoute::classify(name) == ToolRoute::PassThrough
            && self.config.write_tools.iter().any(|t| t == name)
    }

    /// Everything the model may call: specialized tools first, then the
    /// sanitized pass-through tools. A pass-through tool never shadows a
    /// specialized one.
    pub async fn catalog(&self) -> Result<Vec<ToolDeclaration>> {
        let mut tools = specialized_declarations(&self.config);
        for decl in self.passthrough.list_tools().await? {
            if SpecializedTool::from_name(&decl.name).is_some() {
                warn!(tool = %decl.name, "pass-through tool shadows a specialized tool; ignored");
                continue;
            }
            tools.push(decl.sanitized());
        }
        Ok(tools)
    }

    /// Drop every projection and stored path of the current query.
    pub fn release_all(&self) -> Vec<String> {
        let released = self.catalog.clear();
        let paths = {
            let mut store = self.paths.lock();
            let n = store.paths.len();
            store.paths.clear();
            n
        };
        if !released.is_empty() || paths > 0 {
            info!(projections = ?released, paths, "released query resources");
        }
        released
    }

    /// Answer one invocation.
    ///
    /// Returns `Err` only for unrecoverable failures (store unavailable and
    /// the like); everything else is a failure outcome.
    pub async fn dispatch(&self, invocation: &ToolInvocation) -> Result<ToolOutcome> {
        let mut state = InvocationState::Received;
        let route = ToolRoute::classify(&invocation.name);
        debug!(call_id = %invocation.id, tool = %invocation.name, ?route, "tool call received");

        let result = match route {
            ToolRoute::Specialized(tool) => match Request::parse(tool, &invocation.arguments) {
                Err(err) => Err(err),
                Ok(request) => {
                    transition(invocation, &mut state, InvocationState::Validated)?;
                    transition(invocation, &mut state, InvocationState::Dispatched)?;
                    self.run(request).await
                }
            },
            ToolRoute::PassThrough => {
                // Arguments belong to the provider; nothing to check here.
                transition(invocation, &mut state, InvocationState::Validated)?;
                transition(invocation, &mut state, InvocationState::Dispatched)?;
                self.passthrough
                    .call_tool(&invocation.name, invocation.arguments.clone())
                    .await
            }
        };

        match result {
            Ok(payload) => {
                transition(invocation, &mut state, InvocationState::Succeeded)?;
                Ok(ToolOutcome::success(invocation, payload))
            }
            Err(err) if err.is_recoverable() => {
                transition(invocation, &mut state, InvocationState::Failed)?;
                warn!(call_id = %invocation.id, tool = %invocation.name, error = %err, "tool call failed");
                Ok(ToolOutcome::failure(invocation, ToolFailure::from(&err)))
            }
            Err(err) => {
                warn!(call_id = %invocation.id, tool = %invocation.name, error = %err, "tool call aborted");
                Err(err)
            }
        }
    }

    async fn run(&self, request: Request) -> Result<JsonValue> {
        match request {
            Request::Discover(a) => self.discover_weights(a).await,
            Request::Build(a) => {
                let request = self.resolve(a).await?;
                let info = self.builder.build(self.store.as_ref(), &self.catalog, &request).await?;
                Ok(serde_json::to_value(info)?)
            }
            Request::Drop(a) => {
                if self.catalog.drop_projection(&a.name) {
                    Ok(json!({ "dropped": a.name }))
                } else {
                    Err(Error::NotFound(format!("projection '{}'", a.name)))
                }
            }
            Request::ShortestPath(a) => self.find_shortest_path(a).await,
            Request::Render(a) => {
                let path = self.path(&a.path_id)
                    .ok_or_else(|| Error::NotFound(format!("path '{}'", a.path_id)))?;
                let document = render(&path, a.mode, &a.options)?;
                Ok(json!({ "path_id": a.path_id, "mode": a.mode, "document": document }))
            }
            Request::TrafficEngineering(a) => self.traffic_engineering(a).await,
        }
    }

    async fn discover_weights(&self, args: DiscoverArgs) -> Result<JsonValue> {
        let rel_type = self.relationship_type(args.relationship_type);
        let descriptor = discover(self.store.as_ref(), &rel_type, self.config.discovery_sample).await?;
        let suggested = descriptor.suggest(self.config.default_weight_property.as_deref());
        Ok(json!({
            "relationship_type": descriptor.relationship_type,
            "numeric_properties": descriptor.numeric_properties,
            "sampled": descriptor.sampled,
            "suggested": suggested,
        }))
    }

    async fn find_shortest_path(&self, args: PathArgs) -> Result<JsonValue> {
        let path = match &args.existing {
            Some(name) => shortest_path(&self.catalog, name, &args.start_node, &args.end_node)?,
            None => {
                let request = self.resolve(args.build).await?;
                self.compute_path(&request, &args.start_node, &args.end_node).await?
            }
        };
        let text = render_text(&path);
        let path_id = self.store_path(path.clone());
        Ok(json!({
            "path_id": path_id,
            "projection": path.projection,
            "nodes": path.node_ids(),
            "hops": path.len(),
            "total_cost": path.total_cost,
            "text": text,
        }))
    }

    async fn traffic_engineering(&self, args: TrafficArgs) -> Result<JsonValue> {
        let request = self.resolve(args.build).await?;
        let path = self.compute_path(&request, &args.start_node, &args.end_node).await?;

        let options = RenderOptions {
            customer_name: Some(args.customer_name),
            service_type: args.service_type,
            service_name: args.service_name,
        };
        let provisioning = render(&path, RenderMode::ProvisioningXml, &options)?;
        let traffic = match (&options.service_type, &options.service_name) {
            (Some(_), Some(_)) => Some(render(&path, RenderMode::TrafficEngineeringXml, &options)?),
            _ => None,
        };

        let nodes: Vec<String> = path.node_ids().into_iter().map(String::from).collect();
        let total_cost = path.total_cost;
        let path_id = self.store_path(path);
        Ok(json!({
            "path_id": path_id,
            "nodes": nodes,
            "total_cost": total_cost,
            "weight_property": request.weight_property,
            "provisioning_xml": provisioning,
            "traffic_engineering_xml": traffic,
        }))
    }

    /// Shortest path over a projection that lives only for this call. An
    /// identical projection built earlier by `build_projection` is reused
    /// and left in place.
    async fn compute_path(&self, request: &ProjectionRequest, start: &str, end: &str) -> Result<PathResult> {
        let name = self.builder.name_for(request);
        if self.catalog.contains(&name) {
            return shortest_path(&self.catalog, &name, start, end);
        }
        let info = self.builder.build(self.store.as_ref(), &self.catalog, request).await?;
        let guard = ProjectionGuard::new(&self.catalog, info.name);
        shortest_path(&self.catalog, guard.name(), start, end)
    }

    /// Fill in defaults: configured relationship type and orientation, and
    /// a discovered weight when none was named.
    async fn resolve(&self, args: BuildArgs) -> Result<ProjectionRequest> {
        let relationship_type = self.relationship_type(args.relationship_type);
        let weight_property = match args.weight_property.filter(|w| !w.trim().is_empty()) {
            Some(w) => w,
            None => {
                let descriptor = discover(self.store.as_ref(), &relationship_type, self.config.discovery_sample).await?;
                descriptor
                    .suggest(self.config.default_weight_property.as_deref())
                    .map(str::to_string)
                    .ok_or_else(|| Error::Projection(format!(
                        "relationship type '{relationship_type}' has no numeric property to weight by"
                    )))?
            }
        };
        Ok(ProjectionRequest {
            relationship_type,
            weight_property,
            orientation: args.orientation.unwrap_or(self.config.orientation),
        })
    }

    fn relationship_type(&self, requested: Option<String>) -> String {
        requested
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.config.default_relationship_type.clone())
    }

    fn store_path(&self, path: PathResult) -> String {
        let mut store = self.paths.lock();
        store.next += 1;
        let id = format!("path-{}", store.next);
        store.paths.insert(id.clone(), path);
        id
    }
}

fn transition(invocation: &ToolInvocation, state: &mut InvocationState, next: InvocationState) -> Result<()> {
    debug!(call_id = %invocation.id, tool = %invocation.name, from = ?*state, to = ?next, "invocation state");
    state.advance(next)
}
