//! # Graph Data Science
//!
//! The specialized algorithms behind the agent's graph tools:
//!
//! | Module | Role |
//! |--------|------|
//! | `discovery` | Which relationship properties can serve as weights |
//! | `projection` | Named weighted views over one relationship type |
//! | `dijkstra` | Shortest path over a projection |
//!
//! Projections live in a `ProjectionCatalog` owned by one conversation,
//! never in the store, so building one never mutates the graph.

pub mod discovery;
pub mod projection;
pub mod dijkstra;

pub use discovery::{RelationshipDescriptor, describe, discover};
pub use projection::{
    Orientation, Projection, ProjectionBuilder, ProjectionCatalog, ProjectionGuard,
    ProjectionInfo, ProjectionRequest, ProjectedEdge, projection_name,
};
pub use dijkstra::{dijkstra, shortest_path};
