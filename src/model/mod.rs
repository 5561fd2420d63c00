//! # Topology Graph Model
//!
//! Clean DTOs for the network topology: routers and links as they come
//! out of the graph store, and the path results computed over them.
//!
//! This module is pure data with no I/O or async.

pub mod node;
pub mod relationship;
pub mod path;
pub mod value;
pub mod property_map;

pub use node::{Node, NodeId};
pub use relationship::{Relationship, RelId};
pub use path::{Hop, PathNode, PathResult};
pub use value::Value;
pub use property_map::{PropertyMap, props, sorted_entries};
