//! Weight-property discovery.
//!
//! A property is a usable weight when every observed value of it on the
//! inspected relationships is numeric. Booleans do not count, and neither
//! do strings that happen to look like numbers.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;

use crate::model::Relationship;
use crate::storage::GraphStore;
use crate::{Error, Result};

/// Numeric properties found on one relationship type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    pub relationship_type: String,
    /// In first-discovered order: relationships by ascending id, and
    /// properties of one relationship by name.
    pub numeric_properties: SmallVec<[String; 4]>,
    /// Relationships inspected.
    pub sampled: usize,
}

impl RelationshipDescriptor {
    pub fn has(&self, property: &str) -> bool {
        self.numeric_properties.iter().any(|p| p == property)
    }

    pub fn is_empty(&self) -> bool {
        self.numeric_properties.is_empty()
    }

    /// Weight to use when the caller named none: the preferred property if
    /// it qualifies, otherwise the first one discovered.
    pub fn suggest<'a>(&'a self, preferred: Option<&'a str>) -> Option<&'a str> {
        preferred
            .filter(|p| self.has(p))
            .or_else(|| self.numeric_properties.first().map(String::as_str))
    }
}

/// Describe a set of already-fetched relationships of one type.
pub fn describe(rel_type: &str, rels: &[Relationship]) -> RelationshipDescriptor {
    let mut seen: Vec<&str> = Vec::new();
    let mut rejected: Vec<&str> = Vec::new();

    for rel in rels {
        let mut keys: Vec<&String> = rel.properties.keys().collect();
        keys.sort();
        for key in keys {
            let key = key.as_str();
            if rejected.contains(&key) {
                continue;
            }
            if rel.properties[key].is_numeric() {
                if !seen.contains(&key) {
                    seen.push(key);
                }
            } else {
                seen.retain(|k| *k != key);
                rejected.push(key);
            }
        }
    }

    RelationshipDescriptor {
        relationship_type: rel_type.to_string(),
        numeric_properties: seen.into_iter().map(String::from).collect(),
        sampled: rels.len(),
    }
}

/// Inspect a relationship type in the store.
///
/// `sample` bounds the number of relationships read; `None` reads them all.
pub async fn discover<S: GraphStore + ?Sized>(
    store: &S,
    rel_type: &str,
    sample: Option<usize>,
) -> Result<RelationshipDescriptor> {
    ensure_type_exists(store, rel_type).await?;
    let rels = store.relationships_by_type(rel_type, sample).await?;
    let descriptor = describe(rel_type, &rels);
    debug!(
        rel_type,
        sampled = descriptor.sampled,
        numeric = ?descriptor.numeric_properties,
        "discovered weight properties"
    );
    Ok(descriptor)
}

pub(crate) async fn ensure_type_exists<S: GraphStore + ?Sized>(store: &S, rel_type: &str) -> Result<()> {
    let types = store.relationship_types().await?;
    if types.iter().any(|t| t == rel_type) {
        Ok(())
    } else {
        Err(Error::NotFound(format!("relationship type '{rel_type}'")))
    }
}
