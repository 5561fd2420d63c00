//! Plain-text path report for the model and the operator.

use std::fmt::{self, Write};

use crate::model::{sorted_entries, PathResult};

/// Render a path as a deterministic, line-oriented report.
///
/// ```text
/// Path: R1 -> R2 -> R3
/// Relationship: PROD_ROUTING_LINK
/// Weight: distance
/// Total cost: 15
///
/// Hops:
///   1. R1 -> R2 [PROD_ROUTING_LINK] distance=10 (cumulative 10)
///        igp_metric: 10
/// ```
pub fn render_text(path: &PathResult) -> String {
    let mut out = String::new();
    // fmt::Write for String never returns an error.
    write_report(&mut out, path).ok();
    out
}

fn write_report(out: &mut String, path: &PathResult) -> fmt::Result {
    let ids = path.node_ids().join(" -> ");
    writeln!(out, "Path: {ids}")?;
    writeln!(out, "Relationship: {}", path.relationship_type)?;
    writeln!(out, "Weight: {}", path.weight_property)?;
    writeln!(out, "Total cost: {}", path.total_cost)?;

    if path.is_empty() {
        writeln!(out)?;
        writeln!(out, "Source and destination are the same node; no hops.")?;
        return Ok(());
    }

    writeln!(out)?;
    writeln!(out, "Hops:")?;
    let mut cumulative = 0.0;
    for (i, hop) in path.hops.iter().enumerate() {
        cumulative += hop.weight;
        writeln!(
            out,
            "  {}. {} -> {} [{}] {}={} (cumulative {})",
            i + 1, hop.from, hop.to, hop.rel_type, path.weight_property, hop.weight, cumulative,
        )?;
        for (key, value) in sorted_entries(&hop.properties) {
            writeln!(out, "       {key}: {value}")?;
        }
    }
    Ok(())
}
