//! Table creation order.
//!
//! Turns the tables a catalog lists plus the raw reference edges its discovery
//! engine reports into one total order, referenced tables first.

use super::{DependencyEdge, DependencyGraph, ObjectKind, QualifiedName, SchemaObject};
use ahash::AHashMap;

/// Ordered tables plus what had to be given up to produce the order
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Tables in creation order
    pub tables: Vec<SchemaObject>,
    /// Edges dropped to break reference cycles; these tables may need their
    /// constraints re-applied by hand on the target
    pub broken_edges: Vec<DependencyEdge>,
    /// Ordered nodes with no matching table in the catalog listing
    pub unmatched: Vec<QualifiedName>,
}

impl Resolution {
    pub fn has_cycles(&self) -> bool {
        !self.broken_edges.is_empty()
    }

    /// Table names in creation order
    pub fn names(&self) -> Vec<&QualifiedName> {
        self.tables.iter().map(|t| &t.name).collect()
    }
}

/// Order `tables` so that for every edge `A -> B`, `B` comes before `A`.
///
/// Ties are broken by name, and cycles are broken by dropping the edge with the
/// greatest destination name in each cycle found, so identical inputs always give
/// identical output. Ordered nodes are mapped back to `tables` by exact name;
/// nodes that only appear in `edges` are reported in [`Resolution::unmatched`].
pub fn resolve(tables: &[SchemaObject], edges: &[DependencyEdge]) -> Resolution {
    let mut by_name: AHashMap<&QualifiedName, Vec<&SchemaObject>> = AHashMap::new();
    for table in tables.iter().filter(|t| t.kind == ObjectKind::Table) {
        by_name.entry(&table.name).or_default().push(table);
    }

    let graph = DependencyGraph::build(by_name.keys().copied(), edges);
    let sorted = graph.topo_sort();

    let mut resolution = Resolution {
        tables: Vec::with_capacity(tables.len()),
        broken_edges: sorted.broken_edges,
        unmatched: Vec::new(),
    };

    for id in sorted.order {
        let Some(name) = graph.name(id) else {
            continue;
        };
        match by_name.get(name) {
            Some(matches) => resolution
                .tables
                .extend(matches.iter().map(|&t| t.clone())),
            None => {
                tracing::debug!(table = %name, "dependency target not listed by catalog, skipping");
                resolution.unmatched.push(name.clone());
            }
        }
    }

    resolution
}
