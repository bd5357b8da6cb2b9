//! Table dependency graph for ordered export.
//!
//! Provides:
//! - Dependency graph construction from discovered reference edges
//! - Topological sorting with a deterministic name tie-break
//! - Deterministic cycle breaking for circular FK relationships

use super::{DependencyEdge, QualifiedName};
use ahash::{AHashMap, AHashSet};
use std::collections::BTreeSet;

/// Index of a node in a [`DependencyGraph`].
///
/// Nodes are numbered in ascending name order, so comparing ids compares names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dependency graph over tables.
///
/// The graph represents parent → child relationships where:
/// - A parent is a table referenced by another table's FK
/// - A child is a table that references another table
///
/// Every edge endpoint is a node: endpoints not present in the supplied table
/// set are added as nodes so the invariant holds for whatever the discovery
/// engine reports. Self-references and duplicate edges are dropped.
#[derive(Debug)]
pub struct DependencyGraph {
    names: Vec<QualifiedName>,
    index: AHashMap<QualifiedName, NodeId>,
    /// For each node, the nodes it references (sorted ascending)
    parents: Vec<Vec<NodeId>>,
    /// For each node, the nodes referencing it (sorted ascending)
    children: Vec<Vec<NodeId>>,
}

/// Result of topological sort
#[derive(Debug, Default)]
pub struct TopoSortResult {
    /// Every node exactly once, parents before children
    pub order: Vec<NodeId>,
    /// Edges dropped to break cycles, in the order they were dropped
    pub broken_edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// Build a graph from a node set and raw edges
    pub fn build<'a, N, E>(nodes: N, edges: E) -> Self
    where
        N: IntoIterator<Item = &'a QualifiedName>,
        E: IntoIterator<Item = &'a DependencyEdge>,
    {
        let edges: Vec<&DependencyEdge> = edges.into_iter().collect();

        let mut all: BTreeSet<&QualifiedName> = nodes.into_iter().collect();
        for edge in &edges {
            all.insert(&edge.from);
            all.insert(&edge.to);
        }

        let names: Vec<QualifiedName> = all.into_iter().cloned().collect();
        let index: AHashMap<QualifiedName, NodeId> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), NodeId(i as u32)))
            .collect();

        let n = names.len();
        let mut parents: Vec<Vec<NodeId>> = vec![Vec::new(); n];
        let mut children: Vec<Vec<NodeId>> = vec![Vec::new(); n];

        for edge in edges {
            if edge.is_self_reference() {
                tracing::debug!(table = %edge.from, "ignoring self-referencing dependency");
                continue;
            }
            let child = index[&edge.from];
            let parent = index[&edge.to];
            if !parents[child.index()].contains(&parent) {
                parents[child.index()].push(parent);
                children[parent.index()].push(child);
            }
        }

        for list in parents.iter_mut().chain(children.iter_mut()) {
            list.sort_unstable();
        }

        Self {
            names,
            index,
            parents,
            children,
        }
    }

    /// Get the number of nodes in the graph
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get the table name for a node
    pub fn name(&self, id: NodeId) -> Option<&QualifiedName> {
        self.names.get(id.index())
    }

    /// Get the node for a table name
    pub fn node(&self, name: &QualifiedName) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    /// Nodes directly referenced by `id`
    pub fn parents(&self, id: NodeId) -> &[NodeId] {
        &self.parents[id.index()]
    }

    /// Nodes directly referencing `id`
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.children[id.index()]
    }

    /// Number of distinct, non-self edges
    pub fn edge_count(&self) -> usize {
        self.parents.iter().map(Vec::len).sum()
    }

    /// Perform topological sort using Kahn's algorithm.
    ///
    /// Among nodes that are ready at the same step, the smallest name goes first.
    /// When no node is ready, the remaining nodes contain a cycle; the cycle found
    /// by [`Self::weakest_cycle_edge`] loses one edge and sorting continues, so the
    /// result always covers every node exactly once.
    pub fn topo_sort(&self) -> TopoSortResult {
        let n = self.len();
        let mut in_degree: Vec<usize> = self.parents.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<NodeId> = (0..n)
            .filter(|&i| in_degree[i] == 0)
            .map(|i| NodeId(i as u32))
            .collect();
        let mut placed = vec![false; n];
        let mut removed: AHashSet<(NodeId, NodeId)> = AHashSet::new();
        let mut result = TopoSortResult {
            order: Vec::with_capacity(n),
            broken_edges: Vec::new(),
        };

        while result.order.len() < n {
            if let Some(id) = ready.pop_first() {
                placed[id.index()] = true;
                result.order.push(id);

                for &child in &self.children[id.index()] {
                    if removed.contains(&(child, id)) {
                        continue;
                    }
                    in_degree[child.index()] -= 1;
                    if in_degree[child.index()] == 0 {
                        ready.insert(child);
                    }
                }
                continue;
            }

            let Some((child, parent)) = self.weakest_cycle_edge(&placed, &removed) else {
                // Unreachable while in-degrees are consistent; keep name order for
                // whatever is left so the result stays total.
                result
                    .order
                    .extend((0..n).filter(|&i| !placed[i]).map(|i| NodeId(i as u32)));
                break;
            };
            removed.insert((child, parent));
            in_degree[child.index()] -= 1;
            if in_degree[child.index()] == 0 {
                ready.insert(child);
            }

            let edge = DependencyEdge::new(
                self.names[child.index()].clone(),
                self.names[parent.index()].clone(),
            );
            tracing::warn!(
                from = %edge.from,
                to = %edge.to,
                "dependency cycle broken by dropping edge"
            );
            result.broken_edges.push(edge);
        }

        result
    }

    /// Locate a cycle among unplaced nodes and pick the edge to drop.
    ///
    /// Walks from the smallest unplaced node, always following the smallest
    /// unresolved parent, until a node repeats. Of the cycle's edges, the one whose
    /// destination has the greatest name is returned as `(child, parent)`.
    ///
    /// Only called when no node is ready, so every unplaced node has at least one
    /// unresolved parent and the walk cannot dead-end; `None` signals otherwise.
    fn weakest_cycle_edge(
        &self,
        placed: &[bool],
        removed: &AHashSet<(NodeId, NodeId)>,
    ) -> Option<(NodeId, NodeId)> {
        let start = NodeId(placed.iter().position(|&p| !p)? as u32);

        let mut position: Vec<Option<usize>> = vec![None; self.len()];
        let mut path: Vec<NodeId> = Vec::new();
        let mut current = start;

        let cycle_start = loop {
            if let Some(pos) = position[current.index()] {
                break pos;
            }
            position[current.index()] = Some(path.len());
            path.push(current);

            let next = self.parents[current.index()]
                .iter()
                .copied()
                .find(|&p| !placed[p.index()] && !removed.contains(&(current, p)));
            current = next?;
        };

        let cycle = &path[cycle_start..];
        (0..cycle.len())
            .map(|i| (cycle[i], cycle[(i + 1) % cycle.len()]))
            .max_by_key(|&(child, parent)| (parent, child))
    }
}
