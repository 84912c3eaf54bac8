//! Tree shaking — propagates inclusion through the dependency graph.
//!
//! Runs once after discovery, in two passes. The main pass follows every
//! non-ignored root edge and promotes reachable nodes through the inclusion
//! lattice, with exclusion contagion: an excluded node poisons every ancestor
//! on the path that required it. The rescue pass then walks upward from each
//! enforced node, clears contagion on the visited ancestors and re-follows
//! their root edges, so that an explicitly enforced declaration (and anything
//! that only looked poisoned because of it) survives.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::filter::FilterStatus;
use crate::graph::{DeclGraph, ROOT_ID};

/// Verdict produced by the shaking engine, ordered for promotion:
/// a registry entry only ever moves up this lattice (the rescue pass may
/// clear an `Excluded` entry back to absent, at most once per node).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InclusionStatus {
    Unknown,
    Excluded,
    Included,
    Enforced,
}

/// The per-declaration verdicts. Absent entries read as `Unknown`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InclusionRegistry {
    table: HashMap<String, InclusionStatus>,
}

impl InclusionRegistry {
    pub fn status(&self, id: &str) -> InclusionStatus {
        self.table.get(id).copied().unwrap_or(InclusionStatus::Unknown)
    }

    /// True iff the declaration survived shaking.
    pub fn is_included(&self, id: &str) -> bool {
        matches!(
            self.status(id),
            InclusionStatus::Included | InclusionStatus::Enforced
        )
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn set(&mut self, id: &str, status: InclusionStatus) {
        self.table.insert(id.to_string(), status);
    }

    fn clear(&mut self, id: &str) {
        self.table.remove(id);
    }

    fn promote(&mut self, id: &str, new_status: InclusionStatus) -> Promotion {
        let old = self.status(id);
        if old < new_status {
            self.set(id, new_status);
            Promotion {
                current: new_status,
                promoted: true,
            }
        } else {
            Promotion {
                current: old,
                promoted: false,
            }
        }
    }
}

struct Promotion {
    current: InclusionStatus,
    promoted: bool,
}

/// Shake the graph: compute the inclusion registry from the per-node filter
/// statuses recorded during discovery.
pub fn shake(graph: &DeclGraph, diagnostics: bool) -> InclusionRegistry {
    let mut registry = InclusionRegistry::default();

    let root = graph.node(ROOT_ID).expect("graph has no root node");
    for target in root.edges() {
        follow_root_edge(graph, &mut registry, target);
    }

    rescue_enforced(graph, &mut registry);

    debug!(nodes = graph.len(), verdicts = registry.len(), "shaking complete");
    if diagnostics {
        for id in graph.node_ids() {
            match registry.status(id) {
                InclusionStatus::Included => info!("INCL: {id}"),
                InclusionStatus::Enforced => info!("ENF: {id}"),
                _ => {}
            }
        }
    }

    registry
}

/// Follow one edge out of the root. Ignored targets are not traversed at all;
/// an enforced target starts an enforced traversal. A contagious-exclusion
/// result marks the target itself excluded.
fn follow_root_edge(graph: &DeclGraph, registry: &mut InclusionRegistry, target_id: &str) {
    let node = graph.node(target_id).expect("root edge target not in graph");
    if node.filter_status() == FilterStatus::Ignored {
        return;
    }
    let enforced = node.filter_status() == FilterStatus::Enforced;
    if follow_edge(graph, registry, target_id, enforced) {
        registry.set(target_id, InclusionStatus::Excluded);
    }
}

/// Follow the edge into `target_id`, promoting its registry entry and
/// recursing into its outgoing edges. Returns `true` when this path is
/// poisoned by an exclusion, so the caller can mark itself excluded too.
fn follow_edge(
    graph: &DeclGraph,
    registry: &mut InclusionRegistry,
    target_id: &str,
    reinforced: bool,
) -> bool {
    let target = graph.node(target_id).expect("edge target not in graph");

    let enforced = reinforced || target.filter_status() == FilterStatus::Enforced;
    let (new_status, recurse) = if enforced {
        (InclusionStatus::Enforced, true)
    } else {
        match target.filter_status() {
            FilterStatus::Included | FilterStatus::Ignored => (InclusionStatus::Included, true),
            FilterStatus::Excluded => (InclusionStatus::Excluded, false),
            FilterStatus::Enforced => unreachable!("enforced handled above"),
        }
    };

    let promotion = registry.promote(target_id, new_status);
    if promotion.current == InclusionStatus::Excluded {
        return true;
    }
    if !promotion.promoted || !recurse {
        return false;
    }

    let mut excluded = false;
    for next in target.edges() {
        if follow_edge(graph, registry, next, enforced) {
            excluded = true;
            break;
        }
    }
    if excluded {
        registry.set(target_id, InclusionStatus::Excluded);
    }
    excluded
}

/// The rescue pass. For every node that ended up enforced, walk its reverse
/// edges up to the root; each upward path re-queues the root edge of its
/// topmost non-enforced node. Visited ancestors registered `Excluded` are
/// cleared back to unknown before the re-queued edges are re-followed, so a
/// traversal that was poisoned through a now-enforced node can re-promote
/// them. A cleared node whose own root edge is skipped (ignored filter
/// status) and that no re-followed edge reaches stays unknown.
fn rescue_enforced(graph: &DeclGraph, registry: &mut InclusionRegistry) {
    let mut visited: HashSet<String> = HashSet::new();
    let mut affected: Vec<String> = Vec::new();
    let mut queued: HashSet<String> = HashSet::new();

    for id in graph.node_ids() {
        if registry.status(id) != InclusionStatus::Enforced {
            continue;
        }
        let node = graph.node(id).expect("registry id not in graph");
        for parent in node.parents() {
            climb(graph, registry, parent, id, &mut visited, &mut affected, &mut queued);
        }
    }

    for id in &visited {
        if registry.status(id) == InclusionStatus::Excluded {
            registry.clear(id);
        }
    }

    for id in &affected {
        follow_root_edge(graph, registry, id);
    }
}

/// Walk upward from `edge_id` through the parent `node_id`. At the root, the
/// child on this path is re-queued unless already enforced; elsewhere the
/// climb continues through the parent's own parents. The visited set stops
/// dependency loops.
fn climb(
    graph: &DeclGraph,
    registry: &InclusionRegistry,
    node_id: &str,
    edge_id: &str,
    visited: &mut HashSet<String>,
    affected: &mut Vec<String>,
    queued: &mut HashSet<String>,
) {
    if node_id == ROOT_ID {
        if registry.status(edge_id) != InclusionStatus::Enforced && queued.insert(edge_id.to_string())
        {
            affected.push(edge_id.to_string());
        }
        return;
    }

    if !visited.insert(node_id.to_string()) {
        return;
    }

    let node = graph.node(node_id).expect("parent id not in graph");
    for parent in node.parents() {
        climb(graph, registry, parent, node_id, visited, affected, queued);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a graph the way the discovery walker would: each node is adopted
    /// by the root first, then by its semantic parents.
    fn graph(nodes: &[(&str, FilterStatus)], edges: &[(&str, &str)]) -> DeclGraph {
        let mut g = DeclGraph::new();
        for (id, status) in nodes {
            g.add_node(id, *status);
            g.adopt(ROOT_ID, id);
        }
        for (parent, child) in edges {
            g.adopt(parent, child);
        }
        g
    }

    #[test]
    fn included_node_pulls_in_its_dependencies() {
        // struct A { struct B *b; }; struct B { struct A *a; }; include A
        let g = graph(
            &[
                ("A", FilterStatus::Included),
                ("A::b", FilterStatus::Ignored),
                ("B", FilterStatus::Ignored),
                ("B::a", FilterStatus::Ignored),
            ],
            &[("A", "A::b"), ("A::b", "B"), ("B", "B::a"), ("B::a", "A")],
        );
        let registry = shake(&g, false);

        assert_eq!(registry.status("A"), InclusionStatus::Included);
        assert_eq!(registry.status("A::b"), InclusionStatus::Included);
        assert_eq!(registry.status("B"), InclusionStatus::Included);
        assert_eq!(registry.status("B::a"), InclusionStatus::Included);
    }

    #[test]
    fn excluded_dependency_poisons_ancestors() {
        // same shape, but B is excluded: the exclusion travels back up to A
        let g = graph(
            &[
                ("A", FilterStatus::Included),
                ("A::b", FilterStatus::Ignored),
                ("B", FilterStatus::Excluded),
                ("B::a", FilterStatus::Ignored),
            ],
            &[("A", "A::b"), ("A::b", "B"), ("B", "B::a"), ("B::a", "A")],
        );
        let registry = shake(&g, false);

        assert_eq!(registry.status("A"), InclusionStatus::Excluded);
        assert_eq!(registry.status("A::b"), InclusionStatus::Excluded);
        assert_eq!(registry.status("B"), InclusionStatus::Excluded);
        assert!(!registry.is_included("A"));
        assert!(!registry.is_included("B"));
    }

    #[test]
    fn enforcement_overrides_exclusion() {
        // B stays excluded by pattern, but A is enforced: the whole cycle
        // comes back as enforced
        let g = graph(
            &[
                ("A", FilterStatus::Enforced),
                ("A::b", FilterStatus::Ignored),
                ("B", FilterStatus::Excluded),
                ("B::a", FilterStatus::Ignored),
            ],
            &[("A", "A::b"), ("A::b", "B"), ("B", "B::a"), ("B::a", "A")],
        );
        let registry = shake(&g, false);

        assert_eq!(registry.status("A"), InclusionStatus::Enforced);
        assert_eq!(registry.status("A::b"), InclusionStatus::Enforced);
        assert_eq!(registry.status("B"), InclusionStatus::Enforced);
        assert_eq!(registry.status("B::a"), InclusionStatus::Enforced);
    }

    #[test]
    fn rescue_unpoisons_ancestors_of_enforced_nodes() {
        // P requires X (excluded) and is poisoned in the main pass; E,
        // processed later, is enforced and also requires X. X ends up
        // enforced, so P's poisoning was spurious and the rescue pass
        // restores it.
        let g = graph(
            &[
                ("P", FilterStatus::Included),
                ("X", FilterStatus::Excluded),
                ("E", FilterStatus::Enforced),
            ],
            &[("P", "X"), ("E", "X")],
        );
        let registry = shake(&g, false);

        assert_eq!(registry.status("E"), InclusionStatus::Enforced);
        assert_eq!(registry.status("X"), InclusionStatus::Enforced);
        assert_eq!(registry.status("P"), InclusionStatus::Included);
    }

    #[test]
    fn exclusion_unrelated_to_enforcement_sticks() {
        // Q depends on a genuinely excluded X that no enforcement touches;
        // the rescue pass must not resurrect it.
        let g = graph(
            &[
                ("Q", FilterStatus::Included),
                ("X", FilterStatus::Excluded),
                ("E", FilterStatus::Enforced),
                ("D", FilterStatus::Ignored),
            ],
            &[("Q", "X"), ("E", "D")],
        );
        let registry = shake(&g, false);

        assert_eq!(registry.status("Q"), InclusionStatus::Excluded);
        assert_eq!(registry.status("X"), InclusionStatus::Excluded);
        assert_eq!(registry.status("E"), InclusionStatus::Enforced);
        assert_eq!(registry.status("D"), InclusionStatus::Enforced);
    }

    #[test]
    fn ignored_interior_node_on_enforced_path_stays_unknown() {
        // Q's traversal aborts on its first edge (X excluded) before ever
        // reaching P, so P is never promoted. The rescue pass re-queues P's
        // root edge, but P's ignored filter status skips it there; P stays
        // unknown and is not exposed, while E keeps its enforcement.
        let mut g = DeclGraph::new();
        for (id, status) in [
            ("Q", FilterStatus::Included),
            ("X", FilterStatus::Excluded),
            ("P", FilterStatus::Ignored),
            ("E", FilterStatus::Enforced),
        ] {
            g.add_node(id, status);
            g.adopt(ROOT_ID, id);
        }
        g.adopt("Q", "X");
        g.adopt("Q", "P");
        g.adopt("P", "E");

        let registry = shake(&g, false);

        assert_eq!(registry.status("Q"), InclusionStatus::Excluded);
        assert_eq!(registry.status("X"), InclusionStatus::Excluded);
        assert_eq!(registry.status("P"), InclusionStatus::Unknown);
        assert_eq!(registry.status("E"), InclusionStatus::Enforced);
    }

    #[test]
    fn ignored_root_edges_are_not_traversed() {
        let g = graph(
            &[("A", FilterStatus::Ignored), ("B", FilterStatus::Ignored)],
            &[("A", "B")],
        );
        let registry = shake(&g, false);

        assert_eq!(registry.status("A"), InclusionStatus::Unknown);
        assert_eq!(registry.status("B"), InclusionStatus::Unknown);
        assert!(registry.is_empty());
    }

    #[test]
    fn self_referential_node_terminates() {
        let g = graph(&[("A", FilterStatus::Included)], &[("A", "A")]);
        let registry = shake(&g, false);
        assert_eq!(registry.status("A"), InclusionStatus::Included);
    }

    #[test]
    fn shaking_is_idempotent() {
        let g = graph(
            &[
                ("A", FilterStatus::Enforced),
                ("B", FilterStatus::Excluded),
                ("C", FilterStatus::Included),
                ("D", FilterStatus::Ignored),
            ],
            &[("A", "B"), ("C", "B"), ("C", "D"), ("D", "A")],
        );
        let first = shake(&g, false);
        let second = shake(&g, false);
        assert_eq!(first, second);
    }
}
