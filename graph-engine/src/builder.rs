//! Co-occurrence graph construction. Graphs are throwaway: rebuilt from the
//! stored edge set on every run, never updated incrementally.

use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::HashMap;
use tracing::warn;
use tubegraph_core::Link;

/// Maps external string ids to dense graph handles and back. The arena is
/// rebuilt with each graph, so handles are only meaningful next to the graph
/// they were created for.
#[derive(Debug, Default)]
pub struct NodeTable {
    handles: HashMap<String, NodeIndex>,
    labels: Vec<String>,
}

impl NodeTable {
    pub fn get(&self, external_id: &str) -> Option<NodeIndex> {
        self.handles.get(external_id).copied()
    }

    pub fn label(&self, handle: NodeIndex) -> Option<&str> {
        self.labels.get(handle.index()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn insert(&mut self, external_id: &str, handle: NodeIndex) {
        debug_assert_eq!(handle.index(), self.labels.len());
        self.handles.insert(external_id.to_string(), handle);
        self.labels.push(external_id.to_string());
    }
}

/// An undirected weighted co-occurrence graph plus its id table.
#[derive(Debug)]
pub struct CoGraph {
    pub graph: UnGraph<(), u32>,
    pub nodes: NodeTable,
}

impl CoGraph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Build a graph over `node_ids` from persisted co-occurrence links.
///
/// An edge referencing an id outside `node_ids`, a self-loop, or a
/// non-positive weight indicates disagreement between the node set and the
/// edge query; such edges are logged and skipped rather than failing the run.
pub fn build_graph(node_ids: &[String], links: &[Link]) -> CoGraph {
    let mut graph = UnGraph::<(), u32>::with_capacity(node_ids.len(), links.len());
    let mut nodes = NodeTable::default();

    for external_id in node_ids {
        if nodes.get(external_id).is_some() {
            continue;
        }
        let handle = graph.add_node(());
        nodes.insert(external_id, handle);
    }

    for link in links {
        let (source, target) = match (nodes.get(&link.source), nodes.get(&link.target)) {
            (Some(source), Some(target)) => (source, target),
            _ => {
                warn!(
                    "Skipping edge {} -- {}: endpoint not in node set",
                    link.source, link.target
                );
                continue;
            }
        };
        if source == target {
            warn!("Skipping self-loop on {}", link.source);
            continue;
        }
        if link.weight <= 0 {
            warn!(
                "Skipping edge {} -- {}: non-positive weight {}",
                link.source, link.target, link.weight
            );
            continue;
        }
        graph.add_edge(source, target, link.weight as u32);
    }

    CoGraph { graph, nodes }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(source: &str, target: &str, weight: i64) -> Link {
        Link {
            source: source.to_string(),
            target: target.to_string(),
            weight,
            channel_id: "c1".to_string(),
        }
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_simple_graph() {
        let co = build_graph(
            &ids(&["v1", "v2", "v3"]),
            &[link("v1", "v2", 1), link("v2", "v3", 4)],
        );
        assert_eq!(co.node_count(), 3);
        assert_eq!(co.edge_count(), 2);
        assert!(co.graph.edge_weights().all(|&w| w > 0));
    }

    #[test]
    fn test_unknown_endpoint_is_skipped() {
        let co = build_graph(&ids(&["v1", "v2"]), &[link("v1", "ghost", 2)]);
        assert_eq!(co.node_count(), 2);
        assert_eq!(co.edge_count(), 0);
    }

    #[test]
    fn test_self_loop_is_skipped() {
        let co = build_graph(&ids(&["v1", "v2"]), &[link("v1", "v1", 3)]);
        assert_eq!(co.edge_count(), 0);
    }

    #[test]
    fn test_duplicate_node_ids_collapse() {
        let co = build_graph(&ids(&["v1", "v1", "v2"]), &[link("v1", "v2", 1)]);
        assert_eq!(co.node_count(), 2);
        assert_eq!(co.edge_count(), 1);
    }

    #[test]
    fn test_rebuild_is_isomorphic() {
        let node_ids = ids(&["a", "b", "c", "d"]);
        let links = [link("a", "b", 2), link("b", "c", 1), link("c", "d", 5)];

        let edge_multiset = |co: &CoGraph| {
            let mut edges: Vec<(String, String, u32)> = co
                .graph
                .edge_indices()
                .map(|e| {
                    let (s, t) = co.graph.edge_endpoints(e).unwrap();
                    let mut pair = [
                        co.nodes.label(s).unwrap().to_string(),
                        co.nodes.label(t).unwrap().to_string(),
                    ];
                    pair.sort();
                    let [low, high] = pair;
                    (low, high, *co.graph.edge_weight(e).unwrap())
                })
                .collect();
            edges.sort();
            edges
        };

        let first = build_graph(&node_ids, &links);
        let second = build_graph(&node_ids, &links);
        assert_eq!(edge_multiset(&first), edge_multiset(&second));
    }

    #[test]
    fn test_handles_are_dense_and_reversible() {
        let co = build_graph(&ids(&["x", "y", "z"]), &[]);
        for external_id in ["x", "y", "z"] {
            let handle = co.nodes.get(external_id).unwrap();
            assert_eq!(co.nodes.label(handle), Some(external_id));
        }
        assert_eq!(co.nodes.len(), 3);
    }
}
