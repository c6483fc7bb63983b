//! Per-node metrics over a built co-occurrence graph. Scores are indexed by
//! the graph's dense node handles; callers translate back to external ids
//! through the `NodeTable`.

use petgraph::graph::UnGraph;
use std::collections::VecDeque;
use tracing::debug;

pub const PAGERANK_DAMPING: f64 = 0.85;
pub const PAGERANK_TOLERANCE: f64 = 1e-8;
pub const PAGERANK_MAX_ITERATIONS: usize = 100;

/// Weighted PageRank by power iteration. Transition probability out of a
/// node is proportional to edge weight. Scores are kept on the scale where
/// they sum to the node count: initialization is 1.0 per node and the
/// teleport term is (1 - damping) per node.
pub fn pagerank(
    graph: &UnGraph<(), u32>,
    damping: f64,
    tolerance: f64,
    max_iterations: usize,
) -> Vec<f64> {
    let n = graph.node_count();
    if n == 0 {
        return Vec::new();
    }

    let (adjacency, strength) = weighted_adjacency(graph);
    let mut scores = vec![1.0_f64; n];

    for iteration in 0..max_iterations {
        let mut new_scores = vec![1.0 - damping; n];

        // Nodes without edges spread their mass uniformly
        let dangling: f64 = (0..n)
            .filter(|&i| strength[i] == 0.0)
            .map(|i| scores[i])
            .sum();
        let dangling_share = damping * dangling / n as f64;
        for score in new_scores.iter_mut() {
            *score += dangling_share;
        }

        for i in 0..n {
            if strength[i] == 0.0 {
                continue;
            }
            let outflow = damping * scores[i] / strength[i];
            for &(neighbor, weight) in &adjacency[i] {
                new_scores[neighbor] += outflow * weight;
            }
        }

        let diff: f64 = scores
            .iter()
            .zip(new_scores.iter())
            .map(|(old, new)| (old - new).abs())
            .sum();
        scores = new_scores;

        if diff < tolerance {
            debug!("PageRank converged after {} iterations", iteration + 1);
            break;
        }
    }

    scores
}

/// Sum of incident edge weights per node.
pub fn weighted_degree(graph: &UnGraph<(), u32>) -> Vec<f64> {
    let mut degrees = vec![0.0_f64; graph.node_count()];
    for edge in graph.edge_indices() {
        if let (Some((source, target)), Some(&weight)) =
            (graph.edge_endpoints(edge), graph.edge_weight(edge))
        {
            degrees[source.index()] += weight as f64;
            degrees[target.index()] += weight as f64;
        }
    }
    degrees
}

/// Approximate betweenness centrality via Brandes accumulation from a
/// deterministic sample of source nodes (evenly spaced over the arena).
/// Shortest paths are hop counts; edge weights do not enter here. When
/// fewer sources than nodes are used, scores are scaled by n / sources.
pub fn sampled_betweenness(graph: &UnGraph<(), u32>, samples: usize) -> Vec<f64> {
    let n = graph.node_count();
    if n == 0 || samples == 0 {
        return vec![0.0; n];
    }

    let (adjacency, _) = weighted_adjacency(graph);
    let mut centrality = vec![0.0_f64; n];

    let step = if n <= samples { 1 } else { n / samples };
    let sources: Vec<usize> = (0..n).step_by(step).take(samples).collect();

    for &s in &sources {
        let mut stack = Vec::new();
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0_f64; n];
        let mut dist = vec![-1_i64; n];
        let mut delta = vec![0.0_f64; n];

        sigma[s] = 1.0;
        dist[s] = 0;
        let mut queue = VecDeque::new();
        queue.push_back(s);

        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &(w, _) in &adjacency[v] {
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    predecessors[w].push(v);
                }
            }
        }

        while let Some(w) = stack.pop() {
            for &v in &predecessors[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }

    if sources.len() < n {
        let scale = n as f64 / sources.len() as f64;
        for score in centrality.iter_mut() {
            *score *= scale;
        }
    }

    centrality
}

fn weighted_adjacency(graph: &UnGraph<(), u32>) -> (Vec<Vec<(usize, f64)>>, Vec<f64>) {
    let n = graph.node_count();
    let mut adjacency: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    let mut strength = vec![0.0_f64; n];

    for edge in graph.edge_indices() {
        if let (Some((source, target)), Some(&weight)) =
            (graph.edge_endpoints(edge), graph.edge_weight(edge))
        {
            let (s, t, w) = (source.index(), target.index(), weight as f64);
            adjacency[s].push((t, w));
            adjacency[t].push((s, w));
            strength[s] += w;
            strength[t] += w;
        }
    }

    (adjacency, strength)
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::graph::UnGraph;

    fn graph_from_edges(n: usize, edges: &[(usize, usize, u32)]) -> UnGraph<(), u32> {
        let mut graph = UnGraph::<(), u32>::new_undirected();
        let handles: Vec<_> = (0..n).map(|_| graph.add_node(())).collect();
        for &(s, t, w) in edges {
            graph.add_edge(handles[s], handles[t], w);
        }
        graph
    }

    fn run_pagerank(graph: &UnGraph<(), u32>) -> Vec<f64> {
        pagerank(
            graph,
            PAGERANK_DAMPING,
            PAGERANK_TOLERANCE,
            PAGERANK_MAX_ITERATIONS,
        )
    }

    #[test]
    fn test_pagerank_scores_sum_to_node_count() {
        let graph = graph_from_edges(4, &[(0, 1, 1), (1, 2, 2), (2, 3, 1)]);
        let scores = run_pagerank(&graph);
        let total: f64 = scores.iter().sum();
        assert!((total - 4.0).abs() < 1e-6, "sum was {}", total);
    }

    #[test]
    fn test_pagerank_symmetric_graph_gives_equal_scores() {
        // Triangle with uniform weights
        let graph = graph_from_edges(3, &[(0, 1, 1), (1, 2, 1), (2, 0, 1)]);
        let scores = run_pagerank(&graph);
        assert!((scores[0] - scores[1]).abs() < 1e-6);
        assert!((scores[1] - scores[2]).abs() < 1e-6);
    }

    #[test]
    fn test_pagerank_star_center_scores_highest() {
        let graph = graph_from_edges(4, &[(0, 1, 1), (0, 2, 1), (0, 3, 1)]);
        let scores = run_pagerank(&graph);
        assert!(scores[0] > scores[1]);
        assert!(scores[0] > scores[2]);
        assert!(scores[0] > scores[3]);
    }

    #[test]
    fn test_pagerank_follows_edge_weight() {
        // Node 1 is tied to 0 much more strongly than node 2 is
        let graph = graph_from_edges(3, &[(0, 1, 10), (0, 2, 1)]);
        let scores = run_pagerank(&graph);
        assert!(scores[1] > scores[2]);
    }

    #[test]
    fn test_pagerank_empty_graph() {
        let graph = UnGraph::<(), u32>::new_undirected();
        assert!(run_pagerank(&graph).is_empty());
    }

    #[test]
    fn test_pagerank_isolated_nodes_keep_teleport_mass() {
        let graph = graph_from_edges(3, &[]);
        let scores = run_pagerank(&graph);
        let total: f64 = scores.iter().sum();
        assert!((total - 3.0).abs() < 1e-6);
        assert!((scores[0] - scores[1]).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_degree() {
        let graph = graph_from_edges(3, &[(0, 1, 3), (1, 2, 2)]);
        let degrees = weighted_degree(&graph);
        assert_eq!(degrees, vec![3.0, 5.0, 2.0]);
    }

    #[test]
    fn test_betweenness_path_center_highest() {
        let graph = graph_from_edges(5, &[(0, 1, 1), (1, 2, 1), (2, 3, 1), (3, 4, 1)]);
        let scores = sampled_betweenness(&graph, 5);
        let center = scores[2];
        for (i, &score) in scores.iter().enumerate() {
            if i != 2 {
                assert!(center >= score);
            }
        }
        assert!(center > 0.0);
    }

    #[test]
    fn test_betweenness_empty_graph() {
        let graph = UnGraph::<(), u32>::new_undirected();
        assert!(sampled_betweenness(&graph, 8).is_empty());
    }
}
