//! Node centrality, used to weight the gateway coefficient.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ndarray::{Array1, ArrayView2};
use ordered_float::OrderedFloat;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::connectivity::strength;

/// Anything that scores every node of a connectivity matrix.
pub trait Centrality {
    fn centrality(&self, matrix: &ArrayView2<f64>) -> Array1<f64>;
}

/// Node strength: the NaN-ignoring row sum. The default for the gateway
/// coefficient.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeStrength;

impl Centrality for NodeStrength {
    fn centrality(&self, matrix: &ArrayView2<f64>) -> Array1<f64> {
        strength(matrix)
    }
}

/// Weighted betweenness centrality.
///
/// Positive weights are connection strengths, so path lengths are their
/// inverses; non-positive and NaN edges are absent. Counts are over ordered
/// (source, target) pairs, as in `betweenness_wei` of the Brain Connectivity
/// Toolbox, so a symmetric matrix gives twice the undirected count.
#[derive(Debug, Clone, Copy, Default)]
pub struct Betweenness;

impl Betweenness {
    /// Directed graph of inverted positive weights, self loops dropped.
    fn length_graph(matrix: &ArrayView2<f64>) -> DiGraph<usize, f64> {
        let mut graph = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..matrix.nrows()).map(|i| graph.add_node(i)).collect();
        for ((i, j), &w) in matrix.indexed_iter() {
            if i != j && w > 0.0 {
                graph.add_edge(nodes[i], nodes[j], 1.0 / w);
            }
        }
        graph
    }
}

impl Centrality for Betweenness {
    /// Brandes' algorithm with Dijkstra for the single source stage.
    fn centrality(&self, matrix: &ArrayView2<f64>) -> Array1<f64> {
        let graph = Self::length_graph(matrix);
        let n = graph.node_count();
        let mut betweenness = Array1::zeros(n);

        for source in graph.node_indices() {
            let mut stack = Vec::with_capacity(n);
            let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
            let mut paths = vec![0.0f64; n];
            let mut dist = vec![f64::INFINITY; n];
            let mut settled = vec![false; n];

            paths[source.index()] = 1.0;
            dist[source.index()] = 0.0;
            let mut heap = BinaryHeap::new();
            heap.push(Reverse((OrderedFloat(0.0), source.index())));

            while let Some(Reverse((OrderedFloat(d), v))) = heap.pop() {
                if settled[v] {
                    continue;
                }
                settled[v] = true;
                stack.push(v);
                for edge in graph.edges(NodeIndex::new(v)) {
                    let w = edge.target().index();
                    let candidate = d + edge.weight();
                    if candidate < dist[w] {
                        dist[w] = candidate;
                        paths[w] = paths[v];
                        predecessors[w].clear();
                        predecessors[w].push(v);
                        heap.push(Reverse((OrderedFloat(candidate), w)));
                    } else if candidate == dist[w] && !settled[w] {
                        paths[w] += paths[v];
                        predecessors[w].push(v);
                    }
                }
            }

            let mut dependency = vec![0.0f64; n];
            while let Some(w) = stack.pop() {
                for &v in &predecessors[w] {
                    dependency[v] += paths[v] / paths[w] * (1.0 + dependency[w]);
                }
                if w != source.index() {
                    betweenness[w] += dependency[w];
                }
            }
        }
        betweenness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_node_strength_ignores_nan() {
        let m = array![[0.0, 1.0, f64::NAN], [1.0, 0.0, 2.0], [0.5, 2.0, 0.0]];
        assert_eq!(NodeStrength.centrality(&m.view()), array![1.0, 3.0, 2.5]);
    }

    #[test]
    fn test_betweenness_path() {
        // 0 - 1 - 2
        let m = array![[0.0, 1.0, 0.0], [1.0, 0.0, 1.0], [0.0, 1.0, 0.0]];
        assert_eq!(Betweenness.centrality(&m.view()), array![0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_betweenness_prefers_strong_detour() {
        // direct 0-2 edge is weak (length 10); 0-1-2 has length 2
        let m = array![[0.0, 1.0, 0.1], [1.0, 0.0, 1.0], [0.1, 1.0, 0.0]];
        assert_eq!(Betweenness.centrality(&m.view()), array![0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_betweenness_splits_equal_paths() {
        // square 0-1-3, 0-2-3: two equal shortest paths between 0 and 3
        let m = array![
            [0.0, 1.0, 1.0, 0.0],
            [1.0, 0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0, 1.0],
            [0.0, 1.0, 1.0, 0.0]
        ];
        let b = Betweenness.centrality(&m.view());
        assert_eq!(b, array![1.0, 1.0, 1.0, 1.0]);
    }
}
