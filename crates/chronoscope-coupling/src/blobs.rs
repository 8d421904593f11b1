//! Blob and anti-blob detection over coupling graphs.
//!
//! A blob is a densely coupled group of entities inside one file, found by
//! greedy min-degree peeling of each connected component. The anti-blob is
//! the set of entities weakly coupled to everything else.

use std::collections::{BTreeSet, HashMap};

use chronoscope_core::ChronoscopeError;
use tracing::{debug, warn};

use crate::graph::{Graph, Subgraph};
use crate::heap::IndexedMinHeap;

/// Graphs with more nodes than this are not decomposed.
pub const MAX_SIZE: usize = 300;

/// Find the disjoint blobs of `graph` with density of at least
/// `min_density`, component by component in discovery order.
///
/// The density of a node set is the sum of its weighted degrees in the
/// induced subgraph divided by its size. Graphs with more than [`MAX_SIZE`]
/// nodes yield one singleton subgraph of density 0 per node instead.
///
/// # Errors
///
/// Returns [`ChronoscopeError::Config`] if `min_density` is negative.
///
/// # Examples
///
/// ```
/// use chronoscope_coupling::blobs::find_blobs;
/// use chronoscope_coupling::graph::{Edge, Graph, Node};
///
/// let node = |label: &str| Node { label: label.into(), revisions: 4 };
/// let edge = |a: &str, b: &str| Edge {
///     source: a.into(),
///     target: b.into(),
///     revisions: 4,
///     coupling: 1.0,
/// };
/// let graph = Graph {
///     label: "a.rs".into(),
///     nodes: vec![node("a"), node("b"), node("c"), node("d")],
///     edges: vec![edge("a", "b"), edge("a", "c"), edge("b", "c")],
/// };
///
/// let blobs = find_blobs(&graph, 2.0).unwrap();
/// assert_eq!(blobs.len(), 1);
/// assert_eq!(blobs[0].size(), 3);
/// assert_eq!(blobs[0].density, 2.0);
/// ```
pub fn find_blobs(graph: &Graph, min_density: f64) -> Result<Vec<Subgraph>, ChronoscopeError> {
    if min_density.is_nan() || min_density < 0.0 {
        return Err(ChronoscopeError::Config(format!(
            "min-blob-density can't be negative, got {min_density}"
        )));
    }
    if graph.nodes.len() > MAX_SIZE {
        warn!(
            graph = %graph.label,
            nodes = graph.nodes.len(),
            max = MAX_SIZE,
            "graph too large, skipping blob decomposition"
        );
        return Ok(graph
            .nodes
            .iter()
            .map(|n| Subgraph {
                nodes: BTreeSet::from([n.label.clone()]),
                density: 0.0,
            })
            .collect());
    }

    let weighted = WeightedGraph::new(graph);
    let mut blobs = Vec::new();
    for component in graph.components() {
        let mut remaining: Vec<usize> = component
            .iter()
            .filter_map(|label| weighted.index.get(label).copied())
            .collect();
        remaining.sort_unstable();
        while !remaining.is_empty() {
            let (blob, density) = weighted.densest(&remaining);
            if density < min_density {
                break;
            }
            remaining.retain(|node| !blob.contains(node));
            blobs.push(Subgraph {
                nodes: blob.iter().map(|&i| weighted.labels[i].to_string()).collect(),
                density,
            });
        }
    }
    debug!(graph = %graph.label, blobs = blobs.len(), "blob search finished");
    Ok(blobs)
}

/// Find the entities whose weighted degree over the whole graph is at most
/// `max_coupling`, if there are at least `min_size` of them.
///
/// The density of the result is the coupling of every edge touching it,
/// counted once, divided by its size.
///
/// # Errors
///
/// Returns [`ChronoscopeError::Config`] if `max_coupling` is negative or
/// `min_size` is zero.
pub fn find_anti_blob(
    graph: &Graph,
    max_coupling: f64,
    min_size: usize,
) -> Result<Option<Subgraph>, ChronoscopeError> {
    if max_coupling.is_nan() || max_coupling < 0.0 {
        return Err(ChronoscopeError::Config(format!(
            "max-anti-coupling can't be negative, got {max_coupling}"
        )));
    }
    if min_size == 0 {
        return Err(ChronoscopeError::Config(
            "min-anti-blob-size must be positive".into(),
        ));
    }

    let nodes: BTreeSet<String> = graph
        .degrees()
        .into_iter()
        .filter(|&(_, degree)| degree <= max_coupling)
        .map(|(label, _)| label.to_string())
        .collect();
    if nodes.len() < min_size {
        return Ok(None);
    }

    let weight: f64 = graph
        .edges
        .iter()
        .filter(|e| e.source != e.target)
        .filter(|e| nodes.contains(&e.source) || nodes.contains(&e.target))
        .map(|e| e.coupling)
        .sum();
    let density = weight / nodes.len() as f64;
    Ok(Some(Subgraph { nodes, density }))
}

/// Adjacency lists over node indices in label order.
struct WeightedGraph<'a> {
    labels: Vec<&'a str>,
    index: HashMap<&'a str, usize>,
    adjacency: Vec<Vec<(usize, f64)>>,
}

impl<'a> WeightedGraph<'a> {
    fn new(graph: &'a Graph) -> Self {
        let mut labels: Vec<&str> = graph.nodes.iter().map(|n| n.label.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        let index: HashMap<&str, usize> =
            labels.iter().enumerate().map(|(i, &l)| (l, i)).collect();
        let mut adjacency = vec![Vec::new(); labels.len()];
        for edge in &graph.edges {
            let (Some(&a), Some(&b)) = (
                index.get(edge.source.as_str()),
                index.get(edge.target.as_str()),
            ) else {
                continue;
            };
            if a != b {
                adjacency[a].push((b, edge.coupling));
                adjacency[b].push((a, edge.coupling));
            }
        }
        Self {
            labels,
            index,
            adjacency,
        }
    }

    /// Greedy min-degree peeling of the subgraph induced by `members`
    /// (sorted node indices). Returns the densest node set seen and its
    /// density; ties keep the larger, earlier set.
    fn densest(&self, members: &[usize]) -> (BTreeSet<usize>, f64) {
        let k = members.len();
        let local: HashMap<usize, usize> =
            members.iter().enumerate().map(|(i, &m)| (m, i)).collect();
        let adjacency: Vec<Vec<(usize, f64)>> = members
            .iter()
            .map(|&m| {
                self.adjacency[m]
                    .iter()
                    .filter_map(|&(other, c)| local.get(&other).map(|&o| (o, c)))
                    .collect()
            })
            .collect();
        let mut degrees: Vec<f64> = adjacency
            .iter()
            .map(|edges| edges.iter().map(|&(_, c)| c).sum())
            .collect();
        let mut degree_sum: f64 = degrees.iter().sum();

        let mut best_density = degree_sum / k as f64;
        let mut best_peeled = 0;
        let mut peeled = Vec::with_capacity(k);
        let mut heap = IndexedMinHeap::new(degrees.clone());

        while let Some((node, _)) = heap.pop() {
            peeled.push(node);
            for &(other, coupling) in &adjacency[node] {
                if heap.contains(other) {
                    degrees[other] -= coupling;
                    heap.update(other, degrees[other]);
                    degree_sum -= 2.0 * coupling;
                }
            }
            let left = k - peeled.len();
            if left == 0 {
                break;
            }
            let density = degree_sum / left as f64;
            if density > best_density {
                best_density = density;
                best_peeled = peeled.len();
            }
        }

        let dropped: BTreeSet<usize> = peeled[..best_peeled].iter().copied().collect();
        let blob = (0..k)
            .filter(|i| !dropped.contains(i))
            .map(|i| members[i])
            .collect();
        (blob, best_density)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::graph;

    fn labels(subgraph: &Subgraph) -> Vec<&str> {
        subgraph.nodes.iter().map(String::as_str).collect()
    }

    #[test]
    fn negative_density_rejected() {
        let g = graph("g", &["a"], &[]);
        assert!(matches!(
            find_blobs(&g, -1.0),
            Err(ChronoscopeError::Config(_))
        ));
    }

    #[test]
    fn clique_with_tail_peels_the_tail() {
        let g = graph(
            "g",
            &[],
            &[
                ("a", "b", 1.0),
                ("a", "c", 1.0),
                ("b", "c", 1.0),
                ("c", "d", 0.1),
            ],
        );
        let blobs = find_blobs(&g, 1.5).unwrap();
        assert_eq!(blobs.len(), 1);
        assert_eq!(labels(&blobs[0]), vec!["a", "b", "c"]);
        assert!((blobs[0].density - 2.0).abs() < 1e-12);
    }

    #[test]
    fn each_component_is_searched() {
        let g = graph(
            "g",
            &["lonely"],
            &[("a", "b", 1.0), ("x", "y", 1.0)],
        );
        let blobs = find_blobs(&g, 1.0).unwrap();
        assert_eq!(blobs.len(), 2);
        assert_eq!(labels(&blobs[0]), vec!["a", "b"]);
        assert_eq!(labels(&blobs[1]), vec!["x", "y"]);
    }

    #[test]
    fn repeated_extraction_within_a_component() {
        // Two triangles joined by a weak bridge.
        let g = graph(
            "g",
            &[],
            &[
                ("a", "b", 1.0),
                ("a", "c", 1.0),
                ("b", "c", 1.0),
                ("c", "x", 0.1),
                ("x", "y", 0.9),
                ("x", "z", 0.9),
                ("y", "z", 0.9),
            ],
        );
        let blobs = find_blobs(&g, 1.5).unwrap();
        assert_eq!(blobs.len(), 2);
        assert_eq!(labels(&blobs[0]), vec!["a", "b", "c"]);
        assert_eq!(labels(&blobs[1]), vec!["x", "y", "z"]);
        assert!(blobs.iter().all(|b| b.density >= 1.5));
    }

    #[test]
    fn ties_favor_the_larger_set() {
        // Triangle plus pendant: both the full set and the triangle have
        // density 2.
        let g = graph(
            "g",
            &[],
            &[("a", "b", 1.0), ("a", "c", 1.0), ("b", "c", 1.0), ("a", "d", 1.0)],
        );
        let blobs = find_blobs(&g, 1.5).unwrap();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].size(), 4);
        assert_eq!(blobs[0].density, 2.0);
    }

    #[test]
    fn edgeless_components_need_zero_density() {
        let g = graph("g", &["a", "b"], &[]);
        assert!(find_blobs(&g, 0.1).unwrap().is_empty());
        let blobs = find_blobs(&g, 0.0).unwrap();
        assert_eq!(blobs.len(), 2);
        assert!(blobs.iter().all(|b| b.density == 0.0 && b.size() == 1));
    }

    #[test]
    fn oversized_graph_falls_back_to_singletons() {
        let isolated: Vec<String> = (0..=MAX_SIZE).map(|i| format!("n{i:03}")).collect();
        let refs: Vec<&str> = isolated.iter().map(String::as_str).collect();
        let g = graph("big", &refs, &[("n000", "n001", 1.0)]);
        let blobs = find_blobs(&g, 2.5).unwrap();
        assert_eq!(blobs.len(), MAX_SIZE + 1);
        assert!(blobs.iter().all(|b| b.size() == 1 && b.density == 0.0));
    }

    #[test]
    fn anti_blob_collects_weak_nodes() {
        let g = graph(
            "g",
            &["u", "v"],
            &[("a", "b", 1.0), ("b", "w", 0.2), ("a", "x", 0.3)],
        );
        let anti = find_anti_blob(&g, 0.5, 2).unwrap().unwrap();
        assert_eq!(labels(&anti), vec!["u", "v", "w", "x"]);
        assert!((anti.density - 0.5 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn anti_blob_requires_min_size() {
        let g = graph("g", &["u"], &[("a", "b", 1.0)]);
        assert!(find_anti_blob(&g, 0.5, 2).unwrap().is_none());
    }

    #[test]
    fn anti_blob_validates_thresholds() {
        let g = graph("g", &["u"], &[]);
        assert!(find_anti_blob(&g, -0.1, 1).is_err());
        assert!(find_anti_blob(&g, 0.1, 0).is_err());
    }
}
