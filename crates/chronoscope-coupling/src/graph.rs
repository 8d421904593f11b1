//! Coupling graphs projected from a [`TemporalContext`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chronoscope_core::QualifiedId;
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};

use crate::context::TemporalContext;

/// An entity of a coupling graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Qualified id of the entity.
    pub label: String,
    /// Revisions touching the entity.
    pub revisions: u32,
}

/// An undirected coupling relation, stored with `source < target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: String,
    pub target: String,
    /// Revisions touching both endpoints.
    pub revisions: u32,
    /// Temporal coupling of the endpoints.
    pub coupling: f64,
}

/// A labeled, undirected, weighted graph of coupled entities.
///
/// Nodes are sorted by label and edges by `(source, target)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    pub label: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// A subset of graph nodes with its density.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subgraph {
    pub nodes: BTreeSet<String>,
    pub density: f64,
}

impl Subgraph {
    /// Number of nodes.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }
}

/// Project `context` onto `ids`.
///
/// Emits one node per id with its change count and one edge per unordered
/// pair of ids with recorded coupling.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use chronoscope_core::{Revision, StructuralEdit};
/// use chronoscope_coupling::{build_graph_from, HistoryAnalyzer};
///
/// let revision = Revision {
///     id: "r1".into(),
///     date: Utc::now(),
///     author: "alice".into(),
///     edits: vec![
///         StructuralEdit::EditEntity { id: "a.rs#f()".parse().unwrap() },
///         StructuralEdit::EditEntity { id: "a.rs#g()".parse().unwrap() },
///     ],
/// };
/// let context = HistoryAnalyzer::new(100, 1, 0.0).unwrap().analyze([revision]).unwrap();
/// let ids = context.entity_ids();
/// let graph = build_graph_from("a.rs", ids.iter().copied(), &context);
/// assert_eq!(graph.nodes.len(), 2);
/// assert_eq!(graph.edges.len(), 1);
/// assert_eq!(graph.edges[0].coupling, 1.0);
/// ```
pub fn build_graph_from<'a, I>(label: &str, ids: I, context: &TemporalContext) -> Graph
where
    I: IntoIterator<Item = &'a QualifiedId>,
{
    let ids: BTreeSet<&QualifiedId> = ids.into_iter().collect();
    let nodes = ids
        .iter()
        .map(|id| Node {
            label: id.to_string(),
            revisions: context.change_count(id),
        })
        .collect();

    let mut edges = Vec::new();
    for id in &ids {
        for (other, coupling) in context.neighbors(id) {
            if *id < other && ids.contains(other) {
                edges.push(Edge {
                    source: id.to_string(),
                    target: other.to_string(),
                    revisions: context.joint_change_count(id, other),
                    coupling,
                });
            }
        }
    }

    Graph {
        label: label.to_string(),
        nodes,
        edges,
    }
}

/// One graph per source file of `context`, labeled with the file path.
pub fn aggregate_graphs(context: &TemporalContext) -> Vec<Graph> {
    context
        .ids_by_file()
        .into_iter()
        .map(|(path, ids)| build_graph_from(path, ids, context))
        .collect()
}

impl Graph {
    /// Labels of all nodes.
    pub fn node_labels(&self) -> BTreeSet<&str> {
        self.nodes.iter().map(|n| n.label.as_str()).collect()
    }

    /// The subgraph induced by the nodes satisfying `keep`.
    pub fn filter_nodes(&self, mut keep: impl FnMut(&str) -> bool) -> Graph {
        let nodes: Vec<Node> = self
            .nodes
            .iter()
            .filter(|n| keep(&n.label))
            .cloned()
            .collect();
        let labels: BTreeSet<&str> = nodes.iter().map(|n| n.label.as_str()).collect();
        let edges = self
            .edges
            .iter()
            .filter(|e| labels.contains(e.source.as_str()) && labels.contains(e.target.as_str()))
            .cloned()
            .collect();
        Graph {
            label: self.label.clone(),
            nodes,
            edges,
        }
    }

    /// The subgraph induced by `labels`.
    pub fn intersect(&self, labels: &BTreeSet<String>) -> Graph {
        self.filter_nodes(|label| labels.contains(label))
    }

    /// The subgraph induced by every node not in `labels`.
    pub fn without(&self, labels: &BTreeSet<String>) -> Graph {
        self.filter_nodes(|label| !labels.contains(label))
    }

    /// Weighted degree (sum of incident coupling) of every node.
    pub fn degrees(&self) -> BTreeMap<&str, f64> {
        let mut degrees: BTreeMap<&str, f64> =
            self.nodes.iter().map(|n| (n.label.as_str(), 0.0)).collect();
        for edge in &self.edges {
            if edge.source == edge.target {
                continue;
            }
            if !degrees.contains_key(edge.source.as_str())
                || !degrees.contains_key(edge.target.as_str())
            {
                continue;
            }
            for end in [edge.source.as_str(), edge.target.as_str()] {
                if let Some(d) = degrees.get_mut(end) {
                    *d += edge.coupling;
                }
            }
        }
        degrees
    }

    /// Connected components, each as a sorted label set, ordered by their
    /// smallest label. Isolated nodes form singleton components.
    pub fn components(&self) -> Vec<BTreeSet<&str>> {
        let index: HashMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.label.as_str(), i))
            .collect();
        let mut sets = UnionFind::<usize>::new(self.nodes.len());
        for edge in &self.edges {
            if let (Some(&a), Some(&b)) =
                (index.get(edge.source.as_str()), index.get(edge.target.as_str()))
            {
                sets.union(a, b);
            }
        }
        let mut components: BTreeMap<usize, BTreeSet<&str>> = BTreeMap::new();
        for (i, root) in sets.into_labeling().into_iter().enumerate() {
            components
                .entry(root)
                .or_default()
                .insert(self.nodes[i].label.as_str());
        }
        let mut components: Vec<BTreeSet<&str>> = components.into_values().collect();
        components.sort_by(|a, b| a.first().cmp(&b.first()));
        components
    }
}
