use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::Graph;

/// A graph whose nodes carry a group color, for graph dumps.
///
/// Color `0` marks nodes outside every group; groups are numbered from `1`
/// in the order given, and a node in several groups takes the last one.
///
/// # Examples
///
/// ```
/// use chronoscope_coupling::coloring::ColoredGraph;
/// use chronoscope_coupling::graph::{Graph, Node};
///
/// let node = |label: &str| Node { label: label.into(), revisions: 1 };
/// let graph = Graph {
///     label: "a.rs".into(),
///     nodes: vec![node("a"), node("b"), node("c")],
///     edges: vec![],
/// };
/// let colored = ColoredGraph::new(graph, [vec!["a", "b"], vec!["b"]]);
/// assert_eq!(colored.color("a"), Some(1));
/// assert_eq!(colored.color("b"), Some(2));
/// assert_eq!(colored.color("c"), Some(0));
/// assert_eq!(colored.color("z"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColoredGraph {
    pub graph: Graph,
    pub colors: BTreeMap<String, usize>,
}

impl ColoredGraph {
    /// Color the nodes of `graph` by `groups`. Labels not in the graph are
    /// ignored.
    pub fn new<G, S>(graph: Graph, groups: G) -> Self
    where
        G: IntoIterator<Item = S>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let mut colors: BTreeMap<String, usize> =
            graph.nodes.iter().map(|n| (n.label.clone(), 0)).collect();
        for (i, group) in groups.into_iter().enumerate() {
            for label in group {
                if let Some(color) = colors.get_mut(label.as_ref()) {
                    *color = i + 1;
                }
            }
        }
        Self { graph, colors }
    }

    /// Color of the node `label`, if it is in the graph.
    pub fn color(&self, label: &str) -> Option<usize> {
        self.colors.get(label).copied()
    }
}
