//! Temporal coupling analysis: change co-occurrence, coupling graphs and
//! the design smells they reveal.
//!
//! A [`HistoryAnalyzer`] folds a revision history into a
//! [`TemporalContext`]. Per-file coupling graphs built from the context feed
//! blob and anti-blob detection (Divergent Change), while the whole context
//! feeds Feature Envy detection.

pub mod analyzer;
pub mod blobs;
pub mod coloring;
pub mod context;
pub mod divergent;
pub mod envy;
pub mod graph;
pub mod heap;
pub mod matrix;

pub use analyzer::HistoryAnalyzer;
pub use blobs::{find_anti_blob, find_blobs, MAX_SIZE};
pub use coloring::ColoredGraph;
pub use context::{CoupledPair, TemporalContext};
pub use divergent::{DivergentChangeAnalysis, DivergentChangeReport, FileReport};
pub use envy::{
    find_feature_envy, function_to_file_coupling, EnvyFileReport, FeatureEnvy,
    FeatureEnvyAnalysis, FeatureEnvyReport,
};
pub use graph::{aggregate_graphs, build_graph_from, Edge, Graph, Node, Subgraph};
