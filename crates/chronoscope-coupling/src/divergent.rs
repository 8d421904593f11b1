//! Divergent Change: files whose entities fall apart into several
//! independently co-evolving groups.

use chronoscope_core::{ChronoscopeError, DivergentChangeConfig};
use serde::Serialize;

use crate::blobs::{find_anti_blob, find_blobs};
use crate::coloring::ColoredGraph;
use crate::context::TemporalContext;
use crate::graph::{aggregate_graphs, Subgraph};

/// Blobs and anti-blob of one source file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file: String,
    pub blobs: Vec<Subgraph>,
    pub anti_blob: Option<Subgraph>,
    /// Number of blobs, plus one if an anti-blob was found.
    pub responsibilities: usize,
    pub category: &'static str,
    pub name: &'static str,
    pub value: usize,
}

impl FileReport {
    fn new(file: String, blobs: Vec<Subgraph>, anti_blob: Option<Subgraph>) -> Self {
        let responsibilities = blobs.len() + usize::from(anti_blob.is_some());
        Self {
            file,
            blobs,
            anti_blob,
            responsibilities,
            category: "SOLID Breakers",
            name: "Single Responsibility Breakers",
            value: responsibilities,
        }
    }
}

/// Result of [`DivergentChangeAnalysis::analyze`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivergentChangeReport {
    /// Every analyzed file, most responsibilities first.
    pub files: Vec<FileReport>,
    /// Per-file graphs, blobs and anti-blob colored.
    pub colored_graphs: Vec<ColoredGraph>,
}

impl DivergentChangeReport {
    /// Files with at least `min_metric_value` responsibilities.
    pub fn files_above(&self, min_metric_value: usize) -> Vec<&FileReport> {
        self.files
            .iter()
            .filter(|f| f.value >= min_metric_value)
            .collect()
    }
}

/// Blob and anti-blob detection on the coupling graph of every file.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use chronoscope_core::{DivergentChangeConfig, Revision, StructuralEdit};
/// use chronoscope_coupling::{DivergentChangeAnalysis, HistoryAnalyzer};
///
/// let revision = |ids: &[&str]| Revision {
///     id: "r".into(),
///     date: Utc::now(),
///     author: "alice".into(),
///     edits: ids
///         .iter()
///         .map(|id| StructuralEdit::EditEntity { id: id.parse().unwrap() })
///         .collect(),
/// };
/// let history = vec![
///     revision(&["a.rs#f()", "a.rs#g()"]),
///     revision(&["a.rs#x()", "a.rs#y()"]),
/// ];
/// let context = HistoryAnalyzer::new(100, 1, 0.0).unwrap().analyze(history).unwrap();
///
/// let config = DivergentChangeConfig {
///     min_blob_density: 1.0,
///     ..DivergentChangeConfig::default()
/// };
/// let report = DivergentChangeAnalysis::new(config).unwrap().analyze(&context).unwrap();
/// assert_eq!(report.files[0].file, "a.rs");
/// assert_eq!(report.files[0].responsibilities, 2);
/// ```
#[derive(Debug, Clone)]
pub struct DivergentChangeAnalysis {
    config: DivergentChangeConfig,
}

impl DivergentChangeAnalysis {
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::Config`] if `config` is invalid.
    pub fn new(config: DivergentChangeConfig) -> Result<Self, ChronoscopeError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Find the blobs and anti-blob of every file of `context`.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::Config`] if the thresholds are invalid.
    pub fn analyze(
        &self,
        context: &TemporalContext,
    ) -> Result<DivergentChangeReport, ChronoscopeError> {
        let mut files = Vec::new();
        let mut colored_graphs = Vec::new();
        for graph in aggregate_graphs(context) {
            let blobs = find_blobs(&graph, self.config.min_blob_density)?;
            let anti_blob = find_anti_blob(
                &graph,
                self.config.max_anti_coupling,
                self.config.min_anti_blob_size,
            )?;
            let groups: Vec<_> = blobs
                .iter()
                .chain(anti_blob.iter())
                .map(|s| &s.nodes)
                .collect();
            let file = graph.label.clone();
            colored_graphs.push(ColoredGraph::new(graph, groups));
            files.push(FileReport::new(file, blobs, anti_blob));
        }
        files.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.file.cmp(&b.file)));
        Ok(DivergentChangeReport {
            files,
            colored_graphs,
        })
    }
}
