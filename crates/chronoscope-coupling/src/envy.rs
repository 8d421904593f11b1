//! Feature Envy: entities more coupled to a foreign file than to their own.

use std::collections::{BTreeMap, BTreeSet};

use chronoscope_core::{ChronoscopeError, FeatureEnvyConfig, QualifiedId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coloring::ColoredGraph;
use crate::context::TemporalContext;
use crate::graph::build_graph_from;

/// A function that envies another file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureEnvy {
    /// Qualified id of the envious function.
    pub function: String,
    /// Aggregated coupling of the function to its own file.
    pub self_coupling: f64,
    /// The envied source file.
    pub envied_file: String,
    /// Aggregated coupling of the function to the envied file.
    pub envied_coupling: f64,
}

impl FeatureEnvy {
    /// Source file declaring the function.
    pub fn file(&self) -> &str {
        self.function
            .split([':', '#'])
            .next()
            .unwrap_or(&self.function)
    }
}

/// Sum of the coupling of every entity to every source file, its own
/// included.
pub fn function_to_file_coupling(
    context: &TemporalContext,
) -> BTreeMap<&QualifiedId, BTreeMap<&str, f64>> {
    let mut totals: BTreeMap<&QualifiedId, BTreeMap<&str, f64>> = BTreeMap::new();
    for (function, other, coupling) in context.cells() {
        *totals
            .entry(function)
            .or_default()
            .entry(other.source_path())
            .or_default() += coupling;
    }
    totals
}

/// Find the functions whose coupling to another file exceeds
/// `min_envy_ratio` times their coupling to their own file.
///
/// At most `max_envied_files` files are reported per function, most coupled
/// first; the result is sorted by envied coupling descending.
///
/// # Errors
///
/// Returns [`ChronoscopeError::Config`] if `min_envy_ratio` is outside
/// `[0, 1]` or `max_envied_files` is zero.
pub fn find_feature_envy(
    context: &TemporalContext,
    min_envy_ratio: f64,
    max_envied_files: usize,
) -> Result<Vec<FeatureEnvy>, ChronoscopeError> {
    if !(0.0..=1.0).contains(&min_envy_ratio) {
        return Err(ChronoscopeError::Config(format!(
            "min-envy-ratio must be between 0 and 1, got {min_envy_ratio}"
        )));
    }
    if max_envied_files == 0 {
        return Err(ChronoscopeError::Config(
            "max-envied-files must be positive".into(),
        ));
    }

    let mut instances = Vec::new();
    for (function, files) in function_to_file_coupling(context) {
        let own_file = function.source_path();
        let self_coupling = files.get(own_file).copied().unwrap_or(0.0);
        let threshold = self_coupling * min_envy_ratio;

        let mut envied: Vec<(&str, f64)> = files
            .iter()
            .filter(|&(&file, &coupling)| file != own_file && coupling > threshold)
            .map(|(&file, &coupling)| (file, coupling))
            .collect();
        envied.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        instances.extend(envied.into_iter().take(max_envied_files).map(
            |(file, coupling)| FeatureEnvy {
                function: function.to_string(),
                self_coupling,
                envied_file: file.to_string(),
                envied_coupling: coupling,
            },
        ));
    }

    instances.sort_by(|a, b| {
        b.envied_coupling
            .total_cmp(&a.envied_coupling)
            .then_with(|| a.function.cmp(&b.function))
    });
    debug!(instances = instances.len(), "feature envy search finished");
    Ok(instances)
}

/// Feature Envy instances of one source file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvyFileReport {
    pub file: String,
    pub instances: Vec<FeatureEnvy>,
    pub feature_envy_count: usize,
    pub category: &'static str,
    pub name: &'static str,
    pub value: usize,
}

impl EnvyFileReport {
    fn new(file: String, instances: Vec<FeatureEnvy>) -> Self {
        let count = instances.len();
        Self {
            file,
            instances,
            feature_envy_count: count,
            category: "Temporal Coupling Anti-Patterns",
            name: "Feature Envy",
            value: count,
        }
    }
}

/// Result of [`FeatureEnvyAnalysis::analyze`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureEnvyReport {
    /// Files with at least one instance, most instances first.
    pub files: Vec<EnvyFileReport>,
    /// Per file: the file and every file it envies, the envious functions
    /// highlighted.
    pub colored_graphs: Vec<ColoredGraph>,
}

impl FeatureEnvyReport {
    /// Files with at least `min_metric_value` instances.
    pub fn files_above(&self, min_metric_value: usize) -> Vec<&EnvyFileReport> {
        self.files
            .iter()
            .filter(|f| f.value >= min_metric_value)
            .collect()
    }
}

/// Feature Envy detection over a whole [`TemporalContext`].
#[derive(Debug, Clone)]
pub struct FeatureEnvyAnalysis {
    config: FeatureEnvyConfig,
}

impl FeatureEnvyAnalysis {
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::Config`] if `config` is invalid.
    pub fn new(config: FeatureEnvyConfig) -> Result<Self, ChronoscopeError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Detect Feature Envy in `context` and group the instances by file.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::Config`] if the thresholds are invalid.
    pub fn analyze(&self, context: &TemporalContext) -> Result<FeatureEnvyReport, ChronoscopeError> {
        let instances = find_feature_envy(
            context,
            self.config.min_envy_ratio,
            self.config.max_envied_files,
        )?;

        let mut by_file: BTreeMap<String, Vec<FeatureEnvy>> = BTreeMap::new();
        for instance in instances {
            by_file
                .entry(instance.file().to_string())
                .or_default()
                .push(instance);
        }

        let ids_by_file = context.ids_by_file();
        let mut colored_graphs = Vec::with_capacity(by_file.len());
        for (file, instances) in &by_file {
            let mut files: BTreeSet<&str> =
                instances.iter().map(|i| i.envied_file.as_str()).collect();
            files.insert(file.as_str());
            let ids = files
                .iter()
                .filter_map(|f| ids_by_file.get(f))
                .flatten()
                .copied();
            let graph = build_graph_from(file, ids, context);

            let file_groups: Vec<Vec<&QualifiedId>> = files
                .iter()
                .filter_map(|f| ids_by_file.get(f))
                .map(|ids| ids.iter().copied().collect())
                .collect();
            let envious: Vec<Vec<&str>> =
                instances.iter().map(|i| vec![i.function.as_str()]).collect();
            let groups: Vec<Vec<&str>> = file_groups
                .iter()
                .map(|ids| ids.iter().map(|id| id.as_str()).collect())
                .chain(envious)
                .collect();
            colored_graphs.push(ColoredGraph::new(graph, groups));
        }

        let mut files: Vec<EnvyFileReport> = by_file
            .into_iter()
            .map(|(file, instances)| EnvyFileReport::new(file, instances))
            .collect();
        files.sort_by(|a, b| b.value.cmp(&a.value));

        Ok(FeatureEnvyReport {
            files,
            colored_graphs,
        })
    }
}
