use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ChronoscopeError;
use crate::language::{AnalyzerRegistry, ExtensionAnalyzer};
use crate::source::SourceNodeKind;

/// Top-level configuration loaded from `.chronoscope.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use chronoscope_core::ChronoscopeConfig;
///
/// let config = ChronoscopeConfig::default();
/// assert_eq!(config.coupling.max_change_set, 100);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChronoscopeConfig {
    /// History scan and temporal coupling thresholds.
    #[serde(default)]
    pub coupling: CouplingConfig,
    /// Blob / anti-blob thresholds for Divergent Change detection.
    #[serde(default)]
    pub divergent_change: DivergentChangeConfig,
    /// Feature Envy thresholds.
    #[serde(default)]
    pub feature_envy: FeatureEnvyConfig,
    /// Extra per-language entity tracking rules.
    #[serde(default)]
    pub languages: BTreeMap<String, LanguageConfig>,
}

impl ChronoscopeConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::Io`] if the file cannot be read, or
    /// [`ChronoscopeError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, ChronoscopeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use chronoscope_core::ChronoscopeConfig;
    ///
    /// let toml = r#"
    /// [coupling]
    /// min_revisions = 3
    /// "#;
    /// let config = ChronoscopeConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.coupling.min_revisions, 3);
    /// assert_eq!(config.coupling.min_coupling, 0.1);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, ChronoscopeError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Check every threshold against its documented domain.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::Config`] naming the first offending option.
    pub fn validate(&self) -> Result<(), ChronoscopeError> {
        self.coupling.validate()?;
        self.divergent_change.validate()?;
        self.feature_envy.validate()?;
        for (name, language) in &self.languages {
            if language.extensions.is_empty() {
                return Err(ChronoscopeError::Config(format!(
                    "languages.{name}.extensions must not be empty"
                )));
            }
        }
        Ok(())
    }

    /// Build the analyzer registry described by `[languages.*]`.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::Config`] for an unknown entity kind.
    pub fn analyzer_registry(&self) -> Result<AnalyzerRegistry, ChronoscopeError> {
        let mut registry = AnalyzerRegistry::default();
        for (name, language) in &self.languages {
            let kinds = language
                .track
                .iter()
                .map(|k| k.parse::<SourceNodeKind>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ChronoscopeError::Config(format!("languages.{name}.track: {e}")))?;
            registry.register(Arc::new(ExtensionAnalyzer::new(
                name,
                &language.extensions,
                kinds,
            )));
        }
        Ok(registry)
    }
}

/// History scan and temporal coupling thresholds.
///
/// # Examples
///
/// ```
/// use chronoscope_core::CouplingConfig;
///
/// let config = CouplingConfig::default();
/// assert_eq!(config.max_change_set, 100);
/// assert_eq!(config.min_revisions, 5);
/// assert_eq!(config.min_coupling, 0.1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouplingConfig {
    /// Revisions touching more files than this are excluded from joint
    /// change accumulation (default: 100).
    #[serde(default = "default_max_change_set")]
    pub max_change_set: usize,
    /// Minimum revisions of an entity or a coupling relation (default: 5).
    #[serde(default = "default_min_revisions")]
    pub min_revisions: u32,
    /// Minimum temporal coupling between two entities (default: 0.1).
    #[serde(default = "default_min_coupling")]
    pub min_coupling: f64,
}

fn default_max_change_set() -> usize {
    100
}

fn default_min_revisions() -> u32 {
    5
}

fn default_min_coupling() -> f64 {
    0.1
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            max_change_set: default_max_change_set(),
            min_revisions: default_min_revisions(),
            min_coupling: default_min_coupling(),
        }
    }
}

impl CouplingConfig {
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::Config`] if a threshold is out of range.
    pub fn validate(&self) -> Result<(), ChronoscopeError> {
        if self.max_change_set == 0 {
            return Err(ChronoscopeError::Config("max-change-set must be positive".into()));
        }
        if self.min_revisions == 0 {
            return Err(ChronoscopeError::Config("min-revisions must be positive".into()));
        }
        if self.min_coupling.is_nan() || self.min_coupling < 0.0 {
            return Err(ChronoscopeError::Config(format!(
                "min-coupling can't be negative, got {}",
                self.min_coupling
            )));
        }
        Ok(())
    }
}

/// Divergent Change detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivergentChangeConfig {
    /// Minimum average degree (sum of coupling) of entities in a blob
    /// (default: 2.5).
    #[serde(default = "default_min_blob_density")]
    pub min_blob_density: f64,
    /// Maximum degree (sum of coupling) of an entity in an anti-blob
    /// (default: 0.5).
    #[serde(default = "default_max_anti_coupling")]
    pub max_anti_coupling: f64,
    /// Minimum size of an anti-blob (default: 10).
    #[serde(default = "default_min_anti_blob_size")]
    pub min_anti_blob_size: usize,
    /// Ignore files with fewer blobs / anti-blobs than this (default: 0).
    #[serde(default)]
    pub min_metric_value: usize,
}

fn default_min_blob_density() -> f64 {
    2.5
}

fn default_max_anti_coupling() -> f64 {
    0.5
}

fn default_min_anti_blob_size() -> usize {
    10
}

impl Default for DivergentChangeConfig {
    fn default() -> Self {
        Self {
            min_blob_density: default_min_blob_density(),
            max_anti_coupling: default_max_anti_coupling(),
            min_anti_blob_size: default_min_anti_blob_size(),
            min_metric_value: 0,
        }
    }
}

impl DivergentChangeConfig {
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::Config`] if a threshold is out of range.
    pub fn validate(&self) -> Result<(), ChronoscopeError> {
        if self.min_blob_density.is_nan() || self.min_blob_density < 0.0 {
            return Err(ChronoscopeError::Config("min-blob-density can't be negative".into()));
        }
        if self.max_anti_coupling.is_nan() || self.max_anti_coupling < 0.0 {
            return Err(ChronoscopeError::Config("max-anti-coupling can't be negative".into()));
        }
        if self.min_anti_blob_size == 0 {
            return Err(ChronoscopeError::Config("min-anti-blob-size must be positive".into()));
        }
        Ok(())
    }
}

/// Feature Envy detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEnvyConfig {
    /// Minimum ratio of coupling to another file, relative to the coupling
    /// to the own file (default: 1.0, range `[0, 1]`).
    #[serde(default = "default_min_envy_ratio")]
    pub min_envy_ratio: f64,
    /// Maximum number of envied files reported per entity (default: 1).
    #[serde(default = "default_max_envied_files")]
    pub max_envied_files: usize,
    /// Ignore files with fewer Feature Envy instances than this (default: 1).
    #[serde(default = "default_envy_min_metric_value")]
    pub min_metric_value: usize,
}

fn default_min_envy_ratio() -> f64 {
    1.0
}

fn default_max_envied_files() -> usize {
    1
}

fn default_envy_min_metric_value() -> usize {
    1
}

impl Default for FeatureEnvyConfig {
    fn default() -> Self {
        Self {
            min_envy_ratio: default_min_envy_ratio(),
            max_envied_files: default_max_envied_files(),
            min_metric_value: default_envy_min_metric_value(),
        }
    }
}

impl FeatureEnvyConfig {
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::Config`] if a threshold is out of range.
    pub fn validate(&self) -> Result<(), ChronoscopeError> {
        if !(0.0..=1.0).contains(&self.min_envy_ratio) {
            return Err(ChronoscopeError::Config(format!(
                "min-envy-ratio must be in [0, 1], got {}",
                self.min_envy_ratio
            )));
        }
        if self.max_envied_files == 0 {
            return Err(ChronoscopeError::Config("max-envied-files must be positive".into()));
        }
        Ok(())
    }
}

/// Entity tracking rule for one language.
///
/// # Examples
///
/// ```
/// use chronoscope_core::ChronoscopeConfig;
///
/// let toml = r#"
/// [languages.java]
/// extensions = ["java"]
/// track = ["function", "variable"]
/// "#;
/// let config = ChronoscopeConfig::from_toml(toml).unwrap();
/// let registry = config.analyzer_registry().unwrap();
/// assert_eq!(registry.resolve("A.java").name(), "java");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// File extensions handled, without the leading dot.
    pub extensions: Vec<String>,
    /// Entity kinds to track (default: functions only).
    #[serde(default = "default_tracked_kinds")]
    pub track: Vec<String>,
}

fn default_tracked_kinds() -> Vec<String> {
    vec!["function".into()]
}
