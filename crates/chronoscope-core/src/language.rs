//! Pluggable, per-language decisions about which entities are tracked.
//!
//! Analyzers are registered explicitly by the caller; the first analyzer
//! that can process a path wins, and [`DefaultAnalyzer`] handles the rest.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::id::QualifiedId;
use crate::source::SourceNodeKind;

/// Language-specific entity classification.
pub trait LanguageAnalyzer: Send + Sync {
    /// Short name used in logs and configuration.
    fn name(&self) -> &str;

    /// Whether this analyzer handles the source file at `path`.
    fn can_process(&self, path: &str) -> bool;

    /// Whether entities of `kind` are tracked for temporal coupling.
    fn is_trackable(&self, kind: SourceNodeKind) -> bool;
}

/// Tracks functions in every file.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAnalyzer;

impl LanguageAnalyzer for DefaultAnalyzer {
    fn name(&self) -> &str {
        "default"
    }

    fn can_process(&self, _path: &str) -> bool {
        true
    }

    fn is_trackable(&self, kind: SourceNodeKind) -> bool {
        kind == SourceNodeKind::Function
    }
}

/// Tracks a configurable set of kinds in files with matching extensions.
///
/// # Examples
///
/// ```
/// use chronoscope_core::{ExtensionAnalyzer, LanguageAnalyzer, SourceNodeKind};
///
/// let java = ExtensionAnalyzer::new(
///     "java",
///     ["java"],
///     [SourceNodeKind::Function, SourceNodeKind::Variable],
/// );
/// assert!(java.can_process("src/Main.java"));
/// assert!(!java.can_process("src/main.rs"));
/// assert!(java.is_trackable(SourceNodeKind::Variable));
/// ```
#[derive(Debug, Clone)]
pub struct ExtensionAnalyzer {
    name: String,
    extensions: BTreeSet<String>,
    tracked: BTreeSet<SourceNodeKind>,
}

impl ExtensionAnalyzer {
    /// An analyzer named `name` for files ending in one of `extensions`
    /// (without the leading dot).
    pub fn new<E, K>(name: &str, extensions: E, tracked: K) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        K: IntoIterator<Item = SourceNodeKind>,
    {
        Self {
            name: name.to_string(),
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            tracked: tracked.into_iter().filter(|k| k.is_entity()).collect(),
        }
    }
}

impl LanguageAnalyzer for ExtensionAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_process(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        file_name
            .rsplit_once('.')
            .is_some_and(|(_, ext)| self.extensions.contains(&ext.to_lowercase()))
    }

    fn is_trackable(&self, kind: SourceNodeKind) -> bool {
        self.tracked.contains(&kind)
    }
}

/// Ordered set of language analyzers with a functions-only fallback.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use chronoscope_core::{AnalyzerRegistry, ExtensionAnalyzer, SourceNodeKind};
///
/// let mut registry = AnalyzerRegistry::default();
/// registry.register(Arc::new(ExtensionAnalyzer::new(
///     "kotlin",
///     ["kt"],
///     [SourceNodeKind::Function, SourceNodeKind::Variable],
/// )));
///
/// let field = "A.kt:A#count".parse().unwrap();
/// let rust_field = "a.rs:A#count".parse().unwrap();
/// assert!(registry.is_trackable(&field, SourceNodeKind::Variable));
/// assert!(!registry.is_trackable(&rust_field, SourceNodeKind::Variable));
/// ```
#[derive(Clone, Default)]
pub struct AnalyzerRegistry {
    analyzers: Vec<Arc<dyn LanguageAnalyzer>>,
}

impl AnalyzerRegistry {
    /// Append an analyzer; earlier registrations take precedence.
    pub fn register(&mut self, analyzer: Arc<dyn LanguageAnalyzer>) {
        self.analyzers.push(analyzer);
    }

    /// The analyzer responsible for `path`.
    pub fn resolve(&self, path: &str) -> &dyn LanguageAnalyzer {
        self.analyzers
            .iter()
            .find(|a| a.can_process(path))
            .map_or(&DefaultAnalyzer as &dyn LanguageAnalyzer, |a| a.as_ref())
    }

    /// Whether the entity `id` of kind `kind` is tracked.
    pub fn is_trackable(&self, id: &QualifiedId, kind: SourceNodeKind) -> bool {
        self.resolve(id.source_path()).is_trackable(kind)
    }

    /// Names of the registered analyzers, in precedence order.
    pub fn names(&self) -> Vec<&str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }
}

impl std::fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerRegistry")
            .field("analyzers", &self.names())
            .finish()
    }
}
