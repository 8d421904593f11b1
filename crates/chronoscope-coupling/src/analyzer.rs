//! The History Analyzer: a single left-to-right fold over revisions.
//!
//! The analyzer keeps the running source tree (to resolve which entities a
//! removal takes with it), a change counter per entity and a sparse joint
//! change matrix. Temporal coupling is computed once, after the last
//! revision, and the resulting [`TemporalContext`] is filtered by the
//! configured thresholds.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chronoscope_core::{
    AnalyzerRegistry, ChronoscopeError, CouplingConfig, Revision, SourceTree, StructuralEdit,
};
use tracing::{debug, info};

use crate::context::TemporalContext;
use crate::matrix::{EntityIdx, Interner, SparseMatrix};

/// Computes temporal coupling between the entities of a revision history.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use chronoscope_core::{Revision, StructuralEdit};
/// use chronoscope_coupling::HistoryAnalyzer;
///
/// let edit = |ids: &[&str]| Revision {
///     id: "r".into(),
///     date: Utc::now(),
///     author: "alice".into(),
///     edits: ids
///         .iter()
///         .map(|id| StructuralEdit::EditEntity { id: id.parse().unwrap() })
///         .collect(),
/// };
/// let history = vec![
///     edit(&["a.rs#f()", "b.rs#g()"]),
///     edit(&["a.rs#f()", "b.rs#g()"]),
///     edit(&["a.rs#f()"]),
/// ];
///
/// let context = HistoryAnalyzer::new(100, 1, 0.0).unwrap().analyze(history).unwrap();
/// assert_eq!(context.change_count("a.rs#f()"), 3);
/// assert_eq!(context.joint_change_count("b.rs#g()", "a.rs#f()"), 2);
/// assert!((context.coupling("a.rs#f()", "b.rs#g()") - 2.0 / 3.0).abs() < 1e-9);
/// ```
#[derive(Debug)]
pub struct HistoryAnalyzer {
    config: CouplingConfig,
    registry: AnalyzerRegistry,
    tree: SourceTree,
    interner: Interner,
    changes: HashMap<EntityIdx, u32>,
    joint_changes: SparseMatrix<u32>,
    revisions: usize,
    bulk_revisions: usize,
}

impl HistoryAnalyzer {
    /// An analyzer tracking functions only.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::Config`] if `max_change_set` or
    /// `min_revisions` is zero, or `min_coupling` is negative.
    pub fn new(
        max_change_set: usize,
        min_revisions: u32,
        min_coupling: f64,
    ) -> Result<Self, ChronoscopeError> {
        Self::from_config(&CouplingConfig {
            max_change_set,
            min_revisions,
            min_coupling,
        })
    }

    /// An analyzer with the thresholds of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::Config`] if `config` is invalid.
    pub fn from_config(config: &CouplingConfig) -> Result<Self, ChronoscopeError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            registry: AnalyzerRegistry::default(),
            tree: SourceTree::new(),
            interner: Interner::default(),
            changes: HashMap::new(),
            joint_changes: SparseMatrix::default(),
            revisions: 0,
            bulk_revisions: 0,
        })
    }

    /// Decide trackable entities with `registry` instead of the default.
    pub fn with_registry(mut self, registry: AnalyzerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Fold `revisions` and return the filtered context.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::InvalidId`] if an added subtree holds a
    /// node that cannot be qualified.
    pub fn analyze<I>(self, revisions: I) -> Result<TemporalContext, ChronoscopeError>
    where
        I: IntoIterator<Item = Revision>,
    {
        self.analyze_history(revisions.into_iter().map(Ok))
    }

    /// Fold a fallible revision stream, stopping at the first error.
    ///
    /// Errors yielded by `history` are returned as they are.
    ///
    /// # Errors
    ///
    /// Returns the first error of `history`, or a [`ChronoscopeError`]
    /// converted into `E` if a revision cannot be applied.
    pub fn analyze_history<I, E>(mut self, history: I) -> Result<TemporalContext, E>
    where
        I: IntoIterator<Item = Result<Revision, E>>,
        E: From<ChronoscopeError>,
    {
        for revision in history {
            self.process(&revision?)?;
        }
        Ok(self.finish())
    }

    /// Apply one revision: update the running tree, count the changed
    /// entities and, unless the revision is a bulk change, their joint
    /// changes.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::InvalidId`] if an added subtree holds a
    /// node that cannot be qualified.
    pub fn process(&mut self, revision: &Revision) -> Result<(), ChronoscopeError> {
        let mut edited = BTreeSet::new();
        for edit in &revision.edits {
            self.visit(edit, &mut edited)?;
        }

        for idx in &edited {
            *self.changes.entry(*idx).or_default() += 1;
        }
        self.revisions += 1;

        let change_set = revision.change_set().len();
        if change_set > self.config.max_change_set {
            debug!(
                revision = %revision.id,
                files = change_set,
                "bulk revision excluded from joint changes"
            );
            self.bulk_revisions += 1;
            return Ok(());
        }

        let edited: Vec<EntityIdx> = edited.into_iter().collect();
        for (i, &x) in edited.iter().enumerate() {
            for &y in &edited[i + 1..] {
                *self.joint_changes.entry(x, y) += 1;
                *self.joint_changes.entry(y, x) += 1;
            }
        }
        Ok(())
    }

    /// Revisions processed so far that touched `id`, or 0 if untracked.
    pub fn change_count(&self, id: &str) -> u32 {
        self.interner
            .get(id)
            .and_then(|idx| self.changes.get(&idx))
            .copied()
            .unwrap_or(0)
    }

    /// Compute temporal coupling and return the context filtered by the
    /// configured thresholds.
    pub fn finish(self) -> TemporalContext {
        let mut coupling = SparseMatrix::default();
        for (x, y, &joint) in self.joint_changes.cells() {
            let value = match (self.changes.get(&x), self.changes.get(&y)) {
                (Some(&cx), Some(&cy)) => {
                    let total = cx + cy - joint;
                    if total == 0 {
                        0.0
                    } else {
                        f64::from(joint) / f64::from(total)
                    }
                }
                _ => {
                    debug!(
                        a = %self.interner.resolve(x),
                        b = %self.interner.resolve(y),
                        "joint change without change count"
                    );
                    0.0
                }
            };
            coupling.set(x, y, value);
        }

        let context = TemporalContext::new(
            Arc::new(self.interner),
            self.changes,
            self.joint_changes,
            coupling,
        )
        .filter(self.config.min_revisions, self.config.min_coupling);

        info!(
            revisions = self.revisions,
            bulk_revisions = self.bulk_revisions,
            entities = context.len(),
            pairs = context.pairs().count(),
            "history analyzed"
        );
        context
    }

    fn visit(
        &mut self,
        edit: &StructuralEdit,
        edited: &mut BTreeSet<EntityIdx>,
    ) -> Result<(), ChronoscopeError> {
        match edit {
            StructuralEdit::AddNode { id, node } => {
                for (added, kind) in self.tree.add_subtree(id, node)? {
                    if self.registry.is_trackable(&added, kind) {
                        edited.insert(self.interner.intern(&added));
                    }
                }
            }
            StructuralEdit::RemoveNode { id } => {
                // Entities seen only through edits are not in the tree.
                self.tree.remove_subtree(id);
                let removed: Vec<EntityIdx> = self
                    .changes
                    .keys()
                    .chain(edited.iter())
                    .copied()
                    .filter(|&idx| self.interner.resolve(idx).is_within(id))
                    .collect();
                for idx in removed {
                    self.forget(idx, edited);
                }
            }
            StructuralEdit::EditEntity { id } => match self.tree.get(id) {
                Some(kind) if !self.registry.is_trackable(id, kind) => {
                    debug!(%id, %kind, "edit of an untracked entity ignored");
                }
                _ => {
                    edited.insert(self.interner.intern(id));
                }
            },
        }
        Ok(())
    }

    fn forget(&mut self, idx: EntityIdx, edited: &mut BTreeSet<EntityIdx>) {
        edited.remove(&idx);
        self.changes.remove(&idx);
        self.joint_changes.remove_entity(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chronoscope_core::{ExtensionAnalyzer, SourceNode, SourceNodeKind};

    fn revision(edits: Vec<StructuralEdit>) -> Revision {
        Revision {
            id: "r".into(),
            date: Utc::now(),
            author: "alice".into(),
            edits,
        }
    }

    fn add_fn(file: &str, sig: &str) -> StructuralEdit {
        StructuralEdit::AddNode {
            id: format!("{file}#{sig}").parse().unwrap(),
            node: SourceNode::function(sig),
        }
    }

    fn edit(id: &str) -> StructuralEdit {
        StructuralEdit::EditEntity { id: id.parse().unwrap() }
    }

    fn remove(id: &str) -> StructuralEdit {
        StructuralEdit::RemoveNode { id: id.parse().unwrap() }
    }

    fn analyzer() -> HistoryAnalyzer {
        HistoryAnalyzer::new(100, 1, 0.0).unwrap()
    }

    #[test]
    fn rejects_invalid_thresholds() {
        assert!(HistoryAnalyzer::new(0, 1, 0.0).is_err());
        assert!(HistoryAnalyzer::new(1, 0, 0.0).is_err());
        assert!(HistoryAnalyzer::new(1, 1, -0.1).is_err());
        assert!(HistoryAnalyzer::new(1, 1, f64::NAN).is_err());
    }

    #[test]
    fn basic_coupling() {
        let history = vec![
            revision(vec![add_fn("a.rs", "A()"), add_fn("a.rs", "B()")]),
            revision(vec![edit("a.rs#A()"), edit("a.rs#B()")]),
            revision(vec![edit("a.rs#A()")]),
        ];
        let ctx = analyzer().analyze(history).unwrap();
        assert_eq!(ctx.change_count("a.rs#A()"), 3);
        assert_eq!(ctx.change_count("a.rs#B()"), 2);
        assert_eq!(ctx.joint_change_count("a.rs#A()", "a.rs#B()"), 2);
        assert!((ctx.coupling("a.rs#A()", "a.rs#B()") - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn bulk_revision_counts_changes_only() {
        let mut bulk: Vec<StructuralEdit> =
            (0..200).map(|i| edit(&format!("f{i}.rs#run()"))).collect();
        bulk.push(edit("a.rs#A()"));
        bulk.push(edit("b.rs#B()"));
        let history = vec![
            revision(vec![add_fn("a.rs", "A()"), add_fn("b.rs", "B()")]),
            revision(bulk),
            revision(vec![edit("a.rs#A()"), edit("b.rs#B()")]),
        ];
        let ctx = analyzer().analyze(history).unwrap();
        assert_eq!(ctx.change_count("a.rs#A()"), 3);
        assert_eq!(ctx.change_count("b.rs#B()"), 3);
        assert_eq!(ctx.joint_change_count("a.rs#A()", "b.rs#B()"), 2);
        assert_eq!(ctx.joint_change_count("f0.rs#run()", "f1.rs#run()"), 0);
    }

    #[test]
    fn removal_clears_history() {
        let history = vec![
            revision(vec![add_fn("a.rs", "A()")]),
            revision(vec![add_fn("a.rs", "B()")]),
            revision(vec![edit("a.rs#A()"), edit("a.rs#B()")]),
            revision(vec![remove("a.rs#A()")]),
        ];
        let ctx = analyzer().analyze(history).unwrap();
        assert_eq!(ctx.change_count("a.rs#A()"), 0);
        assert_eq!(ctx.joint_change_count("a.rs#A()", "a.rs#B()"), 0);
        assert_eq!(ctx.change_count("a.rs#B()"), 2);
    }

    #[test]
    fn removal_clears_entities_known_only_from_edits() {
        let history = vec![
            revision(vec![edit("a.rs#A()"), edit("a.rs#B()")]),
            revision(vec![remove("a.rs#A()")]),
        ];
        let ctx = analyzer().analyze(history).unwrap();
        assert_eq!(ctx.change_count("a.rs#A()"), 0);
        assert_eq!(ctx.joint_change_count("a.rs#A()", "a.rs#B()"), 0);
        assert!(!ctx.contains("a.rs#A()"));
        assert_eq!(ctx.change_count("a.rs#B()"), 1);
    }

    #[test]
    fn removing_a_file_cascades_to_edited_entities() {
        let history = vec![
            revision(vec![StructuralEdit::AddNode {
                id: "b.rs".parse().unwrap(),
                node: SourceNode::File { path: "b.rs".into(), entities: Vec::new() },
            }]),
            revision(vec![edit("b.rs#f()"), edit("b.rs#g()"), edit("c.rs#h()")]),
            revision(vec![remove("b.rs")]),
        ];
        let ctx = analyzer().analyze(history).unwrap();
        assert_eq!(ctx.change_count("b.rs#f()"), 0);
        assert_eq!(ctx.joint_change_count("b.rs#f()", "b.rs#g()"), 0);
        assert_eq!(ctx.joint_change_count("b.rs#f()", "c.rs#h()"), 0);
        let ids: Vec<&str> = ctx.entity_ids().into_iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["c.rs#h()"]);
    }

    #[test]
    fn removing_a_type_cascades_to_members() {
        let ty = SourceNode::type_with(
            "A",
            vec![SourceNode::function("f()"), SourceNode::function("g()")],
        );
        let history = vec![
            revision(vec![StructuralEdit::AddNode {
                id: "a.rs:A".parse().unwrap(),
                node: ty,
            }]),
            revision(vec![edit("a.rs:A#f()"), edit("a.rs:A#g()")]),
            revision(vec![remove("a.rs:A")]),
        ];
        let ctx = analyzer().analyze(history).unwrap();
        assert!(ctx.is_empty());
    }

    #[test]
    fn removed_then_readded_in_same_revision_counts_once() {
        let history = vec![
            revision(vec![add_fn("a.rs", "f()"), add_fn("a.rs", "g()")]),
            revision(vec![
                edit("a.rs#f()"),
                remove("a.rs#f()"),
                add_fn("a.rs", "f()"),
                edit("a.rs#g()"),
            ]),
        ];
        let ctx = analyzer().analyze(history).unwrap();
        assert_eq!(ctx.change_count("a.rs#f()"), 1);
        assert_eq!(ctx.joint_change_count("a.rs#f()", "a.rs#g()"), 1);
    }

    #[test]
    fn removing_unknown_node_is_tolerated() {
        let history = vec![revision(vec![remove("ghost.rs#f()")])];
        assert!(analyzer().analyze(history).unwrap().is_empty());
    }

    #[test]
    fn types_and_variables_untracked_by_default() {
        let history = vec![
            revision(vec![StructuralEdit::AddNode {
                id: "a.rs".parse().unwrap(),
                node: SourceNode::File {
                    path: "a.rs".into(),
                    entities: vec![
                        SourceNode::type_with("A", vec![SourceNode::variable("x")]),
                        SourceNode::function("f()"),
                    ],
                },
            }]),
            revision(vec![edit("a.rs:A#x"), edit("a.rs#f()")]),
        ];
        let ctx = analyzer().analyze(history).unwrap();
        let ids: Vec<&str> = ctx.entity_ids().into_iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["a.rs#f()"]);
        assert_eq!(ctx.change_count("a.rs#f()"), 2);
    }

    #[test]
    fn registry_can_track_variables() {
        let mut registry = AnalyzerRegistry::default();
        registry.register(Arc::new(ExtensionAnalyzer::new(
            "java",
            ["java"],
            [SourceNodeKind::Function, SourceNodeKind::Variable],
        )));
        let history = vec![
            revision(vec![StructuralEdit::AddNode {
                id: "A.java:A".parse().unwrap(),
                node: SourceNode::type_with(
                    "A",
                    vec![SourceNode::variable("x"), SourceNode::function("f()")],
                ),
            }]),
            revision(vec![edit("A.java:A#x"), edit("A.java:A#f()")]),
        ];
        let ctx = analyzer().with_registry(registry).analyze(history).unwrap();
        assert_eq!(ctx.joint_change_count("A.java:A#x", "A.java:A#f()"), 2);
    }

    #[test]
    fn thresholds_filter_the_result() {
        let history = vec![
            revision(vec![edit("a.rs#f()"), edit("a.rs#g()")]),
            revision(vec![edit("a.rs#f()")]),
        ];
        let ctx = HistoryAnalyzer::new(100, 2, 0.0)
            .unwrap()
            .analyze(history)
            .unwrap();
        assert!(ctx.contains("a.rs#f()"));
        assert!(!ctx.contains("a.rs#g()"));
        assert_eq!(ctx.pairs().count(), 0);
    }

    #[test]
    fn history_errors_are_propagated_unchanged() {
        #[derive(Debug, PartialEq)]
        enum SourceError {
            Broken,
            Analysis,
        }
        impl From<ChronoscopeError> for SourceError {
            fn from(_: ChronoscopeError) -> Self {
                SourceError::Analysis
            }
        }
        let history = vec![
            Ok(revision(vec![edit("a.rs#f()")])),
            Err(SourceError::Broken),
            Ok(revision(vec![edit("a.rs#f()")])),
        ];
        let err = analyzer().analyze_history(history).unwrap_err();
        assert_eq!(err, SourceError::Broken);
    }

    #[test]
    fn change_counts_grow_with_each_revision() {
        let mut analyzer = analyzer();
        let mut last = 0;
        for _ in 0..4 {
            analyzer
                .process(&revision(vec![edit("a.rs#f()")]))
                .unwrap();
            let count = analyzer.change_count("a.rs#f()");
            assert!(count > last);
            last = count;
        }
        assert_eq!(analyzer.change_count("a.rs#g()"), 0);
        assert_eq!(analyzer.finish().change_count("a.rs#f()"), 4);
    }
}
