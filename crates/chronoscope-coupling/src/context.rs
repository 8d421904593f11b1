//! The Temporal Context: per-entity change counts and pairwise coupling.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chronoscope_core::QualifiedId;
use serde::{Deserialize, Serialize};

use crate::matrix::{EntityIdx, Interner, SparseMatrix};

/// A pair of entities that changed together.
///
/// # Examples
///
/// ```
/// use chronoscope_coupling::context::CoupledPair;
///
/// let pair = CoupledPair {
///     entity_a: "src/auth.rs#login()".into(),
///     entity_b: "src/session.rs#open()".into(),
///     joint_changes: 6,
///     coupling: 0.75,
///     changes_a: 7,
///     changes_b: 7,
/// };
/// assert!(pair.coupling > 0.5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoupledPair {
    /// First entity in the pair (lexicographically smaller).
    pub entity_a: String,
    /// Second entity in the pair.
    pub entity_b: String,
    /// Number of revisions touching both entities.
    pub joint_changes: u32,
    /// `joint / (changes_a + changes_b - joint)`.
    pub coupling: f64,
    /// Total revisions touching `entity_a`.
    pub changes_a: u32,
    /// Total revisions touching `entity_b`.
    pub changes_b: u32,
}

/// Read-only view over change counts, joint change counts and temporal
/// coupling of the tracked entities.
///
/// Lookups are order-independent and return zero for unknown entities or
/// pairs. Filtered contexts share the interner of the context they were
/// derived from.
#[derive(Debug, Clone)]
pub struct TemporalContext {
    interner: Arc<Interner>,
    changes: HashMap<EntityIdx, u32>,
    joint_changes: SparseMatrix<u32>,
    coupling: SparseMatrix<f64>,
}

impl TemporalContext {
    pub(crate) fn new(
        interner: Arc<Interner>,
        changes: HashMap<EntityIdx, u32>,
        joint_changes: SparseMatrix<u32>,
        coupling: SparseMatrix<f64>,
    ) -> Self {
        Self {
            interner,
            changes,
            joint_changes,
            coupling,
        }
    }

    /// All tracked entities, sorted.
    pub fn entity_ids(&self) -> BTreeSet<&QualifiedId> {
        self.changes
            .keys()
            .map(|&idx| self.interner.resolve(idx))
            .collect()
    }

    /// Number of tracked entities.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether no entity is tracked.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Whether `id` is tracked.
    pub fn contains(&self, id: impl AsRef<str>) -> bool {
        self.tracked(id.as_ref()).is_some()
    }

    /// Revisions touching `id`, or 0 if untracked.
    pub fn change_count(&self, id: impl AsRef<str>) -> u32 {
        self.tracked(id.as_ref())
            .and_then(|idx| self.changes.get(&idx))
            .copied()
            .unwrap_or(0)
    }

    /// Revisions touching both `a` and `b`, or 0 if the pair is unrecorded.
    pub fn joint_change_count(&self, a: impl AsRef<str>, b: impl AsRef<str>) -> u32 {
        self.cell(&self.joint_changes, a.as_ref(), b.as_ref())
            .copied()
            .unwrap_or(0)
    }

    /// Temporal coupling of `a` and `b`, or 0.0 if the pair is unrecorded.
    pub fn coupling(&self, a: impl AsRef<str>, b: impl AsRef<str>) -> f64 {
        self.cell(&self.coupling, a.as_ref(), b.as_ref())
            .copied()
            .unwrap_or(0.0)
    }

    /// Entities with recorded coupling to `id`, with that coupling.
    pub fn neighbors(&self, id: impl AsRef<str>) -> Vec<(&QualifiedId, f64)> {
        let Some(idx) = self.tracked(id.as_ref()) else {
            return Vec::new();
        };
        let mut neighbors: Vec<_> = self
            .coupling
            .row(idx)
            .map(|(other, &c)| (self.interner.resolve(other), c))
            .collect();
        neighbors.sort_by(|a, b| a.0.cmp(b.0));
        neighbors
    }

    /// Every recorded coupling cell `(a, b, coupling)`, in both orientations.
    pub fn cells(&self) -> impl Iterator<Item = (&QualifiedId, &QualifiedId, f64)> {
        self.coupling
            .cells()
            .map(|(x, y, &c)| (self.interner.resolve(x), self.interner.resolve(y), c))
    }

    /// Recorded unordered pairs `(a, b)` with `a < b`.
    pub fn pairs(&self) -> impl Iterator<Item = (&QualifiedId, &QualifiedId)> {
        self.cells().filter(|(a, b, _)| a < b).map(|(a, b, _)| (a, b))
    }

    /// Tracked entities grouped by source file.
    pub fn ids_by_file(&self) -> BTreeMap<&str, BTreeSet<&QualifiedId>> {
        let mut files: BTreeMap<&str, BTreeSet<&QualifiedId>> = BTreeMap::new();
        for id in self.entity_ids() {
            files.entry(id.source_path()).or_default().insert(id);
        }
        files
    }

    /// Recorded pairs sorted by coupling descending, at most `limit` of them.
    ///
    /// Ties are broken by joint changes descending, then by entity ids.
    pub fn coupled_pairs(&self, limit: Option<usize>) -> Vec<CoupledPair> {
        let mut pairs: Vec<CoupledPair> = self
            .pairs()
            .map(|(a, b)| CoupledPair {
                entity_a: a.to_string(),
                entity_b: b.to_string(),
                joint_changes: self.joint_change_count(a, b),
                coupling: self.coupling(a, b),
                changes_a: self.change_count(a),
                changes_b: self.change_count(b),
            })
            .collect();
        pairs.sort_by(|x, y| {
            y.coupling
                .total_cmp(&x.coupling)
                .then_with(|| y.joint_changes.cmp(&x.joint_changes))
                .then_with(|| x.entity_a.cmp(&y.entity_a))
                .then_with(|| x.entity_b.cmp(&y.entity_b))
        });
        if let Some(limit) = limit {
            pairs.truncate(limit);
        }
        pairs
    }

    /// Project onto entities with at least `min_revisions` changes and pairs
    /// with at least `min_revisions` joint changes and `min_coupling`
    /// coupling between two kept entities.
    ///
    /// Filtering twice with the same thresholds changes nothing.
    pub fn filter(&self, min_revisions: u32, min_coupling: f64) -> TemporalContext {
        let changes: HashMap<EntityIdx, u32> = self
            .changes
            .iter()
            .filter(|(_, &count)| count >= min_revisions)
            .map(|(&idx, &count)| (idx, count))
            .collect();

        let mut joint_changes = SparseMatrix::default();
        let mut coupling = SparseMatrix::default();
        for (x, y, &value) in self.coupling.cells() {
            let joint = self.joint_changes.get(x, y).copied().unwrap_or(0);
            if joint >= min_revisions
                && value >= min_coupling
                && changes.contains_key(&x)
                && changes.contains_key(&y)
            {
                joint_changes.set(x, y, joint);
                coupling.set(x, y, value);
            }
        }

        TemporalContext::new(Arc::clone(&self.interner), changes, joint_changes, coupling)
    }

    fn tracked(&self, id: &str) -> Option<EntityIdx> {
        self.interner
            .get(id)
            .filter(|idx| self.changes.contains_key(idx))
    }

    fn cell<'a, V>(&self, matrix: &'a SparseMatrix<V>, a: &str, b: &str) -> Option<&'a V> {
        let x = self.interner.get(a)?;
        let y = self.interner.get(b)?;
        matrix.get(x, y)
    }
}
