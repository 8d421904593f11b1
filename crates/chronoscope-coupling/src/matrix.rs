//! Interned entity ids and the sparse symmetric matrices keyed by them.

use std::collections::HashMap;

use chronoscope_core::QualifiedId;

/// Dense numeric handle for an interned [`QualifiedId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityIdx(u32);

impl EntityIdx {
    fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Bidirectional map between qualified ids and [`EntityIdx`] handles.
///
/// Handles are never recycled, so an entity removed and re-added under the
/// same id keeps its handle.
///
/// # Examples
///
/// ```
/// use chronoscope_coupling::matrix::Interner;
///
/// let mut interner = Interner::default();
/// let a = interner.intern(&"a.rs#f()".parse().unwrap());
/// let again = interner.intern(&"a.rs#f()".parse().unwrap());
/// assert_eq!(a, again);
/// assert_eq!(interner.resolve(a).as_str(), "a.rs#f()");
/// assert_eq!(interner.get("a.rs#f()"), Some(a));
/// ```
#[derive(Debug, Default, Clone)]
pub struct Interner {
    ids: Vec<QualifiedId>,
    index: HashMap<QualifiedId, EntityIdx>,
}

impl Interner {
    /// Handle for `id`, allocating one on first sight.
    pub fn intern(&mut self, id: &QualifiedId) -> EntityIdx {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = EntityIdx(self.ids.len() as u32);
        self.ids.push(id.clone());
        self.index.insert(id.clone(), idx);
        idx
    }

    /// Handle for `id`, if it was ever interned.
    pub fn get(&self, id: &str) -> Option<EntityIdx> {
        self.index.get(id).copied()
    }

    /// The id behind `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` was not produced by this interner.
    pub fn resolve(&self, idx: EntityIdx) -> &QualifiedId {
        &self.ids[idx.as_usize()]
    }

    /// Number of interned ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no id was interned yet.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Sparse matrix stored as an arena of row maps indexed by [`EntityIdx`].
///
/// Callers keep it symmetric by writing both `(x, y)` and `(y, x)`;
/// [`SparseMatrix::remove_entity`] relies on that to clear a column through
/// the matching row.
#[derive(Debug, Clone)]
pub struct SparseMatrix<V> {
    rows: Vec<HashMap<EntityIdx, V>>,
}

impl<V> Default for SparseMatrix<V> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<V> SparseMatrix<V> {
    /// The value at `(x, y)`, if recorded.
    pub fn get(&self, x: EntityIdx, y: EntityIdx) -> Option<&V> {
        self.rows.get(x.as_usize()).and_then(|row| row.get(&y))
    }

    /// Record `value` at `(x, y)`.
    pub fn set(&mut self, x: EntityIdx, y: EntityIdx, value: V) {
        self.row_mut(x).insert(y, value);
    }

    /// Mutable slot at `(x, y)`, inserting `V::default()` if absent.
    pub fn entry(&mut self, x: EntityIdx, y: EntityIdx) -> &mut V
    where
        V: Default,
    {
        self.row_mut(x).entry(y).or_default()
    }

    /// Recorded cells of row `x`.
    pub fn row(&self, x: EntityIdx) -> impl Iterator<Item = (EntityIdx, &V)> {
        self.rows
            .get(x.as_usize())
            .into_iter()
            .flat_map(|row| row.iter().map(|(&y, v)| (y, v)))
    }

    /// Every recorded cell `(x, y, value)`, in both orientations.
    pub fn cells(&self) -> impl Iterator<Item = (EntityIdx, EntityIdx, &V)> {
        self.rows.iter().enumerate().flat_map(|(x, row)| {
            let x = EntityIdx(x as u32);
            row.iter().map(move |(&y, v)| (x, y, v))
        })
    }

    /// Drop row `idx` and column `idx`.
    pub fn remove_entity(&mut self, idx: EntityIdx) {
        let Some(row) = self.rows.get_mut(idx.as_usize()) else {
            return;
        };
        let row = std::mem::take(row);
        for other in row.keys() {
            if let Some(other_row) = self.rows.get_mut(other.as_usize()) {
                other_row.remove(&idx);
            }
        }
    }

    /// Number of recorded cells.
    pub fn len(&self) -> usize {
        self.rows.iter().map(HashMap::len).sum()
    }

    /// Whether no cell is recorded.
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(HashMap::is_empty)
    }

    fn row_mut(&mut self, x: EntityIdx) -> &mut HashMap<EntityIdx, V> {
        let i = x.as_usize();
        if self.rows.len() <= i {
            self.rows.resize_with(i + 1, HashMap::new);
        }
        &mut self.rows[i]
    }
}
