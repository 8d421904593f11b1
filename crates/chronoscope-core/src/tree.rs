//! The running source tree replayed from structural edits.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::error::ChronoscopeError;
use crate::id::QualifiedId;
use crate::revision::StructuralEdit;
use crate::source::{SourceNode, SourceNodeKind};

/// Flat index of every node currently present in the analyzed sources.
///
/// Only ids, kinds and the parent/child structure are retained; node
/// contents are not needed to resolve which entities a removal affects.
///
/// # Examples
///
/// ```
/// use chronoscope_core::{QualifiedId, SourceNode, SourceTree, StructuralEdit};
///
/// let mut tree = SourceTree::new();
/// let file = QualifiedId::file("a.rs").unwrap();
/// tree.apply(&StructuralEdit::AddNode {
///     id: file.clone(),
///     node: SourceNode::File { path: "a.rs".into(), entities: vec![SourceNode::function("f()")] },
/// }).unwrap();
/// assert!(tree.contains(&"a.rs#f()".parse().unwrap()));
///
/// let removed = tree.remove_subtree(&file);
/// assert_eq!(removed.len(), 2);
/// assert!(tree.is_empty());
/// ```
#[derive(Debug, Default, Clone)]
pub struct SourceTree {
    kinds: HashMap<QualifiedId, SourceNodeKind>,
    children: HashMap<QualifiedId, BTreeSet<QualifiedId>>,
}

impl SourceTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one structural edit.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::InvalidId`] if an added subtree contains a
    /// node that cannot be qualified.
    pub fn apply(&mut self, edit: &StructuralEdit) -> Result<(), ChronoscopeError> {
        match edit {
            StructuralEdit::AddNode { id, node } => {
                self.add_subtree(id, node)?;
            }
            StructuralEdit::RemoveNode { id } => {
                self.remove_subtree(id);
            }
            StructuralEdit::EditEntity { .. } => {}
        }
        Ok(())
    }

    /// Insert `node` under `id`, returning every inserted `(id, kind)` in
    /// pre-order. An existing node with the same id is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::InvalidId`] if the subtree cannot be walked.
    pub fn add_subtree(
        &mut self,
        id: &QualifiedId,
        node: &SourceNode,
    ) -> Result<Vec<(QualifiedId, SourceNodeKind)>, ChronoscopeError> {
        let walked = node.walk(id)?;
        if self.contains(id) {
            warn!(%id, "node added twice, replacing the previous subtree");
            self.remove_subtree(id);
        }
        let mut added = Vec::with_capacity(walked.len());
        for (node_id, child) in walked {
            if let Some(parent) = node_id.parent() {
                self.children.entry(parent).or_default().insert(node_id.clone());
            }
            self.kinds.insert(node_id.clone(), child.kind());
            added.push((node_id, child.kind()));
        }
        Ok(added)
    }

    /// Remove the node `id` and all its descendants, returning them in
    /// pre-order. Removing an absent node is a no-op.
    pub fn remove_subtree(&mut self, id: &QualifiedId) -> Vec<(QualifiedId, SourceNodeKind)> {
        if !self.contains(id) {
            debug!(%id, "removal of an untracked node ignored");
            return Vec::new();
        }
        let removed = self.descendants(id);
        for (node_id, _) in &removed {
            self.kinds.remove(node_id);
            self.children.remove(node_id);
        }
        if let Some(parent) = id.parent() {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.remove(id);
                if siblings.is_empty() {
                    self.children.remove(&parent);
                }
            }
        }
        removed
    }

    /// `id` and every node below it, in pre-order. Empty if `id` is absent.
    pub fn descendants(&self, id: &QualifiedId) -> Vec<(QualifiedId, SourceNodeKind)> {
        let mut result = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(node_id) = stack.pop() {
            let Some(&kind) = self.kinds.get(&node_id) else {
                continue;
            };
            if let Some(children) = self.children.get(&node_id) {
                stack.extend(children.iter().rev().cloned());
            }
            result.push((node_id, kind));
        }
        result
    }

    /// Kind of the node `id`, if present.
    pub fn get(&self, id: &QualifiedId) -> Option<SourceNodeKind> {
        self.kinds.get(id).copied()
    }

    /// Whether the node `id` is present.
    pub fn contains(&self, id: &QualifiedId) -> bool {
        self.kinds.contains_key(id)
    }

    /// Paths of all source files currently present, sorted.
    pub fn source_paths(&self) -> BTreeSet<&str> {
        self.kinds
            .iter()
            .filter(|(_, kind)| **kind == SourceNodeKind::File)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether the tree holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
