use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::QualifiedId;
use crate::source::SourceNode;

/// One structural change to the source tree.
///
/// # Examples
///
/// ```
/// use chronoscope_core::StructuralEdit;
///
/// let edit: StructuralEdit =
///     serde_json::from_str(r#"{"type":"editEntity","id":"src/a.rs#run()"}"#).unwrap();
/// assert_eq!(edit.source_path(), "src/a.rs");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StructuralEdit {
    /// A new node (and its whole subtree) appeared.
    AddNode {
        /// Qualified id of the added node.
        id: QualifiedId,
        /// The added subtree.
        node: SourceNode,
    },
    /// A node and all its descendants disappeared.
    RemoveNode {
        /// Qualified id of the removed node.
        id: QualifiedId,
    },
    /// The contents of an existing entity changed.
    EditEntity {
        /// Qualified id of the edited entity.
        id: QualifiedId,
    },
}

impl StructuralEdit {
    /// Qualified id of the edited node.
    pub fn id(&self) -> &QualifiedId {
        match self {
            StructuralEdit::AddNode { id, .. }
            | StructuralEdit::RemoveNode { id }
            | StructuralEdit::EditEntity { id } => id,
        }
    }

    /// Path of the source file containing the edited node.
    pub fn source_path(&self) -> &str {
        self.id().source_path()
    }
}

/// A commit as seen by the analysis: who, when, and which structural edits.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use chronoscope_core::{Revision, StructuralEdit};
///
/// let revision = Revision {
///     id: "abc123".into(),
///     date: Utc::now(),
///     author: "alice".into(),
///     edits: vec![
///         StructuralEdit::EditEntity { id: "a.rs#f()".parse().unwrap() },
///         StructuralEdit::EditEntity { id: "a.rs#g()".parse().unwrap() },
///         StructuralEdit::EditEntity { id: "b.rs#h()".parse().unwrap() },
///     ],
/// };
/// assert_eq!(revision.change_set().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    /// Unique revision id, typically the commit hash.
    pub id: String,
    /// Authoring date.
    pub date: DateTime<Utc>,
    /// Author name.
    pub author: String,
    /// Structural edits, in application order.
    #[serde(default)]
    pub edits: Vec<StructuralEdit>,
}

impl Revision {
    /// Distinct source files touched by this revision.
    pub fn change_set(&self) -> BTreeSet<&str> {
        self.edits.iter().map(StructuralEdit::source_path).collect()
    }
}

/// Returns whether `id` is a valid revision id (`[-\w]+`).
///
/// # Examples
///
/// ```
/// use chronoscope_core::is_valid_revision_id;
///
/// assert!(is_valid_revision_id("3f2a9c1-hotfix_2"));
/// assert!(!is_valid_revision_id(""));
/// assert!(!is_valid_revision_id("a b"));
/// ```
pub fn is_valid_revision_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c == '-' || c == '_' || c.is_alphanumeric())
}
