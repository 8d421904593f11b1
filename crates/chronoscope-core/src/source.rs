use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChronoscopeError;
use crate::id::QualifiedId;

/// Kind of a source node.
///
/// # Examples
///
/// ```
/// use chronoscope_core::SourceNodeKind;
///
/// let kind: SourceNodeKind = "function".parse().unwrap();
/// assert_eq!(kind, SourceNodeKind::Function);
/// assert!(kind.is_entity());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceNodeKind {
    /// A source file, the root of every qualified id.
    File,
    /// A type declaration (class, struct, interface, ...).
    Type,
    /// A field or global variable.
    Variable,
    /// A function or method.
    Function,
}

impl SourceNodeKind {
    /// Returns `true` for every kind except [`SourceNodeKind::File`].
    pub fn is_entity(self) -> bool {
        self != SourceNodeKind::File
    }
}

impl fmt::Display for SourceNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceNodeKind::File => write!(f, "file"),
            SourceNodeKind::Type => write!(f, "type"),
            SourceNodeKind::Variable => write!(f, "variable"),
            SourceNodeKind::Function => write!(f, "function"),
        }
    }
}

impl FromStr for SourceNodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(SourceNodeKind::File),
            "type" => Ok(SourceNodeKind::Type),
            "variable" | "field" => Ok(SourceNodeKind::Variable),
            "function" | "method" => Ok(SourceNodeKind::Function),
            other => Err(format!("unknown source node kind: {other}")),
        }
    }
}

/// A node of the structured source model produced by a language parser.
///
/// Files contain entities, types contain members; variables and functions
/// are leaves.
///
/// # Examples
///
/// ```
/// use chronoscope_core::{QualifiedId, SourceNode, SourceNodeKind};
///
/// let file = SourceNode::File {
///     path: "Main.java".into(),
///     entities: vec![SourceNode::function("main(String[])")],
/// };
/// let root = QualifiedId::file("Main.java").unwrap();
/// let walked = file.walk(&root).unwrap();
/// assert_eq!(walked.len(), 2);
/// assert_eq!(walked[1].0.as_str(), "Main.java#main(String[])");
/// assert_eq!(walked[1].1.kind(), SourceNodeKind::Function);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceNode {
    /// A source file and its top-level entities.
    File {
        /// Path relative to the repository root.
        path: String,
        /// Top-level types, variables and functions.
        #[serde(default)]
        entities: Vec<SourceNode>,
    },
    /// A type and its members.
    Type {
        /// Simple type name.
        name: String,
        /// Names of the direct supertypes.
        #[serde(default)]
        supertypes: BTreeSet<String>,
        /// Declaration modifiers.
        #[serde(default)]
        modifiers: BTreeSet<String>,
        /// Nested types, fields and methods.
        #[serde(default)]
        members: Vec<SourceNode>,
    },
    /// A field or variable.
    Variable {
        /// Simple variable name.
        name: String,
        /// Declaration modifiers.
        #[serde(default)]
        modifiers: BTreeSet<String>,
        /// Tokenized initializer.
        #[serde(default)]
        initializer: Vec<String>,
    },
    /// A function or method.
    Function {
        /// Signature, e.g. `compute(int, int)`.
        signature: String,
        /// Parameter names in declaration order.
        #[serde(default)]
        parameters: Vec<String>,
        /// Declaration modifiers.
        #[serde(default)]
        modifiers: BTreeSet<String>,
        /// Tokenized body.
        #[serde(default)]
        body: Vec<String>,
    },
}

impl SourceNode {
    /// A function node with only its signature set.
    pub fn function(signature: &str) -> Self {
        SourceNode::Function {
            signature: signature.to_string(),
            parameters: Vec::new(),
            modifiers: BTreeSet::new(),
            body: Vec::new(),
        }
    }

    /// A variable node with only its name set.
    pub fn variable(name: &str) -> Self {
        SourceNode::Variable {
            name: name.to_string(),
            modifiers: BTreeSet::new(),
            initializer: Vec::new(),
        }
    }

    /// A type node with the given members.
    pub fn type_with(name: &str, members: Vec<SourceNode>) -> Self {
        SourceNode::Type {
            name: name.to_string(),
            supertypes: BTreeSet::new(),
            modifiers: BTreeSet::new(),
            members,
        }
    }

    /// The kind of this node.
    pub fn kind(&self) -> SourceNodeKind {
        match self {
            SourceNode::File { .. } => SourceNodeKind::File,
            SourceNode::Type { .. } => SourceNodeKind::Type,
            SourceNode::Variable { .. } => SourceNodeKind::Variable,
            SourceNode::Function { .. } => SourceNodeKind::Function,
        }
    }

    /// The unqualified id: path, name or signature.
    pub fn simple_id(&self) -> &str {
        match self {
            SourceNode::File { path, .. } => path,
            SourceNode::Type { name, .. } | SourceNode::Variable { name, .. } => name,
            SourceNode::Function { signature, .. } => signature,
        }
    }

    /// Direct children of this node.
    pub fn children(&self) -> &[SourceNode] {
        match self {
            SourceNode::File { entities, .. } => entities,
            SourceNode::Type { members, .. } => members,
            SourceNode::Variable { .. } | SourceNode::Function { .. } => &[],
        }
    }

    /// Walk the subtree rooted at this node, which is denoted by `id`.
    ///
    /// Returns every node with its qualified id in pre-order, starting with
    /// this node.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::InvalidId`] if a child cannot be given a
    /// valid qualified id (e.g. a file nested inside a type).
    pub fn walk(&self, id: &QualifiedId) -> Result<Vec<(QualifiedId, &SourceNode)>, ChronoscopeError> {
        let mut nodes = Vec::new();
        let mut stack = vec![(id.clone(), self)];
        while let Some((node_id, node)) = stack.pop() {
            for child in node.children().iter().rev() {
                let child_id = node_id.child(child.kind(), child.simple_id())?;
                stack.push((child_id, child));
            }
            nodes.push((node_id, node));
        }
        Ok(nodes)
    }
}
