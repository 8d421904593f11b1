use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChronoscopeError;
use crate::source::SourceNodeKind;

/// Separates a type from its enclosing file or type.
pub const CONTAINER_SEPARATOR: char = ':';

/// Separates a function or variable from its enclosing file or type.
pub const MEMBER_SEPARATOR: char = '#';

/// Fully qualified identifier of a source node, e.g. `src/Main.java:Main#run()`.
///
/// The first token is always the source path. Types are appended with `:`,
/// and at most one trailing member (function or variable) is appended with
/// `#`. A member token containing `(` denotes a function signature.
///
/// # Examples
///
/// ```
/// use chronoscope_core::{QualifiedId, SourceNodeKind};
///
/// let id = QualifiedId::parse("src/Main.java:Main#run()").unwrap();
/// assert_eq!(id.source_path(), "src/Main.java");
/// assert_eq!(id.kind(), SourceNodeKind::Function);
/// assert_eq!(id.parent().unwrap().as_str(), "src/Main.java:Main");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QualifiedId(String);

impl QualifiedId {
    /// Parse and validate a raw qualified id.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::InvalidId`] if `raw` has blank tokens,
    /// more than one member separator, or a container separator after the
    /// member separator.
    pub fn parse(raw: &str) -> Result<Self, ChronoscopeError> {
        if Self::is_valid(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ChronoscopeError::InvalidId(raw.to_string()))
        }
    }

    /// Returns whether `raw` follows the qualified id grammar.
    ///
    /// # Examples
    ///
    /// ```
    /// use chronoscope_core::QualifiedId;
    ///
    /// assert!(QualifiedId::is_valid("a.rs:Outer:Inner#field"));
    /// assert!(!QualifiedId::is_valid("a.rs#f()#g()"));
    /// assert!(!QualifiedId::is_valid("a.rs::Type"));
    /// ```
    pub fn is_valid(raw: &str) -> bool {
        let (containers, member) = match raw.split_once(MEMBER_SEPARATOR) {
            Some((containers, member)) => (containers, Some(member)),
            None => (raw, None),
        };
        if let Some(member) = member {
            if member.trim().is_empty() || member.contains(MEMBER_SEPARATOR) {
                return false;
            }
        }
        containers
            .split(CONTAINER_SEPARATOR)
            .all(|token| !token.trim().is_empty())
    }

    /// Qualified id of a source file.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::InvalidId`] if `path` is blank or contains
    /// a separator.
    pub fn file(path: &str) -> Result<Self, ChronoscopeError> {
        if path.contains([CONTAINER_SEPARATOR, MEMBER_SEPARATOR]) {
            return Err(ChronoscopeError::InvalidId(path.to_string()));
        }
        Self::parse(path)
    }

    /// Qualified id of the child `simple_id` of kind `kind` under this node.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoscopeError::InvalidId`] if this id denotes a member
    /// (members have no children), if `kind` is a file, or if the resulting
    /// id is not valid.
    pub fn child(&self, kind: SourceNodeKind, simple_id: &str) -> Result<Self, ChronoscopeError> {
        let separator = match kind {
            SourceNodeKind::Type => CONTAINER_SEPARATOR,
            SourceNodeKind::Function | SourceNodeKind::Variable => MEMBER_SEPARATOR,
            SourceNodeKind::File => {
                return Err(ChronoscopeError::InvalidId(format!(
                    "{self}: a file cannot be nested in another node"
                )))
            }
        };
        if matches!(self.kind(), SourceNodeKind::Function | SourceNodeKind::Variable)
            || (kind == SourceNodeKind::Type
                && simple_id.contains([CONTAINER_SEPARATOR, MEMBER_SEPARATOR]))
        {
            return Err(ChronoscopeError::InvalidId(format!("{self}{separator}{simple_id}")));
        }
        Self::parse(&format!("{}{separator}{simple_id}", self.0))
    }

    /// The raw string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the source file containing the denoted node.
    pub fn source_path(&self) -> &str {
        let end = self
            .0
            .find([CONTAINER_SEPARATOR, MEMBER_SEPARATOR])
            .unwrap_or(self.0.len());
        &self.0[..end]
    }

    /// The enclosing container, or `None` for a source file.
    pub fn parent(&self) -> Option<QualifiedId> {
        let containers = match self.0.split_once(MEMBER_SEPARATOR) {
            Some((containers, _)) => return Some(Self(containers.to_string())),
            None => &self.0,
        };
        containers
            .rfind(CONTAINER_SEPARATOR)
            .map(|idx| Self(containers[..idx].to_string()))
    }

    /// The last token: path, type name, variable name or function signature.
    pub fn simple_id(&self) -> &str {
        if let Some((_, member)) = self.0.split_once(MEMBER_SEPARATOR) {
            return member;
        }
        match self.0.rfind(CONTAINER_SEPARATOR) {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Whether this id is `ancestor` or denotes a node nested inside it.
    ///
    /// # Examples
    ///
    /// ```
    /// use chronoscope_core::QualifiedId;
    ///
    /// let file = QualifiedId::parse("a.rs").unwrap();
    /// assert!(QualifiedId::parse("a.rs:A#f()").unwrap().is_within(&file));
    /// assert!(!QualifiedId::parse("a.rsx#f()").unwrap().is_within(&file));
    /// ```
    pub fn is_within(&self, ancestor: &QualifiedId) -> bool {
        match self.0.strip_prefix(ancestor.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with([CONTAINER_SEPARATOR, MEMBER_SEPARATOR]),
            None => false,
        }
    }

    /// Kind of node this id denotes, inferred from its separators.
    pub fn kind(&self) -> SourceNodeKind {
        if let Some((_, member)) = self.0.split_once(MEMBER_SEPARATOR) {
            if member.contains('(') {
                SourceNodeKind::Function
            } else {
                SourceNodeKind::Variable
            }
        } else if self.0.contains(CONTAINER_SEPARATOR) {
            SourceNodeKind::Type
        } else {
            SourceNodeKind::File
        }
    }
}

impl fmt::Display for QualifiedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for QualifiedId {
    type Err = ChronoscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for QualifiedId {
    type Error = ChronoscopeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if Self::is_valid(&value) {
            Ok(Self(value))
        } else {
            Err(ChronoscopeError::InvalidId(value))
        }
    }
}

impl From<QualifiedId> for String {
    fn from(id: QualifiedId) -> Self {
        id.0
    }
}

impl Borrow<str> for QualifiedId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for QualifiedId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
