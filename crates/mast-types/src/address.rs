//! Node references: dual path/id addressing.
//!
//! Every operation that targets a node accepts a [`NodeRef`]. A reference
//! may carry a slash-separated path, a node id, or both. When both are
//! present the resolver checks that they point at the same node and fails
//! with `ADDRESS_MISMATCH` otherwise.

use crate::NodeId;
use serde::{Deserialize, Serialize};

/// A reference to a node by path, by id, or both.
///
/// # Example
///
/// ```
/// use mast_types::{NodeId, NodeRef};
///
/// let by_path = NodeRef::path("root/axis/speed");
/// assert_eq!(by_path.path_str(), Some("root/axis/speed"));
/// assert!(by_path.node_id().is_none());
///
/// let id = NodeId::new();
/// let both = NodeRef::full("root/axis/speed", id);
/// assert_eq!(both.node_id(), Some(id));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    /// Slash-separated name descent from the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Tree-wide unique identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
}

impl NodeRef {
    /// Creates a path-only reference.
    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            id: None,
        }
    }

    /// Creates an id-only reference.
    #[must_use]
    pub fn id(id: NodeId) -> Self {
        Self {
            path: None,
            id: Some(id),
        }
    }

    /// Creates a reference carrying both addressing modes.
    #[must_use]
    pub fn full(path: impl Into<String>, id: NodeId) -> Self {
        Self {
            path: Some(path.into()),
            id: Some(id),
        }
    }

    /// Returns the path, if present.
    #[must_use]
    pub fn path_str(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Returns the id, if present.
    #[must_use]
    pub fn node_id(&self) -> Option<NodeId> {
        self.id
    }

    /// Returns `true` when neither addressing mode is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.id.is_none()
    }
}

impl From<NodeId> for NodeRef {
    fn from(id: NodeId) -> Self {
        Self::id(id)
    }
}

impl From<&str> for NodeRef {
    fn from(path: &str) -> Self {
        Self::path(path)
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.path, &self.id) {
            (Some(p), Some(id)) => write!(f, "{p}@{id}"),
            (Some(p), None) => f.write_str(p),
            (None, Some(id)) => write!(f, "{id}"),
            (None, None) => f.write_str("<empty ref>"),
        }
    }
}
