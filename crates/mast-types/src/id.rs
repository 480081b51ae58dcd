//! Identifier types for the MAST address space.
//!
//! All identifiers are UUID-backed so they stay unique across trees and
//! safe to carry through a transport. Each newtype prints with its own
//! prefix (`node:`, `scope:`, `sub:`, `msg:`) so mixed-up ids are visible
//! in logs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a node in the address space.
///
/// Assigned once at node construction and stable for the node's lifetime.
/// Ids are unique across the whole tree and index the tree-wide id map.
///
/// # Example
///
/// ```
/// use mast_types::NodeId;
///
/// let a = NodeId::new();
/// let b = NodeId::new();
/// assert_ne!(a, b);
/// assert!(a.to_string().starts_with("node:"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

#[allow(clippy::new_without_default)] // a defaulted NodeId would never be registered in a tree
impl NodeId {
    /// Creates a new random node id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

// NOTE: NodeId intentionally does NOT implement Default. Nodes receive
// their id on insertion into an address space; a free-floating default id
// would never resolve.

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Identifier of an active composite-method execution scope.
///
/// Handed back in `Accepted` replies so the caller can correlate the
/// deferred completion, and used to cancel a pending invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(pub Uuid);

#[allow(clippy::new_without_default)] // scopes are allocated by the flow engine only
impl ScopeId {
    /// Creates a new random scope id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope:{}", self.0)
    }
}

/// Identifier of a variable subscription.
///
/// Returned from a subscribe operation; the handle removes exactly that
/// subscription again regardless of how many the same subscriber holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

#[allow(clippy::new_without_default)] // handles are minted by the subscription engine
impl SubscriptionId {
    /// Creates a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub:{}", self.0)
    }
}

/// Identifier of a protocol message.
///
/// Replies echo the request's id; notification events get a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Creates a new random message id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "msg:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_uniqueness() {
        assert_ne!(NodeId::new(), NodeId::new());
    }

    #[test]
    fn display_prefixes() {
        assert!(NodeId::new().to_string().starts_with("node:"));
        assert!(ScopeId::new().to_string().starts_with("scope:"));
        assert!(SubscriptionId::new().to_string().starts_with("sub:"));
        assert!(MessageId::new().to_string().starts_with("msg:"));
    }

    #[test]
    fn message_id_default_is_fresh() {
        assert_ne!(MessageId::default(), MessageId::default());
    }

    #[test]
    fn serde_roundtrip() {
        let id = NodeId::new();
        let json = serde_json::to_string(&id).expect("NodeId should serialize");
        let back: NodeId = serde_json::from_str(&json).expect("NodeId should deserialize");
        assert_eq!(id, back);
    }
}
