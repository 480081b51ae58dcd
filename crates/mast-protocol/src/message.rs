//! Protocol messages.
//!
//! One envelope shape carries everything: requests, their terminal
//! replies, `Accepted` acknowledgements for suspended composite calls,
//! and unsolicited `Event` notifications. The concrete byte serialization
//! belongs to the transport; this layer only guarantees that a message
//! round-trips through serde with `id`, `sender`, `target`, kind,
//! namespace, name and body intact.

use chrono::{DateTime, Utc};
use mast_model::SubscriptionFilter;
use mast_types::{MessageId, NodeRef, ScopeId, SubscriptionId, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Message kind: the four request/response kinds plus `Event` for
/// unsolicited notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// A request from a client.
    Request,
    /// Terminal success reply.
    Success,
    /// Terminal error reply.
    Error,
    /// A composite call suspended; the terminal reply follows later.
    Accepted,
    /// Unsolicited subscription notification.
    Event,
}

/// Operation namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    /// Variable operations.
    Variable,
    /// Method operations.
    Method,
}

/// Operation name within a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationName {
    /// Read a variable.
    Read,
    /// Write a variable. Notification events reuse this name: they
    /// report an accepted write.
    Write,
    /// Attach a subscription.
    Subscribe,
    /// Remove a subscription.
    Unsubscribe,
    /// Invoke a method.
    Call,
}

/// Message body, one variant per request/reply payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Body {
    /// `Variable.Read` request.
    Read {
        /// Target variable.
        node: NodeRef,
    },
    /// `Variable.Write` request.
    Write {
        /// Target variable.
        node: NodeRef,
        /// Proposed value. Object variables take an object value, merged
        /// field-wise.
        value: Value,
    },
    /// `Variable.Subscribe` request.
    Subscribe {
        /// Target variable.
        node: NodeRef,
        /// Notification filter.
        filter: SubscriptionFilter,
    },
    /// `Variable.Unsubscribe` request.
    Unsubscribe {
        /// Target variable.
        node: NodeRef,
        /// Handle returned by the subscribe reply.
        subscription: SubscriptionId,
    },
    /// `Method.Call` request.
    Call {
        /// Target method.
        node: NodeRef,
        /// Positional arguments.
        args: Vec<Value>,
        /// Optional completion deadline for composite invocations.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deadline: Option<DateTime<Utc>>,
    },

    /// Read success.
    Value {
        /// The sampled (possibly hook-transformed) value.
        value: Value,
        /// When the sample was taken.
        timestamp: DateTime<Utc>,
    },
    /// Success with nothing to report (write, unsubscribe).
    Empty,
    /// Subscribe success.
    Subscribed {
        /// Handle for a later unsubscribe.
        subscription: SubscriptionId,
    },
    /// Call success: the method's named return values.
    Returns {
        /// Return map keyed by the return templates.
        returns: BTreeMap<String, Value>,
    },
    /// Composite call suspended; completion arrives under the original
    /// request id.
    Accepted {
        /// Handle for cancellation and correlation.
        scope: ScopeId,
    },
    /// Unsolicited notification for one matched subscription.
    Event {
        /// The written variable.
        node: NodeRef,
        /// The delivered value.
        value: Value,
        /// The matched subscription.
        subscription: SubscriptionId,
    },
    /// Terminal failure.
    Error {
        /// Stable machine-readable code.
        code: String,
        /// Human-readable detail.
        message: String,
    },
}

/// One protocol message.
///
/// Replies echo the request's `id`; deferred completions of a suspended
/// composite call echo the original call's `id`, not the `Accepted`'s.
/// Events carry freshly assigned ids.
///
/// # Example
///
/// ```
/// use mast_protocol::Message;
/// use mast_types::{NodeRef, Value};
///
/// let req = Message::write_request("gw", "press-7", NodeRef::path("root/b"), Value::from(true));
/// let json = serde_json::to_string(&req).expect("serializes");
/// let back: Message = serde_json::from_str(&json).expect("deserializes");
/// assert_eq!(back, req);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message id; replies echo the request's.
    pub id: MessageId,
    /// Originator identity.
    pub sender: String,
    /// Recipient identity.
    pub target: String,
    /// Message kind.
    pub kind: MessageKind,
    /// Operation namespace.
    pub namespace: Namespace,
    /// Operation name.
    pub name: OperationName,
    /// Payload.
    pub body: Body,
}

impl Message {
    /// Creates a request with a fresh id.
    #[must_use]
    pub fn request(
        sender: impl Into<String>,
        target: impl Into<String>,
        namespace: Namespace,
        name: OperationName,
        body: Body,
    ) -> Self {
        Self {
            id: MessageId::new(),
            sender: sender.into(),
            target: target.into(),
            kind: MessageKind::Request,
            namespace,
            name,
            body,
        }
    }

    /// `Variable.Read` request.
    #[must_use]
    pub fn read_request(sender: impl Into<String>, target: impl Into<String>, node: NodeRef) -> Self {
        Self::request(
            sender,
            target,
            Namespace::Variable,
            OperationName::Read,
            Body::Read { node },
        )
    }

    /// `Variable.Write` request.
    #[must_use]
    pub fn write_request(
        sender: impl Into<String>,
        target: impl Into<String>,
        node: NodeRef,
        value: Value,
    ) -> Self {
        Self::request(
            sender,
            target,
            Namespace::Variable,
            OperationName::Write,
            Body::Write { node, value },
        )
    }

    /// `Variable.Subscribe` request.
    #[must_use]
    pub fn subscribe_request(
        sender: impl Into<String>,
        target: impl Into<String>,
        node: NodeRef,
        filter: SubscriptionFilter,
    ) -> Self {
        Self::request(
            sender,
            target,
            Namespace::Variable,
            OperationName::Subscribe,
            Body::Subscribe { node, filter },
        )
    }

    /// `Variable.Unsubscribe` request.
    #[must_use]
    pub fn unsubscribe_request(
        sender: impl Into<String>,
        target: impl Into<String>,
        node: NodeRef,
        subscription: SubscriptionId,
    ) -> Self {
        Self::request(
            sender,
            target,
            Namespace::Variable,
            OperationName::Unsubscribe,
            Body::Unsubscribe { node, subscription },
        )
    }

    /// `Method.Call` request without a deadline.
    #[must_use]
    pub fn call_request(
        sender: impl Into<String>,
        target: impl Into<String>,
        node: NodeRef,
        args: Vec<Value>,
    ) -> Self {
        Self::request(
            sender,
            target,
            Namespace::Method,
            OperationName::Call,
            Body::Call {
                node,
                args,
                deadline: None,
            },
        )
    }

    /// Returns `true` for request messages.
    #[must_use]
    pub fn is_request(&self) -> bool {
        self.kind == MessageKind::Request
    }

    /// Returns `true` for terminal replies (success or error).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, MessageKind::Success | MessageKind::Error)
    }

    /// The node reference carried by a request body, if any.
    #[must_use]
    pub fn node_ref(&self) -> Option<&NodeRef> {
        match &self.body {
            Body::Read { node }
            | Body::Write { node, .. }
            | Body::Subscribe { node, .. }
            | Body::Unsubscribe { node, .. }
            | Body::Call { node, .. }
            | Body::Event { node, .. } => Some(node),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mast_types::NodeId;

    #[test]
    fn request_constructors_set_the_table_row() {
        let read = Message::read_request("gw", "m", NodeRef::path("root/b"));
        assert_eq!(read.kind, MessageKind::Request);
        assert_eq!(read.namespace, Namespace::Variable);
        assert_eq!(read.name, OperationName::Read);
        assert!(read.is_request());

        let call = Message::call_request("gw", "m", NodeRef::path("root/f"), vec![]);
        assert_eq!(call.namespace, Namespace::Method);
        assert_eq!(call.name, OperationName::Call);
    }

    #[test]
    fn fresh_ids_per_request() {
        let a = Message::read_request("gw", "m", NodeRef::path("root/b"));
        let b = Message::read_request("gw", "m", NodeRef::path("root/b"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn envelope_roundtrips_verbatim() {
        let id = NodeId::new();
        let msg = Message::request(
            "gw-north",
            "press-7",
            Namespace::Variable,
            OperationName::Subscribe,
            Body::Subscribe {
                node: NodeRef::full("root/n", id),
                filter: SubscriptionFilter::deadband(2.0),
            },
        );
        let json = serde_json::to_string(&msg).expect("serializes");
        let back: Message = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back, msg);
        assert_eq!(back.sender, "gw-north");
        assert_eq!(back.target, "press-7");
    }

    #[test]
    fn node_ref_extraction() {
        let msg = Message::write_request("gw", "m", NodeRef::path("root/n"), Value::from(1.0));
        assert_eq!(msg.node_ref(), Some(&NodeRef::path("root/n")));

        let reply = Message {
            body: Body::Empty,
            ..msg
        };
        assert!(reply.node_ref().is_none());
    }

    #[test]
    fn terminal_classification() {
        let mut msg = Message::read_request("gw", "m", NodeRef::path("root/b"));
        assert!(!msg.is_terminal());
        msg.kind = MessageKind::Success;
        assert!(msg.is_terminal());
        msg.kind = MessageKind::Accepted;
        assert!(!msg.is_terminal());
    }
}
