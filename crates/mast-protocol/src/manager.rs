//! The protocol manager: request dispatch against an address space.
//!
//! One manager exclusively owns one [`AddressSpace`] and its
//! [`FlowEngine`]. Dispatch is single-threaded and cooperative: each
//! inbound request runs to quiescence — the operation itself, the
//! notification pass of every write it causes, and every in-line scope
//! resume those writes trigger — before the reply is returned. Writes are
//! settled FIFO, so all observers of write W1 are served strictly before
//! any observer of a later write W2.
//!
//! Asynchronous traffic (subscription events, deferred completions of
//! suspended composite calls) accumulates in an outbound queue the
//! embedder drains between dispatches.

use crate::error::ProtocolError;
use crate::message::{Body, Message, MessageKind, Namespace, OperationName};
use chrono::{DateTime, Utc};
use mast_flow::FlowError;
use mast_model::{
    AddressSpace, FlowEngine, InvokeResult, ModelError, NodeKind, ScopeEvent, WriteOutcome,
};
use mast_types::{ErrorCode, MessageId, NodeId, NodeRef, ScopeId, Value};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Bookkeeping for a suspended composite call awaiting completion.
#[derive(Debug, Clone)]
struct PendingCall {
    /// The original call's id; the deferred completion echoes it.
    request_id: MessageId,
    /// Who to send the completion to.
    caller: String,
}

/// Routes protocol messages against one address space.
///
/// # Example
///
/// ```
/// use mast_model::AddressSpaceBuilder;
/// use mast_protocol::{Body, Message, MessageKind, ProtocolManager};
/// use mast_types::{NodeRef, Value};
///
/// let space = AddressSpaceBuilder::new("press-7")
///     .boolean("root", "b", false)
///     .expect("fresh")
///     .build();
/// let mut mng = ProtocolManager::new(space);
///
/// let req = Message::write_request("gw", "press-7", NodeRef::path("root/b"), Value::from(true));
/// let reply = mng.handle(req);
/// assert_eq!(reply.kind, MessageKind::Success);
///
/// let reply = mng.handle(Message::read_request("gw", "press-7", NodeRef::path("root/b")));
/// assert!(matches!(reply.body, Body::Value { value: Value::Bool(true), .. }));
/// ```
pub struct ProtocolManager {
    space: AddressSpace,
    engine: FlowEngine,
    outbound: VecDeque<Message>,
    pending: HashMap<ScopeId, PendingCall>,
}

impl ProtocolManager {
    /// Wraps an address space for protocol dispatch.
    #[must_use]
    pub fn new(space: AddressSpace) -> Self {
        Self {
            space,
            engine: FlowEngine::new(),
            outbound: VecDeque::new(),
            pending: HashMap::new(),
        }
    }

    /// The managed address space.
    #[must_use]
    pub fn space(&self) -> &AddressSpace {
        &self.space
    }

    /// Mutable access for the embedder — binding method callbacks and
    /// variable hooks after loading the tree.
    pub fn space_mut(&mut self) -> &mut AddressSpace {
        &mut self.space
    }

    /// Handles one inbound message to quiescence and returns the reply.
    ///
    /// The reply echoes the request's `id`. A suspended composite call
    /// replies `Accepted`; its terminal `Success`/`Error` arrives later
    /// through [`outbound`](Self::outbound) under the original id.
    pub fn handle(&mut self, msg: Message) -> Message {
        debug!(id = %msg.id, sender = %msg.sender, namespace = ?msg.namespace, name = ?msg.name, "request received");
        self.sweep_deadlines(Utc::now());

        if msg.kind != MessageKind::Request {
            return self.error_reply(&msg, &ProtocolError::NotARequest(msg.kind));
        }
        match self.dispatch(&msg) {
            Ok(reply) => reply,
            Err(err) => self.error_reply(&msg, &err),
        }
    }

    /// Drains the asynchronous messages produced since the last call:
    /// notification events and deferred completions, in production order.
    pub fn outbound(&mut self) -> impl Iterator<Item = Message> + '_ {
        self.outbound.drain(..)
    }

    /// Cancels a suspended composite scope.
    ///
    /// The pending call, if any, receives a `CANCELLED` error completion.
    /// Unknown scope ids are a no-op returning `false`.
    pub fn cancel(&mut self, scope: ScopeId) -> bool {
        if !self.engine.cancel(scope) {
            return false;
        }
        if let Some(call) = self.pending.remove(&scope) {
            let err = ModelError::Flow(FlowError::Cancelled);
            self.push_completion_error(&call, &err);
        }
        true
    }

    /// Removes a node (and its subtree) from the space.
    ///
    /// Scopes that watched a removed node, or belonged to a removed
    /// composite method, fail with `DEPENDENCY_LOST` deferred
    /// completions.
    ///
    /// # Errors
    ///
    /// Resolution and removal errors from the model layer.
    pub fn remove_node(&mut self, node_ref: &NodeRef) -> Result<Vec<NodeId>, ModelError> {
        let id = self.space.resolve(node_ref)?;
        let removed = self.space.remove(id)?;
        for scope in self.engine.fail_dependents(&removed) {
            if let Some(call) = self.pending.remove(&scope) {
                let err = ModelError::Flow(FlowError::DependencyLost);
                self.push_completion_error(&call, &err);
            }
        }
        Ok(removed)
    }

    /// Expires composite scopes whose invocation deadline has passed,
    /// emitting `CANCELLED` completions. Also runs on every
    /// [`handle`](Self::handle).
    pub fn expire_deadlines(&mut self, now: DateTime<Utc>) {
        self.sweep_deadlines(now);
    }

    // ── Dispatch ─────────────────────────────────────────────────

    fn dispatch(&mut self, msg: &Message) -> Result<Message, ProtocolError> {
        match (msg.namespace, msg.name) {
            (Namespace::Variable, OperationName::Read) => {
                let Body::Read { node } = &msg.body else {
                    return Err(ProtocolError::BodyMismatch { expected: "Read" });
                };
                let id = self.space.resolve(node)?;
                let value = self.space.read(id)?;
                Ok(self.reply(
                    msg,
                    MessageKind::Success,
                    Body::Value {
                        value,
                        timestamp: Utc::now(),
                    },
                ))
            }

            (Namespace::Variable, OperationName::Write) => {
                let Body::Write { node, value } = &msg.body else {
                    return Err(ProtocolError::BodyMismatch { expected: "Write" });
                };
                let id = self.space.resolve(node)?;
                self.perform_write(id, value.clone())?;
                Ok(self.reply(msg, MessageKind::Success, Body::Empty))
            }

            (Namespace::Variable, OperationName::Subscribe) => {
                let Body::Subscribe { node, filter } = &msg.body else {
                    return Err(ProtocolError::BodyMismatch { expected: "Subscribe" });
                };
                let id = self.space.resolve(node)?;
                let subscription = self
                    .space
                    .subscribe(id, msg.sender.clone(), filter.clone())?;
                Ok(self.reply(msg, MessageKind::Success, Body::Subscribed { subscription }))
            }

            (Namespace::Variable, OperationName::Unsubscribe) => {
                let Body::Unsubscribe { node, subscription } = &msg.body else {
                    return Err(ProtocolError::BodyMismatch { expected: "Unsubscribe" });
                };
                let id = self.space.resolve(node)?;
                // an absent handle is a no-op, not an error
                self.space.unsubscribe(id, *subscription)?;
                Ok(self.reply(msg, MessageKind::Success, Body::Empty))
            }

            (Namespace::Method, OperationName::Call) => {
                let Body::Call {
                    node,
                    args,
                    deadline,
                } = &msg.body
                else {
                    return Err(ProtocolError::BodyMismatch { expected: "Call" });
                };
                let id = self.space.resolve(node)?;
                self.perform_call(msg, id, args.clone(), *deadline)
            }

            (namespace, name) => Err(ProtocolError::Unsupported { namespace, name }),
        }
    }

    fn perform_write(&mut self, id: NodeId, value: Value) -> Result<(), ProtocolError> {
        let is_object = self
            .space
            .node(id)
            .is_some_and(|n| matches!(n.kind(), NodeKind::Object(_)));
        if is_object {
            let Value::Object(entries) = value else {
                return Err(ModelError::TypeMismatch {
                    expected: mast_types::DataType::Object,
                    actual: value.data_type(),
                }
                .into());
            };
            let merge = self.space.write_merge(id, entries)?;
            let first_error = merge.first_error().cloned();
            // successfully written properties stay written and notify,
            // even when a sibling failed
            self.settle(merge.outcomes);
            match first_error {
                None => Ok(()),
                Some(err) => Err(err.into()),
            }
        } else {
            let outcome = self.space.write(id, value)?;
            self.settle(vec![outcome]);
            Ok(())
        }
    }

    fn perform_call(
        &mut self,
        msg: &Message,
        id: NodeId,
        args: Vec<Value>,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Message, ProtocolError> {
        enum CallTarget {
            Plain,
            Composite,
        }
        let target = match self.space.node(id).map(mast_model::Node::kind) {
            Some(NodeKind::Method(_)) => CallTarget::Plain,
            Some(NodeKind::Composite(_)) => CallTarget::Composite,
            Some(other) => {
                return Err(ModelError::KindMismatch {
                    expected: "method",
                    actual: other.class(),
                }
                .into())
            }
            None => return Err(ModelError::NotFound(id.to_string()).into()),
        };
        match target {
            CallTarget::Plain => {
                let returns = self.space.invoke_method(id, args)?;
                Ok(self.reply(msg, MessageKind::Success, Body::Returns { returns }))
            }
            CallTarget::Composite => {
                let mut writes = Vec::new();
                let invoked =
                    self.engine
                        .invoke(&mut self.space, id, args, deadline, &mut writes);
                // steps already executed have written; their observers are
                // served regardless of how the invocation ended
                self.settle(writes);
                match invoked? {
                    InvokeResult::Completed(returns) => {
                        Ok(self.reply(msg, MessageKind::Success, Body::Returns { returns }))
                    }
                    InvokeResult::Pending(scope) => {
                        self.pending.insert(
                            scope,
                            PendingCall {
                                request_id: msg.id,
                                caller: msg.sender.clone(),
                            },
                        );
                        Ok(self.reply(msg, MessageKind::Accepted, Body::Accepted { scope }))
                    }
                }
            }
        }
    }

    // ── Settlement ───────────────────────────────────────────────

    /// Runs the notification pass to quiescence: delivers each write's
    /// notifications, resumes eligible scopes, and queues any writes the
    /// resumed scopes perform — FIFO, so observers see writes in order.
    fn settle(&mut self, initial: Vec<WriteOutcome>) {
        let mut queue: VecDeque<WriteOutcome> = initial.into();
        while let Some(outcome) = queue.pop_front() {
            for notification in &outcome.notifications {
                // a subscription removed earlier in this pass stays quiet
                if !self
                    .space
                    .has_subscription(notification.node, notification.subscription)
                {
                    continue;
                }
                self.outbound.push_back(Message {
                    id: MessageId::new(),
                    sender: self.space.name().to_string(),
                    target: notification.subscriber.clone(),
                    kind: MessageKind::Event,
                    namespace: Namespace::Variable,
                    name: OperationName::Write,
                    body: Body::Event {
                        node: NodeRef::full(notification.path.clone(), notification.node),
                        value: notification.value.clone(),
                        subscription: notification.subscription,
                    },
                });
            }

            let mut writes = Vec::new();
            let events =
                self.engine
                    .resume_for_write(&mut self.space, outcome.node, outcome.tick, &mut writes);
            queue.extend(writes);
            for event in events {
                self.complete_scope(event);
            }
        }
    }

    fn complete_scope(&mut self, event: ScopeEvent) {
        match event {
            ScopeEvent::Completed { scope, returns } => {
                if let Some(call) = self.pending.remove(&scope) {
                    debug!(scope = %scope, id = %call.request_id, "deferred completion");
                    self.outbound.push_back(Message {
                        id: call.request_id,
                        sender: self.space.name().to_string(),
                        target: call.caller,
                        kind: MessageKind::Success,
                        namespace: Namespace::Method,
                        name: OperationName::Call,
                        body: Body::Returns { returns },
                    });
                }
            }
            ScopeEvent::Failed { scope, error } => {
                if let Some(call) = self.pending.remove(&scope) {
                    self.push_completion_error(&call, &error);
                }
            }
        }
    }

    fn push_completion_error(&mut self, call: &PendingCall, error: &ModelError) {
        debug!(id = %call.request_id, code = error.code(), "deferred failure");
        self.outbound.push_back(Message {
            id: call.request_id,
            sender: self.space.name().to_string(),
            target: call.caller.clone(),
            kind: MessageKind::Error,
            namespace: Namespace::Method,
            name: OperationName::Call,
            body: Body::Error {
                code: error.code().to_string(),
                message: error.to_string(),
            },
        });
    }

    fn sweep_deadlines(&mut self, now: DateTime<Utc>) {
        for scope in self.engine.expire_deadlines(now) {
            if let Some(call) = self.pending.remove(&scope) {
                let err = ModelError::Flow(FlowError::DeadlineExceeded);
                self.push_completion_error(&call, &err);
            }
        }
    }

    // ── Reply construction ───────────────────────────────────────

    fn reply(&self, msg: &Message, kind: MessageKind, body: Body) -> Message {
        Message {
            id: msg.id,
            sender: msg.target.clone(),
            target: msg.sender.clone(),
            kind,
            namespace: msg.namespace,
            name: msg.name,
            body,
        }
    }

    fn error_reply(&self, msg: &Message, err: &ProtocolError) -> Message {
        debug!(id = %msg.id, code = err.code(), "request failed");
        self.reply(
            msg,
            MessageKind::Error,
            Body::Error {
                code: err.code().to_string(),
                message: err.to_string(),
            },
        )
    }
}
