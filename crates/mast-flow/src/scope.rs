//! Execution scopes: the suspendable state of one composite invocation.
//!
//! A composite method is not a coroutine. Each invocation is an explicit
//! state machine: a program counter into the graph, a [`Frame`] of named
//! bindings, and — while suspended — one [`ActiveWait`] recording the
//! predicate that must come true before stepping resumes. This keeps
//! scope state inspectable and cancellable from the outside.

use crate::{CompareOp, FlowError};
use chrono::{DateTime, Utc};
use mast_types::{NodeId, ScopeId, Value};
use std::collections::BTreeMap;

/// Named bindings of a scope: parameters plus `store_as` results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    bindings: BTreeMap<String, Value>,
}

impl Frame {
    /// Creates an empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a frame pre-populated with parameter bindings.
    #[must_use]
    pub fn with_bindings(bindings: BTreeMap<String, Value>) -> Self {
        Self { bindings }
    }

    /// Returns the value bound under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Binds `value` under `name`, replacing any previous binding.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Returns `true` when `name` is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Iterates the bindings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.bindings.iter()
    }
}

/// The predicate a suspended scope is blocked on.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveWait {
    /// The watched variable.
    pub node: NodeId,
    /// Comparison operator.
    pub op: CompareOp,
    /// Right-hand side, resolved against the frame at suspension time.
    pub rhs: Value,
    /// Engine tick at which the wait was registered. A write wakes the
    /// wait only if its tick is strictly later, so a scope never advances
    /// twice on one originating write.
    pub armed_at: u64,
}

impl ActiveWait {
    /// Evaluates the wait predicate against the variable's current value.
    ///
    /// # Errors
    ///
    /// Propagates comparison type errors.
    pub fn holds(&self, current: &Value) -> Result<bool, FlowError> {
        self.op.evaluate(current, &self.rhs)
    }
}

/// One active or suspended execution of a composite method.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Unique scope handle.
    pub id: ScopeId,
    /// The composite method this scope executes.
    pub method: NodeId,
    /// Parameter and intermediate bindings.
    pub frame: Frame,
    /// Program counter into the method's graph.
    pub pc: usize,
    /// Optional invocation deadline, checked at step boundaries.
    pub deadline: Option<DateTime<Utc>>,
    /// The predicate this scope is suspended on, if any.
    pub wait: Option<ActiveWait>,
}

impl Scope {
    /// Creates a fresh scope at the start of the graph.
    #[must_use]
    pub fn new(method: NodeId, frame: Frame, deadline: Option<DateTime<Utc>>) -> Self {
        Self {
            id: ScopeId::new(),
            method,
            frame,
            pc: 0,
            deadline,
            wait: None,
        }
    }

    /// Returns `true` while the scope is blocked on a wait predicate.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.wait.is_some()
    }

    /// Records the wait this scope suspends on.
    pub fn arm_wait(&mut self, node: NodeId, op: CompareOp, rhs: Value, tick: u64) {
        self.wait = Some(ActiveWait {
            node,
            op,
            rhs,
            armed_at: tick,
        });
    }

    /// Drops the active wait, typically just before resuming.
    pub fn clear_wait(&mut self) {
        self.wait = None;
    }

    /// Returns `true` when the invocation deadline has passed.
    #[must_use]
    pub fn deadline_exceeded(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|d| now > d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn frame_bind_and_get() {
        let mut frame = Frame::new();
        assert!(!frame.contains("x"));
        frame.bind("x", Value::from(1.0));
        assert_eq!(frame.get("x"), Some(&Value::from(1.0)));
        frame.bind("x", Value::from(2.0));
        assert_eq!(frame.get("x"), Some(&Value::from(2.0)));
    }

    #[test]
    fn fresh_scope_is_runnable() {
        let scope = Scope::new(NodeId::new(), Frame::new(), None);
        assert_eq!(scope.pc, 0);
        assert!(!scope.is_suspended());
    }

    #[test]
    fn arm_and_clear_wait() {
        let mut scope = Scope::new(NodeId::new(), Frame::new(), None);
        let node = NodeId::new();
        scope.arm_wait(node, CompareOp::Eq, Value::from(17.0), 3);
        assert!(scope.is_suspended());
        let wait = scope.wait.as_ref().expect("armed");
        assert_eq!(wait.node, node);
        assert_eq!(wait.armed_at, 3);
        scope.clear_wait();
        assert!(!scope.is_suspended());
    }

    #[test]
    fn wait_predicate_evaluation() {
        let wait = ActiveWait {
            node: NodeId::new(),
            op: CompareOp::Ge,
            rhs: Value::from(10.0),
            armed_at: 0,
        };
        assert!(wait.holds(&Value::from(11.0)).expect("nums"));
        assert!(!wait.holds(&Value::from(9.0)).expect("nums"));
        assert!(wait.holds(&Value::from(true)).is_err());
    }

    #[test]
    fn deadline_check() {
        let past = Utc::now() - Duration::seconds(5);
        let scope = Scope::new(NodeId::new(), Frame::new(), Some(past));
        assert!(scope.deadline_exceeded(Utc::now()));

        let unbounded = Scope::new(NodeId::new(), Frame::new(), None);
        assert!(!unbounded.deadline_exceeded(Utc::now()));
    }
}
