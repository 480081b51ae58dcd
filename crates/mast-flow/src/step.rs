//! Control-flow steps and graphs.
//!
//! A composite method's body is a [`Graph`]: an ordered sequence of
//! [`Step`]s executed by the flow engine against the address space. The
//! graph is plain data — it references tree nodes by [`NodeRef`] and scope
//! bindings by name, so it can be built by a loader long before a tree
//! exists.

use crate::{CompareOp, FlowError, ValueExpr};
use mast_types::NodeRef;
use serde::{Deserialize, Serialize};

/// One step of a composite method's control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    /// Evaluates `value` against the scope frame and writes it to
    /// `target`. The write runs the full hook/notification pipeline.
    Write {
        /// Variable to write.
        target: NodeRef,
        /// Expression producing the written value.
        value: ValueExpr,
    },

    /// Reads `source` and binds the result under `store_as` in the frame.
    Read {
        /// Variable to read.
        source: NodeRef,
        /// Frame name the result is bound to.
        store_as: String,
    },

    /// Compares `source` with `rhs`; advances when the predicate holds,
    /// suspends the scope otherwise.
    Wait {
        /// Variable whose value is tested.
        source: NodeRef,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand side, resolved against the frame at evaluation.
        rhs: ValueExpr,
    },

    /// Invokes an async-flavored method and binds its immediate
    /// acknowledgement. Never blocks the scope.
    CallAsync {
        /// Method to invoke.
        method: NodeRef,
        /// Positional arguments, resolved against the frame.
        args: Vec<ValueExpr>,
        /// Frame name the acknowledgement map is bound to, if wanted.
        store_returns_as: Option<String>,
    },

    /// Jumps to `if_true` or `if_false` depending on the predicate over
    /// `source`. The only non-linear step.
    Branch {
        /// Variable whose value is tested.
        source: NodeRef,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand side, resolved against the frame at evaluation.
        rhs: ValueExpr,
        /// Step index taken when the predicate holds.
        if_true: usize,
        /// Step index taken otherwise.
        if_false: usize,
    },
}

/// An ordered control-flow graph.
///
/// Without branches the graph is a linear sequence; branch targets allow
/// non-linear advance within the same step list.
///
/// # Example
///
/// ```
/// use mast_flow::{CompareOp, Graph, Step, ValueExpr};
/// use mast_types::{NodeRef, Value};
///
/// let graph = Graph::new(vec![
///     Step::Write {
///         target: NodeRef::path("root/n"),
///         value: ValueExpr::from(Value::from(18.0)),
///     },
///     Step::Wait {
///         source: NodeRef::path("root/n"),
///         op: CompareOp::Eq,
///         rhs: ValueExpr::from(Value::from(17.0)),
///     },
/// ]);
/// assert_eq!(graph.len(), 2);
/// graph.validate().expect("no branches, nothing to check");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Graph {
    steps: Vec<Step>,
}

impl Graph {
    /// Creates a graph from an ordered step list.
    #[must_use]
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Returns the step at `pc`, if inside the graph.
    #[must_use]
    pub fn step(&self, pc: usize) -> Option<&Step> {
        self.steps.get(pc)
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` when the graph has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Iterates the steps in order.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Checks structural invariants: every branch target must land inside
    /// the graph.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::BranchOutOfRange`] for the first bad target.
    pub fn validate(&self) -> Result<(), FlowError> {
        let len = self.steps.len();
        for step in &self.steps {
            if let Step::Branch {
                if_true, if_false, ..
            } = step
            {
                for &target in [if_true, if_false] {
                    if target >= len {
                        return Err(FlowError::BranchOutOfRange { target, len });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mast_types::Value;

    fn wait(path: &str, rhs: f64) -> Step {
        Step::Wait {
            source: NodeRef::path(path),
            op: CompareOp::Eq,
            rhs: ValueExpr::from(Value::from(rhs)),
        }
    }

    #[test]
    fn linear_graph_validates() {
        let g = Graph::new(vec![wait("root/a", 1.0), wait("root/b", 2.0)]);
        g.validate().expect("linear graph");
        assert_eq!(g.len(), 2);
        assert!(!g.is_empty());
    }

    #[test]
    fn branch_targets_checked() {
        let g = Graph::new(vec![Step::Branch {
            source: NodeRef::path("root/flag"),
            op: CompareOp::Eq,
            rhs: ValueExpr::from(Value::from(true)),
            if_true: 0,
            if_false: 7,
        }]);
        let err = g.validate().expect_err("if_false lands outside");
        assert_eq!(err, FlowError::BranchOutOfRange { target: 7, len: 1 });
    }

    #[test]
    fn step_lookup_past_end() {
        let g = Graph::new(vec![wait("root/a", 1.0)]);
        assert!(g.step(0).is_some());
        assert!(g.step(1).is_none());
    }

    #[test]
    fn serde_roundtrip() {
        let g = Graph::new(vec![
            Step::Read {
                source: NodeRef::path("root/b"),
                store_as: "out".into(),
            },
            Step::CallAsync {
                method: NodeRef::path("root/start"),
                args: vec![ValueExpr::Var("out".into())],
                store_returns_as: None,
            },
        ]);
        let json = serde_json::to_string(&g).expect("graph serializes");
        let back: Graph = serde_json::from_str(&json).expect("graph deserializes");
        assert_eq!(back, g);
    }
}
