//! Control-flow types for MAST composite methods.
//!
//! A composite method declares its body as a [`Graph`] of [`Step`]s:
//! reads, writes, wait conditions, async method calls and branches. This
//! crate holds the *data* side of that machinery — steps, value
//! expressions, comparison operators, and the suspendable [`Scope`]
//! state — with no dependency on the node tree. The engine that steps a
//! scope against a tree lives in `mast-model`.
//!
//! # Crate architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  mast-types     : ids, Value, Unit, NodeRef           │
//! │  mast-flow      : steps, expressions, scopes ◄── HERE │
//! │  mast-model     : node tree, subscriptions, engine    │
//! │  mast-protocol  : messages, protocol manager          │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Suspension model
//!
//! Scopes are explicit state machines, not coroutines: a program counter
//! plus a [`Frame`] of bindings. A [`Step::Wait`] whose predicate is
//! false records an [`ActiveWait`] and hands control back; an accepted
//! write to the watched variable re-evaluates the predicate and resumes
//! stepping from the recorded counter.
//!
//! # Example
//!
//! ```
//! use mast_flow::{CompareOp, Graph, Step, ValueExpr};
//! use mast_types::{NodeRef, Value};
//!
//! // write root/n = 18, wait until it reads 17, then read root/b as `out`
//! let graph = Graph::new(vec![
//!     Step::Write {
//!         target: NodeRef::path("root/n"),
//!         value: ValueExpr::from(Value::from(18.0)),
//!     },
//!     Step::Wait {
//!         source: NodeRef::path("root/n"),
//!         op: CompareOp::Eq,
//!         rhs: ValueExpr::from(Value::from(17.0)),
//!     },
//!     Step::Read {
//!         source: NodeRef::path("root/b"),
//!         store_as: "out".into(),
//!     },
//! ]);
//! graph.validate().expect("well-formed");
//! ```

mod error;
mod expr;
mod op;
mod scope;
mod step;

pub use error::FlowError;
pub use expr::ValueExpr;
pub use op::CompareOp;
pub use scope::{ActiveWait, Frame, Scope};
pub use step::{Graph, Step};
