//! The MAST node tree and composite-method engine.
//!
//! An [`AddressSpace`] exposes a machine's observable state and invocable
//! actions as a rooted tree of folders, typed variables and methods,
//! addressed by slash-separated path or by id. Variables carry hook
//! pipelines around read and write, plus filtered subscriptions that turn
//! accepted writes into ordered notification batches. Composite methods
//! carry control-flow graphs stepped by the [`FlowEngine`], suspending on
//! unmet wait conditions and resuming when watched variables change.
//!
//! # Crate architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  mast-types     : ids, Value, Unit, NodeRef           │
//! │  mast-flow      : steps, expressions, scopes          │
//! │  mast-model     : tree, subscriptions, engine ◄── HERE│
//! │  mast-protocol  : messages, protocol manager          │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Ownership model
//!
//! The tree is an arena: one flat id→node map that doubles as the O(1)
//! id index. Folders and object variables name their children by id, and
//! parent links are ids too — lookup-only, never ownership. Removal
//! cascades through the subtree and reports the removed ids so dependent
//! composite scopes can be failed with `DEPENDENCY_LOST`.
//!
//! # Delivery model
//!
//! Writes do not call subscribers directly. An accepted write returns a
//! [`WriteOutcome`]: the write's sequence number plus the matched
//! [`Notification`]s, the variable's own subscribers first and ancestor
//! object variables after, bottom-up. The embedder (normally the
//! protocol manager) delivers them and feeds the outcome to the engine
//! so waiting scopes resume in write order.
//!
//! # Example
//!
//! ```
//! use mast_model::{AddressSpace, SubscriptionFilter};
//! use mast_types::Value;
//!
//! let mut space = AddressSpace::new("press-7");
//! let root = space.root();
//! let temp = space.add_numeric(root, "temp", 20.0).expect("fresh name");
//! space
//!     .subscribe(temp, "gateway", SubscriptionFilter::deadband(2.0))
//!     .expect("valid filter");
//!
//! let outcome = space.write(temp, Value::from(25.0)).expect("in range");
//! assert_eq!(outcome.notifications.len(), 1);
//! assert_eq!(outcome.notifications[0].subscriber, "gateway");
//! ```

mod builder;
mod engine;
mod error;
mod hook;
mod node;
mod space;
mod subscription;

pub use builder::{AddressSpaceBuilder, NumericInit};
pub use engine::{FlowEngine, InvokeResult, ScopeEvent};
pub use error::ModelError;
pub use hook::{
    ArgMap, HookError, HookVerdict, MethodCallback, PostInvokeHook, PostReadHook, PostUpdateHook,
    PreInvokeHook, PreReadHook, PreUpdateHook, VariableHook,
};
pub use node::{
    BoolVariable, CompositeMethodNode, Folder, MethodFlavor, MethodNode, Node, NodeKind,
    NumericVariable, ObjectVariable, StringVariable, Template,
};
pub use space::{AddressSpace, MergeOutcome};
pub use subscription::{
    Notification, RangeMode, Subscription, SubscriptionFilter, WriteOutcome,
};
