//! Nodes of the address space.
//!
//! A node is a tagged variant with a common header: folders own children,
//! variables hold typed values plus hooks and subscriptions, methods hold
//! parameter/return templates and a bound callback, composite methods
//! hold a control-flow graph. Parent links are plain ids — lookup only,
//! never ownership; the tree's arena owns every node.

use crate::hook::{MethodCallback, PostInvokeHook, PreInvokeHook, VariableHooks};
use crate::subscription::Subscription;
use crate::ModelError;
use mast_flow::Graph;
use mast_types::{DataType, NodeId, Unit, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A typed variable template: the declared shape of a method parameter or
/// return value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Parameter / return name.
    pub name: String,
    /// Declared type.
    pub data_type: DataType,
    /// Value used when the caller omits the argument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Template {
    /// Creates a template without a default.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            default: None,
        }
    }

    /// Attaches a default value.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Whether a method call returns its result or only an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodFlavor {
    /// The callback's result is the call's result.
    Sync,
    /// The callback returns an immediate acknowledgement; the real effect
    /// lands later through variable changes.
    Async,
}

/// State shared by every variable kind: hook slots and the ordered
/// subscription list.
#[derive(Debug, Default)]
pub struct VariableCommon {
    pub(crate) hooks: VariableHooks,
    pub(crate) subscriptions: Vec<Subscription>,
}

/// A folder: ordered name→child mapping, children exclusively owned by
/// the tree arena on the folder's behalf.
#[derive(Debug, Default)]
pub struct Folder {
    pub(crate) children: BTreeMap<String, NodeId>,
}

/// A boolean variable.
#[derive(Debug)]
pub struct BoolVariable {
    pub(crate) value: bool,
    pub(crate) common: VariableCommon,
}

/// A string variable.
#[derive(Debug)]
pub struct StringVariable {
    pub(crate) value: String,
    pub(crate) common: VariableCommon,
}

/// A numeric variable with an optional unit tag and optional inclusive
/// bounds.
#[derive(Debug)]
pub struct NumericVariable {
    pub(crate) value: f64,
    pub(crate) unit: Option<Unit>,
    pub(crate) low: Option<f64>,
    pub(crate) high: Option<f64>,
    pub(crate) common: VariableCommon,
}

impl NumericVariable {
    /// Checks `value` against the declared bounds.
    pub(crate) fn check_bounds(&self, value: f64) -> Result<(), ModelError> {
        let below = self.low.is_some_and(|lo| value < lo);
        let above = self.high.is_some_and(|hi| value > hi);
        if below || above {
            return Err(ModelError::OutOfRange {
                value,
                low: self.low,
                high: self.high,
            });
        }
        Ok(())
    }

    /// The unit tag, if declared.
    #[must_use]
    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }
}

/// An object variable: an ordered name→property mapping with no scalar
/// state of its own. Its value is the composition of its properties'
/// values; property changes propagate upward through it.
#[derive(Debug, Default)]
pub struct ObjectVariable {
    pub(crate) properties: BTreeMap<String, NodeId>,
    pub(crate) common: VariableCommon,
}

/// A method: parameter and return templates plus the user-bound
/// implementation and invocation hooks.
pub struct MethodNode {
    pub(crate) flavor: MethodFlavor,
    pub(crate) parameters: Vec<Template>,
    pub(crate) returns: Vec<Template>,
    pub(crate) callback: Option<MethodCallback>,
    pub(crate) pre_invoke: Option<PreInvokeHook>,
    pub(crate) post_invoke: Option<PostInvokeHook>,
}

impl MethodNode {
    pub(crate) fn new(flavor: MethodFlavor, parameters: Vec<Template>, returns: Vec<Template>) -> Self {
        Self {
            flavor,
            parameters,
            returns,
            callback: None,
            pre_invoke: None,
            post_invoke: None,
        }
    }

    /// The method's flavor.
    #[must_use]
    pub fn flavor(&self) -> MethodFlavor {
        self.flavor
    }

    /// Declared parameters.
    #[must_use]
    pub fn parameters(&self) -> &[Template] {
        &self.parameters
    }

    /// Declared returns.
    #[must_use]
    pub fn returns(&self) -> &[Template] {
        &self.returns
    }

    /// Returns `true` once an implementation is bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.callback.is_some()
    }
}

impl std::fmt::Debug for MethodNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodNode")
            .field("flavor", &self.flavor)
            .field("parameters", &self.parameters)
            .field("returns", &self.returns)
            .field("bound", &self.callback.is_some())
            .finish()
    }
}

/// A composite method: templates plus a control-flow graph. The graph is
/// shared behind an `Arc` so the engine can step it while the tree is
/// mutably borrowed.
#[derive(Debug)]
pub struct CompositeMethodNode {
    pub(crate) parameters: Vec<Template>,
    pub(crate) returns: Vec<Template>,
    pub(crate) graph: Arc<Graph>,
}

impl CompositeMethodNode {
    pub(crate) fn new(parameters: Vec<Template>, returns: Vec<Template>, graph: Graph) -> Self {
        Self {
            parameters,
            returns,
            graph: Arc::new(graph),
        }
    }

    /// Declared parameters.
    #[must_use]
    pub fn parameters(&self) -> &[Template] {
        &self.parameters
    }

    /// Declared returns.
    #[must_use]
    pub fn returns(&self) -> &[Template] {
        &self.returns
    }

    /// The control-flow graph.
    #[must_use]
    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }
}

/// Variant payload of a node.
#[derive(Debug)]
pub enum NodeKind {
    /// Folder of named children.
    Folder(Folder),
    /// Boolean variable.
    Bool(BoolVariable),
    /// String variable.
    Str(StringVariable),
    /// Numeric variable.
    Num(NumericVariable),
    /// Object variable composed of properties.
    Object(ObjectVariable),
    /// Sync or async method.
    Method(MethodNode),
    /// Composite method with a control-flow graph.
    Composite(CompositeMethodNode),
}

impl NodeKind {
    /// Node class name, for errors and logs.
    #[must_use]
    pub fn class(&self) -> &'static str {
        match self {
            Self::Folder(_) => "folder",
            Self::Bool(_) => "boolean variable",
            Self::Str(_) => "string variable",
            Self::Num(_) => "numeric variable",
            Self::Object(_) => "object variable",
            Self::Method(m) => match m.flavor {
                MethodFlavor::Sync => "method",
                MethodFlavor::Async => "async method",
            },
            Self::Composite(_) => "composite method",
        }
    }

    /// Returns `true` for any variable kind.
    #[must_use]
    pub fn is_variable(&self) -> bool {
        matches!(
            self,
            Self::Bool(_) | Self::Str(_) | Self::Num(_) | Self::Object(_)
        )
    }

    /// Declared value type of a variable kind.
    #[must_use]
    pub fn variable_type(&self) -> Option<DataType> {
        match self {
            Self::Bool(_) => Some(DataType::Bool),
            Self::Str(_) => Some(DataType::Str),
            Self::Num(_) => Some(DataType::Num),
            Self::Object(_) => Some(DataType::Object),
            _ => None,
        }
    }

    /// Shared variable state, for any variable kind.
    pub(crate) fn variable_common(&self) -> Option<&VariableCommon> {
        match self {
            Self::Bool(v) => Some(&v.common),
            Self::Str(v) => Some(&v.common),
            Self::Num(v) => Some(&v.common),
            Self::Object(v) => Some(&v.common),
            _ => None,
        }
    }

    pub(crate) fn variable_common_mut(&mut self) -> Option<&mut VariableCommon> {
        match self {
            Self::Bool(v) => Some(&mut v.common),
            Self::Str(v) => Some(&mut v.common),
            Self::Num(v) => Some(&mut v.common),
            Self::Object(v) => Some(&mut v.common),
            _ => None,
        }
    }

    /// Child map of a container kind (folder children or object
    /// properties).
    pub(crate) fn child_map(&self) -> Option<&BTreeMap<String, NodeId>> {
        match self {
            Self::Folder(f) => Some(&f.children),
            Self::Object(o) => Some(&o.properties),
            _ => None,
        }
    }

    pub(crate) fn child_map_mut(&mut self) -> Option<&mut BTreeMap<String, NodeId>> {
        match self {
            Self::Folder(f) => Some(&mut f.children),
            Self::Object(o) => Some(&mut o.properties),
            _ => None,
        }
    }
}

/// One node of the address space: common header plus variant payload.
#[derive(Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) kind: NodeKind,
}

impl Node {
    /// The node's tree-wide unique id.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node's name, unique among siblings.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Parent id; `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Variant payload.
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }
}
