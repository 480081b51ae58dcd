//! The address space: an arena-owned node tree.
//!
//! The tree owns every node in a flat id→node map, which doubles as the
//! O(1) id index. Folders and object variables reference their children
//! by id; parent links are ids too, so there is no circular ownership
//! anywhere. One `AddressSpace` is exclusively owned by one protocol
//! manager; there is no interior locking.

use crate::hook::{
    ArgMap, HookVerdict, MethodCallback, PostInvokeHook, PreInvokeHook, VariableHook,
};
use crate::node::{
    BoolVariable, CompositeMethodNode, Folder, MethodFlavor, MethodNode, Node, NodeKind,
    NumericVariable, ObjectVariable, StringVariable, Template, VariableCommon,
};
use crate::subscription::{Notification, Subscription, SubscriptionFilter, WriteOutcome};
use crate::ModelError;
use mast_types::{NodeId, NodeRef, SubscriptionId, Unit, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace, warn};

/// Result of a field-wise merge write against an object variable.
///
/// There is no cross-property transaction: properties written before a
/// failure stay written, and each property reports its own result.
#[derive(Debug)]
pub struct MergeOutcome {
    /// Per-property result, keyed by property name.
    pub per_property: BTreeMap<String, Result<(), ModelError>>,
    /// Write outcomes of the successful property writes, in merge order.
    pub outcomes: Vec<WriteOutcome>,
}

impl MergeOutcome {
    /// Returns `true` when every property write succeeded.
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.per_property.values().all(Result::is_ok)
    }

    /// Returns the first failure, if any.
    #[must_use]
    pub fn first_error(&self) -> Option<&ModelError> {
        self.per_property.values().find_map(|r| r.as_ref().err())
    }
}

/// The node tree of one machine.
///
/// # Example
///
/// ```
/// use mast_model::AddressSpace;
/// use mast_types::{NodeRef, Value};
///
/// let mut space = AddressSpace::new("press-7");
/// let root = space.root();
/// let speed = space.add_numeric(root, "speed", 0.0).expect("fresh name");
///
/// space.write(speed, Value::from(120.0)).expect("in type");
/// assert_eq!(space.read(speed).expect("readable"), Value::from(120.0));
/// assert_eq!(space.resolve(&NodeRef::path("root/speed")).expect("path"), speed);
/// ```
#[derive(Debug)]
pub struct AddressSpace {
    name: String,
    description: String,
    root: NodeId,
    nodes: HashMap<NodeId, Node>,
    write_seq: u64,
}

impl AddressSpace {
    /// Creates an address space with an empty root folder named `root`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let root_id = NodeId::new();
        let mut nodes = HashMap::new();
        nodes.insert(
            root_id,
            Node {
                id: root_id,
                name: "root".to_string(),
                description: String::new(),
                parent: None,
                kind: NodeKind::Folder(Folder::default()),
            },
        );
        Self {
            name: name.into(),
            description: String::new(),
            root: root_id,
            nodes,
            write_seq: 0,
        }
    }

    /// The machine/model name this space describes.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description of the space.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Sets the space description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// The root folder's id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Returns `true` when the id is registered.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of nodes in the tree, root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The sequence number of the most recent accepted write.
    #[must_use]
    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// Looks up a direct child by name under a folder or object variable.
    #[must_use]
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes
            .get(&parent)
            .and_then(|n| n.kind.child_map())
            .and_then(|m| m.get(name))
            .copied()
    }

    /// Reconstructs the slash-separated path of a node.
    #[must_use]
    pub fn path_of(&self, id: NodeId) -> Option<String> {
        let mut segments = Vec::new();
        let mut cursor = Some(id);
        while let Some(cur) = cursor {
            let node = self.nodes.get(&cur)?;
            segments.push(node.name.clone());
            cursor = node.parent;
        }
        segments.reverse();
        Some(segments.join("/"))
    }

    // ── Addressing ───────────────────────────────────────────────

    /// Resolves a node reference by path, by id, or both.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` when the address does not resolve; `ADDRESS_MISMATCH`
    /// when path and id name different nodes.
    pub fn resolve(&self, node_ref: &NodeRef) -> Result<NodeId, ModelError> {
        match (node_ref.path_str(), node_ref.node_id()) {
            (None, None) => Err(ModelError::NotFound("<empty ref>".into())),
            (Some(path), None) => self.resolve_path(path),
            (None, Some(id)) => {
                if self.nodes.contains_key(&id) {
                    Ok(id)
                } else {
                    Err(ModelError::NotFound(id.to_string()))
                }
            }
            (Some(path), Some(id)) => {
                let by_path = self.resolve_path(path)?;
                if by_path != id {
                    return Err(ModelError::AddressMismatch {
                        path: path.to_string(),
                        id,
                    });
                }
                Ok(id)
            }
        }
    }

    /// Resolves a slash-separated path by name descent from the root.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` at the first missing segment.
    pub fn resolve_path(&self, path: &str) -> Result<NodeId, ModelError> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let Some(first) = segments.next() else {
            return Err(ModelError::NotFound(path.to_string()));
        };
        let root = self.node_or_corrupt(self.root);
        if first != root.name {
            return Err(ModelError::NotFound(path.to_string()));
        }
        let mut cursor = self.root;
        for segment in segments {
            let node = self.node_or_corrupt(cursor);
            cursor = node
                .kind
                .child_map()
                .and_then(|m| m.get(segment))
                .copied()
                .ok_or_else(|| ModelError::NotFound(path.to_string()))?;
        }
        Ok(cursor)
    }

    // ── Construction ─────────────────────────────────────────────

    /// Inserts a node under `parent`, maintaining the id index and
    /// sibling-name uniqueness.
    ///
    /// Folders accept any child; object variables accept variables only.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` for a missing parent, `MALFORMED_MODEL` for duplicate
    /// or empty names, bad numeric bounds, invalid composite graphs, or
    /// a non-variable offered as an object property.
    pub fn insert(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        description: impl Into<String>,
        kind: NodeKind,
    ) -> Result<NodeId, ModelError> {
        let name = name.into();
        if name.is_empty() || name.contains('/') {
            return Err(ModelError::MalformedModel(format!(
                "node name '{name}' must be non-empty and slash-free"
            )));
        }
        if let NodeKind::Num(num) = &kind {
            if let (Some(lo), Some(hi)) = (num.low, num.high) {
                if lo > hi {
                    return Err(ModelError::MalformedModel(format!(
                        "numeric bounds inverted: {lo} > {hi}"
                    )));
                }
            }
        }
        if let NodeKind::Composite(c) = &kind {
            c.graph().validate()?;
        }

        let parent_node = self
            .nodes
            .get(&parent)
            .ok_or_else(|| ModelError::NotFound(parent.to_string()))?;
        match &parent_node.kind {
            NodeKind::Folder(_) => {}
            NodeKind::Object(_) => {
                if !kind.is_variable() {
                    return Err(ModelError::MalformedModel(format!(
                        "object properties must be variables, got a {}",
                        kind.class()
                    )));
                }
            }
            other => {
                return Err(ModelError::KindMismatch {
                    expected: "folder or object variable",
                    actual: other.class(),
                })
            }
        }
        if parent_node
            .kind
            .child_map()
            .is_some_and(|m| m.contains_key(&name))
        {
            return Err(ModelError::MalformedModel(format!(
                "duplicate sibling name '{name}'"
            )));
        }

        let id = NodeId::new();
        self.nodes.insert(
            id,
            Node {
                id,
                name: name.clone(),
                description: description.into(),
                parent: Some(parent),
                kind,
            },
        );
        let parent_map = self
            .nodes
            .get_mut(&parent)
            .and_then(|n| n.kind.child_map_mut())
            .expect("parent vanished during insert - tree corrupted");
        parent_map.insert(name, id);
        Ok(id)
    }

    /// Adds an empty folder under `parent`.
    pub fn add_folder(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
    ) -> Result<NodeId, ModelError> {
        self.insert(parent, name, "", NodeKind::Folder(Folder::default()))
    }

    /// Adds a boolean variable under `parent`.
    pub fn add_boolean(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        initial: bool,
    ) -> Result<NodeId, ModelError> {
        self.insert(
            parent,
            name,
            "",
            NodeKind::Bool(BoolVariable {
                value: initial,
                common: VariableCommon::default(),
            }),
        )
    }

    /// Adds a string variable under `parent`.
    pub fn add_string(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        initial: impl Into<String>,
    ) -> Result<NodeId, ModelError> {
        self.insert(
            parent,
            name,
            "",
            NodeKind::Str(StringVariable {
                value: initial.into(),
                common: VariableCommon::default(),
            }),
        )
    }

    /// Adds an unbounded, unitless numeric variable under `parent`.
    pub fn add_numeric(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        initial: f64,
    ) -> Result<NodeId, ModelError> {
        self.add_numeric_full(parent, name, initial, None, None, None)
    }

    /// Adds a numeric variable with optional unit and inclusive bounds.
    pub fn add_numeric_full(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        initial: f64,
        unit: Option<Unit>,
        low: Option<f64>,
        high: Option<f64>,
    ) -> Result<NodeId, ModelError> {
        self.insert(
            parent,
            name,
            "",
            NodeKind::Num(NumericVariable {
                value: initial,
                unit,
                low,
                high,
                common: VariableCommon::default(),
            }),
        )
    }

    /// Adds an object variable (initially without properties).
    pub fn add_object(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
    ) -> Result<NodeId, ModelError> {
        self.insert(parent, name, "", NodeKind::Object(ObjectVariable::default()))
    }

    /// Adds a sync or async method with its templates.
    pub fn add_method(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        flavor: MethodFlavor,
        parameters: Vec<Template>,
        returns: Vec<Template>,
    ) -> Result<NodeId, ModelError> {
        self.insert(
            parent,
            name,
            "",
            NodeKind::Method(MethodNode::new(flavor, parameters, returns)),
        )
    }

    /// Adds a composite method with its control-flow graph.
    pub fn add_composite(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        parameters: Vec<Template>,
        returns: Vec<Template>,
        graph: mast_flow::Graph,
    ) -> Result<NodeId, ModelError> {
        self.insert(
            parent,
            name,
            "",
            NodeKind::Composite(CompositeMethodNode::new(parameters, returns, graph)),
        )
    }

    /// Sets a node's description.
    pub fn describe(&mut self, id: NodeId, description: impl Into<String>) -> Result<(), ModelError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| ModelError::NotFound(id.to_string()))?;
        node.description = description.into();
        Ok(())
    }

    /// Removes a node and its whole subtree.
    ///
    /// Every removed node is deregistered from the id index and its
    /// subscriptions dropped. The removed ids are returned so the caller
    /// can cancel composite scopes that depended on them.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` for an unknown id, `MALFORMED_MODEL` for the root.
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<NodeId>, ModelError> {
        if id == self.root {
            return Err(ModelError::MalformedModel(
                "the root folder cannot be removed".into(),
            ));
        }
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| ModelError::NotFound(id.to_string()))?;
        let parent = node.parent;
        let name = node.name.clone();

        // preorder walk of the subtree
        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let node = self.node_or_corrupt(cur);
            if let Some(children) = node.kind.child_map() {
                stack.extend(children.values().copied());
            }
            removed.push(cur);
        }
        for gone in &removed {
            self.nodes.remove(gone);
        }
        if let Some(pid) = parent {
            if let Some(map) = self.nodes.get_mut(&pid).and_then(|n| n.kind.child_map_mut()) {
                map.remove(&name);
            }
        }
        debug!(node = %id, count = removed.len(), "removed subtree");
        Ok(removed)
    }

    // ── Variable operations ──────────────────────────────────────

    /// Reads a variable through its hook pipeline.
    ///
    /// Object variables read as a recursive name→value map, each property
    /// through its own hooks.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND`, `TYPE_MISMATCH` for non-variables, `HOOK_FAILED` when
    /// a hook raises.
    pub fn read(&self, id: NodeId) -> Result<Value, ModelError> {
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| ModelError::NotFound(id.to_string()))?;
        let common = node.kind.variable_common().ok_or(ModelError::KindMismatch {
            expected: "variable",
            actual: node.kind.class(),
        })?;

        common
            .hooks
            .fire_pre_read()
            .map_err(|e| ModelError::HookFailed(e.to_string()))?;

        let sampled = match &node.kind {
            NodeKind::Bool(v) => Value::Bool(v.value),
            NodeKind::Str(v) => Value::Str(v.value.clone()),
            NodeKind::Num(v) => Value::Num(v.value),
            NodeKind::Object(o) => {
                let mut map = BTreeMap::new();
                for (name, prop) in &o.properties {
                    map.insert(name.clone(), self.read(*prop)?);
                }
                Value::Object(map)
            }
            _ => unreachable!("variable_common() gated the kind"),
        };

        common
            .hooks
            .fire_post_read(sampled)
            .map_err(|e| ModelError::HookFailed(e.to_string()))
    }

    /// Samples a variable's stored value without firing any hooks.
    ///
    /// Used internally for filter seeding and hierarchical notification;
    /// also handy for tests.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` or `TYPE_MISMATCH` for non-variables.
    pub fn raw_value(&self, id: NodeId) -> Result<Value, ModelError> {
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| ModelError::NotFound(id.to_string()))?;
        match &node.kind {
            NodeKind::Bool(v) => Ok(Value::Bool(v.value)),
            NodeKind::Str(v) => Ok(Value::Str(v.value.clone())),
            NodeKind::Num(v) => Ok(Value::Num(v.value)),
            NodeKind::Object(o) => {
                let mut map = BTreeMap::new();
                for (name, prop) in &o.properties {
                    map.insert(name.clone(), self.raw_value(*prop)?);
                }
                Ok(Value::Object(map))
            }
            other => Err(ModelError::KindMismatch {
                expected: "variable",
                actual: other.class(),
            }),
        }
    }

    /// Writes a scalar variable: type check, range check, hook pipeline,
    /// assignment, then filter evaluation.
    ///
    /// The returned [`WriteOutcome`] carries the write's sequence number
    /// and the matched notifications — the variable's own subscribers in
    /// subscription order, then ancestor object variables bottom-up with
    /// their composite values. Delivery is the caller's job.
    ///
    /// Object variables reject this entry point; use
    /// [`write_merge`](Self::write_merge).
    ///
    /// # Errors
    ///
    /// `TYPE_MISMATCH`, `OUT_OF_RANGE`, `VETOED`, `POST_VETOED`,
    /// `HOOK_FAILED` (with rollback), `NOT_FOUND`.
    pub fn write(&mut self, id: NodeId, value: Value) -> Result<WriteOutcome, ModelError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| ModelError::NotFound(id.to_string()))?;

        let declared = node.kind.variable_type().ok_or(ModelError::KindMismatch {
            expected: "variable",
            actual: node.kind.class(),
        })?;
        if declared == mast_types::DataType::Object {
            return Err(ModelError::KindMismatch {
                expected: "scalar variable",
                actual: "object variable",
            });
        }
        if !value.matches(declared) {
            return Err(ModelError::TypeMismatch {
                expected: declared,
                actual: value.data_type(),
            });
        }
        if let NodeKind::Num(num) = &node.kind {
            num.check_bounds(value.expect_num().expect("type-checked above"))?;
        }

        let common = node
            .kind
            .variable_common()
            .expect("scalar kinds carry variable state");
        match common.hooks.fire_pre_update(&value) {
            Ok(HookVerdict::Accept) => {}
            Ok(HookVerdict::Reject) => {
                warn!(node = %id, "write vetoed by pre-update hook");
                return Err(ModelError::Vetoed);
            }
            Err(e) => return Err(ModelError::HookFailed(e.to_string())),
        }

        let previous = Self::assign_scalar(node, &value);

        let common = node
            .kind
            .variable_common()
            .expect("scalar kinds carry variable state");
        match common.hooks.fire_post_update(&previous, &value) {
            Ok(HookVerdict::Accept) => {}
            Ok(HookVerdict::Reject) => {
                Self::assign_scalar(node, &previous);
                warn!(node = %id, "write vetoed by post-update hook, rolled back");
                return Err(ModelError::PostVetoed);
            }
            Err(e) => {
                Self::assign_scalar(node, &previous);
                return Err(ModelError::HookFailed(e.to_string()));
            }
        }

        self.write_seq += 1;
        let tick = self.write_seq;
        debug!(node = %id, tick, "write accepted");

        let notifications = self.collect_notifications(id, &value);
        Ok(WriteOutcome {
            node: id,
            tick,
            notifications,
        })
    }

    /// Field-wise merge write against an object variable.
    ///
    /// Each entry is written into the matching property individually, with
    /// the full scalar-write pipeline. An unknown property name reports
    /// per-property `NOT_FOUND`; other entries proceed regardless.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` / `TYPE_MISMATCH` when the target is not an object
    /// variable. Per-property failures land in the outcome, not here.
    pub fn write_merge(
        &mut self,
        id: NodeId,
        entries: BTreeMap<String, Value>,
    ) -> Result<MergeOutcome, ModelError> {
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| ModelError::NotFound(id.to_string()))?;
        let NodeKind::Object(object) = &node.kind else {
            return Err(ModelError::KindMismatch {
                expected: "object variable",
                actual: node.kind.class(),
            });
        };
        let object_path = self.path_of(id).unwrap_or_else(|| id.to_string());
        let properties: Vec<(String, Option<NodeId>)> = entries
            .keys()
            .map(|k| (k.clone(), object.properties.get(k).copied()))
            .collect();

        let mut merge = MergeOutcome {
            per_property: BTreeMap::new(),
            outcomes: Vec::new(),
        };
        let mut values = entries;
        for (name, prop) in properties {
            let value = values.remove(&name).expect("keys came from this map");
            match prop {
                None => {
                    merge.per_property.insert(
                        name.clone(),
                        Err(ModelError::NotFound(format!("{object_path}/{name}"))),
                    );
                }
                Some(prop_id) => match self.write(prop_id, value) {
                    Ok(outcome) => {
                        merge.outcomes.push(outcome);
                        merge.per_property.insert(name, Ok(()));
                    }
                    Err(err) => {
                        merge.per_property.insert(name, Err(err));
                    }
                },
            }
        }
        Ok(merge)
    }

    fn assign_scalar(node: &mut Node, value: &Value) -> Value {
        match (&mut node.kind, value) {
            (NodeKind::Bool(v), Value::Bool(b)) => {
                let prev = Value::Bool(v.value);
                v.value = *b;
                prev
            }
            (NodeKind::Str(v), Value::Str(s)) => {
                let prev = Value::Str(std::mem::take(&mut v.value));
                v.value = s.clone();
                prev
            }
            (NodeKind::Num(v), Value::Num(n)) => {
                let prev = Value::Num(v.value);
                v.value = *n;
                prev
            }
            _ => unreachable!("assignment is type-checked before it runs"),
        }
    }

    /// Evaluates subscriptions for an accepted write: the variable's own
    /// list first, then each ancestor object variable with its composite
    /// value, bottom-up. Folders stop the climb.
    fn collect_notifications(&mut self, id: NodeId, written: &Value) -> Vec<Notification> {
        let mut out = Vec::new();
        let path = self.path_of(id).unwrap_or_else(|| id.to_string());
        self.match_subscriptions(id, &path, written, &mut out);

        let mut cursor = self.nodes.get(&id).and_then(|n| n.parent);
        while let Some(pid) = cursor {
            let is_object = self
                .nodes
                .get(&pid)
                .is_some_and(|n| matches!(n.kind, NodeKind::Object(_)));
            if !is_object {
                break;
            }
            let composite = self
                .raw_value(pid)
                .expect("object ancestor must compose - tree corrupted");
            let parent_path = self.path_of(pid).unwrap_or_else(|| pid.to_string());
            self.match_subscriptions(pid, &parent_path, &composite, &mut out);
            cursor = self.nodes.get(&pid).and_then(|n| n.parent);
        }
        out
    }

    fn match_subscriptions(
        &mut self,
        id: NodeId,
        path: &str,
        value: &Value,
        out: &mut Vec<Notification>,
    ) {
        let Some(common) = self
            .nodes
            .get_mut(&id)
            .and_then(|n| n.kind.variable_common_mut())
        else {
            return;
        };
        for sub in &mut common.subscriptions {
            if sub.should_notify(value) {
                trace!(node = %id, subscriber = sub.subscriber(), "notification matched");
                out.push(Notification {
                    subscription: sub.id(),
                    subscriber: sub.subscriber().to_string(),
                    node: id,
                    path: path.to_string(),
                    value: value.clone(),
                });
            }
        }
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// Attaches a filtered subscription to a variable.
    ///
    /// One record per subscriber identity: subscribing again returns the
    /// existing handle.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND`, `TYPE_MISMATCH` for non-variables, `INVALID_FILTER`
    /// for ill-formed filter parameters.
    pub fn subscribe(
        &mut self,
        id: NodeId,
        subscriber: impl Into<String>,
        filter: SubscriptionFilter,
    ) -> Result<SubscriptionId, ModelError> {
        let subscriber = subscriber.into();
        let current = self.raw_value(id)?;
        let common = self
            .nodes
            .get_mut(&id)
            .and_then(|n| n.kind.variable_common_mut())
            .expect("raw_value gated the kind");
        if let Some(existing) = common
            .subscriptions
            .iter()
            .find(|s| s.subscriber() == subscriber)
        {
            return Ok(existing.id());
        }
        let sub = Subscription::new(subscriber, filter, &current)?;
        let sub_id = sub.id();
        common.subscriptions.push(sub);
        Ok(sub_id)
    }

    /// Removes a subscription by handle. Absent handles are a no-op.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` when the variable itself is gone.
    pub fn unsubscribe(&mut self, id: NodeId, sub: SubscriptionId) -> Result<bool, ModelError> {
        let common = self.variable_common_mut(id)?;
        let before = common.subscriptions.len();
        common.subscriptions.retain(|s| s.id() != sub);
        Ok(common.subscriptions.len() < before)
    }

    /// Removes every subscription held by `subscriber` on the variable.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` when the variable itself is gone.
    pub fn unsubscribe_subscriber(
        &mut self,
        id: NodeId,
        subscriber: &str,
    ) -> Result<usize, ModelError> {
        let common = self.variable_common_mut(id)?;
        let before = common.subscriptions.len();
        common.subscriptions.retain(|s| s.subscriber() != subscriber);
        Ok(before - common.subscriptions.len())
    }

    /// Returns `true` while the subscription is still attached.
    ///
    /// Delivery re-checks this so a subscription removed mid-pass is not
    /// invoked for the remainder of the pass.
    #[must_use]
    pub fn has_subscription(&self, id: NodeId, sub: SubscriptionId) -> bool {
        self.nodes
            .get(&id)
            .and_then(|n| n.kind.variable_common())
            .is_some_and(|c| c.subscriptions.iter().any(|s| s.id() == sub))
    }

    fn variable_common_mut(&mut self, id: NodeId) -> Result<&mut VariableCommon, ModelError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| ModelError::NotFound(id.to_string()))?;
        let class = node.kind.class();
        node.kind
            .variable_common_mut()
            .ok_or(ModelError::KindMismatch {
                expected: "variable",
                actual: class,
            })
    }

    // ── Hooks and methods ────────────────────────────────────────

    /// Installs a variable hook, replacing any previous hook in the same
    /// phase.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` or `TYPE_MISMATCH` for non-variables.
    pub fn bind_variable_hook(&mut self, id: NodeId, hook: VariableHook) -> Result<(), ModelError> {
        let phase = hook.phase();
        let common = self.variable_common_mut(id)?;
        common.hooks.bind(hook);
        debug!(node = %id, phase, "variable hook bound");
        Ok(())
    }

    /// Binds the implementation of a sync or async method.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` or `TYPE_MISMATCH` when the node is not a plain
    /// method (composite methods carry graphs, not callbacks).
    pub fn bind_method_callback(
        &mut self,
        id: NodeId,
        callback: MethodCallback,
    ) -> Result<(), ModelError> {
        self.method_mut(id)?.callback = Some(callback);
        Ok(())
    }

    /// Installs the pre-invoke hook of a method.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` or `TYPE_MISMATCH` when the node is not a method.
    pub fn bind_pre_invoke(&mut self, id: NodeId, hook: PreInvokeHook) -> Result<(), ModelError> {
        self.method_mut(id)?.pre_invoke = Some(hook);
        Ok(())
    }

    /// Installs the post-invoke hook of a method.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` or `TYPE_MISMATCH` when the node is not a method.
    pub fn bind_post_invoke(&mut self, id: NodeId, hook: PostInvokeHook) -> Result<(), ModelError> {
        self.method_mut(id)?.post_invoke = Some(hook);
        Ok(())
    }

    fn method_mut(&mut self, id: NodeId) -> Result<&mut MethodNode, ModelError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| ModelError::NotFound(id.to_string()))?;
        let class = node.kind.class();
        match &mut node.kind {
            NodeKind::Method(m) => Ok(m),
            _ => Err(ModelError::KindMismatch {
                expected: "method",
                actual: class,
            }),
        }
    }

    /// Invokes a sync or async method with positional arguments.
    ///
    /// Arguments are matched left-to-right against the parameter
    /// templates; missing trailing arguments fall back to template
    /// defaults. The return map is keyed by the return templates.
    ///
    /// # Errors
    ///
    /// `UNBOUND_CALLBACK` without an implementation, `TYPE_MISMATCH` for
    /// argument shape or type problems, `HOOK_FAILED` when a hook or the
    /// callback raises.
    pub fn invoke_method(&mut self, id: NodeId, args: Vec<Value>) -> Result<ArgMap, ModelError> {
        let path = self.path_of(id).unwrap_or_else(|| id.to_string());
        let method = self.method_mut(id)?;
        if method.callback.is_none() {
            return Err(ModelError::UnboundCallback(path));
        }
        let arg_map = resolve_arguments(&method.parameters, args)?;

        if let Some(pre) = &method.pre_invoke {
            pre(&arg_map).map_err(|e| ModelError::HookFailed(e.to_string()))?;
        }
        let callback = method
            .callback
            .as_mut()
            .expect("checked for a bound callback above");
        let values = callback(&arg_map).map_err(|e| ModelError::HookFailed(e.to_string()))?;

        if values.len() != method.returns.len() {
            return Err(ModelError::HookFailed(format!(
                "callback returned {} value(s), method declares {}",
                values.len(),
                method.returns.len()
            )));
        }
        let mut returns = ArgMap::new();
        for (template, value) in method.returns.iter().zip(values) {
            if !value.matches(template.data_type) {
                return Err(ModelError::TypeMismatch {
                    expected: template.data_type,
                    actual: value.data_type(),
                });
            }
            returns.insert(template.name.clone(), value);
        }
        if let Some(post) = &method.post_invoke {
            post(&returns).map_err(|e| ModelError::HookFailed(e.to_string()))?;
        }
        Ok(returns)
    }

    /// Returns the flavor of a method node, if it is one.
    #[must_use]
    pub fn method_flavor(&self, id: NodeId) -> Option<MethodFlavor> {
        match self.nodes.get(&id).map(|n| &n.kind) {
            Some(NodeKind::Method(m)) => Some(m.flavor()),
            _ => None,
        }
    }

    fn node_or_corrupt(&self, id: NodeId) -> &Node {
        self.nodes
            .get(&id)
            .expect("dangling id in the index - tree corrupted")
    }
}

/// Matches positional arguments against parameter templates, producing
/// the named argument map the callback / scope frame receives.
pub(crate) fn resolve_arguments(
    params: &[Template],
    args: Vec<Value>,
) -> Result<ArgMap, ModelError> {
    if args.len() > params.len() {
        return Err(ModelError::ArityMismatch {
            expected: params.len(),
            given: args.len(),
        });
    }
    let given = args.len();
    let mut map = ArgMap::new();
    let mut values = args.into_iter();
    for template in params {
        let value = match values.next() {
            Some(v) => v,
            None => match &template.default {
                Some(d) => d.clone(),
                None => {
                    return Err(ModelError::ArityMismatch {
                        expected: params.len(),
                        given,
                    })
                }
            },
        };
        if !value.matches(template.data_type) {
            return Err(ModelError::TypeMismatch {
                expected: template.data_type,
                actual: value.data_type(),
            });
        }
        map.insert(template.name.clone(), value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mast_types::DataType;

    fn space() -> AddressSpace {
        AddressSpace::new("test-rig")
    }

    #[test]
    fn root_is_a_folder_named_root() {
        let s = space();
        let root = s.node(s.root()).expect("root exists");
        assert_eq!(root.name(), "root");
        assert!(matches!(root.kind(), NodeKind::Folder(_)));
        assert_eq!(s.node_count(), 1);
    }

    #[test]
    fn path_and_id_lookup_agree() {
        let mut s = space();
        let cell = s.add_folder(s.root(), "cell").expect("folder");
        let temp = s.add_numeric(cell, "temp", 20.0).expect("numeric");

        assert_eq!(s.resolve_path("root/cell/temp").expect("path"), temp);
        assert_eq!(s.resolve(&NodeRef::id(temp)).expect("id"), temp);
        assert_eq!(
            s.resolve(&NodeRef::full("root/cell/temp", temp)).expect("both"),
            temp
        );
        assert_eq!(s.path_of(temp).expect("path"), "root/cell/temp");
    }

    #[test]
    fn mismatched_path_and_id() {
        let mut s = space();
        let a = s.add_boolean(s.root(), "a", false).expect("a");
        let _b = s.add_boolean(s.root(), "b", false).expect("b");
        let err = s
            .resolve(&NodeRef::full("root/b", a))
            .expect_err("path names b, id names a");
        assert!(matches!(err, ModelError::AddressMismatch { .. }));
    }

    #[test]
    fn first_missing_segment_fails() {
        let mut s = space();
        s.add_folder(s.root(), "cell").expect("folder");
        let err = s.resolve_path("root/hall/temp").expect_err("no hall");
        assert_eq!(err, ModelError::NotFound("root/hall/temp".into()));
    }

    #[test]
    fn duplicate_sibling_rejected() {
        let mut s = space();
        s.add_boolean(s.root(), "flag", false).expect("first");
        let err = s.add_boolean(s.root(), "flag", true).expect_err("dup");
        assert!(matches!(err, ModelError::MalformedModel(_)));
    }

    #[test]
    fn inverted_bounds_rejected() {
        let mut s = space();
        let err = s
            .add_numeric_full(s.root(), "n", 0.0, None, Some(10.0), Some(1.0))
            .expect_err("lo > hi");
        assert!(matches!(err, ModelError::MalformedModel(_)));
    }

    #[test]
    fn write_then_read() {
        let mut s = space();
        let b = s.add_boolean(s.root(), "b", false).expect("b");
        s.write(b, Value::from(true)).expect("bool accepted");
        assert_eq!(s.read(b).expect("read"), Value::from(true));
    }

    #[test]
    fn type_mismatch_rejected() {
        let mut s = space();
        let b = s.add_boolean(s.root(), "b", false).expect("b");
        let err = s.write(b, Value::from(1.0)).expect_err("num into bool");
        assert_eq!(
            err,
            ModelError::TypeMismatch {
                expected: DataType::Bool,
                actual: DataType::Num
            }
        );
    }

    #[test]
    fn out_of_range_leaves_value_unchanged() {
        let mut s = space();
        let n = s
            .add_numeric_full(s.root(), "n", 5.0, None, Some(0.0), Some(10.0))
            .expect("n");
        let err = s.write(n, Value::from(11.0)).expect_err("out of range");
        assert!(matches!(err, ModelError::OutOfRange { .. }));
        assert_eq!(s.read(n).expect("unchanged"), Value::from(5.0));
    }

    #[test]
    fn object_reads_compose() {
        let mut s = space();
        let obj = s.add_object(s.root(), "obj").expect("obj");
        s.add_string(obj, "state", "idle").expect("prop");
        s.add_numeric(obj, "speed", 0.0).expect("prop");

        let v = s.read(obj).expect("composite");
        let map = v.as_object().expect("object value");
        assert_eq!(map.get("state"), Some(&Value::from("idle")));
        assert_eq!(map.get("speed"), Some(&Value::from(0.0)));
    }

    #[test]
    fn object_direct_scalar_write_rejected() {
        let mut s = space();
        let obj = s.add_object(s.root(), "obj").expect("obj");
        let err = s.write(obj, Value::from(1.0)).expect_err("merge only");
        assert!(matches!(err, ModelError::KindMismatch { .. }));
    }

    #[test]
    fn merge_write_is_per_property() {
        let mut s = space();
        let obj = s.add_object(s.root(), "obj").expect("obj");
        s.add_numeric_full(obj, "speed", 0.0, None, Some(0.0), Some(10.0))
            .expect("speed");
        s.add_string(obj, "state", "idle").expect("state");

        let mut entries = BTreeMap::new();
        entries.insert("speed".to_string(), Value::from(99.0)); // out of range
        entries.insert("state".to_string(), Value::from("run"));
        entries.insert("ghost".to_string(), Value::from(1.0)); // unknown

        let merge = s.write_merge(obj, entries).expect("object target");
        assert!(!merge.all_ok());
        assert!(matches!(
            merge.per_property.get("speed"),
            Some(Err(ModelError::OutOfRange { .. }))
        ));
        assert!(matches!(
            merge.per_property.get("ghost"),
            Some(Err(ModelError::NotFound(_)))
        ));
        assert_eq!(merge.per_property.get("state"), Some(&Ok(())));
        // the successful sibling stayed written
        let state = s.resolve_path("root/obj/state").expect("state");
        assert_eq!(s.read(state).expect("state"), Value::from("run"));
    }

    #[test]
    fn cascade_removal_clears_index() {
        let mut s = space();
        let cell = s.add_folder(s.root(), "cell").expect("cell");
        let temp = s.add_numeric(cell, "temp", 0.0).expect("temp");
        let removed = s.remove(cell).expect("removable");
        assert!(removed.contains(&cell));
        assert!(removed.contains(&temp));
        assert!(!s.contains(cell));
        assert!(!s.contains(temp));
        assert!(matches!(
            s.resolve_path("root/cell/temp"),
            Err(ModelError::NotFound(_))
        ));
    }

    #[test]
    fn root_cannot_be_removed() {
        let mut s = space();
        assert!(matches!(
            s.remove(s.root()),
            Err(ModelError::MalformedModel(_))
        ));
    }

    #[test]
    fn subscribe_is_idempotent_per_subscriber() {
        let mut s = space();
        let n = s.add_numeric(s.root(), "n", 0.0).expect("n");
        let first = s
            .subscribe(n, "gw-1", SubscriptionFilter::All)
            .expect("subscribe");
        let second = s
            .subscribe(n, "gw-1", SubscriptionFilter::deadband(5.0))
            .expect("idempotent");
        assert_eq!(first, second);
    }

    #[test]
    fn unsubscribe_unknown_handle_is_noop() {
        let mut s = space();
        let n = s.add_numeric(s.root(), "n", 0.0).expect("n");
        assert!(!s.unsubscribe(n, SubscriptionId::new()).expect("noop"));
    }

    #[test]
    fn resolve_arguments_defaults_and_types() {
        let params = vec![
            Template::new("a", DataType::Num),
            Template::new("b", DataType::Str).with_default(Value::from("x")),
        ];
        let map = resolve_arguments(&params, vec![Value::from(1.0)]).expect("default fills b");
        assert_eq!(map.get("a"), Some(&Value::from(1.0)));
        assert_eq!(map.get("b"), Some(&Value::from("x")));

        let err = resolve_arguments(&params, vec![Value::from("oops")]).expect_err("wrong type");
        assert!(matches!(err, ModelError::TypeMismatch { .. }));

        let err = resolve_arguments(&params, vec![]).expect_err("a has no default");
        assert!(matches!(err, ModelError::ArityMismatch { .. }));

        let err = resolve_arguments(
            &params,
            vec![Value::from(1.0), Value::from("x"), Value::from(2.0)],
        )
        .expect_err("surplus");
        assert!(matches!(err, ModelError::ArityMismatch { .. }));
    }
}
