//! The composite-method engine.
//!
//! Steps composite invocations against the address space. Each
//! invocation is a [`Scope`]: stepping runs synchronously until the graph
//! ends, a wait condition suspends it, or an error tears it down.
//! Suspended scopes live in the engine's registry, keyed by scope id and
//! recording the variable and predicate they wait on.
//!
//! Resumption is tick-based. The address space stamps every accepted
//! write with a monotonically increasing sequence number; a wait records
//! the tick at which it was armed and only writes with a strictly later
//! tick can wake it. A scope that writes a variable and then waits on it
//! therefore cannot be woken by its own write — the wakeup belongs to the
//! next write touching that variable.

use crate::hook::ArgMap;
use crate::node::{MethodFlavor, NodeKind, Template};
use crate::space::{resolve_arguments, AddressSpace};
use crate::subscription::WriteOutcome;
use crate::ModelError;
use chrono::{DateTime, Utc};
use mast_flow::{FlowError, Frame, Graph, Scope, Step};
use mast_types::{NodeId, ScopeId, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Immediate result of a composite invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeResult {
    /// The graph ran to the end in one go; the return tuple is final.
    Completed(ArgMap),
    /// A wait condition suspended the invocation; the scope id keys the
    /// deferred completion.
    Pending(ScopeId),
}

/// A deferred scope event produced while resuming waiters.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeEvent {
    /// The scope ran to the end of its graph.
    Completed {
        /// The finished scope.
        scope: ScopeId,
        /// Its assembled return map.
        returns: ArgMap,
    },
    /// The scope failed and was torn down.
    Failed {
        /// The failed scope.
        scope: ScopeId,
        /// Why it failed.
        error: ModelError,
    },
}

enum StepRun {
    Completed(ArgMap),
    Suspended,
}

/// Registry and interpreter for composite-method scopes.
#[derive(Default)]
pub struct FlowEngine {
    scopes: HashMap<ScopeId, Scope>,
    /// Scope ids in creation order, so multi-scope wakeups are
    /// deterministic.
    order: Vec<ScopeId>,
}

impl FlowEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (suspended) scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Returns `true` when no scope is suspended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Returns `true` while the scope is registered.
    #[must_use]
    pub fn contains(&self, scope: ScopeId) -> bool {
        self.scopes.contains_key(&scope)
    }

    /// Scope ids belonging to one composite method, in creation order.
    #[must_use]
    pub fn scopes_of(&self, method: NodeId) -> Vec<ScopeId> {
        self.order
            .iter()
            .copied()
            .filter(|sid| self.scopes.get(sid).is_some_and(|s| s.method == method))
            .collect()
    }

    /// Invokes a composite method.
    ///
    /// Arguments are validated against the parameter templates, a fresh
    /// scope is allocated, and stepping runs until the graph ends,
    /// suspends, or fails. Writes performed by steps are appended to
    /// `writes` in program order for the caller to deliver.
    ///
    /// # Errors
    ///
    /// Argument validation and step errors; the scope is freed on error.
    pub fn invoke(
        &mut self,
        space: &mut AddressSpace,
        method: NodeId,
        args: Vec<Value>,
        deadline: Option<DateTime<Utc>>,
        writes: &mut Vec<WriteOutcome>,
    ) -> Result<InvokeResult, ModelError> {
        let (parameters, returns, graph) = composite_parts(space, method)?;
        let bindings = resolve_arguments(&parameters, args)?;
        let mut scope = Scope::new(method, Frame::with_bindings(bindings), deadline);
        debug!(scope = %scope.id, method = %method, "composite invocation started");

        match run(space, &mut scope, &graph, &returns, writes)? {
            StepRun::Completed(ret) => {
                debug!(scope = %scope.id, "composite completed synchronously");
                Ok(InvokeResult::Completed(ret))
            }
            StepRun::Suspended => {
                let id = scope.id;
                self.scopes.insert(id, scope);
                self.order.push(id);
                Ok(InvokeResult::Pending(id))
            }
        }
    }

    /// Re-evaluates every scope waiting on `written` after a write with
    /// sequence number `tick`.
    ///
    /// Only waits armed at a strictly earlier tick are eligible, which
    /// bounds every scope to at most one advance per originating write.
    /// Scopes whose predicate now holds resume stepping; completions and
    /// failures are reported for deferred replies, re-suspensions are
    /// silent.
    pub fn resume_for_write(
        &mut self,
        space: &mut AddressSpace,
        written: NodeId,
        tick: u64,
        writes: &mut Vec<WriteOutcome>,
    ) -> Vec<ScopeEvent> {
        let eligible: Vec<ScopeId> = self
            .order
            .iter()
            .copied()
            .filter(|sid| {
                self.scopes.get(sid).is_some_and(|s| {
                    s.wait
                        .as_ref()
                        .is_some_and(|w| w.node == written && w.armed_at < tick)
                })
            })
            .collect();

        let mut events = Vec::new();
        for sid in eligible {
            let Some(mut scope) = self.scopes.remove(&sid) else {
                continue;
            };
            let wait = scope.wait.clone().expect("eligibility checked the wait");

            let current = match space.read(written) {
                Ok(v) => v,
                Err(error) => {
                    self.forget(sid);
                    events.push(ScopeEvent::Failed { scope: sid, error });
                    continue;
                }
            };
            match wait.holds(&current) {
                Ok(false) => {
                    // predicate still unmet, keep waiting with the
                    // original arming tick
                    self.scopes.insert(sid, scope);
                    continue;
                }
                Err(flow_err) => {
                    self.forget(sid);
                    events.push(ScopeEvent::Failed {
                        scope: sid,
                        error: flow_err.into(),
                    });
                    continue;
                }
                Ok(true) => {}
            }

            scope.clear_wait();
            scope.pc += 1;
            debug!(scope = %sid, node = %written, "scope resumed");

            let (_, returns, graph) = match composite_parts(space, scope.method) {
                Ok(parts) => parts,
                Err(_) => {
                    self.forget(sid);
                    events.push(ScopeEvent::Failed {
                        scope: sid,
                        error: FlowError::DependencyLost.into(),
                    });
                    continue;
                }
            };
            match run(space, &mut scope, &graph, &returns, writes) {
                Ok(StepRun::Completed(ret)) => {
                    self.forget(sid);
                    events.push(ScopeEvent::Completed {
                        scope: sid,
                        returns: ret,
                    });
                }
                Ok(StepRun::Suspended) => {
                    self.scopes.insert(sid, scope);
                }
                Err(error) => {
                    self.forget(sid);
                    events.push(ScopeEvent::Failed { scope: sid, error });
                }
            }
        }
        events
    }

    /// Cancels a scope by id, dropping its wait and freeing it.
    ///
    /// Returns `false` when the scope is unknown (a no-op).
    pub fn cancel(&mut self, scope: ScopeId) -> bool {
        let existed = self.scopes.remove(&scope).is_some();
        if existed {
            self.forget(scope);
            debug!(scope = %scope, "scope cancelled");
        }
        existed
    }

    /// Tears down every scope that depended on a removed node — either
    /// waiting on it or belonging to a removed composite method.
    ///
    /// Returns the affected scope ids so the caller can emit
    /// `DEPENDENCY_LOST` completions.
    pub fn fail_dependents(&mut self, removed: &[NodeId]) -> Vec<ScopeId> {
        let victims: Vec<ScopeId> = self
            .order
            .iter()
            .copied()
            .filter(|sid| {
                self.scopes.get(sid).is_some_and(|s| {
                    removed.contains(&s.method)
                        || s.wait.as_ref().is_some_and(|w| removed.contains(&w.node))
                })
            })
            .collect();
        for sid in &victims {
            self.scopes.remove(sid);
            self.forget(*sid);
            debug!(scope = %sid, "scope lost a dependency");
        }
        victims
    }

    /// Tears down every scope whose invocation deadline has passed.
    ///
    /// Returns the expired scope ids so the caller can emit `CANCELLED`
    /// completions.
    pub fn expire_deadlines(&mut self, now: DateTime<Utc>) -> Vec<ScopeId> {
        let expired: Vec<ScopeId> = self
            .order
            .iter()
            .copied()
            .filter(|sid| {
                self.scopes
                    .get(sid)
                    .is_some_and(|s| s.deadline_exceeded(now))
            })
            .collect();
        for sid in &expired {
            self.scopes.remove(sid);
            self.forget(*sid);
            debug!(scope = %sid, "scope deadline expired");
        }
        expired
    }

    fn forget(&mut self, scope: ScopeId) {
        self.order.retain(|s| *s != scope);
    }
}

/// Clones out the composite method's templates and shared graph.
fn composite_parts(
    space: &AddressSpace,
    method: NodeId,
) -> Result<(Vec<Template>, Vec<Template>, Arc<Graph>), ModelError> {
    let node = space
        .node(method)
        .ok_or_else(|| ModelError::NotFound(method.to_string()))?;
    match node.kind() {
        NodeKind::Composite(c) => Ok((
            c.parameters().to_vec(),
            c.returns().to_vec(),
            Arc::clone(c.graph()),
        )),
        other => Err(ModelError::KindMismatch {
            expected: "composite method",
            actual: other.class(),
        }),
    }
}

/// Steps a scope until the graph ends, a wait suspends it, or a step
/// fails. The deadline is checked at every step boundary.
fn run(
    space: &mut AddressSpace,
    scope: &mut Scope,
    graph: &Graph,
    returns: &[Template],
    writes: &mut Vec<WriteOutcome>,
) -> Result<StepRun, ModelError> {
    loop {
        if scope.deadline_exceeded(Utc::now()) {
            return Err(FlowError::DeadlineExceeded.into());
        }
        let Some(step) = graph.step(scope.pc) else {
            let mut ret = ArgMap::new();
            for template in returns {
                let value = scope
                    .frame
                    .get(&template.name)
                    .cloned()
                    .ok_or_else(|| FlowError::UnboundName(template.name.clone()))?;
                ret.insert(template.name.clone(), value);
            }
            return Ok(StepRun::Completed(ret));
        };

        match step {
            Step::Write { target, value } => {
                let value = value.resolve(&scope.frame)?;
                let id = space.resolve(target)?;
                let is_object = space
                    .node(id)
                    .is_some_and(|n| matches!(n.kind(), NodeKind::Object(_)));
                if is_object {
                    let Value::Object(entries) = value else {
                        return Err(ModelError::TypeMismatch {
                            expected: mast_types::DataType::Object,
                            actual: value.data_type(),
                        });
                    };
                    let merge = space.write_merge(id, entries)?;
                    let failed = merge.first_error().cloned();
                    writes.extend(merge.outcomes);
                    if let Some(error) = failed {
                        return Err(error);
                    }
                } else {
                    writes.push(space.write(id, value)?);
                }
                scope.pc += 1;
            }
            Step::Read { source, store_as } => {
                let id = space.resolve(source)?;
                let value = space.read(id)?;
                scope.frame.bind(store_as.clone(), value);
                scope.pc += 1;
            }
            Step::Wait { source, op, rhs } => {
                let id = space.resolve(source)?;
                let rhs = rhs.resolve(&scope.frame)?;
                let current = space.read(id)?;
                if op.evaluate(&current, &rhs)? {
                    scope.pc += 1;
                } else {
                    scope.arm_wait(id, *op, rhs, space.write_seq());
                    debug!(scope = %scope.id, node = %id, "scope suspended on wait");
                    return Ok(StepRun::Suspended);
                }
            }
            Step::CallAsync {
                method,
                args,
                store_returns_as,
            } => {
                let id = space.resolve(method)?;
                match space.method_flavor(id) {
                    Some(MethodFlavor::Async) => {}
                    _ => {
                        let actual = space
                            .node(id)
                            .map_or("missing node", |n| n.kind().class());
                        return Err(ModelError::KindMismatch {
                            expected: "async method",
                            actual,
                        });
                    }
                }
                let argv = args
                    .iter()
                    .map(|a| a.resolve(&scope.frame))
                    .collect::<Result<Vec<_>, _>>()?;
                let ack = space.invoke_method(id, argv)?;
                if let Some(name) = store_returns_as {
                    scope.frame.bind(name.clone(), Value::Object(ack));
                }
                scope.pc += 1;
            }
            Step::Branch {
                source,
                op,
                rhs,
                if_true,
                if_false,
            } => {
                let id = space.resolve(source)?;
                let rhs = rhs.resolve(&scope.frame)?;
                let current = space.read(id)?;
                scope.pc = if op.evaluate(&current, &rhs)? {
                    *if_true
                } else {
                    *if_false
                };
            }
        }
    }
}
