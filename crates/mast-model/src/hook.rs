//! User-supplied callback hooks.
//!
//! Variables expose four interception points around read and write;
//! methods expose a pre/post pair around invocation. Hooks run
//! synchronously on the dispatching thread. A hook that fails is isolated:
//! the operation aborts with `HOOK_FAILED` and any assignment already made
//! is rolled back, so a faulty hook cannot corrupt the tree.

use mast_types::Value;
use std::collections::BTreeMap;

/// Error returned from inside a user hook or method callback.
///
/// Converted to `ModelError::HookFailed` by the operation that fired the
/// hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookError(pub String);

impl HookError {
    /// Creates a hook error from a message.
    #[must_use]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl std::fmt::Display for HookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A hook's decision about the operation it observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookVerdict {
    /// Let the operation proceed (or stand).
    Accept,
    /// Reject the operation: a pre-update veto blocks the assignment, a
    /// post-update veto restores the previous value.
    Reject,
}

/// Fires before a read samples the value.
pub type PreReadHook = Box<dyn Fn() -> Result<(), HookError> + Send>;

/// Fires after a read; may transform the sampled value. The transformed
/// value is what the caller observes.
pub type PostReadHook = Box<dyn Fn(Value) -> Result<Value, HookError> + Send>;

/// Fires before an update with the proposed value; may veto.
pub type PreUpdateHook = Box<dyn Fn(&Value) -> Result<HookVerdict, HookError> + Send>;

/// Fires after an update with `(previous, new)`; may veto, in which case
/// the previous value is restored.
pub type PostUpdateHook = Box<dyn Fn(&Value, &Value) -> Result<HookVerdict, HookError> + Send>;

/// Named argument/return maps passed to method hooks and callbacks.
pub type ArgMap = BTreeMap<String, Value>;

/// The bound implementation of a method node.
pub type MethodCallback = Box<dyn FnMut(&ArgMap) -> Result<Vec<Value>, HookError> + Send>;

/// Fires before a method callback with the resolved arguments.
pub type PreInvokeHook = Box<dyn Fn(&ArgMap) -> Result<(), HookError> + Send>;

/// Fires after a method callback with the assembled return map.
pub type PostInvokeHook = Box<dyn Fn(&ArgMap) -> Result<(), HookError> + Send>;

/// One variable hook, tagged by the phase it binds to.
///
/// # Example
///
/// ```
/// use mast_model::{HookVerdict, VariableHook};
/// use mast_types::Value;
///
/// // refuse every write below zero
/// let hook = VariableHook::PreUpdate(Box::new(|proposed: &Value| {
///     Ok(match proposed.as_num() {
///         Some(n) if n < 0.0 => HookVerdict::Reject,
///         _ => HookVerdict::Accept,
///     })
/// }));
/// assert_eq!(hook.phase(), "pre_update");
/// ```
pub enum VariableHook {
    /// Binds the pre-read phase.
    PreRead(PreReadHook),
    /// Binds the post-read phase.
    PostRead(PostReadHook),
    /// Binds the pre-update phase.
    PreUpdate(PreUpdateHook),
    /// Binds the post-update phase.
    PostUpdate(PostUpdateHook),
}

impl VariableHook {
    /// Returns the phase name, for logs.
    #[must_use]
    pub fn phase(&self) -> &'static str {
        match self {
            Self::PreRead(_) => "pre_read",
            Self::PostRead(_) => "post_read",
            Self::PreUpdate(_) => "pre_update",
            Self::PostUpdate(_) => "post_update",
        }
    }
}

/// The hook slots of one variable. All slots start empty.
#[derive(Default)]
pub struct VariableHooks {
    pub(crate) pre_read: Option<PreReadHook>,
    pub(crate) post_read: Option<PostReadHook>,
    pub(crate) pre_update: Option<PreUpdateHook>,
    pub(crate) post_update: Option<PostUpdateHook>,
}

impl VariableHooks {
    /// Installs `hook` into its phase slot, replacing any previous hook.
    pub fn bind(&mut self, hook: VariableHook) {
        match hook {
            VariableHook::PreRead(f) => self.pre_read = Some(f),
            VariableHook::PostRead(f) => self.post_read = Some(f),
            VariableHook::PreUpdate(f) => self.pre_update = Some(f),
            VariableHook::PostUpdate(f) => self.post_update = Some(f),
        }
    }

    pub(crate) fn fire_pre_read(&self) -> Result<(), HookError> {
        match &self.pre_read {
            Some(f) => f(),
            None => Ok(()),
        }
    }

    pub(crate) fn fire_post_read(&self, value: Value) -> Result<Value, HookError> {
        match &self.post_read {
            Some(f) => f(value),
            None => Ok(value),
        }
    }

    pub(crate) fn fire_pre_update(&self, proposed: &Value) -> Result<HookVerdict, HookError> {
        match &self.pre_update {
            Some(f) => f(proposed),
            None => Ok(HookVerdict::Accept),
        }
    }

    pub(crate) fn fire_post_update(
        &self,
        previous: &Value,
        new: &Value,
    ) -> Result<HookVerdict, HookError> {
        match &self.post_update {
            Some(f) => f(previous, new),
            None => Ok(HookVerdict::Accept),
        }
    }
}

impl std::fmt::Debug for VariableHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableHooks")
            .field("pre_read", &self.pre_read.is_some())
            .field("post_read", &self.post_read.is_some())
            .field("pre_update", &self.pre_update.is_some())
            .field("post_update", &self.post_update.is_some())
            .finish()
    }
}
