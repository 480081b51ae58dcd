//! Model-layer errors.
//!
//! Every failed tree operation maps to one stable code; the protocol
//! manager copies that code into its Error replies. Validation and hook
//! errors abort the current operation only — they never poison the tree.

use mast_flow::FlowError;
use mast_types::{DataType, ErrorCode, NodeId};
use thiserror::Error;

/// Error raised by address-space operations.
///
/// | Variant | Code |
/// |---------|------|
/// | [`NotFound`](Self::NotFound) | `NOT_FOUND` |
/// | [`AddressMismatch`](Self::AddressMismatch) | `ADDRESS_MISMATCH` |
/// | [`TypeMismatch`](Self::TypeMismatch) | `TYPE_MISMATCH` |
/// | [`KindMismatch`](Self::KindMismatch) | `TYPE_MISMATCH` |
/// | [`OutOfRange`](Self::OutOfRange) | `OUT_OF_RANGE` |
/// | [`Vetoed`](Self::Vetoed) | `VETOED` |
/// | [`PostVetoed`](Self::PostVetoed) | `POST_VETOED` |
/// | [`HookFailed`](Self::HookFailed) | `HOOK_FAILED` |
/// | [`UnboundCallback`](Self::UnboundCallback) | `UNBOUND_CALLBACK` |
/// | [`MalformedModel`](Self::MalformedModel) | `MALFORMED_MODEL` |
/// | [`InvalidFilter`](Self::InvalidFilter) | `INVALID_FILTER` |
/// | [`Flow`](Self::Flow) | delegated to the flow error |
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// An address did not resolve to a node.
    #[error("no node at '{0}'")]
    NotFound(String),

    /// A reference carried both a path and an id and they name
    /// different nodes.
    #[error("path '{path}' and id {id} name different nodes")]
    AddressMismatch {
        /// The path side of the reference.
        path: String,
        /// The id side of the reference.
        id: NodeId,
    },

    /// A value's type is incompatible with the variable's declared type.
    #[error("expected a {expected} value, got {actual}")]
    TypeMismatch {
        /// Declared type of the target.
        expected: DataType,
        /// Type of the offered value.
        actual: DataType,
    },

    /// The operation targets the wrong class of node.
    #[error("expected a {expected} node, got a {actual} node")]
    KindMismatch {
        /// Node class the operation needs.
        expected: &'static str,
        /// Node class found at the address.
        actual: &'static str,
    },

    /// A call supplied more positional arguments than the method declares,
    /// or omitted one without a template default.
    #[error("method takes {expected} argument(s), {given} usable given")]
    ArityMismatch {
        /// Declared parameter count.
        expected: usize,
        /// Arguments the caller supplied.
        given: usize,
    },

    /// A numeric write fell outside the variable's inclusive bounds.
    #[error("value {value} outside bounds [{low:?}, {high:?}]")]
    OutOfRange {
        /// The rejected value.
        value: f64,
        /// Inclusive lower bound, if declared.
        low: Option<f64>,
        /// Inclusive upper bound, if declared.
        high: Option<f64>,
    },

    /// The pre-update hook rejected the proposed value.
    #[error("write vetoed by pre-update hook")]
    Vetoed,

    /// The post-update hook rejected the applied value; the previous
    /// value was restored.
    #[error("write vetoed by post-update hook, previous value restored")]
    PostVetoed,

    /// A user hook raised internally; the operation was rolled back.
    #[error("hook failed: {0}")]
    HookFailed(String),

    /// The method has no bound implementation.
    #[error("method '{0}' has no bound callback")]
    UnboundCallback(String),

    /// A tree-construction invariant was violated.
    #[error("malformed model: {0}")]
    MalformedModel(String),

    /// Subscription filter parameters are ill-formed.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A flow-layer error surfaced through the composite engine.
    #[error(transparent)]
    Flow(#[from] FlowError),
}

impl ErrorCode for ModelError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::AddressMismatch { .. } => "ADDRESS_MISMATCH",
            Self::TypeMismatch { .. } | Self::KindMismatch { .. } | Self::ArityMismatch { .. } => {
                "TYPE_MISMATCH"
            }
            Self::OutOfRange { .. } => "OUT_OF_RANGE",
            Self::Vetoed => "VETOED",
            Self::PostVetoed => "POST_VETOED",
            Self::HookFailed(_) => "HOOK_FAILED",
            Self::UnboundCallback(_) => "UNBOUND_CALLBACK",
            Self::MalformedModel(_) => "MALFORMED_MODEL",
            Self::InvalidFilter(_) => "INVALID_FILTER",
            Self::Flow(err) => err.code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        // Hooks observe machine state, so a vetoed write may pass later.
        matches!(self, Self::Vetoed | Self::PostVetoed)
    }
}
