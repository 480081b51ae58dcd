//! Flow-layer errors.

use mast_types::{DataType, ErrorCode};
use thiserror::Error;

/// Error raised while validating or executing a control-flow graph.
///
/// | Variant | Code | Recoverable |
/// |---------|------|-------------|
/// | [`UnboundName`](Self::UnboundName) | `NOT_FOUND` | No |
/// | [`Comparison`](Self::Comparison) | `TYPE_MISMATCH` | No |
/// | [`UnknownOperator`](Self::UnknownOperator) | `MALFORMED_MODEL` | No |
/// | [`BranchOutOfRange`](Self::BranchOutOfRange) | `MALFORMED_MODEL` | No |
/// | [`Cancelled`](Self::Cancelled) | `CANCELLED` | No |
/// | [`DeadlineExceeded`](Self::DeadlineExceeded) | `CANCELLED` | No |
/// | [`DependencyLost`](Self::DependencyLost) | `DEPENDENCY_LOST` | No |
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    /// A value expression referenced a frame binding that does not exist.
    #[error("name '{0}' is not bound in the scope frame")]
    UnboundName(String),

    /// A predicate compared incompatible value types.
    #[error("cannot compare {lhs} with {rhs} using '{op}'")]
    Comparison {
        /// Left-hand side type.
        lhs: DataType,
        /// Right-hand side type.
        rhs: DataType,
        /// Operator text.
        op: &'static str,
    },

    /// An operator string does not name a comparison operator.
    #[error("unknown comparison operator '{0}'")]
    UnknownOperator(String),

    /// A branch step targets a step index outside the graph.
    #[error("branch target {target} out of range (graph has {len} steps)")]
    BranchOutOfRange {
        /// Offending target index.
        target: usize,
        /// Number of steps in the graph.
        len: usize,
    },

    /// The scope was cancelled explicitly.
    #[error("scope was cancelled")]
    Cancelled,

    /// The scope outlived its invocation deadline.
    #[error("scope deadline exceeded")]
    DeadlineExceeded,

    /// A node the scope was waiting on was removed from the tree.
    #[error("a watched node was removed while the scope was suspended")]
    DependencyLost,
}

impl ErrorCode for FlowError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnboundName(_) => "NOT_FOUND",
            Self::Comparison { .. } => "TYPE_MISMATCH",
            Self::UnknownOperator(_) | Self::BranchOutOfRange { .. } => "MALFORMED_MODEL",
            Self::Cancelled | Self::DeadlineExceeded => "CANCELLED",
            Self::DependencyLost => "DEPENDENCY_LOST",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mast_types::assert_error_codes;

    fn all_variants() -> Vec<FlowError> {
        vec![
            FlowError::UnboundName("x".into()),
            FlowError::Comparison {
                lhs: DataType::Num,
                rhs: DataType::Str,
                op: "<",
            },
            FlowError::UnknownOperator("<>".into()),
            FlowError::BranchOutOfRange { target: 9, len: 3 },
            FlowError::Cancelled,
            FlowError::DeadlineExceeded,
            FlowError::DependencyLost,
        ]
    }

    #[test]
    fn all_codes_valid() {
        assert_error_codes(&all_variants());
    }

    #[test]
    fn deadline_reports_cancelled() {
        assert_eq!(FlowError::DeadlineExceeded.code(), "CANCELLED");
        assert_eq!(FlowError::Cancelled.code(), "CANCELLED");
    }

    #[test]
    fn display_mentions_name() {
        let err = FlowError::UnboundName("out".into());
        assert!(err.to_string().contains("'out'"));
    }
}
