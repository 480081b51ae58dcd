//! Protocol-layer errors.
//!
//! Model errors pass through with their own codes; the protocol adds the
//! envelope-level failures a gateway can cause — sending something that
//! is not a request, a body that does not match the operation, or an
//! operation the target namespace does not support.

use mast_model::ModelError;
use mast_types::ErrorCode;
use thiserror::Error;

use crate::message::{MessageKind, Namespace, OperationName};

/// Error produced while dispatching a protocol message.
///
/// | Variant | Code |
/// |---------|------|
/// | [`NotARequest`](Self::NotARequest) | `BAD_REQUEST` |
/// | [`BodyMismatch`](Self::BodyMismatch) | `BAD_REQUEST` |
/// | [`Unsupported`](Self::Unsupported) | `NOT_SUPPORTED` |
/// | [`Model`](Self::Model) | delegated to the model error |
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// Only `Request` messages are dispatched.
    #[error("expected a request, got a {0:?} message")]
    NotARequest(MessageKind),

    /// The body payload does not fit the operation named in the header.
    #[error("operation expects a {expected} body")]
    BodyMismatch {
        /// Body variant the operation needs.
        expected: &'static str,
    },

    /// The namespace/operation pair has no dispatch entry.
    #[error("{namespace:?}.{name:?} is not supported")]
    Unsupported {
        /// Request namespace.
        namespace: Namespace,
        /// Request operation.
        name: OperationName,
    },

    /// A model-layer failure, reported with its own code.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl ErrorCode for ProtocolError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotARequest(_) | Self::BodyMismatch { .. } => "BAD_REQUEST",
            Self::Unsupported { .. } => "NOT_SUPPORTED",
            Self::Model(err) => err.code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Model(err) => err.is_recoverable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mast_types::assert_error_codes;

    #[test]
    fn codes_are_well_formed() {
        assert_error_codes(&[
            ProtocolError::NotARequest(MessageKind::Event),
            ProtocolError::BodyMismatch { expected: "Write" },
            ProtocolError::Unsupported {
                namespace: Namespace::Method,
                name: OperationName::Subscribe,
            },
            ProtocolError::Model(ModelError::Vetoed),
        ]);
    }

    #[test]
    fn model_codes_pass_through() {
        let err = ProtocolError::Model(ModelError::NotFound("root/x".into()));
        assert_eq!(err.code(), "NOT_FOUND");
        let err = ProtocolError::Model(ModelError::Vetoed);
        assert!(err.is_recoverable());
    }
}
