//! Value expressions resolved against a scope frame.

use crate::{FlowError, Frame};
use mast_types::Value;
use serde::{Deserialize, Serialize};

/// The value operand of a step: a constant or a frame reference.
///
/// Frame references name a parameter or a `store_as` binding of the
/// executing scope. Loaders commonly write them with a `$` prefix; see
/// [`ValueExpr::parse`].
///
/// # Example
///
/// ```
/// use mast_flow::{Frame, ValueExpr};
/// use mast_types::Value;
///
/// let mut frame = Frame::new();
/// frame.bind("target", Value::from(42.0));
///
/// let expr = ValueExpr::parse("$target");
/// assert_eq!(expr.resolve(&frame).expect("bound"), Value::from(42.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueExpr {
    /// A literal value.
    Const(Value),
    /// A reference to a frame binding by name.
    Var(String),
}

impl ValueExpr {
    /// Parses the loader shorthand: `$name` becomes a frame reference,
    /// anything else a string constant.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix('$') {
            Some(name) => Self::Var(name.to_string()),
            None => Self::Const(Value::from(s)),
        }
    }

    /// Resolves the expression against a frame.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnboundName`] when a `Var` names a binding
    /// the frame does not hold.
    pub fn resolve(&self, frame: &Frame) -> Result<Value, FlowError> {
        match self {
            Self::Const(v) => Ok(v.clone()),
            Self::Var(name) => frame
                .get(name)
                .cloned()
                .ok_or_else(|| FlowError::UnboundName(name.clone())),
        }
    }
}

impl From<Value> for ValueExpr {
    fn from(v: Value) -> Self {
        Self::Const(v)
    }
}
