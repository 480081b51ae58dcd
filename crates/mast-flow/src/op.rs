//! Comparison operators for wait and branch predicates.

use crate::FlowError;
use mast_types::Value;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A comparison operator applied between a variable and a resolved value.
///
/// Ordered comparisons (`<`, `<=`, `>`, `>=`) are defined on numeric
/// values only; equality is defined on any pair of the same type.
///
/// # Example
///
/// ```
/// use mast_flow::CompareOp;
/// use mast_types::Value;
///
/// let op: CompareOp = ">=".parse().expect("known operator");
/// let hit = op.evaluate(&Value::from(17.0), &Value::from(17.0)).expect("nums");
/// assert!(hit);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// Returns the operator's textual form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    /// Evaluates `lhs <op> rhs`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Comparison`] when the operand types are
    /// incompatible: different types for equality, non-numeric operands
    /// for ordered comparison.
    pub fn evaluate(&self, lhs: &Value, rhs: &Value) -> Result<bool, FlowError> {
        match self {
            Self::Eq | Self::Ne => {
                if lhs.data_type() != rhs.data_type() {
                    return Err(self.mismatch(lhs, rhs));
                }
                let equal = lhs == rhs;
                Ok(if *self == Self::Eq { equal } else { !equal })
            }
            Self::Lt | Self::Le | Self::Gt | Self::Ge => {
                let (Some(l), Some(r)) = (lhs.as_num(), rhs.as_num()) else {
                    return Err(self.mismatch(lhs, rhs));
                };
                Ok(match self {
                    Self::Lt => l < r,
                    Self::Le => l <= r,
                    Self::Gt => l > r,
                    Self::Ge => l >= r,
                    Self::Eq | Self::Ne => unreachable!(),
                })
            }
        }
    }

    fn mismatch(&self, lhs: &Value, rhs: &Value) -> FlowError {
        FlowError::Comparison {
            lhs: lhs.data_type(),
            rhs: rhs.data_type(),
            op: self.as_str(),
        }
    }
}

impl FromStr for CompareOp {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            _ => Err(FlowError::UnknownOperator(s.to_string())),
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[CompareOp] = &[
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Lt,
        CompareOp::Le,
        CompareOp::Gt,
        CompareOp::Ge,
    ];

    #[test]
    fn text_roundtrip() {
        for &op in ALL {
            let parsed: CompareOp = op.as_str().parse().expect("roundtrip");
            assert_eq!(parsed, op);
        }
    }

    #[test]
    fn unknown_operator() {
        assert!("<>".parse::<CompareOp>().is_err());
    }

    #[test]
    fn numeric_ordering() {
        let a = Value::from(1.0);
        let b = Value::from(2.0);
        assert!(CompareOp::Lt.evaluate(&a, &b).expect("nums"));
        assert!(!CompareOp::Gt.evaluate(&a, &b).expect("nums"));
        assert!(CompareOp::Le.evaluate(&a, &a).expect("nums"));
        assert!(CompareOp::Ge.evaluate(&b, &b).expect("nums"));
    }

    #[test]
    fn equality_on_strings_and_bools() {
        assert!(CompareOp::Eq
            .evaluate(&Value::from("run"), &Value::from("run"))
            .expect("strs"));
        assert!(CompareOp::Ne
            .evaluate(&Value::from(true), &Value::from(false))
            .expect("bools"));
    }

    #[test]
    fn ordered_comparison_rejects_strings() {
        let err = CompareOp::Lt
            .evaluate(&Value::from("a"), &Value::from("b"))
            .expect_err("strings are unordered here");
        assert!(matches!(err, FlowError::Comparison { .. }));
    }

    #[test]
    fn equality_rejects_cross_type() {
        let err = CompareOp::Eq
            .evaluate(&Value::from(1.0), &Value::from("1"))
            .expect_err("cross-type equality is a model bug");
        assert!(matches!(err, FlowError::Comparison { .. }));
    }
}
