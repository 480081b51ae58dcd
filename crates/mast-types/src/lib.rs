//! Core types for MAST (Machine Address Space Tree).
//!
//! This crate is the leaf of the workspace: identifier newtypes, the typed
//! [`Value`] carried by variables and messages, measurement [`Unit`] tags,
//! dual path/id [`NodeRef`] addressing, and the [`ErrorCode`] contract
//! every workspace error implements.
//!
//! # Crate architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  mast-types     : ids, Value, Unit, NodeRef  ◄── HERE │
//! │  mast-flow      : steps, expressions, scopes          │
//! │  mast-model     : node tree, subscriptions, engine    │
//! │  mast-protocol  : messages, protocol manager          │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Identifier design
//!
//! All identifiers are UUID newtypes: globally unique without
//! coordination, serde-first, and printed with a per-kind prefix so a
//! scope id can never be mistaken for a node id in a log line.
//!
//! # Example
//!
//! ```
//! use mast_types::{DataType, NodeRef, Value};
//!
//! let speed = Value::from(1450.0);
//! assert_eq!(speed.data_type(), DataType::Num);
//!
//! let target = NodeRef::path("root/spindle/speed");
//! assert_eq!(target.to_string(), "root/spindle/speed");
//! ```

mod address;
mod error;
mod id;
mod unit;
mod value;

pub use address::NodeRef;
pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{MessageId, NodeId, ScopeId, SubscriptionId};
pub use unit::Unit;
pub use value::{DataType, Value, ValueTypeError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ref_from_id_and_path() {
        let id = NodeId::new();
        let r: NodeRef = id.into();
        assert_eq!(r.node_id(), Some(id));

        let r: NodeRef = "root/cell/temp".into();
        assert_eq!(r.path_str(), Some("root/cell/temp"));
    }

    #[test]
    fn value_matches_declared_type() {
        assert!(Value::from(true).matches(DataType::Bool));
        assert!(!Value::from("x").matches(DataType::Num));
    }

    #[test]
    fn unit_is_plain_label() {
        let u = Unit::new("celsius");
        assert_eq!(u.as_str(), "celsius");
    }
}
