//! Protocol layer for MAST.
//!
//! Translates envelope-carried requests — variable reads and writes,
//! subscriptions, method calls — into operations against an
//! [`mast_model::AddressSpace`], producing terminal replies, `Accepted`
//! acknowledgements for suspended composite calls, and asynchronous
//! `Event` / deferred-completion traffic for the embedder to ship over
//! its transport.
//!
//! # Crate architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  mast-types     : ids, Value, Unit, NodeRef           │
//! │  mast-flow      : steps, expressions, scopes          │
//! │  mast-model     : tree, subscriptions, engine         │
//! │  mast-protocol  : messages, manager          ◄── HERE │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Reply discipline
//!
//! Every request yields exactly one terminal reply (`Success` or
//! `Error`) echoing the request id — except a `Method.Call` against a
//! composite method that suspends, which yields `Accepted { scope }`
//! immediately and its single terminal reply later, still under the
//! original call's id.
//!
//! # Example
//!
//! ```
//! use mast_model::{AddressSpaceBuilder, SubscriptionFilter};
//! use mast_protocol::{Body, Message, MessageKind, ProtocolManager};
//! use mast_types::{NodeRef, Value};
//!
//! let space = AddressSpaceBuilder::new("press-7")
//!     .numeric("root", "temp", 20.0)
//!     .expect("fresh")
//!     .build();
//! let mut mng = ProtocolManager::new(space);
//!
//! // subscribe, then write: the event lands in the outbound queue
//! let sub = Message::subscribe_request(
//!     "gw",
//!     "press-7",
//!     NodeRef::path("root/temp"),
//!     SubscriptionFilter::All,
//! );
//! assert_eq!(mng.handle(sub).kind, MessageKind::Success);
//!
//! let write = Message::write_request("gw", "press-7", NodeRef::path("root/temp"), Value::from(21.0));
//! assert_eq!(mng.handle(write).kind, MessageKind::Success);
//!
//! let events: Vec<Message> = mng.outbound().collect();
//! assert_eq!(events.len(), 1);
//! assert!(matches!(events[0].body, Body::Event { .. }));
//! ```

mod error;
mod manager;
mod message;

pub use error::ProtocolError;
pub use manager::ProtocolManager;
pub use message::{Body, Message, MessageKind, Namespace, OperationName};
