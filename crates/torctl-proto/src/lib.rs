//! Typed parsers that turn assembled [`torctl_wire::ReplyMessage`]s into
//! Tor control-protocol domain objects: command replies, asynchronous
//! events, and the value objects (exit policies, router-status entries)
//! those carry.

pub mod descriptor;
pub mod error;
pub mod event;
pub mod exit_policy;
pub mod response;

pub use error::{InvalidRequest, OperationFailed, ProtoError, ProtoResult, UnsatisfiableRequest};
pub use event::{Event, base::EventBase};
