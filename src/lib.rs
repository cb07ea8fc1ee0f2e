//! `torctl`: a client library for the Tor control protocol. Wraps
//! `torctl-wire`'s codec and `torctl-proto`'s typed parsers with a socket
//! manager, message pump, authentication, and the [`Controller`] façade.

pub mod auth;
pub mod controller;
pub mod error;
pub mod listener;
pub mod pump;
pub mod socket;

pub use controller::{Controller, MapAddressOutcome};
pub use error::{AuthenticationFailure, ControllerError, SocketError};
pub use listener::{ListenerId, ListenerRegistry};

pub use torctl_proto as proto;
pub use torctl_wire as wire;
