//! Typed parsers for synchronous command replies (spec.md §4.4). Unlike
//! events, a reply's shape is determined by which command produced it, not
//! by sniffing its content, so each parser here is invoked directly by the
//! caller that knows which command it sent.

pub mod authchallenge;
pub mod getconf;
pub mod getinfo;
pub mod mapaddress;
pub mod protocolinfo;
pub mod singleline;
