//! Tor control-port wire framing.
//!
//! This crate is the low-level half of the Controller Protocol Engine: a
//! pure byte/string transform with no networking of its own. It turns raw
//! CRLF-stripped lines into [`assembler::ReplyMessage`]s, and exposes
//! [`cursor::ParsedLine`] for tokenizing a single reply line's content.

pub mod assembler;
pub mod cursor;
pub mod error;
pub mod line;

pub use assembler::{AssembledLine, Assembler, ReplyMessage};
pub use cursor::ParsedLine;
pub use error::{WireError, WireResult};
pub use line::{encode_command, Divider, ReplyLine};
