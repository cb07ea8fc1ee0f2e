/// Errors produced by the wire codec, reply assembler, and line cursor.
///
/// This crate never touches a socket, so it has no notion of a closed
/// connection — that distinction belongs to the transport layer above it.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("line is missing the 3-digit status code and divider: {0:?}")]
    MalformedHeader(String),

    #[error("status code {found} on continuation line does not match {expected} from the start of the reply")]
    StatusCodeMismatch { expected: u16, found: u16 },

    #[error("connection closed while a data payload (+) was still open")]
    UnterminatedDataPayload,

    #[error("connection closed in the middle of a reply")]
    UnterminatedReply,

    #[error("expected a quoted token, found: {0:?}")]
    ExpectedQuotedToken(String),

    #[error("popped past the end of the line")]
    OutOfRange,

    #[error("malformed key=value mapping: {0:?}")]
    MalformedMapping(String),
}

pub type WireResult<T> = Result<T, WireError>;
