use crate::event::circuit::CircuitEvent;

/// Tor rejected a request outright: an `InvalidArguments` per §4.4's GETINFO/
/// GETCONF 552 handling, or a generic malformed-request rejection.
#[derive(Debug, thiserror::Error)]
pub enum InvalidRequest {
    #[error("Tor rejected arguments: {0:?}")]
    InvalidArguments(Vec<String>),
}

/// A request that was well-formed but that Tor could not satisfy.
#[derive(Debug, thiserror::Error)]
pub enum UnsatisfiableRequest {
    #[error(transparent)]
    Invalid(#[from] InvalidRequest),
    #[error("circuit extension failed: {message}")]
    CircuitExtensionFailed {
        message: String,
        event: Box<Option<CircuitEvent>>,
    },
}

/// Tor returned a non-`250` status for a command.
#[derive(Debug, thiserror::Error)]
pub enum OperationFailed {
    #[error("Tor returned {code} {message:?}")]
    Failed { code: u16, message: String },
    #[error(transparent)]
    Unsatisfiable(#[from] UnsatisfiableRequest),
}

/// Errors raised while turning an assembled [`torctl_wire::ReplyMessage`]
/// into a typed response or event.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error(transparent)]
    Wire(#[from] torctl_wire::WireError),
    #[error(transparent)]
    Operation(#[from] OperationFailed),
    #[error("malformed {kind} reply: {detail}")]
    MalformedReply { kind: String, detail: String },
    #[error("reply returned unrequested key {0:?}")]
    UnrequestedKey(String),
}

pub type ProtoResult<T> = Result<T, ProtoError>;

impl ProtoError {
    pub fn malformed(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        ProtoError::MalformedReply {
            kind: kind.into(),
            detail: detail.into(),
        }
    }
}
