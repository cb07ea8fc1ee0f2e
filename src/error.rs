//! Error taxonomy for the controller façade (spec.md §7).
//!
//! `torctl_proto::ProtoError` already covers parser-level failures
//! (`ProtocolError`/`OperationFailed` and their children); this module adds
//! the transport layer (`SocketError`) and the authentication hierarchy on
//! top of it, folded into one [`ControllerError`] root.

use std::io;

pub use torctl_proto::{InvalidRequest, OperationFailed, UnsatisfiableRequest};

/// Transport-layer failure: the socket itself, not the protocol carried on it.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("socket closed")]
    SocketClosed,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Root error type returned by every [`crate::Controller`] operation.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Protocol(#[from] torctl_proto::ProtoError),
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("request timed out")]
    Timeout,
    #[error("controller is not connected")]
    NotConnected,
    #[error(transparent)]
    Auth(#[from] AuthenticationFailure),
}

impl From<OperationFailed> for ControllerError {
    fn from(err: OperationFailed) -> Self {
        ControllerError::Protocol(err.into())
    }
}

impl From<io::Error> for ControllerError {
    fn from(err: io::Error) -> Self {
        ControllerError::Socket(SocketError::Io(err))
    }
}

/// Why `authenticate` failed (spec.md §4.9) once every applicable method has
/// been tried and none of them hit a socket-level failure — a dead socket
/// short-circuits `authenticate` directly rather than becoming one of these.
/// [`Self::severity`] then picks the most informative of the remaining,
/// per-method rejections.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationFailure {
    #[error("server rejected authentication with no credentials")]
    OpenAuthRejected,
    #[error("server rejected password authentication")]
    PasswordAuthRejected,
    #[error("incorrect control password")]
    IncorrectPassword,
    #[error("cookie file is {actual} bytes, expected 32")]
    IncorrectCookieSize { actual: usize },
    #[error("could not read cookie file {path:?}: {source}")]
    UnreadableCookieFile { path: String, source: io::Error },
    #[error("server rejected cookie authentication")]
    CookieAuthRejected,
    #[error("cookie value rejected by server")]
    IncorrectCookieValue,
    #[error("server advertised no authentication method this client supports")]
    UnrecognizedAuthChallengeMethod,
    #[error("AUTHCHALLENGE failed: {0}")]
    AuthChallengeFailed(String),
    #[error("server HMAC did not match during SAFECOOKIE handshake")]
    AuthSecurityFailure,
    #[error("client nonce rejected by server")]
    InvalidClientNonce,
}

impl AuthenticationFailure {
    /// Higher values win when picking which failure to report after every
    /// applicable method has been tried (spec.md §4.9: "cookie unreadable >
    /// password rejected > open rejected").
    fn severity(&self) -> u8 {
        match self {
            AuthenticationFailure::OpenAuthRejected => 0,
            AuthenticationFailure::PasswordAuthRejected | AuthenticationFailure::IncorrectPassword => 1,
            AuthenticationFailure::IncorrectCookieSize { .. }
            | AuthenticationFailure::UnreadableCookieFile { .. }
            | AuthenticationFailure::CookieAuthRejected
            | AuthenticationFailure::IncorrectCookieValue
            | AuthenticationFailure::UnrecognizedAuthChallengeMethod
            | AuthenticationFailure::AuthChallengeFailed(_)
            | AuthenticationFailure::AuthSecurityFailure
            | AuthenticationFailure::InvalidClientNonce => 2,
        }
    }

    /// Picks the most severe of a set of collected per-method failures.
    pub fn most_severe(failures: Vec<AuthenticationFailure>) -> Option<AuthenticationFailure> {
        failures.into_iter().max_by_key(AuthenticationFailure::severity)
    }
}
