use torctl_wire::ReplyMessage;

use crate::error::{OperationFailed, ProtoError};

/// The result of a command whose successful reply is a bare `250 OK` (or
/// any other single terminal line): the status code and message text, with
/// non-`250` codes already converted to an error (spec.md §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleLineResponse {
    pub code: u16,
    pub message: String,
}

pub fn parse(msg: &ReplyMessage) -> Result<SingleLineResponse, ProtoError> {
    let last = msg.lines.last().expect("assembled replies are never empty");
    if msg.code() != 250 {
        return Err(OperationFailed::Failed {
            code: msg.code(),
            message: last.content.clone(),
        }
        .into());
    }
    Ok(SingleLineResponse {
        code: msg.code(),
        message: last.content.clone(),
    })
}
