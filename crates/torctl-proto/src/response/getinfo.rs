use std::collections::HashMap;

use torctl_wire::ReplyMessage;

use crate::error::{InvalidRequest, OperationFailed, ProtoError};

/// A parsed `GETINFO` reply: `key -> value`, with multi-line values (a
/// `key=` header followed by a data payload) collapsed to their joined
/// body (spec.md §4.4).
pub fn parse(msg: &ReplyMessage, requested: &[String]) -> Result<HashMap<String, String>, ProtoError> {
    if msg.code() == 552 {
        let message = msg.lines.last().map(|l| l.content.clone()).unwrap_or_default();
        return Err(OperationFailed::Unsatisfiable(
            InvalidRequest::InvalidArguments(extract_rejected_keys(&message, requested)).into(),
        )
        .into());
    }
    if msg.code() != 250 {
        return Err(OperationFailed::Failed {
            code: msg.code(),
            message: msg.lines.last().map(|l| l.content.clone()).unwrap_or_default(),
        }
        .into());
    }

    let mut out = HashMap::new();
    for line in &msg.lines {
        if line.content == "OK" {
            continue;
        }
        let (key, value) = line
            .content
            .split_once('=')
            .ok_or_else(|| ProtoError::malformed("GETINFO", format!("line without '=': {:?}", line.content)))?;
        let value = line.payload.clone().unwrap_or_else(|| value.to_owned());
        if !requested.iter().any(|r| r == key) {
            return Err(ProtoError::UnrequestedKey(key.to_owned()));
        }
        out.insert(key.to_owned(), value);
    }
    Ok(out)
}

/// Tor's 552 message names the first offending key; stem's convention
/// (and ours) is to report every requested key as rejected since Tor
/// doesn't say which of the rest would have succeeded.
fn extract_rejected_keys(_message: &str, requested: &[String]) -> Vec<String> {
    requested.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use torctl_wire::Assembler;

    #[test]
    fn scenario_3_multiline_value_is_joined() {
        let mut asm = Assembler::new();
        asm.feed("250+info/names=").unwrap();
        asm.feed("desc/id/* -- Router descriptors by ID.").unwrap();
        asm.feed("desc/name/* -- Router descriptors by nickname.").unwrap();
        asm.feed(".").unwrap();
        let msg = asm.feed("250 OK").unwrap().unwrap();

        let result = parse(&msg, &["info/names".to_owned()]).unwrap();
        assert_eq!(
            result.get("info/names").unwrap(),
            "desc/id/* -- Router descriptors by ID.\ndesc/name/* -- Router descriptors by nickname."
        );
    }

    #[test]
    fn single_line_value() {
        let mut asm = Assembler::new();
        asm.feed("250-version=0.4.7.13").unwrap();
        let msg = asm.feed("250 OK").unwrap().unwrap();
        let result = parse(&msg, &["version".to_owned()]).unwrap();
        assert_eq!(result.get("version").unwrap(), "0.4.7.13");
    }

    #[test]
    fn missing_key_with_552_is_invalid_arguments() {
        let mut asm = Assembler::new();
        let msg = asm.feed("552 Unrecognized key \"bogus\"").unwrap().unwrap();
        let err = parse(&msg, &["bogus".to_owned()]).unwrap_err();
        assert!(matches!(
            err,
            ProtoError::Operation(OperationFailed::Unsatisfiable(_))
        ));
    }

    #[test]
    fn unrequested_key_is_a_protocol_error() {
        let mut asm = Assembler::new();
        asm.feed("250-version=0.4.7.13").unwrap();
        let msg = asm.feed("250 OK").unwrap().unwrap();
        let err = parse(&msg, &["something-else".to_owned()]).unwrap_err();
        assert!(matches!(err, ProtoError::UnrequestedKey(_)));
    }
}
