use std::collections::HashMap;

use torctl_wire::ReplyMessage;

use crate::error::{InvalidRequest, OperationFailed, ProtoError};

/// A parsed `GETCONF` reply: `option -> values`, where a repeated option
/// accumulates every value and an option with no `=` in the reply means
/// "set but with no value" (`None`) rather than unset (spec.md §4.4).
pub fn parse(msg: &ReplyMessage) -> Result<HashMap<String, Vec<Option<String>>>, ProtoError> {
    if msg.code() == 552 {
        let message = msg.lines.last().map(|l| l.content.clone()).unwrap_or_default();
        return Err(OperationFailed::Unsatisfiable(InvalidRequest::InvalidArguments(vec![message]).into()).into());
    }
    if msg.code() != 250 {
        return Err(OperationFailed::Failed {
            code: msg.code(),
            message: msg.lines.last().map(|l| l.content.clone()).unwrap_or_default(),
        }
        .into());
    }

    let mut out: HashMap<String, Vec<Option<String>>> = HashMap::new();
    for line in &msg.lines {
        if line.content == "OK" {
            continue;
        }
        let (key, value) = match line.content.split_once('=') {
            Some((k, v)) => (k.to_owned(), Some(v.trim_matches('"').to_owned())),
            None => (line.content.clone(), None),
        };
        out.entry(key).or_default().push(value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use torctl_wire::Assembler;

    #[test]
    fn repeated_option_accumulates_values() {
        let mut asm = Assembler::new();
        asm.feed("250-ExitNodes=house1").unwrap();
        asm.feed("250-ExitNodes=house2").unwrap();
        let msg = asm.feed("250 OK").unwrap().unwrap();
        let result = parse(&msg).unwrap();
        assert_eq!(
            result.get("ExitNodes").unwrap(),
            &vec![Some("house1".to_owned()), Some("house2".to_owned())]
        );
    }

    #[test]
    fn option_without_equals_is_none() {
        let mut asm = Assembler::new();
        asm.feed("250-ExitPolicy").unwrap();
        let msg = asm.feed("250 OK").unwrap().unwrap();
        let result = parse(&msg).unwrap();
        assert_eq!(result.get("ExitPolicy").unwrap(), &vec![None]);
    }
}
