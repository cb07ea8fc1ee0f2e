use chrono::{DateTime, Utc};
use torctl_wire::ReplyMessage;

use super::base::EventBase;
use crate::error::ProtoError;

/// A `CONF_CHANGED` event: one or more configuration options changed,
/// reported as a multi-line `KEY[=VALUE]` payload (spec.md §4.5). A bare
/// `KEY` line with no `=` means the option was reset to its default.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfChangedEvent {
    pub base: EventBase,
    pub changed: Vec<(String, Option<String>)>,
}

pub fn parse(
    msg: &ReplyMessage,
    event_type_hint: &str,
    arrived_at: DateTime<Utc>,
) -> Result<ConfChangedEvent, ProtoError> {
    let first = msg
        .lines
        .first()
        .ok_or_else(|| ProtoError::malformed(event_type_hint, "empty reply"))?;

    let changed = match &first.payload {
        Some(payload) => payload
            .lines()
            .filter(|l| !l.is_empty())
            .map(|line| match line.split_once('=') {
                Some((k, v)) => (k.to_owned(), Some(v.to_owned())),
                None => (line.to_owned(), None),
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(ConfChangedEvent {
        base: EventBase {
            event_type: event_type_hint.to_owned(),
            positional_args: Vec::new(),
            keyword_args: std::collections::HashMap::new(),
            arrived_at,
        },
        changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use torctl_wire::Assembler;

    #[test]
    fn multiline_conf_changed_payload() {
        let mut asm = Assembler::new();
        asm.feed("650+CONF_CHANGED").unwrap();
        asm.feed("ExitNodes=house").unwrap();
        asm.feed("ExitPolicy").unwrap();
        asm.feed(".").unwrap();
        let msg = asm.feed("650 OK").unwrap().unwrap();
        let ev = parse(&msg, "CONF_CHANGED", Utc::now()).unwrap();
        assert_eq!(
            ev.changed,
            vec![
                ("ExitNodes".to_owned(), Some("house".to_owned())),
                ("ExitPolicy".to_owned(), None),
            ]
        );
    }
}
