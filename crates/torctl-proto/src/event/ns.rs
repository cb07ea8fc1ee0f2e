use chrono::{DateTime, Utc};
use torctl_wire::ReplyMessage;

use super::base::EventBase;
use crate::descriptor::RouterStatusEntry;
use crate::error::ProtoError;

/// `NEWCONSENSUS` and `NS` events (spec.md §4.5): router-status-entry
/// payloads, parsed the same way as a GETINFO `ns/...` reply.
#[derive(Debug, Clone, PartialEq)]
pub struct NsEvent {
    pub base: EventBase,
    pub entries: Vec<RouterStatusEntry>,
}

pub fn parse(
    msg: &ReplyMessage,
    event_type_hint: &str,
    arrived_at: DateTime<Utc>,
) -> Result<NsEvent, ProtoError> {
    let first = msg
        .lines
        .first()
        .ok_or_else(|| ProtoError::malformed(event_type_hint, "empty reply"))?;
    let payload = first
        .payload
        .as_deref()
        .ok_or_else(|| ProtoError::malformed(event_type_hint, "expected a data payload"))?;

    Ok(NsEvent {
        base: EventBase {
            event_type: event_type_hint.to_owned(),
            positional_args: Vec::new(),
            keyword_args: std::collections::HashMap::new(),
            arrived_at,
        },
        entries: RouterStatusEntry::parse_all(payload),
    })
}

/// `NEWDESC` events are simpler: a space-separated list of relay
/// references on a single line rather than a full status-entry payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDescEvent {
    pub base: EventBase,
    pub relays: Vec<String>,
}

pub fn parse_new_desc(
    msg: &ReplyMessage,
    event_type_hint: &str,
    arrived_at: DateTime<Utc>,
) -> Result<NewDescEvent, ProtoError> {
    let content = super::base::joined_content(msg);
    let (_ty, rest) = super::base::split_event_type(&content)?;
    let relays = rest.split_whitespace().map(str::to_owned).collect();

    Ok(NewDescEvent {
        base: EventBase {
            event_type: event_type_hint.to_owned(),
            positional_args: Vec::new(),
            keyword_args: std::collections::HashMap::new(),
            arrived_at,
        },
        relays,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use torctl_wire::Assembler;

    #[test]
    fn newconsensus_payload_is_parsed_into_entries() {
        let mut asm = Assembler::new();
        asm.feed("650+NEWCONSENSUS").unwrap();
        asm.feed("r piyaz 999A226EBED397F331B612FE1E4CFAE5C1F201BA 2+9NNdSl9XfgqSGOLi6Q+c9TYQ 2012-11-08 16:48:38 77.62.51.182 9001 0").unwrap();
        asm.feed("s Fast Named Running Stable Valid").unwrap();
        asm.feed(".").unwrap();
        let msg = asm.feed("650 OK").unwrap().unwrap();
        let ev = parse(&msg, "NEWCONSENSUS", Utc::now()).unwrap();
        assert_eq!(ev.entries.len(), 1);
        assert_eq!(ev.entries[0].nickname, "piyaz");
    }

    #[test]
    fn newdesc_is_a_list_of_relay_references() {
        let mut asm = Assembler::new();
        let msg = asm
            .feed("650 NEWDESC $999A226EBED397F331B612FE1E4CFAE5C1F201BA~piyaz")
            .unwrap()
            .unwrap();
        let ev = parse_new_desc(&msg, "NEWDESC", Utc::now()).unwrap();
        assert_eq!(ev.relays, vec!["$999A226EBED397F331B612FE1E4CFAE5C1F201BA~piyaz".to_owned()]);
    }
}
