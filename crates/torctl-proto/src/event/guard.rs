use chrono::{DateTime, Utc};
use torctl_wire::ReplyMessage;

use super::base::{joined_content, log_unknown_once, split_event_type, tokenize_base, EventBase};
use crate::error::ProtoError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardType {
    Entry,
    Other(String),
}

impl GuardType {
    fn parse(value: &str) -> Self {
        match value {
            "ENTRY" => Self::Entry,
            other => {
                log_unknown_once("GuardType", other);
                Self::Other(other.to_owned())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardStatus {
    New,
    Up,
    Down,
    Bad,
    Good,
    Dropped,
    Other(String),
}

impl GuardStatus {
    fn parse(value: &str) -> Self {
        match value {
            "NEW" => Self::New,
            "UP" => Self::Up,
            "DOWN" => Self::Down,
            "BAD" => Self::Bad,
            "GOOD" => Self::Good,
            "DROPPED" => Self::Dropped,
            other => {
                log_unknown_once("GuardStatus", other);
                Self::Other(other.to_owned())
            }
        }
    }
}

/// A `GUARD` event: entry-guard selection status changes (spec.md §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct GuardEvent {
    pub base: EventBase,
    pub guard_type: GuardType,
    pub name: String,
    pub status: GuardStatus,
}

pub fn parse(
    msg: &ReplyMessage,
    event_type_hint: &str,
    arrived_at: DateTime<Utc>,
) -> Result<GuardEvent, ProtoError> {
    let content = joined_content(msg);
    let (_ty, rest) = split_event_type(&content)?;
    let mut parts = rest.splitn(4, ' ');
    let guard_type = GuardType::parse(parts.next().unwrap_or(""));
    let name = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProtoError::malformed(event_type_hint, "missing guard name"))?
        .to_owned();
    let status = GuardStatus::parse(parts.next().unwrap_or(""));
    let remainder = parts.next().unwrap_or("");

    let (positional, keyword) = tokenize_base(remainder)
        .map_err(|e| ProtoError::malformed(event_type_hint, e.to_string()))?;

    Ok(GuardEvent {
        base: EventBase {
            event_type: event_type_hint.to_owned(),
            positional_args: positional,
            keyword_args: keyword,
            arrived_at,
        },
        guard_type,
        name,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use torctl_wire::Assembler;

    fn assemble(line: &str) -> ReplyMessage {
        let mut asm = Assembler::new();
        asm.feed(line).unwrap().unwrap()
    }

    #[test]
    fn entry_guard_became_good() {
        let msg = assemble("650 GUARD ENTRY $999A226EBED397F331B612FE1E4CFAE5C1F201BA~piyaz GOOD");
        let ev = parse(&msg, "GUARD", Utc::now()).unwrap();
        assert_eq!(ev.guard_type, GuardType::Entry);
        assert_eq!(ev.status, GuardStatus::Good);
    }
}
