use chrono::{DateTime, Utc};
use torctl_wire::ReplyMessage;

use super::base::{joined_content, log_unknown_once, split_event_type, tokenize_base, EventBase};
use crate::error::ProtoError;

/// Which of the three `STATUS_*` event families this is (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    General,
    Client,
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusSeverity {
    Notice,
    Warn,
    Err,
    Other(String),
}

impl StatusSeverity {
    fn parse(value: &str) -> Self {
        match value {
            "NOTICE" => Self::Notice,
            "WARN" => Self::Warn,
            "ERR" => Self::Err,
            other => {
                log_unknown_once("StatusSeverity", other);
                Self::Other(other.to_owned())
            }
        }
    }
}

/// A `STATUS_GENERAL`/`STATUS_CLIENT`/`STATUS_SERVER` event: a severity, an
/// action keyword (e.g. `CIRCUIT_ESTABLISHED`), and a free-form set of
/// keyword arguments whose shape depends on the action.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub base: EventBase,
    pub kind: StatusKind,
    pub severity: StatusSeverity,
    pub action: String,
}

pub fn parse(
    msg: &ReplyMessage,
    event_type_hint: &str,
    arrived_at: DateTime<Utc>,
) -> Result<StatusEvent, ProtoError> {
    let kind = match event_type_hint {
        "STATUS_GENERAL" => StatusKind::General,
        "STATUS_CLIENT" => StatusKind::Client,
        "STATUS_SERVER" => StatusKind::Server,
        other => return Err(ProtoError::malformed(event_type_hint, format!("not a STATUS event: {other:?}"))),
    };

    let content = joined_content(msg);
    let (_ty, rest) = split_event_type(&content)?;
    let mut parts = rest.splitn(3, ' ');
    let severity = StatusSeverity::parse(parts.next().unwrap_or(""));
    let action = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProtoError::malformed(event_type_hint, "missing action keyword"))?
        .to_owned();
    let remainder = parts.next().unwrap_or("");

    let (positional, keyword) = tokenize_base(remainder)
        .map_err(|e| ProtoError::malformed(event_type_hint, e.to_string()))?;

    Ok(StatusEvent {
        base: EventBase {
            event_type: event_type_hint.to_owned(),
            positional_args: positional,
            keyword_args: keyword,
            arrived_at,
        },
        kind,
        severity,
        action,
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
    fn status_client_bootstrap_progress() {
        let msg = assemble(
            "650 STATUS_CLIENT NOTICE BOOTSTRAP PROGRESS=100 TAG=done SUMMARY=\"Done\"",
        );
        let ev = parse(&msg, "STATUS_CLIENT", Utc::now()).unwrap();
        assert_eq!(ev.kind, StatusKind::Client);
        assert_eq!(ev.severity, StatusSeverity::Notice);
        assert_eq!(ev.action, "BOOTSTRAP");
        assert_eq!(ev.base.keyword_args.get("PROGRESS").map(String::as_str), Some("100"));
    }

    #[test]
    fn status_general_circuit_established() {
        let msg = assemble("650 STATUS_GENERAL NOTICE CIRCUIT_ESTABLISHED");
        let ev = parse(&msg, "STATUS_GENERAL", Utc::now()).unwrap();
        assert_eq!(ev.kind, StatusKind::General);
        assert_eq!(ev.action, "CIRCUIT_ESTABLISHED");
    }
}
