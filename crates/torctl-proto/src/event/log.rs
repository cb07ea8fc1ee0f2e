use chrono::{DateTime, Utc};
use torctl_wire::ReplyMessage;

use super::base::EventBase;
use crate::error::ProtoError;

/// Severity carried by a `DEBUG`/`INFO`/`NOTICE`/`WARN`/`ERR` log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    Debug,
    Info,
    Notice,
    Warn,
    Err,
}

impl LogSeverity {
    fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "NOTICE" => Some(Self::Notice),
            "WARN" => Some(Self::Warn),
            "ERR" => Some(Self::Err),
            _ => None,
        }
    }
}

/// A log event: one of `DEBUG`/`INFO`/`NOTICE`/`WARN`/`ERR` (spec.md §4.5).
/// These never carry keyword args, just a free-text message that may span
/// a multi-line data payload.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub base: EventBase,
    pub severity: LogSeverity,
    pub message: String,
}

/// Unlike most events, a log event's message may arrive as a multi-line
/// data payload, in which case the event type sits alone on the header
/// line (`650+WARN`) and the message is the payload rather than trailing
/// content on that same line. Single-line events (`650 NOTICE ...`) carry
/// both on one line instead, so this is handled directly against the
/// assembled lines rather than through the generic `joined_content` join.
pub fn parse(
    msg: &ReplyMessage,
    event_type_hint: &str,
    arrived_at: DateTime<Utc>,
) -> Result<LogEvent, ProtoError> {
    let first = msg
        .lines
        .first()
        .ok_or_else(|| ProtoError::malformed(event_type_hint, "empty reply"))?;

    let (ty, message) = match &first.payload {
        Some(payload) => (first.content.trim(), payload.clone()),
        None => first
            .content
            .split_once(' ')
            .map(|(ty, rest)| (ty, rest.to_owned()))
            .unwrap_or((first.content.as_str(), String::new())),
    };

    let severity = LogSeverity::from_event_type(ty)
        .ok_or_else(|| ProtoError::malformed(event_type_hint, format!("unknown log severity {ty:?}")))?;

    Ok(LogEvent {
        base: EventBase {
            event_type: event_type_hint.to_owned(),
            positional_args: Vec::new(),
            keyword_args: std::collections::HashMap::new(),
            arrived_at,
        },
        severity,
        message,
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
    fn single_line_notice() {
        let msg = assemble("650 NOTICE Tor has successfully opened a circuit.");
        let ev = parse(&msg, "NOTICE", Utc::now()).unwrap();
        assert_eq!(ev.severity, LogSeverity::Notice);
        assert_eq!(ev.message, "Tor has successfully opened a circuit.");
    }

    #[test]
    fn multiline_warn_payload_is_joined() {
        let mut asm = Assembler::new();
        asm.feed("650+WARN").unwrap();
        asm.feed("first line").unwrap();
        asm.feed("second line").unwrap();
        asm.feed(".").unwrap();
        let msg = asm.feed("650 OK").unwrap().unwrap();
        let ev = parse(&msg, "WARN", Utc::now()).unwrap();
        assert_eq!(ev.severity, LogSeverity::Warn);
        assert_eq!(ev.message, "first line\nsecond line");
    }
}
