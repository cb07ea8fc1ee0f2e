use chrono::{DateTime, Utc};
use torctl_wire::ReplyMessage;

use super::base::{joined_content, log_unknown_once, split_event_type, tokenize_base, EventBase};
use crate::error::ProtoError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    New,
    NewResolve,
    SentConnect,
    SentResolve,
    Succeeded,
    Failed,
    Closed,
    Detached,
    Remap,
    Other(String),
}

impl StreamStatus {
    fn parse(value: &str) -> Self {
        match value {
            "NEW" => Self::New,
            "NEWRESOLVE" => Self::NewResolve,
            "SENTCONNECT" => Self::SentConnect,
            "SENTRESOLVE" => Self::SentResolve,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            "CLOSED" => Self::Closed,
            "DETACHED" => Self::Detached,
            "REMAP" => Self::Remap,
            other => {
                log_unknown_once("StreamStatus", other);
                Self::Other(other.to_owned())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPurpose {
    User,
    DirFetch,
    Uploads,
    Dns,
    Other(String),
}

impl StreamPurpose {
    fn parse(value: &str) -> Self {
        match value {
            "USER" => Self::User,
            "DIR_FETCH" => Self::DirFetch,
            "DIR_UPLOAD" => Self::Uploads,
            "DNS_REQUEST" => Self::Dns,
            other => {
                log_unknown_once("StreamPurpose", other);
                Self::Other(other.to_owned())
            }
        }
    }
}

/// A `STREAM`/`STREAM_BW` event (spec.md §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub base: EventBase,
    pub id: String,
    pub status: StreamStatus,
    pub circuit_id: Option<String>,
    pub target_address: String,
    pub target_port: u16,
    pub reason: Option<String>,
    pub remapped_source: Option<String>,
    pub source_addr: Option<(String, u16)>,
    pub purpose: Option<StreamPurpose>,
}

fn split_host_port(s: &str) -> (String, u16) {
    s.rsplit_once(':')
        .map(|(h, p)| (h.to_owned(), p.parse().unwrap_or(0)))
        .unwrap_or((s.to_owned(), 0))
}

pub fn parse(
    msg: &ReplyMessage,
    event_type_hint: &str,
    arrived_at: DateTime<Utc>,
) -> Result<StreamEvent, ProtoError> {
    let content = joined_content(msg);
    let (_ty, rest) = split_event_type(&content)?;
    let mut parts = rest.splitn(5, ' ');
    let id = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProtoError::malformed(event_type_hint, "missing stream id"))?
        .to_owned();
    let status = StreamStatus::parse(parts.next().unwrap_or(""));
    let circuit_tok = parts.next().unwrap_or("0");
    let circuit_id = if circuit_tok == "0" {
        None
    } else {
        Some(circuit_tok.to_owned())
    };
    let target_tok = parts.next().unwrap_or("");
    let (target_address, target_port) = split_host_port(target_tok);
    let remainder = parts.next().unwrap_or("");

    let (positional, keyword) = tokenize_base(remainder)
        .map_err(|e| ProtoError::malformed(event_type_hint, e.to_string()))?;

    let reason = keyword.get("REASON").cloned();
    let remapped_source = keyword.get("SOURCE").cloned();
    let source_addr = keyword.get("SOURCE_ADDR").map(|v| split_host_port(v));
    let purpose = keyword.get("PURPOSE").map(|v| StreamPurpose::parse(v));

    Ok(StreamEvent {
        base: EventBase {
            event_type: event_type_hint.to_owned(),
            positional_args: positional,
            keyword_args: keyword,
            arrived_at,
        },
        id,
        status,
        circuit_id,
        target_address,
        target_port,
        reason,
        remapped_source,
        source_addr,
        purpose,
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
    fn basic_stream_event() {
        let msg = assemble("650 STREAM 1 NEW 0 www.example.com:80 REASON=MISC");
        let ev = parse(&msg, "STREAM", Utc::now()).unwrap();
        assert_eq!(ev.id, "1");
        assert_eq!(ev.status, StreamStatus::New);
        assert_eq!(ev.circuit_id, None);
        assert_eq!(ev.target_address, "www.example.com");
        assert_eq!(ev.target_port, 80);
        assert_eq!(ev.reason.as_deref(), Some("MISC"));
    }

    #[test]
    fn attached_stream_has_circuit_id() {
        let msg = assemble("650 STREAM 2 SUCCEEDED 7 www.example.com:443");
        let ev = parse(&msg, "STREAM", Utc::now()).unwrap();
        assert_eq!(ev.circuit_id.as_deref(), Some("7"));
    }
}
