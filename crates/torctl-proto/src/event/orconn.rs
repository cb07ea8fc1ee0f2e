use chrono::{DateTime, Utc};
use torctl_wire::ReplyMessage;

use super::base::{joined_content, log_unknown_once, split_event_type, tokenize_base, EventBase};
use crate::error::ProtoError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ORConnStatus {
    New,
    Launched,
    Connected,
    Failed,
    Closed,
    Other(String),
}

impl ORConnStatus {
    fn parse(value: &str) -> Self {
        match value {
            "NEW" => Self::New,
            "LAUNCHED" => Self::Launched,
            "CONNECTED" => Self::Connected,
            "FAILED" => Self::Failed,
            "CLOSED" => Self::Closed,
            other => {
                log_unknown_once("ORConnStatus", other);
                Self::Other(other.to_owned())
            }
        }
    }
}

/// An `ORCONN` event (spec.md §4.5). `endpoint` is either a
/// `$FP[~=]nick` relay reference or a bare `host:port`.
#[derive(Debug, Clone, PartialEq)]
pub struct ORConnEvent {
    pub base: EventBase,
    pub endpoint: String,
    pub status: ORConnStatus,
    pub reason: Option<String>,
    pub circuit_count: Option<u32>,
}

pub fn parse(
    msg: &ReplyMessage,
    event_type_hint: &str,
    arrived_at: DateTime<Utc>,
) -> Result<ORConnEvent, ProtoError> {
    let content = joined_content(msg);
    let (_ty, rest) = split_event_type(&content)?;
    let mut parts = rest.splitn(3, ' ');
    let endpoint = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProtoError::malformed(event_type_hint, "missing endpoint"))?
        .to_owned();
    let status = ORConnStatus::parse(parts.next().unwrap_or(""));
    let remainder = parts.next().unwrap_or("");

    let (positional, keyword) = tokenize_base(remainder)
        .map_err(|e| ProtoError::malformed(event_type_hint, e.to_string()))?;
    let reason = keyword.get("REASON").cloned();
    let circuit_count = keyword.get("NCIRCS").and_then(|v| v.parse().ok());

    Ok(ORConnEvent {
        base: EventBase {
            event_type: event_type_hint.to_owned(),
            positional_args: positional,
            keyword_args: keyword,
            arrived_at,
        },
        endpoint,
        status,
        reason,
        circuit_count,
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
    fn orconn_with_fingerprint_endpoint() {
        let msg = assemble("650 ORCONN $999A226EBED397F331B612FE1E4CFAE5C1F201BA~piyaz CONNECTED NCIRCS=4");
        let ev = parse(&msg, "ORCONN", Utc::now()).unwrap();
        assert_eq!(ev.status, ORConnStatus::Connected);
        assert_eq!(ev.circuit_count, Some(4));
    }

    #[test]
    fn orconn_with_host_port_endpoint() {
        let msg = assemble("650 ORCONN 128.31.0.34:9101 LAUNCHED");
        let ev = parse(&msg, "ORCONN", Utc::now()).unwrap();
        assert_eq!(ev.endpoint, "128.31.0.34:9101");
        assert_eq!(ev.status, ORConnStatus::Launched);
    }
}
