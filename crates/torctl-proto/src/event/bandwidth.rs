use chrono::{DateTime, Utc};
use torctl_wire::ReplyMessage;

use super::base::{joined_content, split_event_type, tokenize_base, EventBase};
use crate::error::ProtoError;

/// A `BW` event: aggregate read/write byte counters for the process
/// (spec.md §4.5, §8 scenario 4).
#[derive(Debug, Clone, PartialEq)]
pub struct BandwidthEvent {
    pub base: EventBase,
    pub read: u64,
    pub written: u64,
}

pub fn parse(
    msg: &ReplyMessage,
    event_type_hint: &str,
    arrived_at: DateTime<Utc>,
) -> Result<BandwidthEvent, ProtoError> {
    let content = joined_content(msg);
    let (_ty, rest) = split_event_type(&content)?;
    let mut parts = rest.splitn(3, ' ');
    let read_tok = parts.next().unwrap_or("");
    let written_tok = parts.next().unwrap_or("");
    let remainder = parts.next().unwrap_or("");

    let read: u64 = read_tok
        .parse()
        .map_err(|_| ProtoError::malformed(event_type_hint, format!("non-numeric read count: {read_tok:?}")))?;
    let written: u64 = written_tok.parse().map_err(|_| {
        ProtoError::malformed(event_type_hint, format!("non-numeric write count: {written_tok:?}"))
    })?;

    let (positional, keyword) = tokenize_base(remainder)
        .map_err(|e| ProtoError::malformed(event_type_hint, e.to_string()))?;

    Ok(BandwidthEvent {
        base: EventBase {
            event_type: event_type_hint.to_owned(),
            positional_args: positional,
            keyword_args: keyword,
            arrived_at,
        },
        read,
        written,
    })
}
