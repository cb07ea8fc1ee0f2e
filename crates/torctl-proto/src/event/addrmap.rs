use chrono::{DateTime, Utc};
use torctl_wire::ReplyMessage;

use super::base::{joined_content, split_event_type, tokenize_base, EventBase};
use crate::error::ProtoError;

/// An `ADDRMAP` event: Tor's address-mapping table changed (spec.md §4.5),
/// e.g. as a result of `MAPADDRESS` or a DNS resolution through Tor.
#[derive(Debug, Clone, PartialEq)]
pub struct AddrMapEvent {
    pub base: EventBase,
    pub original: String,
    pub replacement: String,
    /// `"NEVER"` for a permanent entry, otherwise a quoted expiry timestamp,
    /// or absent for the special `"<error>"` replacement.
    pub expiry: Option<String>,
    pub error: Option<String>,
    pub cached: Option<bool>,
}

pub fn parse(
    msg: &ReplyMessage,
    event_type_hint: &str,
    arrived_at: DateTime<Utc>,
) -> Result<AddrMapEvent, ProtoError> {
    let content = joined_content(msg);
    let (_ty, rest) = split_event_type(&content)?;

    let cursor = torctl_wire::ParsedLine::new(rest);
    let original = cursor
        .pop(false, true)
        .map_err(|e| ProtoError::malformed(event_type_hint, e.to_string()))?;
    let replacement = cursor
        .pop(cursor.is_next_quoted(true), true)
        .map_err(|e| ProtoError::malformed(event_type_hint, e.to_string()))?;
    let expiry_tok = if cursor.remainder().trim().is_empty() {
        None
    } else {
        Some(
            cursor
                .pop(cursor.is_next_quoted(true), true)
                .map_err(|e| ProtoError::malformed(event_type_hint, e.to_string()))?,
        )
    };

    let (positional, keyword) = tokenize_base(&cursor.remainder())
        .map_err(|e| ProtoError::malformed(event_type_hint, e.to_string()))?;

    let error = keyword.get("error").cloned();
    let cached = keyword.get("CACHED").map(|v| v.trim_matches('"') == "YES");

    Ok(AddrMapEvent {
        base: EventBase {
            event_type: event_type_hint.to_owned(),
            positional_args: positional,
            keyword_args: keyword,
            arrived_at,
        },
        original,
        replacement,
        expiry: expiry_tok,
        error,
        cached,
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
    fn basic_addrmap_event() {
        let msg = assemble("650 ADDRMAP www.example.com 93.184.216.34 \"2012-11-09 12:00:00\"");
        let ev = parse(&msg, "ADDRMAP", Utc::now()).unwrap();
        assert_eq!(ev.original, "www.example.com");
        assert_eq!(ev.replacement, "93.184.216.34");
        assert_eq!(ev.expiry.as_deref(), Some("2012-11-09 12:00:00"));
    }

    #[test]
    fn addrmap_with_cached_flag() {
        let msg = assemble("650 ADDRMAP example.com 8.8.8.8 NEVER CACHED=\"YES\"");
        let ev = parse(&msg, "ADDRMAP", Utc::now()).unwrap();
        assert_eq!(ev.expiry.as_deref(), Some("NEVER"));
        assert_eq!(ev.cached, Some(true));
    }
}
