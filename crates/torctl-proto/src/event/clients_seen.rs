use chrono::{DateTime, Utc};
use torctl_wire::ReplyMessage;

use super::base::{joined_content, split_event_type, tokenize_base, EventBase};
use crate::error::ProtoError;

/// A `CLIENTS_SEEN` event: bridge relay usage estimates (spec.md §4.5).
/// `country_counts` and `ip_versions` are parsed out of their
/// comma-separated `CODE=count` sub-fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientsSeenEvent {
    pub base: EventBase,
    pub start_time: Option<String>,
    pub country_counts: Vec<(String, u32)>,
    pub ip_versions: Vec<(String, u32)>,
}

/// `require_two_letter_code` distinguishes `CountrySummary` (ISO 3166
/// country codes, always two letters) from `IPVersions` (labels like `v4`,
/// `v6`), which the protocol doesn't constrain to two letters.
fn parse_counts(
    raw: &str,
    field: &str,
    require_two_letter_code: bool,
    event_type_hint: &str,
) -> Result<Vec<(String, u32)>, ProtoError> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for entry in raw.split(',') {
        let (code, count) = entry
            .split_once('=')
            .ok_or_else(|| ProtoError::malformed(event_type_hint, format!("{field}: {entry:?} is not CODE=count")))?;
        if require_two_letter_code && (code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic())) {
            return Err(ProtoError::malformed(event_type_hint, format!("{field}: {code:?} is not a two-letter code")));
        }
        let count: u32 = count
            .parse()
            .map_err(|_| ProtoError::malformed(event_type_hint, format!("{field}: {count:?} is not numeric")))?;
        if !seen.insert(code.to_owned()) {
            return Err(ProtoError::malformed(event_type_hint, format!("{field}: duplicate key {code:?}")));
        }
        out.push((code.to_owned(), count));
    }
    Ok(out)
}

pub fn parse(
    msg: &ReplyMessage,
    event_type_hint: &str,
    arrived_at: DateTime<Utc>,
) -> Result<ClientsSeenEvent, ProtoError> {
    let content = joined_content(msg);
    let (_ty, rest) = split_event_type(&content)?;

    let (positional, keyword) = tokenize_base(rest)
        .map_err(|e| ProtoError::malformed(event_type_hint, e.to_string()))?;

    let start_time = keyword.get("TimeStarted").map(|v| v.trim_matches('"').to_owned());
    let country_counts = match keyword.get("CountrySummary") {
        Some(v) => parse_counts(v, "CountrySummary", true, event_type_hint)?,
        None => Vec::new(),
    };
    let ip_versions = match keyword.get("IPVersions") {
        Some(v) => parse_counts(v, "IPVersions", false, event_type_hint)?,
        None => Vec::new(),
    };

    Ok(ClientsSeenEvent {
        base: EventBase {
            event_type: event_type_hint.to_owned(),
            positional_args: positional,
            keyword_args: keyword,
            arrived_at,
        },
        start_time,
        country_counts,
        ip_versions,
    })
}
