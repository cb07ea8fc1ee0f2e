use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use torctl_wire::{ReplyMessage, WireError};

use crate::error::ProtoError;

/// Fields shared by every event subclass (spec.md §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct EventBase {
    pub event_type: String,
    pub positional_args: Vec<String>,
    pub keyword_args: HashMap<String, String>,
    pub arrived_at: DateTime<Utc>,
}

/// Joins an event reply's lines into one logical body: mid-reply/terminal
/// line content verbatim, data-payload lines by their captured payload.
pub fn joined_content(msg: &ReplyMessage) -> String {
    msg.lines
        .iter()
        .map(|l| l.payload.as_deref().unwrap_or(l.content.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits the joined content into `(event_type, remainder)`.
pub fn split_event_type(content: &str) -> Result<(&str, &str), ProtoError> {
    let content = content.trim_start();
    let (ty, rest) = content
        .split_once(' ')
        .unwrap_or((content, ""));
    if ty.is_empty() {
        return Err(ProtoError::malformed("Event", "missing event type"));
    }
    Ok((ty, rest.trim_start()))
}

/// Tokenizes `rest` into the base's positional and keyword args: leading
/// bare tokens are positional, everything from the first `KEY=` token
/// onward is a keyword arg (mirrors stem's loose event grammar).
pub fn tokenize_base(rest: &str) -> Result<(Vec<String>, HashMap<String, String>), WireError> {
    let cursor = torctl_wire::ParsedLine::new(rest);
    let mut positional = Vec::new();
    let mut keyword = HashMap::new();
    let mut seen_keyword = false;
    loop {
        if cursor.remainder().trim().is_empty() {
            break;
        }
        if cursor.peek_key().is_some() {
            seen_keyword = true;
            let (k, v) = cursor.pop_mapping(cursor.is_next_value_quoted(), true)?;
            keyword.insert(k, v);
        } else if seen_keyword {
            // Shouldn't normally happen (positional args precede keyword
            // args), but tolerate it rather than losing data.
            let tok = cursor.pop(false, true)?;
            positional.push(tok);
        } else {
            positional.push(cursor.pop(false, true)?);
        }
    }
    Ok((positional, keyword))
}

/// Logs an unrecognized enum value exactly once per distinct `(kind,
/// value)` pair, per spec.md §4.5/§9's "Enum-as-open-set" guidance.
pub fn log_unknown_once(kind: &str, value: &str) {
    static SEEN: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    let seen = SEEN.get_or_init(|| Mutex::new(HashSet::new()));
    let key = format!("{kind}:{value}");
    let mut guard = seen.lock().unwrap();
    if guard.insert(key) {
        tracing::debug!(kind, value, "unrecognized enum value, returning raw string");
    }
}
