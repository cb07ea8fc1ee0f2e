use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::base::{joined_content, log_unknown_once, split_event_type, tokenize_base, EventBase};
use crate::error::ProtoError;
use torctl_wire::ReplyMessage;

macro_rules! open_enum {
    ($name:ident { $($variant:ident => $lit:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn parse(kind: &'static str, value: &str) -> Self {
                match value {
                    $($lit => $name::$variant,)+
                    other => {
                        log_unknown_once(kind, other);
                        $name::Other(other.to_owned())
                    }
                }
            }
        }
    };
}

open_enum!(CircStatus {
    Launched => "LAUNCHED",
    Built => "BUILT",
    Extended => "EXTENDED",
    Failed => "FAILED",
    Closed => "CLOSED",
});

open_enum!(CircPurpose {
    General => "GENERAL",
    HsClientIntro => "HS_CLIENT_INTRO",
    HsClientRend => "HS_CLIENT_REND",
    HsServiceIntro => "HS_SERVICE_INTRO",
    HsServiceRend => "HS_SERVICE_REND",
    Testing => "TESTING",
    Controller => "CONTROLLER",
    Measureip => "MEASURE_TIMEOUT",
});

open_enum!(CircCloseReason {
    None => "NONE",
    TorProtocol => "TORPROTOCOL",
    Internal => "INTERNAL",
    Requested => "REQUESTED",
    HibernatingTimeout => "HIBERNATING",
    ResourceLimit => "RESOURCELIMIT",
    ConnectFailed => "CONNECTFAILED",
    OrIdentity => "OR_IDENTITY",
    OrConnClosed => "OR_CONN_CLOSED",
    Timeout => "TIMEOUT",
    Finished => "FINISHED",
    Destroyed => "DESTROYED",
    NoPath => "NOPATH",
    NoSuchService => "NOSUCHSERVICE",
    MeasurementExpired => "MEASUREMENT_EXPIRED",
});

/// A `CIRC`/`CIRC_MINOR` event (spec.md §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitEvent {
    pub base: EventBase,
    pub id: String,
    pub status: CircStatus,
    /// `(fingerprint, nickname)`; either may be absent if the peer wasn't
    /// verbose-named.
    pub path: Vec<(Option<String>, Option<String>)>,
    pub build_flags: HashSet<String>,
    pub purpose: CircPurpose,
    pub hs_state: Option<String>,
    pub rend_query: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub close_reason: Option<CircCloseReason>,
    pub remote_reason: Option<CircCloseReason>,
}

fn parse_path(token: &str) -> Vec<(Option<String>, Option<String>)> {
    token
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|hop| {
            let hop = hop.trim_start_matches('$');
            if let Some((fp, nick)) = hop.split_once(['=', '~']) {
                (Some(fp.to_owned()), Some(nick.to_owned()))
            } else if hop.is_empty() {
                (None, None)
            } else {
                (Some(hop.to_owned()), None)
            }
        })
        .collect()
}

pub fn parse(msg: &ReplyMessage, event_type_hint: &str, arrived_at: DateTime<Utc>) -> Result<CircuitEvent, ProtoError> {
    let content = joined_content(msg);
    let (_ty, rest) = split_event_type(&content)?;
    let mut parts = rest.splitn(3, ' ');
    let id = parts
        .next()
        .filter(|s| !s.is_empty() && s.len() <= 16 && s.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| ProtoError::malformed(event_type_hint, "circuit id must be a 1..16 digit string"))?
        .to_owned();
    let status_tok = parts.next().unwrap_or("");
    let remainder = parts.next().unwrap_or("");

    let status = CircStatus::parse("CircStatus", status_tok);

    // The path, if present, is a leading bare token of the remainder that
    // looks like `$FP=nick,$FP,...` — it would otherwise be misread as a
    // KEY=VALUE pair by `tokenize_base`, so it's peeled off first.
    let (path, keyword_rest) = if let Some(path_tok) = remainder.starts_with('$').then(|| {
        remainder.split_once(' ').map_or(remainder, |(tok, _)| tok)
    }) {
        let rest = remainder[path_tok.len()..].trim_start();
        (parse_path(path_tok), rest)
    } else {
        (Vec::new(), remainder)
    };

    let (positional, keyword) = tokenize_base(keyword_rest)
        .map_err(|e| ProtoError::malformed(event_type_hint, e.to_string()))?;

    let build_flags = keyword
        .get("BUILD_FLAGS")
        .map(|v| v.split(',').map(str::to_owned).collect())
        .unwrap_or_default();
    let purpose = keyword
        .get("PURPOSE")
        .map(|v| CircPurpose::parse("CircPurpose", v))
        .unwrap_or(CircPurpose::General);
    let created = keyword
        .get("TIME_CREATED")
        .and_then(|v| DateTime::parse_from_str(&format!("{v}+0000"), "%Y-%m-%dT%H:%M:%S%.f%z").ok())
        .map(|dt| dt.with_timezone(&Utc));
    let close_reason = keyword.get("REASON").map(|v| CircCloseReason::parse("CircCloseReason", v));
    let remote_reason = keyword
        .get("REMOTE_REASON")
        .map(|v| CircCloseReason::parse("CircCloseReason", v));

    Ok(CircuitEvent {
        base: EventBase {
            event_type: event_type_hint.to_owned(),
            positional_args: positional,
            keyword_args: keyword,
            arrived_at,
        },
        id,
        status,
        path,
        build_flags,
        purpose,
        hs_state: None,
        rend_query: None,
        created,
        close_reason,
        remote_reason,
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
    fn scenario_5_circuit_extended_event() {
        let msg = assemble(
            "650 CIRC 7 EXTENDED $999A226EBED397F331B612FE1E4CFAE5C1F201BA=piyaz BUILD_FLAGS=NEED_CAPACITY PURPOSE=GENERAL TIME_CREATED=2012-11-08T16:48:38.417238",
        );
        let now = Utc::now();
        let ev = parse(&msg, "CIRC", now).unwrap();
        assert_eq!(ev.id, "7");
        assert_eq!(ev.status, CircStatus::Extended);
        assert_eq!(ev.path, vec![(
            Some("999A226EBED397F331B612FE1E4CFAE5C1F201BA".to_owned()),
            Some("piyaz".to_owned())
        )]);
        assert!(ev.build_flags.contains("NEED_CAPACITY"));
        assert_eq!(ev.purpose, CircPurpose::General);
        assert_eq!(
            ev.created.unwrap().format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            "2012-11-08 16:48:38.417238"
        );
    }

    #[test]
    fn time_created_is_optional() {
        let msg = assemble("650 CIRC 3 LAUNCHED");
        let ev = parse(&msg, "CIRC", Utc::now()).unwrap();
        assert_eq!(ev.created, None);
        assert_eq!(ev.status, CircStatus::Launched);
    }

    #[test]
    fn overlong_circuit_id_is_rejected() {
        let msg = assemble("650 CIRC toolong8901234567 LAUNCHED");
        assert!(parse(&msg, "CIRC", Utc::now()).is_err());
    }

    #[test]
    fn non_numeric_circuit_id_is_rejected() {
        let msg = assemble("650 CIRC 7a LAUNCHED");
        assert!(parse(&msg, "CIRC", Utc::now()).is_err());
    }

    #[test]
    fn unknown_status_is_preserved_as_raw_string() {
        let msg = assemble("650 CIRC 3 FROBNICATED");
        let ev = parse(&msg, "CIRC", Utc::now()).unwrap();
        assert_eq!(ev.status, CircStatus::Other("FROBNICATED".to_owned()));
    }
}
