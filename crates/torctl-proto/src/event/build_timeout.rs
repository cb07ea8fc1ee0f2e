use chrono::{DateTime, Utc};
use torctl_wire::ReplyMessage;

use super::base::{joined_content, log_unknown_once, split_event_type, tokenize_base, EventBase};
use crate::error::ProtoError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildTimeoutSetType {
    ComputedTimeout,
    Reset,
    SuspendedTimeout,
    DiscardTimeout,
    ResumeTimeout,
    Other(String),
}

impl BuildTimeoutSetType {
    fn parse(value: &str) -> Self {
        match value {
            "COMPUTED" => Self::ComputedTimeout,
            "RESET" => Self::Reset,
            "SUSPENDED" => Self::SuspendedTimeout,
            "DISCARD" => Self::DiscardTimeout,
            "RESUME" => Self::ResumeTimeout,
            other => {
                log_unknown_once("BuildTimeoutSetType", other);
                Self::Other(other.to_owned())
            }
        }
    }
}

/// A `BUILDTIMEOUT_SET` event: adaptive circuit-build-timeout statistics
/// (spec.md §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct BuildTimeoutSetEvent {
    pub base: EventBase,
    pub set_type: BuildTimeoutSetType,
    pub total_times: Option<u32>,
    pub timeout_ms: Option<u32>,
    pub xm: Option<u32>,
    pub timeout_rate: Option<f64>,
    pub close_ms: Option<u32>,
    pub close_rate: Option<f64>,
}

pub fn parse(
    msg: &ReplyMessage,
    event_type_hint: &str,
    arrived_at: DateTime<Utc>,
) -> Result<BuildTimeoutSetEvent, ProtoError> {
    let content = joined_content(msg);
    let (_ty, rest) = split_event_type(&content)?;
    let (set_type_tok, remainder) = rest.split_once(' ').unwrap_or((rest, ""));
    let set_type = BuildTimeoutSetType::parse(set_type_tok);

    let (positional, keyword) = tokenize_base(remainder)
        .map_err(|e| ProtoError::malformed(event_type_hint, e.to_string()))?;

    let get_u32 = |k: &str| -> Result<Option<u32>, ProtoError> {
        keyword
            .get(k)
            .map(|v| v.parse().map_err(|_| ProtoError::malformed(event_type_hint, format!("{k}={v:?} is not a u32"))))
            .transpose()
    };
    let get_f64 = |k: &str| -> Result<Option<f64>, ProtoError> {
        keyword
            .get(k)
            .map(|v| v.parse().map_err(|_| ProtoError::malformed(event_type_hint, format!("{k}={v:?} is not a f64"))))
            .transpose()
    };

    Ok(BuildTimeoutSetEvent {
        base: EventBase {
            event_type: event_type_hint.to_owned(),
            positional_args: positional,
            keyword_args: keyword.clone(),
            arrived_at,
        },
        set_type,
        total_times: get_u32("TOTAL_TIMES")?,
        timeout_ms: get_u32("TIMEOUT_MS")?,
        xm: get_u32("XM")?,
        timeout_rate: get_f64("TIMEOUT_RATE")?,
        close_ms: get_u32("CLOSE_MS")?,
        close_rate: get_f64("CLOSE_RATE")?,
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
    fn computed_timeout_statistics() {
        let msg = assemble(
            "650 BUILDTIMEOUT_SET COMPUTED TOTAL_TIMES=862 TIMEOUT_MS=21679 XM=1271 TIMEOUT_RATE=0.142395 CLOSE_MS=43354 CLOSE_RATE=0.051460",
        );
        let ev = parse(&msg, "BUILDTIMEOUT_SET", Utc::now()).unwrap();
        assert_eq!(ev.set_type, BuildTimeoutSetType::ComputedTimeout);
        assert_eq!(ev.total_times, Some(862));
        assert_eq!(ev.timeout_ms, Some(21679));
        assert!((ev.timeout_rate.unwrap() - 0.142395).abs() < 1e-9);
    }

    #[test]
    fn rejects_unparseable_numeric_field() {
        let msg = assemble("650 BUILDTIMEOUT_SET COMPUTED TOTAL_TIMES=notanumber");
        assert!(parse(&msg, "BUILDTIMEOUT_SET", Utc::now()).is_err());
    }

    #[test]
    fn rejects_unparseable_float_field() {
        let msg = assemble("650 BUILDTIMEOUT_SET COMPUTED TIMEOUT_RATE=notafloat");
        assert!(parse(&msg, "BUILDTIMEOUT_SET", Utc::now()).is_err());
    }
}
