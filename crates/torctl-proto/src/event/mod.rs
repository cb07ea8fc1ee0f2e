//! Parsers for the asynchronous (650-series) events a controller can
//! subscribe to (spec.md §4.5).

pub mod addrmap;
pub mod base;
pub mod bandwidth;
pub mod build_timeout;
pub mod circuit;
pub mod clients_seen;
pub mod conf_changed;
pub mod guard;
pub mod log;
pub mod ns;
pub mod orconn;
pub mod status;
pub mod stream;

use chrono::{DateTime, Utc};
use torctl_wire::ReplyMessage;

use crate::error::ProtoError;

/// The parsed form of any event Tor can deliver over a 650-series reply.
/// `Unknown` is returned instead of an error for event types this crate
/// doesn't recognize, so a caller subscribed to `ALL` never trips a parse
/// failure over a future Tor version's new event type.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Circuit(circuit::CircuitEvent),
    Stream(stream::StreamEvent),
    ORConn(orconn::ORConnEvent),
    Bandwidth(bandwidth::BandwidthEvent),
    Log(log::LogEvent),
    Status(status::StatusEvent),
    AddrMap(addrmap::AddrMapEvent),
    BuildTimeoutSet(build_timeout::BuildTimeoutSetEvent),
    ClientsSeen(clients_seen::ClientsSeenEvent),
    ConfChanged(conf_changed::ConfChangedEvent),
    NewConsensus(ns::NsEvent),
    Ns(ns::NsEvent),
    NewDesc(ns::NewDescEvent),
    Guard(guard::GuardEvent),
    Unknown { event_type: String, raw: ReplyMessage },
}

fn event_type_of(msg: &ReplyMessage) -> Result<&str, ProtoError> {
    let first = msg
        .lines
        .first()
        .ok_or_else(|| ProtoError::malformed("Event", "empty reply"))?;
    Ok(first
        .content
        .split_whitespace()
        .next()
        .unwrap_or(first.content.as_str()))
}

/// Dispatches an assembled event reply to its typed parser based on the
/// leading keyword of its first line.
pub fn parse(msg: &ReplyMessage) -> Result<Event, ProtoError> {
    let arrived_at: DateTime<Utc> = Utc::now();
    let event_type = event_type_of(msg)?.to_owned();

    Ok(match event_type.as_str() {
        "CIRC" | "CIRC_MINOR" => Event::Circuit(circuit::parse(msg, &event_type, arrived_at)?),
        "STREAM" | "STREAM_BW" => Event::Stream(stream::parse(msg, &event_type, arrived_at)?),
        "ORCONN" => Event::ORConn(orconn::parse(msg, &event_type, arrived_at)?),
        "BW" => Event::Bandwidth(bandwidth::parse(msg, &event_type, arrived_at)?),
        "DEBUG" | "INFO" | "NOTICE" | "WARN" | "ERR" => Event::Log(log::parse(msg, &event_type, arrived_at)?),
        "STATUS_GENERAL" | "STATUS_CLIENT" | "STATUS_SERVER" => {
            Event::Status(status::parse(msg, &event_type, arrived_at)?)
        }
        "ADDRMAP" => Event::AddrMap(addrmap::parse(msg, &event_type, arrived_at)?),
        "BUILDTIMEOUT_SET" => Event::BuildTimeoutSet(build_timeout::parse(msg, &event_type, arrived_at)?),
        "CLIENTS_SEEN" => Event::ClientsSeen(clients_seen::parse(msg, &event_type, arrived_at)?),
        "CONF_CHANGED" => Event::ConfChanged(conf_changed::parse(msg, &event_type, arrived_at)?),
        "NEWCONSENSUS" => Event::NewConsensus(ns::parse(msg, &event_type, arrived_at)?),
        "NS" => Event::Ns(ns::parse(msg, &event_type, arrived_at)?),
        "NEWDESC" => Event::NewDesc(ns::parse_new_desc(msg, &event_type, arrived_at)?),
        "GUARD" => Event::Guard(guard::parse(msg, &event_type, arrived_at)?),
        _ => {
            base::log_unknown_once("EventType", &event_type);
            Event::Unknown {
                event_type,
                raw: msg.clone(),
            }
        }
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
    fn dispatches_known_event_types() {
        let msg = assemble("650 BW 15 25");
        assert!(matches!(parse(&msg).unwrap(), Event::Bandwidth(_)));
    }

    #[test]
    fn unrecognized_event_types_become_unknown_rather_than_failing() {
        let msg = assemble("650 SOME_FUTURE_EVENT foo bar");
        assert!(matches!(parse(&msg).unwrap(), Event::Unknown { .. }));
    }
}
