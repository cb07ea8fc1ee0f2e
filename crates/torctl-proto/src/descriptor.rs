//! Router-status-entry value objects, parsed from the multi-line payloads
//! carried by NEWDESC/NEWCONSENSUS/NS events and `ns/...` GETINFO replies.
//!
//! Each sub-line is identified by its leading keyword (`r`, `s`, `m`, `v`,
//! `w`, `p`, ...). Unknown keywords are retained verbatim for caller
//! inspection rather than rejected, per spec.md §3.

use crate::exit_policy::MicrodescriptorExitPolicy;

/// One relay's entry in a network-status document (a `r` line and the
/// sub-lines that follow it, up to the next `r` line or end of payload).
#[derive(Debug, Clone, PartialEq)]
pub struct RouterStatusEntry {
    pub nickname: String,
    pub identity: String,
    pub digest: String,
    pub address: String,
    pub or_port: u16,
    pub dir_port: u16,
    pub flags: Vec<String>,
    pub version: Option<String>,
    pub bandwidth: Vec<(String, String)>,
    pub exit_policy: Option<MicrodescriptorExitPolicy>,
    pub unrecognized: Vec<String>,
}

impl RouterStatusEntry {
    /// Parses every entry out of a blank-line-delimited payload: each
    /// entry starts with an `r ...` line.
    pub fn parse_all(payload: &str) -> Vec<RouterStatusEntry> {
        let mut entries = Vec::new();
        let mut current: Option<Builder> = None;
        for line in payload.lines() {
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix("r ") {
                if let Some(builder) = current.take() {
                    entries.push(builder.finish());
                }
                current = Some(Builder::new(rest));
                continue;
            }
            if let Some(builder) = current.as_mut() {
                builder.apply_line(line);
            }
        }
        if let Some(builder) = current {
            entries.push(builder.finish());
        }
        entries
    }
}

struct Builder {
    nickname: String,
    identity: String,
    digest: String,
    address: String,
    or_port: u16,
    dir_port: u16,
    flags: Vec<String>,
    version: Option<String>,
    bandwidth: Vec<(String, String)>,
    exit_policy: Option<MicrodescriptorExitPolicy>,
    unrecognized: Vec<String>,
}

impl Builder {
    fn new(r_line: &str) -> Self {
        let fields: Vec<&str> = r_line.split_whitespace().collect();
        // r nickname identity digest publication-date publication-time address or-port dir-port
        let nickname = fields.first().copied().unwrap_or_default().to_owned();
        let identity = fields.get(1).copied().unwrap_or_default().to_owned();
        let digest = fields.get(2).copied().unwrap_or_default().to_owned();
        let address = fields.get(5).copied().unwrap_or_default().to_owned();
        let or_port = fields.get(6).and_then(|p| p.parse().ok()).unwrap_or(0);
        let dir_port = fields.get(7).and_then(|p| p.parse().ok()).unwrap_or(0);
        Builder {
            nickname,
            identity,
            digest,
            address,
            or_port,
            dir_port,
            flags: Vec::new(),
            version: None,
            bandwidth: Vec::new(),
            exit_policy: None,
            unrecognized: Vec::new(),
        }
    }

    fn apply_line(&mut self, line: &str) {
        let (keyword, rest) = line.split_once(' ').unwrap_or((line, ""));
        match keyword {
            "s" => self.flags = rest.split_whitespace().map(str::to_owned).collect(),
            "v" => self.version = Some(rest.to_owned()),
            "w" => {
                self.bandwidth = rest
                    .split_whitespace()
                    .filter_map(|kv| kv.split_once('='))
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect();
            }
            "p" => self.exit_policy = MicrodescriptorExitPolicy::parse(rest).ok(),
            _ => self.unrecognized.push(line.to_owned()),
        }
    }

    fn finish(self) -> RouterStatusEntry {
        RouterStatusEntry {
            nickname: self.nickname,
            identity: self.identity,
            digest: self.digest,
            address: self.address,
            or_port: self.or_port,
            dir_port: self.dir_port,
            flags: self.flags,
            version: self.version,
            bandwidth: self.bandwidth,
            exit_policy: self.exit_policy,
            unrecognized: self.unrecognized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_entry_with_known_sublines() {
        let payload = "\
r piyaz 999A226EBED397F331B612FE1E4CFAE5C1F201BA 2+9NNdSl9XfgqSGOLi6Q+c9TYQ 2012-11-08 16:48:38 77.62.51.182 9001 0
s Fast Named Running Stable Valid
v Tor 0.2.1.30
w Bandwidth=51
p accept 80,443";
        let entries = RouterStatusEntry::parse_all(payload);
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.nickname, "piyaz");
        assert_eq!(e.address, "77.62.51.182");
        assert_eq!(e.or_port, 9001);
        assert_eq!(e.flags, vec!["Fast", "Named", "Running", "Stable", "Valid"]);
        assert_eq!(e.version.as_deref(), Some("Tor 0.2.1.30"));
        assert_eq!(e.bandwidth, vec![("Bandwidth".to_owned(), "51".to_owned())]);
        assert!(e.exit_policy.as_ref().unwrap().can_exit_to(443));
    }

    #[test]
    fn unknown_sublines_are_retained() {
        let payload = "r a b c 2012-11-08 16:48:38 1.2.3.4 1 2\nz some-future-field";
        let entries = RouterStatusEntry::parse_all(payload);
        assert_eq!(entries[0].unrecognized, vec!["z some-future-field"]);
    }

    #[test]
    fn multiple_entries_split_on_r_lines() {
        let payload = "\
r one a b 2012-11-08 16:48:38 1.1.1.1 1 1
s Fast
r two c d 2012-11-08 16:48:38 2.2.2.2 2 2
s Stable";
        let entries = RouterStatusEntry::parse_all(payload);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].nickname, "one");
        assert_eq!(entries[1].nickname, "two");
    }
}
