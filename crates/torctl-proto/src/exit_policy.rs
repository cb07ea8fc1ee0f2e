//! Exit-policy value objects: the reference parser for every value-object
//! parser in this crate (spec.md §1).
//!
//! Only the exit-pattern form is implemented (`accept`/`reject
//! addrspec:portspec`), not the full torrc policy grammar with its
//! `private`/macro expansion — see `SPEC_FULL.md` §6(c).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::ProtoError;

/// What kind of address an [`ExitPolicyRule`] matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Wildcard,
    IPv4,
    IPv6,
}

/// A single `accept`/`reject addrspec:portspec` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitPolicyRule {
    pub accept: bool,
    pub address_kind: AddressKind,
    pub address: Option<IpAddr>,
    pub mask_bits: Option<u8>,
    pub min_port: u16,
    pub max_port: u16,
}

impl ExitPolicyRule {
    /// Parses one rule, e.g. `"accept *:80"`, `"reject 1.2.3.4/16:*"`,
    /// `"accept [::1]/128:443"`.
    pub fn parse(rule: &str) -> Result<Self, ProtoError> {
        let rule = rule.trim();
        let (verb, rest) = rule
            .split_once(' ')
            .ok_or_else(|| ProtoError::malformed("ExitPolicyRule", rule))?;
        let accept = match verb {
            "accept" => true,
            "reject" => false,
            _ => return Err(ProtoError::malformed("ExitPolicyRule", rule)),
        };
        let (addr_part, port_part) = rest
            .rsplit_once(':')
            .ok_or_else(|| ProtoError::malformed("ExitPolicyRule", rule))?;

        let (address_kind, address, mask_bits) = parse_addr_spec(addr_part)?;
        let (min_port, max_port) = parse_port_spec(port_part)?;
        if min_port > max_port {
            return Err(ProtoError::malformed(
                "ExitPolicyRule",
                format!("min port {min_port} > max port {max_port}"),
            ));
        }

        Ok(ExitPolicyRule {
            accept,
            address_kind,
            address,
            mask_bits,
            min_port,
            max_port,
        })
    }

    /// True if this rule's address and port ranges cover the given probe.
    pub fn matches(&self, address: IpAddr, port: u16) -> bool {
        if port < self.min_port || port > self.max_port {
            return false;
        }
        match (self.address_kind, self.address) {
            (AddressKind::Wildcard, _) => true,
            (AddressKind::IPv4, Some(IpAddr::V4(rule_addr))) => {
                let IpAddr::V4(probe) = address else {
                    return false;
                };
                ipv4_in_range(probe, rule_addr, self.mask_bits.unwrap_or(32))
            }
            (AddressKind::IPv6, Some(IpAddr::V6(rule_addr))) => {
                let IpAddr::V6(probe) = address else {
                    return false;
                };
                ipv6_in_range(probe, rule_addr, self.mask_bits.unwrap_or(128))
            }
            _ => false,
        }
    }
}

impl fmt::Display for ExitPolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.accept { "accept" } else { "reject" };
        let addr = match (self.address_kind, self.address, self.mask_bits) {
            (AddressKind::Wildcard, ..) => "*".to_owned(),
            (AddressKind::IPv4, Some(a), Some(32)) | (AddressKind::IPv4, Some(a), None) => {
                a.to_string()
            }
            (AddressKind::IPv4, Some(a), Some(bits)) => format!("{a}/{bits}"),
            (AddressKind::IPv6, Some(a), Some(128)) | (AddressKind::IPv6, Some(a), None) => {
                format!("[{a}]")
            }
            (AddressKind::IPv6, Some(a), Some(bits)) => format!("[{a}]/{bits}"),
            _ => "*".to_owned(),
        };
        let port = if self.min_port == 1 && self.max_port == 65535 {
            "*".to_owned()
        } else if self.min_port == self.max_port {
            self.min_port.to_string()
        } else {
            format!("{}-{}", self.min_port, self.max_port)
        };
        write!(f, "{verb} {addr}:{port}")
    }
}

fn parse_addr_spec(s: &str) -> Result<(AddressKind, Option<IpAddr>, Option<u8>), ProtoError> {
    if s == "*" {
        return Ok((AddressKind::Wildcard, None, None));
    }
    if let Some(rest) = s.strip_prefix('[') {
        let (addr_str, bits_str) = rest
            .split_once(']')
            .ok_or_else(|| ProtoError::malformed("ExitPolicyRule", s))?;
        let addr: Ipv6Addr = addr_str
            .parse()
            .map_err(|_| ProtoError::malformed("ExitPolicyRule", s))?;
        let bits = match bits_str.strip_prefix('/') {
            Some(b) => {
                let bits: u8 = b
                    .parse()
                    .map_err(|_| ProtoError::malformed("ExitPolicyRule", s))?;
                if bits > 128 {
                    return Err(ProtoError::malformed("ExitPolicyRule", s));
                }
                bits
            }
            None => 128,
        };
        return Ok((AddressKind::IPv6, Some(IpAddr::V6(addr)), Some(bits)));
    }
    let (addr_str, mask_str) = s.split_once('/').unwrap_or((s, ""));
    let addr: Ipv4Addr = addr_str
        .parse()
        .map_err(|_| ProtoError::malformed("ExitPolicyRule", s))?;
    let bits = if mask_str.is_empty() {
        32
    } else if let Ok(bits) = mask_str.parse::<u8>() {
        if bits > 32 {
            return Err(ProtoError::malformed("ExitPolicyRule", s));
        }
        bits
    } else {
        let mask: Ipv4Addr = mask_str
            .parse()
            .map_err(|_| ProtoError::malformed("ExitPolicyRule", s))?;
        u32::from(mask).count_ones() as u8
    };
    Ok((AddressKind::IPv4, Some(IpAddr::V4(addr)), Some(bits)))
}

fn parse_port_spec(s: &str) -> Result<(u16, u16), ProtoError> {
    if s == "*" {
        return Ok((1, 65535));
    }
    if let Some((lo, hi)) = s.split_once('-') {
        let lo: u16 = lo
            .parse()
            .map_err(|_| ProtoError::malformed("ExitPolicyRule", s))?;
        let hi: u16 = hi
            .parse()
            .map_err(|_| ProtoError::malformed("ExitPolicyRule", s))?;
        return Ok((lo, hi));
    }
    let port: u16 = s
        .parse()
        .map_err(|_| ProtoError::malformed("ExitPolicyRule", s))?;
    Ok((port, port))
}

fn ipv4_in_range(probe: Ipv4Addr, rule: Ipv4Addr, bits: u8) -> bool {
    if bits == 0 {
        return true;
    }
    let mask = u32::MAX << (32 - bits);
    (u32::from(probe) & mask) == (u32::from(rule) & mask)
}

fn ipv6_in_range(probe: Ipv6Addr, rule: Ipv6Addr, bits: u8) -> bool {
    if bits == 0 {
        return true;
    }
    let mask = u128::MAX << (128 - bits);
    (u128::from(probe) & mask) == (u128::from(rule) & mask)
}

/// An ordered list of rules plus a default action used when nothing
/// matches. First match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitPolicy {
    pub rules: Vec<ExitPolicyRule>,
    pub default_allowed: bool,
}

impl ExitPolicy {
    /// Parses an ordered list of rule lines. `default_allowed` governs the
    /// fallback when no rule matches (Tor's own default is `reject`).
    pub fn parse<'a>(
        lines: impl IntoIterator<Item = &'a str>,
        default_allowed: bool,
    ) -> Result<Self, ProtoError> {
        let rules = lines
            .into_iter()
            .map(ExitPolicyRule::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ExitPolicy {
            rules,
            default_allowed,
        })
    }

    pub fn can_exit_to(&self, address: IpAddr, port: u16) -> bool {
        for rule in &self.rules {
            if rule.matches(address, port) {
                return rule.accept;
            }
        }
        self.default_allowed
    }

    /// True if any port can plausibly exit under this policy.
    pub fn is_exiting_allowed(&self) -> bool {
        self.rules.iter().any(|r| r.accept) || self.default_allowed
    }

    /// Condenses a policy to the `"accept 80, 443"` / `"reject 80, 443"`
    /// form: the ports covered by the first rule's verb, assuming later
    /// rules only narrow a wildcard address (the common torrc-free case
    /// this crate's exit-pattern form targets).
    pub fn summary(&self) -> String {
        let Some(first) = self.rules.first() else {
            return if self.default_allowed {
                "accept *".to_owned()
            } else {
                "reject *".to_owned()
            };
        };
        let verb = if first.accept { "accept" } else { "reject" };
        let ports: Vec<String> = self
            .rules
            .iter()
            .take_while(|r| r.accept == first.accept)
            .map(|r| {
                if r.min_port == r.max_port {
                    r.min_port.to_string()
                } else {
                    format!("{}-{}", r.min_port, r.max_port)
                }
            })
            .collect();
        format!("{verb} {}", ports.join(", "))
    }
}

impl fmt::Display for ExitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.rules.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join(", "))
    }
}

/// The compact `accept/reject PORT,PORT` form used in microdescriptors:
/// address-independent, port-set-only policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrodescriptorExitPolicy {
    pub accept: bool,
    pub ports: Vec<(u16, u16)>,
}

impl MicrodescriptorExitPolicy {
    pub fn parse(s: &str) -> Result<Self, ProtoError> {
        let s = s.trim();
        let (verb, rest) = s
            .split_once(' ')
            .ok_or_else(|| ProtoError::malformed("MicrodescriptorExitPolicy", s))?;
        let accept = match verb {
            "accept" => true,
            "reject" => false,
            _ => return Err(ProtoError::malformed("MicrodescriptorExitPolicy", s)),
        };
        let ports = rest
            .split(',')
            .map(parse_port_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MicrodescriptorExitPolicy { accept, ports })
    }

    pub fn can_exit_to(&self, port: u16) -> bool {
        let in_ports = self.ports.iter().any(|&(lo, hi)| port >= lo && port <= hi);
        in_ports == self.accept
    }
}

impl fmt::Display for MicrodescriptorExitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.accept { "accept" } else { "reject" };
        let ports: Vec<String> = self
            .ports
            .iter()
            .map(|&(lo, hi)| {
                if lo == hi {
                    lo.to_string()
                } else {
                    format!("{lo}-{hi}")
                }
            })
            .collect();
        write!(f, "{verb} {}", ports.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_1_exit_policy_summary_and_reachability() {
        let policy = ExitPolicy::parse(["accept *:80", "accept *:443", "reject *:*"], false)
            .unwrap();
        assert_eq!(policy.summary(), "accept 80, 443");
        let probe: IpAddr = "75.119.206.243".parse().unwrap();
        assert!(policy.can_exit_to(probe, 80));
        assert!(!policy.can_exit_to(probe, 22));
    }

    #[test]
    fn scenario_2_microdescriptor_policy() {
        let policy = MicrodescriptorExitPolicy::parse("accept 80,443").unwrap();
        let any: IpAddr = "1.2.3.4".parse().unwrap();
        let _ = any;
        assert!(policy.can_exit_to(443));
        assert!(!policy.can_exit_to(22));
        assert_eq!(policy.to_string(), "accept 80,443");
    }

    #[test]
    fn first_match_wins() {
        let policy = ExitPolicy::parse(["reject 1.2.3.4:*", "accept *:*"], false).unwrap();
        let probe: IpAddr = "1.2.3.4".parse().unwrap();
        assert!(!policy.can_exit_to(probe, 80));
        let other: IpAddr = "5.6.7.8".parse().unwrap();
        assert!(policy.can_exit_to(other, 80));
    }

    #[test]
    fn ipv4_cidr_mask() {
        let rule = ExitPolicyRule::parse("accept 10.0.0.0/24:*").unwrap();
        assert!(rule.matches("10.0.0.5".parse().unwrap(), 80));
        assert!(!rule.matches("10.0.1.5".parse().unwrap(), 80));
    }

    #[test]
    fn ipv6_bracket_form() {
        let rule = ExitPolicyRule::parse("accept [2001:db8::]/32:443").unwrap();
        assert!(rule.matches("2001:db8::1".parse().unwrap(), 443));
        assert!(!rule.matches("2001:db9::1".parse().unwrap(), 443));
        assert!(!rule.matches("2001:db8::1".parse().unwrap(), 80));
    }

    #[test]
    fn default_allowed_used_when_nothing_matches() {
        let policy = ExitPolicy::parse(["reject 1.2.3.4:*"], true).unwrap();
        let other: IpAddr = "5.6.7.8".parse().unwrap();
        assert!(policy.can_exit_to(other, 80));
    }

    #[test]
    fn rejects_malformed_rule() {
        assert!(ExitPolicyRule::parse("maybe *:80").is_err());
        assert!(ExitPolicyRule::parse("accept *").is_err());
        assert!(ExitPolicyRule::parse("accept *:99999").is_err());
    }

    #[test]
    fn is_exiting_allowed() {
        let allow_some = ExitPolicy::parse(["accept *:80", "reject *:*"], false).unwrap();
        assert!(allow_some.is_exiting_allowed());
        let allow_none = ExitPolicy::parse(["reject *:*"], false).unwrap();
        assert!(!allow_none.is_exiting_allowed());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let rule = ExitPolicyRule::parse("accept 10.0.0.0/24:80-90").unwrap();
        let rendered = rule.to_string();
        let reparsed = ExitPolicyRule::parse(&rendered).unwrap();
        assert_eq!(rule, reparsed);
    }
}
