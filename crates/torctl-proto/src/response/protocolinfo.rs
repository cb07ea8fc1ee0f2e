use torctl_wire::{ParsedLine, ReplyMessage};

use crate::error::ProtoError;

/// An authentication method named in a PROTOCOLINFO `AUTH` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Null,
    Password,
    Cookie,
    SafeCookie,
}

impl AuthMethod {
    fn parse(token: &str) -> Result<Self, String> {
        match token {
            "NULL" => Ok(Self::Null),
            "HASHEDPASSWORD" => Ok(Self::Password),
            "COOKIE" => Ok(Self::Cookie),
            "SAFECOOKIE" => Ok(Self::SafeCookie),
            other => Err(other.to_owned()),
        }
    }
}

/// A parsed `PROTOCOLINFO` reply (spec.md §4.4, §8 scenario 6).
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolInfo {
    pub protocol_version: u32,
    pub auth_methods: Vec<AuthMethod>,
    pub unrecognized_auth_methods: Vec<String>,
    pub cookie_file: Option<String>,
    pub tor_version: Option<String>,
}

pub fn parse(msg: &ReplyMessage) -> Result<ProtocolInfo, ProtoError> {
    let mut protocol_version = None;
    let mut auth_methods = Vec::new();
    let mut unrecognized_auth_methods = Vec::new();
    let mut cookie_file = None;
    let mut tor_version = None;

    for line in &msg.lines {
        let content = &line.content;
        let (keyword, rest) = content.split_once(' ').unwrap_or((content.as_str(), ""));
        match keyword {
            "PROTOCOLINFO" => {
                protocol_version = Some(
                    rest.trim()
                        .parse()
                        .map_err(|_| ProtoError::malformed("PROTOCOLINFO", format!("non-numeric version: {rest:?}")))?,
                );
            }
            "AUTH" => {
                let cursor = ParsedLine::new(rest);
                while cursor.peek_key().is_some() {
                    let (key, value) = cursor
                        .pop_mapping(cursor.is_next_value_quoted(), true)
                        .map_err(|e| ProtoError::malformed("PROTOCOLINFO", e.to_string()))?;
                    match key.as_str() {
                        "METHODS" => {
                            for tok in value.split(',') {
                                match AuthMethod::parse(tok) {
                                    Ok(m) => auth_methods.push(m),
                                    Err(unknown) => unrecognized_auth_methods.push(unknown),
                                }
                            }
                        }
                        "COOKIEFILE" => cookie_file = Some(value),
                        _ => {}
                    }
                }
            }
            "VERSION" => {
                let cursor = ParsedLine::new(rest);
                if let Ok((key, value)) = cursor.pop_mapping(cursor.is_next_value_quoted(), true) {
                    if key == "Tor" {
                        tor_version = Some(value);
                    }
                }
            }
            "OK" | "" => {}
            _ => {}
        }
    }

    Ok(ProtocolInfo {
        protocol_version: protocol_version
            .ok_or_else(|| ProtoError::malformed("PROTOCOLINFO", "missing PROTOCOLINFO line"))?,
        auth_methods,
        unrecognized_auth_methods,
        cookie_file,
        tor_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use torctl_wire::Assembler;

    #[test]
    fn scenario_6_protocolinfo_reply() {
        let mut asm = Assembler::new();
        asm.feed("250-PROTOCOLINFO 1").unwrap();
        asm.feed("250-AUTH METHODS=COOKIE COOKIEFILE=\"/tmp/my data\\\\\\\"dir//control_auth_cookie\"").unwrap();
        asm.feed("250-VERSION Tor=\"0.2.1.30\"").unwrap();
        let msg = asm.feed("250 OK").unwrap().unwrap();

        let info = parse(&msg).unwrap();
        assert_eq!(info.protocol_version, 1);
        assert_eq!(info.auth_methods, vec![AuthMethod::Cookie]);
        assert_eq!(
            info.cookie_file.as_deref(),
            Some("/tmp/my data\\\"dir//control_auth_cookie")
        );
        assert_eq!(info.tor_version.as_deref(), Some("0.2.1.30"));
    }
}
