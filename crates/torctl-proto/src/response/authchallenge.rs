use torctl_wire::{ParsedLine, ReplyMessage};

use crate::error::ProtoError;

/// A parsed `AUTHCHALLENGE` reply: the server's nonce and HMAC, decoded
/// from hex, used to complete the SAFECOOKIE handshake (spec.md §4.9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallengeResponse {
    pub server_hash: Vec<u8>,
    pub server_nonce: Vec<u8>,
}

pub fn parse(msg: &ReplyMessage) -> Result<AuthChallengeResponse, ProtoError> {
    let last = msg.lines.last().expect("assembled replies are never empty");
    let (keyword, rest) = last.content.split_once(' ').unwrap_or((last.content.as_str(), ""));
    if keyword != "AUTHCHALLENGE" {
        return Err(ProtoError::malformed("AUTHCHALLENGE", format!("unexpected reply line {:?}", last.content)));
    }

    let cursor = ParsedLine::new(rest);
    let mut server_hash = None;
    let mut server_nonce = None;
    while cursor.peek_key().is_some() {
        let (key, value) = cursor
            .pop_mapping(false, false)
            .map_err(|e| ProtoError::malformed("AUTHCHALLENGE", e.to_string()))?;
        match key.as_str() {
            "SERVERHASH" => {
                server_hash = Some(
                    hex::decode(&value)
                        .map_err(|e| ProtoError::malformed("AUTHCHALLENGE", format!("bad SERVERHASH hex: {e}")))?,
                );
            }
            "SERVERNONCE" => {
                server_nonce = Some(
                    hex::decode(&value)
                        .map_err(|e| ProtoError::malformed("AUTHCHALLENGE", format!("bad SERVERNONCE hex: {e}")))?,
                );
            }
            _ => {}
        }
    }

    Ok(AuthChallengeResponse {
        server_hash: server_hash
            .ok_or_else(|| ProtoError::malformed("AUTHCHALLENGE", "missing SERVERHASH"))?,
        server_nonce: server_nonce
            .ok_or_else(|| ProtoError::malformed("AUTHCHALLENGE", "missing SERVERNONCE"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use torctl_wire::Assembler;

    #[test]
    fn parses_server_hash_and_nonce() {
        let mut asm = Assembler::new();
        let msg = asm
            .feed("250 AUTHCHALLENGE SERVERHASH=ABCDEF01 SERVERNONCE=10203040")
            .unwrap()
            .unwrap();
        let resp = parse(&msg).unwrap();
        assert_eq!(resp.server_hash, vec![0xAB, 0xCD, 0xEF, 0x01]);
        assert_eq!(resp.server_nonce, vec![0x10, 0x20, 0x30, 0x40]);
    }
}
