use crate::error::{WireError, WireResult};

/// The divider character separating a reply line's status code from its
/// content: `-` for a mid-reply line, `+` for the start of a data payload,
/// and ` ` (space) for the terminal line of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divider {
    MidReply,
    Data,
    End,
}

impl Divider {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'-' => Some(Divider::MidReply),
            b'+' => Some(Divider::Data),
            b' ' => Some(Divider::End),
            _ => None,
        }
    }
}

/// One line read off the control port, already stripped of its trailing
/// CRLF: a 3-digit status code, a divider, and the remaining content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    pub code: u16,
    pub divider: Divider,
    pub content: String,
}

impl ReplyLine {
    /// Parses a single CRLF-stripped line per the control-port header
    /// format: 3 ASCII digits, one divider byte, then arbitrary content.
    pub fn parse(line: &str) -> WireResult<Self> {
        let bytes = line.as_bytes();
        if bytes.len() < 4 || !bytes[..3].iter().all(u8::is_ascii_digit) {
            return Err(WireError::MalformedHeader(line.to_owned()));
        }
        let divider = Divider::from_byte(bytes[3])
            .ok_or_else(|| WireError::MalformedHeader(line.to_owned()))?;
        // unwrap: bytes[..3] validated as ASCII digits above.
        let code: u16 = line[..3].parse().unwrap();
        Ok(ReplyLine {
            code,
            divider,
            content: line[4..].to_owned(),
        })
    }
}

/// Serializes a command string into the bytes written to the control port:
/// the command verbatim, followed by CRLF.
pub fn encode_command(command: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(command.len() + 2);
    out.extend_from_slice(command.as_bytes());
    out.extend_from_slice(b"\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_end_line() {
        let line = ReplyLine::parse("250 OK").unwrap();
        assert_eq!(line.code, 250);
        assert_eq!(line.divider, Divider::End);
        assert_eq!(line.content, "OK");
    }

    #[test]
    fn parses_mid_reply_line() {
        let line = ReplyLine::parse("250-PROTOCOLINFO 1").unwrap();
        assert_eq!(line.divider, Divider::MidReply);
        assert_eq!(line.content, "PROTOCOLINFO 1");
    }

    #[test]
    fn parses_data_line() {
        let line = ReplyLine::parse("250+info/names=").unwrap();
        assert_eq!(line.divider, Divider::Data);
        assert_eq!(line.content, "info/names=");
    }

    #[test]
    fn empty_content_is_allowed() {
        let line = ReplyLine::parse("250 ").unwrap();
        assert_eq!(line.content, "");
    }

    #[test]
    fn rejects_short_line() {
        assert!(ReplyLine::parse("25").is_err());
        assert!(ReplyLine::parse("250").is_err());
    }

    #[test]
    fn rejects_non_numeric_code() {
        assert!(ReplyLine::parse("25X OK").is_err());
    }

    #[test]
    fn rejects_unknown_divider() {
        assert!(ReplyLine::parse("250:OK").is_err());
    }

    #[test]
    fn encode_appends_crlf() {
        assert_eq!(encode_command("GETINFO version"), b"GETINFO version\r\n");
    }
}
