use crate::error::{WireError, WireResult};
use crate::line::{Divider, ReplyLine};

/// One line of a fully assembled [`ReplyMessage`].
///
/// For a `Data` line, `content` is the header content that preceded the
/// payload (e.g. `"info/names="`) and `payload` is the dot-unstuffed,
/// CRLF-normalized body captured up to the terminating `.` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledLine {
    pub code: u16,
    pub divider: Divider,
    pub content: String,
    pub payload: Option<String>,
}

/// A complete, non-empty sequence of lines sharing one status code,
/// terminated by an `End`-divider line. Remembers its raw wire form for
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyMessage {
    pub lines: Vec<AssembledLine>,
    pub raw: String,
}

impl ReplyMessage {
    /// The status code shared by every line of the reply.
    pub fn code(&self) -> u16 {
        self.lines[0].code
    }

    /// True if the reply's hundreds digit is 6 (an asynchronous event).
    pub fn is_event(&self) -> bool {
        self.code() / 100 == 6
    }
}

enum State {
    Idle,
    AwaitingHeader { code: u16, lines: Vec<AssembledLine> },
    Data {
        code: u16,
        lines: Vec<AssembledLine>,
        header_content: String,
        payload: Vec<String>,
    },
}

/// Consumes raw CRLF-stripped lines from the wire codec and emits complete
/// [`ReplyMessage`]s. Stateful across calls to [`Assembler::feed`]; one
/// assembler instance is used per connection (not per reply).
pub struct Assembler {
    state: State,
    raw: String,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Assembler {
            state: State::Idle,
            raw: String::new(),
        }
    }

    /// True if no reply is currently being assembled; safe point to observe
    /// a clean connection close.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    /// Feeds one raw line (CRLF already stripped by the codec). Returns
    /// `Some(message)` once a full reply has been assembled.
    pub fn feed(&mut self, raw_line: &str) -> WireResult<Option<ReplyMessage>> {
        self.raw.push_str(raw_line);
        self.raw.push_str("\r\n");

        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => self.feed_header(raw_line, None),
            State::AwaitingHeader { code, lines } => self.feed_header(raw_line, Some((code, lines))),
            State::Data {
                code,
                lines,
                header_content,
                mut payload,
            } => {
                if raw_line == "." {
                    let joined = payload.join("\n");
                    let mut lines = lines;
                    lines.push(AssembledLine {
                        code,
                        divider: Divider::Data,
                        content: header_content,
                        payload: Some(joined),
                    });
                    self.state = State::AwaitingHeader { code, lines };
                    Ok(None)
                } else {
                    let unstuffed = raw_line.strip_prefix("..").map_or_else(
                        || raw_line.to_owned(),
                        |rest| format!(".{rest}"),
                    );
                    payload.push(unstuffed);
                    self.state = State::Data {
                        code,
                        lines,
                        header_content,
                        payload,
                    };
                    Ok(None)
                }
            }
        }
    }

    /// Called when the underlying transport reaches EOF. Errors if a reply
    /// was left incomplete.
    pub fn on_eof(&self) -> WireResult<()> {
        match self.state {
            State::Idle => Ok(()),
            State::Data { .. } => Err(WireError::UnterminatedDataPayload),
            State::AwaitingHeader { .. } => Err(WireError::UnterminatedReply),
        }
    }

    fn feed_header(
        &mut self,
        raw_line: &str,
        in_progress: Option<(u16, Vec<AssembledLine>)>,
    ) -> WireResult<Option<ReplyMessage>> {
        let header = ReplyLine::parse(raw_line)?;
        if let Some((expected, _)) = &in_progress {
            if *expected != header.code {
                return Err(WireError::StatusCodeMismatch {
                    expected: *expected,
                    found: header.code,
                });
            }
        }
        let mut lines = in_progress.map_or_else(Vec::new, |(_, l)| l);

        match header.divider {
            Divider::End => {
                lines.push(AssembledLine {
                    code: header.code,
                    divider: Divider::End,
                    content: header.content,
                    payload: None,
                });
                let raw = std::mem::take(&mut self.raw);
                self.state = State::Idle;
                Ok(Some(ReplyMessage { lines, raw }))
            }
            Divider::MidReply => {
                lines.push(AssembledLine {
                    code: header.code,
                    divider: Divider::MidReply,
                    content: header.content,
                    payload: None,
                });
                self.state = State::AwaitingHeader {
                    code: header.code,
                    lines,
                };
                Ok(None)
            }
            Divider::Data => {
                self.state = State::Data {
                    code: header.code,
                    lines,
                    header_content: header.content,
                    payload: Vec::new(),
                };
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(lines: &[&str]) -> ReplyMessage {
        let mut asm = Assembler::new();
        let mut out = None;
        for line in lines {
            if let Some(msg) = asm.feed(line).unwrap() {
                out = Some(msg);
            }
        }
        out.expect("reply should have completed")
    }

    #[test]
    fn single_line_reply() {
        let msg = feed_all(&["250 OK"]);
        assert_eq!(msg.lines.len(), 1);
        assert_eq!(msg.code(), 250);
        assert!(!msg.is_event());
    }

    #[test]
    fn multi_line_reply_without_data() {
        let msg = feed_all(&["250-VERSION Tor=\"0.2.1.30\"", "250 OK"]);
        assert_eq!(msg.lines.len(), 2);
        assert_eq!(msg.lines[0].content, "VERSION Tor=\"0.2.1.30\"");
    }

    #[test]
    fn scenario_3_data_payload_then_ok() {
        let msg = feed_all(&[
            "250+info/names=",
            "desc/id/* -- Router descriptors by ID.",
            "desc/name/* -- Router descriptors by nickname.",
            ".",
            "250 OK",
        ]);
        assert_eq!(msg.lines.len(), 2);
        let data = &msg.lines[0];
        assert_eq!(data.content, "info/names=");
        assert_eq!(
            data.payload.as_deref(),
            Some(
                "desc/id/* -- Router descriptors by ID.\ndesc/name/* -- Router descriptors by nickname."
            )
        );
        assert_eq!(msg.lines[1].content, "OK");
    }

    #[test]
    fn dot_stuffing_is_reversed() {
        let msg = feed_all(&["250+data=", "..is stuffed", "plain", ".", "250 OK"]);
        assert_eq!(
            msg.lines[0].payload.as_deref(),
            Some(".is stuffed\nplain")
        );
    }

    #[test]
    fn code_mismatch_is_a_protocol_error() {
        let mut asm = Assembler::new();
        asm.feed("250-partial").unwrap();
        let err = asm.feed("251 OK").unwrap_err();
        assert!(matches!(err, WireError::StatusCodeMismatch { expected: 250, found: 251 }));
    }

    #[test]
    fn eof_mid_reply_is_an_error() {
        let mut asm = Assembler::new();
        asm.feed("250-partial").unwrap();
        assert!(asm.on_eof().is_err());
    }

    #[test]
    fn eof_mid_data_payload_is_an_error() {
        let mut asm = Assembler::new();
        asm.feed("250+data=").unwrap();
        asm.feed("some line").unwrap();
        assert!(asm.on_eof().is_err());
    }

    #[test]
    fn eof_between_replies_is_fine() {
        let asm = Assembler::new();
        assert!(asm.on_eof().is_ok());
    }

    #[test]
    fn event_code_is_detected() {
        let msg = feed_all(&["650 BW 15 25"]);
        assert!(msg.is_event());
    }
}
