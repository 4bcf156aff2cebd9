//! STOMP frame type with encode/decode.
//!
//! Layout on the wire:
//! `[command] LF ([header-name ":" header-value] LF)* LF [body] NUL`
//!
//! Encoding emits LF line endings; decoding accepts CRLF as well. Header
//! names and values are escaped per STOMP 1.2 (`\\`, `\n`, `\r`, `\c`)
//! on every frame except `CONNECT`/`CONNECTED`, whose headers STOMP
//! leaves unescaped for backward compatibility.
//!
//! # Invariants
//!
//! - A decoded frame always carries a known command.
//! - If a `content-length` header is present, the body is exactly that
//!   many bytes; otherwise the body runs to the first NUL.

use thiserror::Error;

/// Errors produced while decoding a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame contained no command line.
    #[error("missing command line")]
    MissingCommand,

    /// Command is not one the codec understands.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Header line had no `:` separator.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// Header contained an escape sequence STOMP 1.2 does not define.
    #[error("invalid escape sequence: \\{0}")]
    InvalidEscape(char),

    /// Command or header bytes were not valid UTF-8.
    #[error("invalid utf-8 in frame head")]
    InvalidUtf8,

    /// Frame body was not terminated by NUL.
    #[error("missing NUL terminator")]
    MissingTerminator,

    /// `content-length` header did not parse or did not match the body.
    #[error("bad content-length: {0}")]
    BadContentLength(String),
}

/// Frame commands the chat session exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Client handshake.
    Connect,
    /// Server handshake acknowledgment.
    Connected,
    /// Client publish to a destination.
    Send,
    /// Client opens a subscription.
    Subscribe,
    /// Client closes a subscription.
    Unsubscribe,
    /// Client graceful shutdown.
    Disconnect,
    /// Server delivery to a subscription.
    Message,
    /// Server receipt acknowledgment.
    Receipt,
    /// Server-reported error.
    Error,
}

impl Command {
    /// Wire name of the command.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "CONNECT" => Some(Self::Connect),
            "CONNECTED" => Some(Self::Connected),
            "SEND" => Some(Self::Send),
            "SUBSCRIBE" => Some(Self::Subscribe),
            "UNSUBSCRIBE" => Some(Self::Unsubscribe),
            "DISCONNECT" => Some(Self::Disconnect),
            "MESSAGE" => Some(Self::Message),
            "RECEIPT" => Some(Self::Receipt),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    /// Whether headers of this frame use STOMP 1.2 escaping.
    ///
    /// `CONNECT` and `CONNECTED` are exempt in STOMP 1.2.
    const fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

/// A complete STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command.
    pub command: Command,
    /// Headers in insertion order. Per STOMP, the first occurrence of a
    /// repeated header name wins.
    headers: Vec<(String, String)>,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl Frame {
    /// Create an empty frame for a command.
    #[must_use]
    pub const fn new(command: Command) -> Self {
        Self { command, headers: Vec::new(), body: Vec::new() }
    }

    /// Append a header (builder style).
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a body (builder style).
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header, if present.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    /// All headers in wire order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Encode the frame into wire bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let escape = self.command.escapes_headers();
        let mut out = Vec::with_capacity(64 + self.body.len());

        out.extend_from_slice(self.command.as_str().as_bytes());
        out.push(b'\n');
        for (name, value) in &self.headers {
            if escape {
                out.extend_from_slice(escape_header(name).as_bytes());
                out.push(b':');
                out.extend_from_slice(escape_header(value).as_bytes());
            } else {
                out.extend_from_slice(name.as_bytes());
                out.push(b':');
                out.extend_from_slice(value.as_bytes());
            }
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out.push(0);

        out
    }

    /// Decode a complete frame from wire bytes.
    pub fn decode(input: &[u8]) -> Result<Self, ProtocolError> {
        let head_end = find_head_end(input).ok_or(ProtocolError::MissingCommand)?;
        let head = str::from_utf8(&input[..head_end]).map_err(|_| ProtocolError::InvalidUtf8)?;

        let mut lines = head.lines();
        let command_line = lines.next().ok_or(ProtocolError::MissingCommand)?;
        if command_line.is_empty() {
            return Err(ProtocolError::MissingCommand);
        }
        let command = Command::parse(command_line)
            .ok_or_else(|| ProtocolError::UnknownCommand(command_line.to_string()))?;

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ProtocolError::MalformedHeader(line.to_string()))?;
            if command.escapes_headers() {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let frame = Self { command, headers, body: Vec::new() };
        let rest = &input[head_end..];
        let body = read_body(&frame, rest)?;

        Ok(Self { body, ..frame })
    }
}

/// Offset of the first byte after the blank line separating head and body.
fn find_head_end(input: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'\n' {
            if input.get(i + 1) == Some(&b'\n') {
                return Some(i + 2);
            }
            if input.get(i + 1) == Some(&b'\r') && input.get(i + 2) == Some(&b'\n') {
                return Some(i + 3);
            }
        }
        i += 1;
    }
    None
}

/// Extract the body, honoring `content-length` when present.
fn read_body(frame: &Frame, rest: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if let Some(raw) = frame.header_value("content-length") {
        let length: usize =
            raw.parse().map_err(|_| ProtocolError::BadContentLength(raw.to_string()))?;
        if rest.len() < length + 1 || rest[length] != 0 {
            return Err(ProtocolError::BadContentLength(format!(
                "declared {length}, frame has {} bytes before terminator",
                rest.len().saturating_sub(1)
            )));
        }
        return Ok(rest[..length].to_vec());
    }

    let nul = rest.iter().position(|&b| b == 0).ok_or(ProtocolError::MissingTerminator)?;
    Ok(rest[..nul].to_vec())
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(value: &str) -> Result<String, ProtocolError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            Some(other) => return Err(ProtocolError::InvalidEscape(other)),
            None => return Err(ProtocolError::InvalidEscape('\0')),
        }
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::proptest;

    use super::*;

    #[test]
    fn encode_send_frame() {
        let frame = Frame::new(Command::Send)
            .header("destination", "/app/chat")
            .header("content-type", "application/json")
            .with_body(br#"{"message":"hi"}"#.to_vec());

        let wire = frame.encode();

        assert_eq!(
            wire,
            b"SEND\ndestination:/app/chat\ncontent-type:application/json\n\n{\"message\":\"hi\"}\0"
        );
    }

    #[test]
    fn decode_message_frame() {
        let wire = b"MESSAGE\nsubscription:3\ndestination:/topic/chat/room-a\n\nhello\0";

        let frame = Frame::decode(wire).unwrap();

        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.header_value("subscription"), Some("3"));
        assert_eq!(frame.body, b"hello");
    }

    #[test]
    fn decode_accepts_crlf_line_endings() {
        let wire = b"CONNECTED\r\nversion:1.2\r\n\r\n\0";

        let frame = Frame::decode(wire).unwrap();

        assert_eq!(frame.command, Command::Connected);
        assert_eq!(frame.header_value("version"), Some("1.2"));
        assert!(frame.body.is_empty());
    }

    #[test]
    fn content_length_allows_nul_in_body() {
        let wire = b"MESSAGE\ncontent-length:3\n\na\0b\0";

        let frame = Frame::decode(wire).unwrap();

        assert_eq!(frame.body, b"a\0b");
    }

    #[test]
    fn content_length_mismatch_is_rejected() {
        let wire = b"MESSAGE\ncontent-length:10\n\nabc\0";

        assert!(matches!(Frame::decode(wire), Err(ProtocolError::BadContentLength(_))));
    }

    #[test]
    fn first_occurrence_of_repeated_header_wins() {
        let wire = b"MESSAGE\ndestination:first\ndestination:second\n\n\0";

        let frame = Frame::decode(wire).unwrap();

        assert_eq!(frame.header_value("destination"), Some("first"));
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(matches!(
            Frame::decode(b"NACK\n\n\0"),
            Err(ProtocolError::UnknownCommand(c)) if c == "NACK"
        ));
    }

    #[test]
    fn connect_headers_are_not_escaped() {
        // A bearer token may contain characters that look like escape
        // sequences; CONNECT headers pass through verbatim.
        let frame =
            Frame::new(Command::Connect).header("X-Authorization", "Bearer a\\b");

        let wire = frame.encode();
        let decoded = Frame::decode(&wire).unwrap();

        assert_eq!(decoded.header_value("X-Authorization"), Some("Bearer a\\b"));
    }

    #[test]
    fn undefined_escape_is_fatal() {
        let wire = b"MESSAGE\ndest:\\t\n\n\0";

        assert!(matches!(Frame::decode(wire), Err(ProtocolError::InvalidEscape('t'))));
    }

    proptest! {
        #[test]
        fn escaped_headers_roundtrip(name in "[a-z-]{1,12}", value in "[ -~]{0,32}") {
            let frame = Frame::new(Command::Send).header(name.clone(), value.clone());

            let decoded = Frame::decode(&frame.encode()).unwrap();

            assert_eq!(decoded.header_value(&name), Some(value.as_str()));
        }
    }
}
