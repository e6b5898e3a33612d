//! Message Formatter
//!
//! Renders messages as `[HH:mm:ss.fff] <payload>` lines. Payloads are encoded
//! straight into the output buffer, so rendering a batch costs one allocation
//! at most, and none once a [`MessageFormatter`] buffer has grown to size.

use crate::encoding::DisplayEncoding;
use crate::error::FormatError;
use crate::time::{write_timestamp, TIMESTAMP_LEN};
use serial_protocol::Message;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Formatter that keeps its output buffer between calls
#[derive(Debug, Default)]
pub struct MessageFormatter {
    buffer: String,
}

impl MessageFormatter {
    /// Create a formatter with an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Render a batch into the reused buffer and borrow the result
    pub fn render(&mut self, messages: &[Message], encoding: DisplayEncoding) -> &str {
        self.buffer.clear();
        self.buffer.reserve(estimate_len(messages, encoding));
        write_messages(&mut self.buffer, messages, encoding);
        &self.buffer
    }

    /// Bytes currently reserved by the reused buffer
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }
}

/// Render a batch, one line per message, in order
pub fn format_messages(messages: &[Message], encoding: DisplayEncoding) -> String {
    let mut out = String::with_capacity(estimate_len(messages, encoding));
    write_messages(&mut out, messages, encoding);
    out
}

/// Render a batch with the encoding given by name
pub fn format_messages_as(messages: &[Message], encoding: &str) -> Result<String, FormatError> {
    let encoding: DisplayEncoding = encoding.parse()?;
    Ok(format_messages(messages, encoding))
}

/// Append one line per message to `out`
pub fn write_messages(out: &mut String, messages: &[Message], encoding: DisplayEncoding) {
    for message in messages {
        write_message(out, message, encoding);
        out.push('\n');
    }
}

/// Render a single message without a line terminator
pub fn format_message(message: &Message, encoding: DisplayEncoding) -> String {
    let mut out = String::with_capacity(TIMESTAMP_LEN + 1 + encoded_len(message.len(), encoding));
    write_message(&mut out, message, encoding);
    out
}

fn write_message(out: &mut String, message: &Message, encoding: DisplayEncoding) {
    write_timestamp(out, &message.timestamp());
    out.push(' ');
    write_payload(out, message.payload(), encoding);
}

/// Append `payload` rendered with `encoding`
pub fn write_payload(out: &mut String, payload: &[u8], encoding: DisplayEncoding) {
    match encoding {
        DisplayEncoding::Ascii => {
            out.extend(payload.iter().map(|&b| if b.is_ascii() { char::from(b) } else { '?' }));
        }
        DisplayEncoding::Utf8 => out.push_str(&String::from_utf8_lossy(payload)),
        DisplayEncoding::Hex => write_hex(out, payload),
    }
}

/// Uppercase byte pairs separated by single spaces; empty input yields nothing
pub fn encode_hex(payload: &[u8]) -> String {
    let mut out = String::with_capacity(encoded_len(payload.len(), DisplayEncoding::Hex));
    write_hex(&mut out, payload);
    out
}

fn write_hex(out: &mut String, payload: &[u8]) {
    for (i, &byte) in payload.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push(char::from(HEX_DIGITS[usize::from(byte >> 4)]));
        out.push(char::from(HEX_DIGITS[usize::from(byte & 0x0F)]));
    }
}

/// Inverse of [`encode_hex`]
pub fn parse_hex_pairs(text: &str) -> Result<Vec<u8>, FormatError> {
    text.split_whitespace()
        .map(|pair| {
            if pair.len() == 2 && pair.bytes().all(|b| b.is_ascii_hexdigit()) {
                u8::from_str_radix(pair, 16).map_err(|_| FormatError::InvalidHexPair(pair.to_string()))
            } else {
                Err(FormatError::InvalidHexPair(pair.to_string()))
            }
        })
        .collect()
}

fn encoded_len(payload_len: usize, encoding: DisplayEncoding) -> usize {
    match encoding {
        DisplayEncoding::Hex => (payload_len * 3).saturating_sub(1),
        DisplayEncoding::Ascii | DisplayEncoding::Utf8 => payload_len,
    }
}

fn estimate_len(messages: &[Message], encoding: DisplayEncoding) -> usize {
    messages
        .iter()
        .map(|m| TIMESTAMP_LEN + 2 + encoded_len(m.len(), encoding))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use proptest::prelude::*;
    use serial_protocol::Origin;

    fn at(h: u32, m: u32, s: u32, ms: u32, payload: &[u8]) -> Message {
        let ts = Local
            .with_ymd_and_hms(2024, 3, 1, h, m, s)
            .single()
            .unwrap()
            + chrono::Duration::milliseconds(i64::from(ms));
        Message::with_timestamp(payload.to_vec(), Origin::Received, ts)
    }

    #[test]
    fn test_hex_encoding() {
        assert_eq!(encode_hex(&[]), "");
        assert_eq!(encode_hex(&[0x0A]), "0A");
        assert_eq!(encode_hex(&[0x01, 0xFF, 0x00]), "01 FF 00");
    }

    #[test]
    fn test_ascii_replaces_high_bytes() {
        let mut out = String::new();
        write_payload(&mut out, &[b'O', b'K', 0xC3, 0xA9], DisplayEncoding::Ascii);
        assert_eq!(out, "OK??");
    }

    #[test]
    fn test_utf8_decodes_multibyte() {
        let mut out = String::new();
        write_payload(&mut out, "café".as_bytes(), DisplayEncoding::Utf8);
        assert_eq!(out, "café");

        out.clear();
        write_payload(&mut out, &[b'a', 0xFF], DisplayEncoding::Utf8);
        assert_eq!(out, "a\u{FFFD}");
    }

    #[test]
    fn test_format_messages_lines() {
        let messages = vec![
            at(9, 30, 0, 5, b"hello"),
            at(9, 30, 1, 250, &[0x02, 0x41, 0x03]),
        ];

        assert_eq!(
            format_messages(&messages, DisplayEncoding::Hex),
            "[09:30:00.005] 68 65 6C 6C 6F\n[09:30:01.250] 02 41 03\n"
        );
        assert_eq!(
            format_messages(&messages[..1], DisplayEncoding::Ascii),
            "[09:30:00.005] hello\n"
        );
        assert_eq!(format_messages(&[], DisplayEncoding::Utf8), "");
    }

    #[test]
    fn test_single_message_has_no_terminator() {
        let message = at(0, 0, 0, 0, b"");
        assert_eq!(format_message(&message, DisplayEncoding::Hex), "[00:00:00.000] ");
    }

    #[test]
    fn test_format_by_name_rejects_unknown() {
        let messages = vec![at(1, 2, 3, 4, b"x")];
        assert!(format_messages_as(&messages, "utf8").is_ok());
        assert_eq!(
            format_messages_as(&messages, "base64"),
            Err(FormatError::UnsupportedEncoding("base64".to_string()))
        );
    }

    #[test]
    fn test_formatter_reuses_buffer() {
        let messages: Vec<Message> = (0..64).map(|i| at(12, 0, 0, i, b"payload")).collect();
        let mut formatter = MessageFormatter::new();

        let first = formatter.render(&messages, DisplayEncoding::Hex).to_string();
        let capacity = formatter.buffer_capacity();
        let second = formatter.render(&messages, DisplayEncoding::Hex).to_string();

        assert_eq!(first, second);
        assert_eq!(formatter.buffer_capacity(), capacity);
        assert_eq!(first, format_messages(&messages, DisplayEncoding::Hex));
    }

    #[test]
    fn test_parse_hex_pairs_rejects_bad_tokens() {
        assert_eq!(parse_hex_pairs(""), Ok(vec![]));
        assert_eq!(parse_hex_pairs("0a FF"), Ok(vec![0x0A, 0xFF]));
        assert!(parse_hex_pairs("0AF").is_err());
        assert!(parse_hex_pairs("ZZ").is_err());
    }

    proptest! {
        #[test]
        fn prop_hex_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let encoded = encode_hex(&bytes);
            prop_assert!(!encoded.ends_with(' '));
            prop_assert!(!encoded.chars().any(|c| c.is_ascii_lowercase()));
            prop_assert_eq!(parse_hex_pairs(&encoded).unwrap(), bytes);
        }

        #[test]
        fn prop_every_line_starts_with_timestamp(count in 0usize..20) {
            let messages: Vec<Message> = (0..count).map(|_| Message::received(b"abc".to_vec())).collect();
            let text = format_messages(&messages, DisplayEncoding::Ascii);
            prop_assert_eq!(text.lines().count(), count);
            for line in text.lines() {
                let bytes = line.as_bytes();
                prop_assert_eq!(bytes[0], b'[');
                prop_assert_eq!(bytes[TIMESTAMP_LEN - 1], b']');
                prop_assert_eq!(&line[TIMESTAMP_LEN..], " abc");
            }
        }
    }
}
