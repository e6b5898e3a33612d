//! Outbound Text Parsing
//!
//! Text typed by the user is sent as raw bytes when every whitespace-separated
//! token has the form `$XX` (two hex digits), e.g. `$01 $FF`. Anything else is
//! sent as UTF-8.

/// Convert user input into the bytes to write
pub fn parse_to_bytes(input: &str) -> Vec<u8> {
    let tokens: Vec<&str> = input.split_whitespace().collect();

    if tokens.iter().all(|token| is_hex_token(token)) {
        tokens.iter().filter_map(|token| hex_token_value(token)).collect()
    } else {
        input.as_bytes().to_vec()
    }
}

fn is_hex_token(token: &str) -> bool {
    hex_token_value(token).is_some()
}

fn hex_token_value(token: &str) -> Option<u8> {
    let digits = token.strip_prefix('$')?;
    if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_tokens() {
        assert_eq!(parse_to_bytes("$01 $FF"), vec![0x01, 0xFF]);
        assert_eq!(parse_to_bytes("  $0a\t$Bc  "), vec![0x0A, 0xBC]);
    }

    #[test]
    fn test_mixed_tokens_fall_back_to_text() {
        assert_eq!(parse_to_bytes("$01 hello"), b"$01 hello".to_vec());
        assert_eq!(parse_to_bytes("$1 $02"), b"$1 $02".to_vec());
        assert_eq!(parse_to_bytes("$0G"), b"$0G".to_vec());
        assert_eq!(parse_to_bytes("$012"), b"$012".to_vec());
    }

    #[test]
    fn test_plain_text_is_utf8() {
        assert_eq!(parse_to_bytes("AT+GMR"), b"AT+GMR".to_vec());
        assert_eq!(parse_to_bytes("온도"), "온도".as_bytes().to_vec());
    }

    #[test]
    fn test_blank_input_yields_nothing() {
        assert!(parse_to_bytes("").is_empty());
        assert!(parse_to_bytes("   ").is_empty());
    }
}
