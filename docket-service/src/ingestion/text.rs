//! Plain text and markdown decoding.

use std::borrow::Cow;
use tracing::debug;

/// Decode as UTF-8, falling back to Latin-1 on invalid input
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text.strip_prefix('\u{feff}').unwrap_or(text)),
        Err(e) => {
            debug!(valid_up_to = e.valid_up_to(), "Text is not UTF-8, decoding as Latin-1");
            encoding_rs::mem::decode_latin1(bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8() {
        assert_eq!(decode_text("Überlingen §1983".as_bytes()), "Überlingen §1983");
    }

    #[test]
    fn test_strips_bom() {
        assert_eq!(decode_text(b"\xef\xbb\xbfhello"), "hello");
    }

    #[test]
    fn test_latin1_fallback() {
        // "café §" in ISO-8859-1
        assert_eq!(decode_text(b"caf\xe9 \xa7"), "café §");
    }
}
