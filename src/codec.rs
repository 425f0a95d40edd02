//! Byte/text boundary between uploads and the inference engine.
//!
//! Standard alphabet with padding, so `decode(encode(b)) == b` for every buffer.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("empty base64 payload")]
    Empty,
    #[error(transparent)]
    Decode(#[from] base64::DecodeError),
}

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode(text: &str) -> Result<Vec<u8>, CodecError> {
    Ok(STANDARD.decode(text)?)
}

/// Verifies an outbound payload is non-empty padded standard base64 by
/// decoding it; the decoded bytes are discarded.
pub fn check_payload(text: &str) -> Result<(), CodecError> {
    if text.is_empty() {
        return Err(CodecError::Empty);
    }
    decode(text).map(|_| ())
}

/// Short form of a large payload for log lines.
pub fn preview(text: &str) -> String {
    if text.len() > 50 {
        format!("{}...[{} chars total]", &text[..50], text.len())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(4099).collect();
        assert_eq!(decode(&encode(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn round_trips_empty_buffer() {
        assert_eq!(encode(&[]), "");
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn round_trips_at_upload_limit() {
        let bytes = vec![0xA5u8; 10 * 1024 * 1024];
        let encoded = encode(&bytes);
        assert!(check_payload(&encoded).is_ok());
        assert_eq!(decode(&encoded).unwrap(), bytes);
    }

    #[test]
    fn uses_padded_standard_alphabet() {
        assert_eq!(encode(b"leaf"), "bGVhZg==");
        assert_eq!(encode(&[0xfb, 0xff]), "+/8=");
    }

    #[test]
    fn check_rejects_bad_shapes() {
        assert!(matches!(check_payload(""), Err(CodecError::Empty)));
        assert!(matches!(check_payload("abc"), Err(CodecError::Decode(_))));
        assert!(matches!(check_payload("ab-_"), Err(CodecError::Decode(_))));
        assert!(matches!(check_payload("bGVhZg"), Err(CodecError::Decode(_))));
        assert!(check_payload("bGVhZg==").is_ok());
    }

    #[test]
    fn decode_reports_invalid_input() {
        assert!(matches!(decode("!!!!"), Err(CodecError::Decode(_))));
    }

    #[test]
    fn preview_truncates_long_payloads() {
        let long = "A".repeat(120);
        assert_eq!(preview(&long), format!("{}...[120 chars total]", "A".repeat(50)));
        assert_eq!(preview("short"), "short");
    }
}
