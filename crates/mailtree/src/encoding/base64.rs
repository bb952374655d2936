//! Streaming base64 (RFC 2045 section 6.8).

use ::base64::Engine;
use ::base64::alphabet;
use ::base64::engine::general_purpose::STANDARD;
use ::base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

/// Maximum encoded line length.
const LINE_LENGTH: usize = 76;

/// Decoding engine that tolerates missing padding and stray trailing bits.
pub(crate) const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

const fn in_alphabet(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'+' || byte == b'/'
}

#[derive(Debug, Default, Clone)]
pub(super) struct Base64Encoder {
    pending: Vec<u8>,
    column: usize,
}

impl Base64Encoder {
    fn emit(&mut self, encoded: &str, out: &mut Vec<u8>) {
        for byte in encoded.bytes() {
            if self.column == LINE_LENGTH {
                out.push(b'\n');
                self.column = 0;
            }
            out.push(byte);
            self.column += 1;
        }
    }

    pub(super) fn step(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.pending.extend_from_slice(input);
        let whole = self.pending.len() / 3 * 3;
        if whole == 0 {
            return;
        }
        let encoded = STANDARD.encode(&self.pending[..whole]);
        self.pending.drain(..whole);
        self.emit(&encoded, out);
    }

    pub(super) fn flush(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.step(input, out);
        if !self.pending.is_empty() {
            let encoded = STANDARD.encode(&self.pending);
            self.emit(&encoded, out);
        }
        if self.column > 0 {
            out.push(b'\n');
        }
        self.reset();
    }

    pub(super) fn reset(&mut self) {
        self.pending.clear();
        self.column = 0;
    }

    pub(super) const fn outlen(inlen: usize) -> usize {
        let chars = (inlen + 5) / 3 * 4;
        chars + chars / LINE_LENGTH + 2
    }
}

#[derive(Debug, Default, Clone)]
pub(super) struct Base64Decoder {
    quad: Vec<u8>,
    finished: bool,
}

impl Base64Decoder {
    fn decode_quad(&mut self, out: &mut Vec<u8>) {
        if self.quad.len() > 1 {
            if let Err(e) = LENIENT.decode_vec(&self.quad, out) {
                tracing::trace!(?e, "dropping undecodable base64 group");
            }
        }
        self.quad.clear();
    }

    pub(super) fn step(&mut self, input: &[u8], out: &mut Vec<u8>) {
        if self.finished {
            return;
        }
        for &byte in input {
            if byte == b'=' {
                self.decode_quad(out);
                self.finished = true;
                return;
            }
            if !in_alphabet(byte) {
                continue;
            }
            self.quad.push(byte);
            if self.quad.len() == 4 {
                self.decode_quad(out);
            }
        }
    }

    pub(super) fn flush(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.step(input, out);
        self.decode_quad(out);
        self.reset();
    }

    pub(super) fn reset(&mut self) {
        self.quad.clear();
        self.finished = false;
    }

    pub(super) const fn outlen(inlen: usize) -> usize {
        (inlen + 3) / 4 * 3 + 3
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn encode(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        Base64Encoder::default().flush(data, &mut out);
        out
    }

    fn decode(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        Base64Decoder::default().flush(data, &mut out);
        out
    }

    #[test]
    fn test_encode_short() {
        assert_eq!(encode(b"Hello, World!"), b"SGVsbG8sIFdvcmxkIQ==\n");
        assert_eq!(encode(b""), b"");
    }

    #[test]
    fn test_encode_wraps_at_76() {
        let out = encode(&[0u8; 120]);
        let lines: Vec<&[u8]> = out.split(|&b| b == b'\n').collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].len(), 76);
        assert_eq!(lines[1].len(), 76);
        assert_eq!(lines[2].len(), 8);
        assert!(lines[3].is_empty());
    }

    #[test]
    fn test_encode_chunked_matches_oneshot() {
        let data: Vec<u8> = (0..=255).collect();
        let mut enc = Base64Encoder::default();
        let mut out = Vec::new();
        for chunk in data.chunks(7) {
            enc.step(chunk, &mut out);
        }
        enc.flush(&[], &mut out);
        assert_eq!(out, encode(&data));
    }

    #[test]
    fn test_decode_ignores_garbage() {
        assert_eq!(decode(b"SGVs\r\nbG8s IFdv*cmxk\tIQ=="), b"Hello, World!");
    }

    #[test]
    fn test_decode_stops_at_padding() {
        assert_eq!(decode(b"SGk=SGk="), b"Hi");
    }

    #[test]
    fn test_decode_missing_padding() {
        assert_eq!(decode(b"SGk"), b"Hi");
        assert_eq!(decode(b"SGVsbG8"), b"Hello");
    }

    #[test]
    fn test_outlen_bounds() {
        let data = vec![0xa5u8; 1000];
        assert!(encode(&data).len() <= Base64Encoder::outlen(1000));
        let encoded = encode(&data);
        assert!(decode(&encoded).len() <= Base64Decoder::outlen(encoded.len()));
    }
}
