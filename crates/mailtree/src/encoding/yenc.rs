//! Streaming yEnc body encoding.
//!
//! Only the data lines are produced and consumed; `=ybegin`, `=ypart` and
//! `=yend` control lines are skipped by the decoder and left to the caller
//! when encoding.

/// Encoded line length.
const LINE_LENGTH: usize = 128;

const OFFSET: u8 = 42;
const ESCAPE_OFFSET: u8 = 64;

#[derive(Debug, Default, Clone)]
pub(super) struct YencEncoder {
    column: usize,
}

impl YencEncoder {
    const fn needs_escape(&self, encoded: u8) -> bool {
        match encoded {
            0 | b'\n' | b'\r' | b'=' => true,
            b'\t' | b' ' => self.column == 0 || self.column >= LINE_LENGTH - 1,
            b'.' => self.column == 0,
            _ => false,
        }
    }

    pub(super) fn step(&mut self, input: &[u8], out: &mut Vec<u8>) {
        for &byte in input {
            let encoded = byte.wrapping_add(OFFSET);
            if self.needs_escape(encoded) {
                out.push(b'=');
                out.push(encoded.wrapping_add(ESCAPE_OFFSET));
                self.column += 2;
            } else {
                out.push(encoded);
                self.column += 1;
            }
            if self.column >= LINE_LENGTH {
                out.push(b'\n');
                self.column = 0;
            }
        }
    }

    pub(super) fn flush(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.step(input, out);
        if self.column > 0 {
            out.push(b'\n');
        }
        self.reset();
    }

    pub(super) const fn reset(&mut self) {
        self.column = 0;
    }

    pub(super) const fn outlen(inlen: usize) -> usize {
        inlen * 2 + inlen / (LINE_LENGTH / 2) + 2
    }
}

#[derive(Debug, Clone)]
pub(super) struct YencDecoder {
    line_start: bool,
    escape: bool,
    escape_at_line_start: bool,
    in_control_line: bool,
}

impl Default for YencDecoder {
    fn default() -> Self {
        Self {
            line_start: true,
            escape: false,
            escape_at_line_start: false,
            in_control_line: false,
        }
    }
}

impl YencDecoder {
    pub(super) fn step(&mut self, input: &[u8], out: &mut Vec<u8>) {
        for &byte in input {
            if self.in_control_line {
                if byte == b'\n' {
                    self.in_control_line = false;
                    self.line_start = true;
                }
                continue;
            }
            if self.escape {
                self.escape = false;
                if self.escape_at_line_start && byte == b'y' {
                    self.in_control_line = true;
                    continue;
                }
                out.push(byte.wrapping_sub(ESCAPE_OFFSET).wrapping_sub(OFFSET));
                continue;
            }
            match byte {
                b'\n' => self.line_start = true,
                b'\r' => {}
                b'=' => {
                    self.escape = true;
                    self.escape_at_line_start = self.line_start;
                    self.line_start = false;
                }
                _ => {
                    out.push(byte.wrapping_sub(OFFSET));
                    self.line_start = false;
                }
            }
        }
    }

    pub(super) fn flush(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.step(input, out);
        self.reset();
    }

    pub(super) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(super) const fn outlen(inlen: usize) -> usize {
        inlen
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

    #[test]
    fn test_escapes_critical_bytes() {
        let mut out = Vec::new();
        // 0xd6 + 42 wraps to NUL, 0xe0 to LF, 0xe3 to CR, 0x13 to '='.
        YencEncoder::default().flush(&[0xd6, 0xe0, 0xe3, 0x13, b'A'], &mut out);
        assert_eq!(out, b"=@=J=M=}k\n");
    }

    #[test]
    fn test_line_length() {
        let mut out = Vec::new();
        YencEncoder::default().flush(&[b'a'; 300], &mut out);
        let lines: Vec<&[u8]> = out.split(|&b| b == b'\n').collect();
        assert_eq!(lines[0].len(), 128);
        assert_eq!(lines[1].len(), 128);
        assert_eq!(lines[2].len(), 44);
    }

    #[test]
    fn test_decoder_skips_control_lines() {
        let input = b"=ybegin line=128 size=2 name=x\r\nkl\r\n=yend size=2\r\n";
        let mut out = Vec::new();
        YencDecoder::default().flush(input, &mut out);
        assert_eq!(out, b"AB");
    }

    #[test]
    fn test_roundtrip_all_bytes() {
        let data: Vec<u8> = (0..=255).cycle().take(1024).collect();
        let mut encoded = Vec::new();
        YencEncoder::default().flush(&data, &mut encoded);
        let mut decoded = Vec::new();
        YencDecoder::default().flush(&encoded, &mut decoded);
        assert_eq!(decoded, data);
    }
}
