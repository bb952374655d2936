//! Streaming uuencode.

/// Bytes per encoded line.
const LINE_BYTES: usize = 45;

/// Name written on the `begin` line when none is given.
pub(super) const DEFAULT_NAME: &str = "unknown";

const fn enc(value: u8) -> u8 {
    let value = value & 0x3f;
    if value == 0 { b'`' } else { value + b' ' }
}

const fn dec(byte: u8) -> u8 {
    byte.wrapping_sub(b' ') & 0x3f
}

#[derive(Debug, Clone)]
pub(super) struct UuEncoder {
    name: String,
    began: bool,
    line: Vec<u8>,
}

impl Default for UuEncoder {
    fn default() -> Self {
        Self::with_name(DEFAULT_NAME)
    }
}

impl UuEncoder {
    pub(super) fn with_name(name: &str) -> Self {
        Self {
            name: name.to_string(),
            began: false,
            line: Vec::with_capacity(LINE_BYTES),
        }
    }

    fn begin(&mut self, out: &mut Vec<u8>) {
        if !self.began {
            out.extend_from_slice(b"begin 644 ");
            out.extend_from_slice(self.name.as_bytes());
            out.push(b'\n');
            self.began = true;
        }
    }

    fn encode_line(chunk: &[u8], out: &mut Vec<u8>) {
        #[allow(clippy::cast_possible_truncation)]
        out.push(enc(chunk.len() as u8));
        for group in chunk.chunks(3) {
            let b0 = group[0];
            let b1 = group.get(1).copied().unwrap_or(0);
            let b2 = group.get(2).copied().unwrap_or(0);
            out.push(enc(b0 >> 2));
            out.push(enc((b0 << 4) | (b1 >> 4)));
            out.push(enc((b1 << 2) | (b2 >> 6)));
            out.push(enc(b2));
        }
        out.push(b'\n');
    }

    pub(super) fn step(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.begin(out);
        let mut input = input;
        while !input.is_empty() {
            let take = (LINE_BYTES - self.line.len()).min(input.len());
            self.line.extend_from_slice(&input[..take]);
            input = &input[take..];
            if self.line.len() == LINE_BYTES {
                Self::encode_line(&self.line, out);
                self.line.clear();
            }
        }
    }

    pub(super) fn flush(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.step(input, out);
        if !self.line.is_empty() {
            Self::encode_line(&self.line, out);
        }
        out.extend_from_slice(b"`\nend\n");
        self.reset();
    }

    pub(super) fn reset(&mut self) {
        self.began = false;
        self.line.clear();
    }

    pub(super) fn outlen(&self, inlen: usize) -> usize {
        let lines = inlen / LINE_BYTES + 2;
        lines * 62 + self.name.len() + 20
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum UuState {
    #[default]
    BeforeBegin,
    Body,
    Done,
}

#[derive(Debug, Default, Clone)]
pub(super) struct UuDecoder {
    state: UuState,
    line: Vec<u8>,
}

impl UuDecoder {
    fn process_line(&mut self, out: &mut Vec<u8>) {
        let mut line = std::mem::take(&mut self.line);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        match self.state {
            UuState::BeforeBegin => {
                if line.starts_with(b"begin ") {
                    self.state = UuState::Body;
                }
            }
            UuState::Body => {
                if line == b"end" {
                    self.state = UuState::Done;
                } else if let Some(&first) = line.first() {
                    Self::decode_line(first, &line[1..], out);
                }
            }
            UuState::Done => {}
        }
        line.clear();
        self.line = line;
    }

    fn decode_line(first: u8, body: &[u8], out: &mut Vec<u8>) {
        let count = usize::from(dec(first));
        if count == 0 {
            return;
        }
        let needed = count.div_ceil(3) * 4;
        if body.len() < needed {
            tracing::trace!(count, len = body.len(), "skipping short uuencoded line");
            return;
        }
        let start = out.len();
        for group in body[..needed].chunks(4) {
            let c0 = dec(group[0]);
            let c1 = dec(group[1]);
            let c2 = dec(group[2]);
            let c3 = dec(group[3]);
            out.push((c0 << 2) | (c1 >> 4));
            out.push((c1 << 4) | (c2 >> 2));
            out.push((c2 << 6) | c3);
        }
        out.truncate(start + count);
    }

    pub(super) fn step(&mut self, input: &[u8], out: &mut Vec<u8>) {
        for &byte in input {
            if self.state == UuState::Done {
                return;
            }
            if byte == b'\n' {
                self.process_line(out);
            } else {
                self.line.push(byte);
            }
        }
    }

    pub(super) fn flush(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.step(input, out);
        if !self.line.is_empty() && self.state != UuState::Done {
            self.process_line(out);
        }
        self.reset();
    }

    pub(super) fn reset(&mut self) {
        self.state = UuState::BeforeBegin;
        self.line.clear();
    }

    pub(super) const fn outlen(inlen: usize) -> usize {
        inlen / 4 * 3 + 3
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
    fn test_encode_known_vector() {
        let mut out = Vec::new();
        UuEncoder::with_name("cat.txt").flush(b"Cat", &mut out);
        assert_eq!(out, b"begin 644 cat.txt\n#0V%T\n`\nend\n");
    }

    #[test]
    fn test_default_name() {
        let mut out = Vec::new();
        UuEncoder::default().flush(b"", &mut out);
        assert_eq!(out, b"begin 644 unknown\n`\nend\n");
    }

    #[test]
    fn test_decode_skips_preamble_and_trailer() {
        let input = b"some text\r\nbegin 644 cat.txt\r\n#0V%T\r\n`\r\nend\r\nignored\n";
        let mut out = Vec::new();
        UuDecoder::default().flush(input, &mut out);
        assert_eq!(out, b"Cat");
    }

    #[test]
    fn test_decode_skips_malformed_line() {
        let input = b"begin 644 x\nM0V\n#0V%T\nend\n";
        let mut out = Vec::new();
        UuDecoder::default().flush(input, &mut out);
        assert_eq!(out, b"Cat");
    }

    #[test]
    fn test_full_lines() {
        let data: Vec<u8> = (0..100).collect();
        let mut encoded = Vec::new();
        UuEncoder::default().flush(&data, &mut encoded);
        let text = String::from_utf8(encoded.clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[1].starts_with('M'));
        assert_eq!(lines[1].len(), 61);

        let mut decoded = Vec::new();
        UuDecoder::default().flush(&encoded, &mut decoded);
        assert_eq!(decoded, data);
    }
}
