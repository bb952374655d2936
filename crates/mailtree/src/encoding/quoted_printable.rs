//! Streaming quoted-printable (RFC 2045 section 6.7).

/// Maximum encoded line length, including the soft break `=`.
const MAX_LINE_LENGTH: usize = 76;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[derive(Debug, Default, Clone)]
pub(super) struct QpEncoder {
    column: usize,
    pending_ws: Option<u8>,
    pending_cr: bool,
}

impl QpEncoder {
    fn put(&mut self, token: &[u8], out: &mut Vec<u8>) {
        if self.column + token.len() > MAX_LINE_LENGTH - 1 {
            out.extend_from_slice(b"=\n");
            self.column = 0;
        }
        out.extend_from_slice(token);
        self.column += token.len();
    }

    fn put_escaped(&mut self, byte: u8, out: &mut Vec<u8>) {
        let token = [b'=', HEX[usize::from(byte >> 4)], HEX[usize::from(byte & 0x0f)]];
        self.put(&token, out);
    }

    fn put_byte(&mut self, byte: u8, out: &mut Vec<u8>) {
        match byte {
            b'!'..=b'<' | b'>'..=b'~' => self.put(&[byte], out),
            _ => self.put_escaped(byte, out),
        }
    }

    /// Releases held whitespace as a literal: it is not at the end of a line.
    fn release_ws(&mut self, out: &mut Vec<u8>) {
        if let Some(ws) = self.pending_ws.take() {
            self.put(&[ws], out);
        }
    }

    fn release_cr(&mut self, out: &mut Vec<u8>) {
        if self.pending_cr {
            self.pending_cr = false;
            self.release_ws(out);
            self.put_escaped(b'\r', out);
        }
    }

    pub(super) fn step(&mut self, input: &[u8], out: &mut Vec<u8>) {
        for &byte in input {
            if byte == b'\n' {
                if let Some(ws) = self.pending_ws.take() {
                    self.put_escaped(ws, out);
                }
                if self.pending_cr {
                    out.push(b'\r');
                    self.pending_cr = false;
                }
                out.push(b'\n');
                self.column = 0;
                continue;
            }

            self.release_cr(out);
            match byte {
                b'\r' => self.pending_cr = true,
                b' ' | b'\t' => {
                    self.release_ws(out);
                    self.pending_ws = Some(byte);
                }
                _ => {
                    self.release_ws(out);
                    self.put_byte(byte, out);
                }
            }
        }
    }

    pub(super) fn flush(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.step(input, out);
        if let Some(ws) = self.pending_ws.take() {
            self.put_escaped(ws, out);
        }
        if self.pending_cr {
            self.put_escaped(b'\r', out);
        }
        self.reset();
    }

    pub(super) fn reset(&mut self) {
        self.column = 0;
        self.pending_ws = None;
        self.pending_cr = false;
    }

    pub(super) const fn outlen(inlen: usize) -> usize {
        let escaped = (inlen + 2) * 3;
        escaped + escaped / (MAX_LINE_LENGTH - 3) * 2 + 2
    }
}

#[derive(Debug, Default, Clone)]
pub(super) struct QpDecoder {
    pending: Vec<u8>,
}

impl QpDecoder {
    pub(super) fn step(&mut self, input: &[u8], out: &mut Vec<u8>) {
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(input);

        let mut i = 0;
        while i < data.len() {
            if data[i] != b'=' {
                out.push(data[i]);
                i += 1;
                continue;
            }
            match data.get(i + 1).copied() {
                None => {
                    self.pending.extend_from_slice(&data[i..]);
                    return;
                }
                Some(b'\n') => i += 2,
                Some(b'\r') => match data.get(i + 2).copied() {
                    None => {
                        self.pending.extend_from_slice(&data[i..]);
                        return;
                    }
                    Some(b'\n') => i += 3,
                    Some(_) => {
                        out.push(b'=');
                        i += 1;
                    }
                },
                Some(high) => {
                    let Some(low) = data.get(i + 2).copied() else {
                        self.pending.extend_from_slice(&data[i..]);
                        return;
                    };
                    if let (Some(h), Some(l)) = (hex_value(high), hex_value(low)) {
                        out.push((h << 4) | l);
                        i += 3;
                    } else {
                        out.push(b'=');
                        i += 1;
                    }
                }
            }
        }
    }

    pub(super) fn flush(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.step(input, out);
        out.append(&mut self.pending);
    }

    pub(super) fn reset(&mut self) {
        self.pending.clear();
    }

    pub(super) const fn outlen(inlen: usize) -> usize {
        inlen + 3
    }
}

/// Decodes a quoted-printable slice in one go.
pub(crate) fn decode_slice(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    QpDecoder::default().flush(input, &mut out);
    out
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
        QpEncoder::default().flush(data, &mut out);
        out
    }

    #[test]
    fn test_encode_plain_text() {
        assert_eq!(encode(b"Hello, World!"), b"Hello, World!");
        assert_eq!(encode("Héllo".as_bytes()), b"H=C3=A9llo");
        assert_eq!(encode(b"a=b"), b"a=3Db");
    }

    #[test]
    fn test_encode_preserves_hard_breaks() {
        assert_eq!(encode(b"one\r\ntwo\nthree"), b"one\r\ntwo\nthree");
    }

    #[test]
    fn test_encode_trailing_whitespace() {
        assert_eq!(encode(b"end \nnext\t\r\nlast "), b"end=20\nnext=09\r\nlast=20");
        assert_eq!(encode(b"a b"), b"a b");
    }

    #[test]
    fn test_encode_lone_cr() {
        assert_eq!(encode(b"a\rb"), b"a=0Db");
        assert_eq!(encode(b"a\r"), b"a=0D");
    }

    #[test]
    fn test_encode_soft_breaks() {
        let out = encode(&[b'x'; 200]);
        for line in out.split(|&b| b == b'\n') {
            assert!(line.len() <= MAX_LINE_LENGTH);
        }
        assert_eq!(decode_slice(&out), vec![b'x'; 200]);
    }

    #[test]
    fn test_escape_never_split() {
        let data = "é".repeat(60);
        let out = encode(data.as_bytes());
        for line in out.split(|&b| b == b'\n') {
            let body = line.strip_suffix(b"=").unwrap_or(line);
            assert_eq!(body.len() % 3, 0);
        }
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode_slice(b"H=C3=A9llo"), "Héllo".as_bytes());
        assert_eq!(decode_slice(b"h=c3=a9"), "hé".as_bytes());
        assert_eq!(decode_slice(b"Hello=\r\nWorld=\nAgain"), b"HelloWorldAgain");
    }

    #[test]
    fn test_decode_invalid_escape_passthrough() {
        assert_eq!(decode_slice(b"100=ZZ%"), b"100=ZZ%");
        assert_eq!(decode_slice(b"tail="), b"tail=");
        assert_eq!(decode_slice(b"tail=4"), b"tail=4");
    }

    #[test]
    fn test_decode_escape_across_steps() {
        let mut dec = QpDecoder::default();
        let mut out = Vec::new();
        dec.step(b"caf=", &mut out);
        dec.step(b"C", &mut out);
        dec.step(b"3=A9!", &mut out);
        dec.flush(b"", &mut out);
        assert_eq!(out, "café!".as_bytes());
    }
}
