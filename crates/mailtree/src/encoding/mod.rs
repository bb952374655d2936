//! Content-Transfer-Encoding codecs.
//!
//! [`Encoder`] and [`Decoder`] are incremental: feed input with `step` as it
//! arrives and finish with `flush`. Output is independent of how the input
//! was chunked. Encoders end lines with `\n`; the composer converts line
//! endings on output.
//!
//! ```ignore
//! use mailtree::encoding::{ContentEncoding, Decoder, Encoder};
//!
//! let mut enc = Encoder::new(ContentEncoding::Base64);
//! let mut wire = enc.step(b"Hello, ");
//! wire.extend(enc.flush(b"World!"));
//!
//! let mut dec = Decoder::new(ContentEncoding::Base64);
//! assert_eq!(dec.flush(&wire), b"Hello, World!");
//! ```

mod base64;
mod quoted_printable;
pub mod rfc2047;
mod uuencode;
mod yenc;

use std::fmt;
use std::str::FromStr;

use self::base64::{Base64Decoder, Base64Encoder};
use self::quoted_printable::{QpDecoder, QpEncoder};
use self::uuencode::{UuDecoder, UuEncoder};
use self::yenc::{YencDecoder, YencEncoder};

/// Longest line allowed in a 7bit body (RFC 5322 section 2.1.1).
const MAX_7BIT_LINE: usize = 998;

/// Content-Transfer-Encoding mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ContentEncoding {
    /// No encoding declared.
    #[default]
    Default,
    /// 7bit.
    SevenBit,
    /// 8bit.
    EightBit,
    /// Binary.
    Binary,
    /// Base64.
    Base64,
    /// Quoted-printable.
    QuotedPrintable,
    /// uuencode (`x-uuencode`).
    UuEncode,
    /// yEnc (`x-yencode`).
    YEncode,
}

impl ContentEncoding {
    /// Parses an encoding name. Unknown names map to [`Self::Default`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("x-").unwrap_or(&lower);
        match name {
            "7bit" => Self::SevenBit,
            "8bit" => Self::EightBit,
            "binary" => Self::Binary,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "uuencode" | "uue" => Self::UuEncode,
            "yencode" | "yenc" => Self::YEncode,
            _ => Self::Default,
        }
    }

    /// Returns true if `s` names a known encoding.
    #[must_use]
    pub fn is_known(s: &str) -> bool {
        Self::parse(s) != Self::Default
    }

    /// Returns the canonical header value (empty for [`Self::Default`]).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "",
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Binary => "binary",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
            Self::UuEncode => "x-uuencode",
            Self::YEncode => "x-yencode",
        }
    }

    /// Returns true if encoding and decoding leave bytes unchanged.
    #[must_use]
    pub const fn is_identity(self) -> bool {
        matches!(
            self,
            Self::Default | Self::SevenBit | Self::EightBit | Self::Binary
        )
    }

    /// Picks the cheapest encoding that can carry `data` on a 7bit transport.
    ///
    /// Pure ASCII text with short lines stays 7bit, mostly printable text
    /// becomes quoted-printable and everything else base64.
    #[must_use]
    pub fn best_for(data: &[u8]) -> Self {
        let mut unsafe_bytes = 0usize;
        let mut line = 0usize;
        let mut longest = 0usize;
        for &byte in data {
            if byte == b'\n' {
                longest = longest.max(line);
                line = 0;
                continue;
            }
            line += 1;
            if byte == 0 || byte >= 0x80 || (byte < 0x20 && byte != b'\t' && byte != b'\r') {
                unsafe_bytes += 1;
            }
        }
        longest = longest.max(line);

        if unsafe_bytes == 0 && longest <= MAX_7BIT_LINE {
            Self::SevenBit
        } else if unsafe_bytes * 6 <= data.len() {
            Self::QuotedPrintable
        } else {
            Self::Base64
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentEncoding {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

#[derive(Debug, Clone)]
enum EncoderState {
    Identity,
    Base64(Base64Encoder),
    QuotedPrintable(QpEncoder),
    UuEncode(UuEncoder),
    YEncode(YencEncoder),
}

/// Incremental encoder.
#[derive(Debug, Clone)]
pub struct Encoder {
    encoding: ContentEncoding,
    state: EncoderState,
}

impl Encoder {
    /// Creates an encoder for `encoding`.
    #[must_use]
    pub fn new(encoding: ContentEncoding) -> Self {
        let state = match encoding {
            ContentEncoding::Base64 => EncoderState::Base64(Base64Encoder::default()),
            ContentEncoding::QuotedPrintable => {
                EncoderState::QuotedPrintable(QpEncoder::default())
            }
            ContentEncoding::UuEncode => EncoderState::UuEncode(UuEncoder::default()),
            ContentEncoding::YEncode => EncoderState::YEncode(YencEncoder::default()),
            _ => EncoderState::Identity,
        };
        Self { encoding, state }
    }

    /// Creates a uuencoder that writes `name` on its `begin` line.
    #[must_use]
    pub fn uuencode_named(name: &str) -> Self {
        Self {
            encoding: ContentEncoding::UuEncode,
            state: EncoderState::UuEncode(UuEncoder::with_name(name)),
        }
    }

    /// Returns the encoding this encoder produces.
    #[must_use]
    pub const fn encoding(&self) -> ContentEncoding {
        self.encoding
    }

    /// Encodes `input`, appending to `out`.
    pub fn step_into(&mut self, input: &[u8], out: &mut Vec<u8>) {
        match &mut self.state {
            EncoderState::Identity => out.extend_from_slice(input),
            EncoderState::Base64(e) => e.step(input, out),
            EncoderState::QuotedPrintable(e) => e.step(input, out),
            EncoderState::UuEncode(e) => e.step(input, out),
            EncoderState::YEncode(e) => e.step(input, out),
        }
    }

    /// Encodes `input` and returns the output produced so far.
    #[must_use]
    pub fn step(&mut self, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.outlen(input.len()));
        self.step_into(input, &mut out);
        out
    }

    /// Encodes the final `input`, appending everything still buffered to
    /// `out`, and resets the encoder.
    pub fn flush_into(&mut self, input: &[u8], out: &mut Vec<u8>) {
        match &mut self.state {
            EncoderState::Identity => out.extend_from_slice(input),
            EncoderState::Base64(e) => e.flush(input, out),
            EncoderState::QuotedPrintable(e) => e.flush(input, out),
            EncoderState::UuEncode(e) => e.flush(input, out),
            EncoderState::YEncode(e) => e.flush(input, out),
        }
    }

    /// Encodes the final `input` and returns the remaining output.
    #[must_use]
    pub fn flush(&mut self, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.outlen(input.len()));
        self.flush_into(input, &mut out);
        out
    }

    /// Upper bound on the output produced for `inlen` input bytes, including
    /// anything buffered from earlier steps.
    #[must_use]
    pub fn outlen(&self, inlen: usize) -> usize {
        match &self.state {
            EncoderState::Identity => inlen,
            EncoderState::Base64(_) => Base64Encoder::outlen(inlen),
            EncoderState::QuotedPrintable(_) => QpEncoder::outlen(inlen),
            EncoderState::UuEncode(e) => e.outlen(inlen),
            EncoderState::YEncode(_) => YencEncoder::outlen(inlen),
        }
    }

    /// Drops buffered state.
    pub fn reset(&mut self) {
        match &mut self.state {
            EncoderState::Identity => {}
            EncoderState::Base64(e) => e.reset(),
            EncoderState::QuotedPrintable(e) => e.reset(),
            EncoderState::UuEncode(e) => e.reset(),
            EncoderState::YEncode(e) => e.reset(),
        }
    }
}

#[derive(Debug, Clone)]
enum DecoderState {
    Identity,
    Base64(Base64Decoder),
    QuotedPrintable(QpDecoder),
    UuEncode(UuDecoder),
    YEncode(YencDecoder),
}

/// Incremental decoder.
#[derive(Debug, Clone)]
pub struct Decoder {
    encoding: ContentEncoding,
    state: DecoderState,
}

impl Decoder {
    /// Creates a decoder for `encoding`.
    #[must_use]
    pub fn new(encoding: ContentEncoding) -> Self {
        let state = match encoding {
            ContentEncoding::Base64 => DecoderState::Base64(Base64Decoder::default()),
            ContentEncoding::QuotedPrintable => {
                DecoderState::QuotedPrintable(QpDecoder::default())
            }
            ContentEncoding::UuEncode => DecoderState::UuEncode(UuDecoder::default()),
            ContentEncoding::YEncode => DecoderState::YEncode(YencDecoder::default()),
            _ => DecoderState::Identity,
        };
        Self { encoding, state }
    }

    /// Returns the encoding this decoder consumes.
    #[must_use]
    pub const fn encoding(&self) -> ContentEncoding {
        self.encoding
    }

    /// Decodes `input`, appending to `out`.
    pub fn step_into(&mut self, input: &[u8], out: &mut Vec<u8>) {
        match &mut self.state {
            DecoderState::Identity => out.extend_from_slice(input),
            DecoderState::Base64(d) => d.step(input, out),
            DecoderState::QuotedPrintable(d) => d.step(input, out),
            DecoderState::UuEncode(d) => d.step(input, out),
            DecoderState::YEncode(d) => d.step(input, out),
        }
    }

    /// Decodes `input` and returns the output produced so far.
    #[must_use]
    pub fn step(&mut self, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.outlen(input.len()));
        self.step_into(input, &mut out);
        out
    }

    /// Decodes the final `input`, appending everything still buffered to
    /// `out`, and resets the decoder.
    pub fn flush_into(&mut self, input: &[u8], out: &mut Vec<u8>) {
        match &mut self.state {
            DecoderState::Identity => out.extend_from_slice(input),
            DecoderState::Base64(d) => d.flush(input, out),
            DecoderState::QuotedPrintable(d) => d.flush(input, out),
            DecoderState::UuEncode(d) => d.flush(input, out),
            DecoderState::YEncode(d) => d.flush(input, out),
        }
    }

    /// Decodes the final `input` and returns the remaining output.
    #[must_use]
    pub fn flush(&mut self, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.outlen(input.len()));
        self.flush_into(input, &mut out);
        out
    }

    /// Upper bound on the output produced for `inlen` input bytes, including
    /// anything buffered from earlier steps.
    #[must_use]
    pub const fn outlen(&self, inlen: usize) -> usize {
        match &self.state {
            DecoderState::Identity => inlen,
            DecoderState::Base64(_) => Base64Decoder::outlen(inlen),
            DecoderState::QuotedPrintable(_) => QpDecoder::outlen(inlen),
            DecoderState::UuEncode(_) => UuDecoder::outlen(inlen),
            DecoderState::YEncode(_) => YencDecoder::outlen(inlen),
        }
    }

    /// Drops buffered state.
    pub fn reset(&mut self) {
        match &mut self.state {
            DecoderState::Identity => {}
            DecoderState::Base64(d) => d.reset(),
            DecoderState::QuotedPrintable(d) => d.reset(),
            DecoderState::UuEncode(d) => d.reset(),
            DecoderState::YEncode(d) => d.reset(),
        }
    }
}

/// Encodes `data` in one call.
#[must_use]
pub fn encode(encoding: ContentEncoding, data: &[u8]) -> Vec<u8> {
    Encoder::new(encoding).flush(data)
}

/// Decodes `data` in one call.
#[must_use]
pub fn decode(encoding: ContentEncoding, data: &[u8]) -> Vec<u8> {
    Decoder::new(encoding).flush(data)
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
    use proptest::prelude::*;

    #[test]
    fn test_parse_names() {
        assert_eq!(ContentEncoding::parse("BASE64"), ContentEncoding::Base64);
        assert_eq!(ContentEncoding::parse(" 7bit "), ContentEncoding::SevenBit);
        assert_eq!(
            ContentEncoding::parse("Quoted-Printable"),
            ContentEncoding::QuotedPrintable
        );
        assert_eq!(ContentEncoding::parse("uuencode"), ContentEncoding::UuEncode);
        assert_eq!(ContentEncoding::parse("x-uuencode"), ContentEncoding::UuEncode);
        assert_eq!(ContentEncoding::parse("x-yencode"), ContentEncoding::YEncode);
        assert_eq!(ContentEncoding::parse(""), ContentEncoding::Default);
        assert_eq!(ContentEncoding::parse("invalid"), ContentEncoding::Default);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ContentEncoding::UuEncode.to_string(), "x-uuencode");
        assert_eq!(ContentEncoding::Default.to_string(), "");
        assert_eq!(
            "quoted-printable".parse::<ContentEncoding>().unwrap(),
            ContentEncoding::QuotedPrintable
        );
        assert!(ContentEncoding::is_known("8BIT"));
        assert!(!ContentEncoding::is_known("gzip"));
    }

    #[test]
    fn test_best_for() {
        assert_eq!(ContentEncoding::best_for(b"plain text\n"), ContentEncoding::SevenBit);
        assert_eq!(
            ContentEncoding::best_for("mostly ascii with one é".as_bytes()),
            ContentEncoding::QuotedPrintable
        );
        assert_eq!(
            ContentEncoding::best_for(&[0u8, 0xff, 0x10, 0x80, 0x7f, 0x01]),
            ContentEncoding::Base64
        );
        assert_eq!(
            ContentEncoding::best_for(&[b'a'; 1200]),
            ContentEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_identity_passthrough() {
        let data = b"\x00\xffraw\r\n";
        for enc in [
            ContentEncoding::Default,
            ContentEncoding::SevenBit,
            ContentEncoding::EightBit,
            ContentEncoding::Binary,
        ] {
            assert!(enc.is_identity());
            assert_eq!(encode(enc, data), data);
            assert_eq!(decode(enc, data), data);
        }
    }

    #[test]
    fn test_uuencode_named() {
        let out = Encoder::uuencode_named("a.bin").flush(b"Cat");
        assert!(out.starts_with(b"begin 644 a.bin\n"));
        assert_eq!(decode(ContentEncoding::UuEncode, &out), b"Cat");
    }

    #[test]
    fn test_reset_drops_state() {
        let mut dec = Decoder::new(ContentEncoding::QuotedPrintable);
        let _ = dec.step(b"abc=4");
        dec.reset();
        assert_eq!(dec.flush(b"1"), b"1");
    }

    fn chunked_roundtrip(encoding: ContentEncoding, data: &[u8], enc_split: usize, dec_split: usize) -> Vec<u8> {
        let mut encoder = Encoder::new(encoding);
        let mut wire = Vec::new();
        for chunk in data.chunks(enc_split.max(1)) {
            encoder.step_into(chunk, &mut wire);
        }
        encoder.flush_into(&[], &mut wire);
        assert_eq!(wire, encode(encoding, data), "encoding depends on chunking");

        let mut decoder = Decoder::new(encoding);
        let mut plain = Vec::new();
        for chunk in wire.chunks(dec_split.max(1)) {
            decoder.step_into(chunk, &mut plain);
        }
        decoder.flush_into(&[], &mut plain);
        plain
    }

    proptest! {
        #[test]
        fn prop_roundtrip_any_chunking(
            data in proptest::collection::vec(any::<u8>(), 0..600),
            enc_split in 1usize..97,
            dec_split in 1usize..97,
        ) {
            for encoding in [
                ContentEncoding::Base64,
                ContentEncoding::QuotedPrintable,
                ContentEncoding::UuEncode,
                ContentEncoding::YEncode,
                ContentEncoding::Binary,
            ] {
                let plain = chunked_roundtrip(encoding, &data, enc_split, dec_split);
                prop_assert_eq!(&plain, &data, "encoding {:?}", encoding);
            }
        }

        #[test]
        fn prop_qp_lines_fit(data in proptest::collection::vec(any::<u8>(), 0..400)) {
            let wire = encode(ContentEncoding::QuotedPrintable, &data);
            for line in wire.split(|&b| b == b'\n') {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                prop_assert!(line.len() <= 76);
            }
        }

        #[test]
        fn prop_outlen_is_upper_bound(data in proptest::collection::vec(any::<u8>(), 0..400)) {
            for encoding in [
                ContentEncoding::Base64,
                ContentEncoding::QuotedPrintable,
                ContentEncoding::UuEncode,
                ContentEncoding::YEncode,
            ] {
                let encoder = Encoder::new(encoding);
                let bound = encoder.outlen(data.len());
                prop_assert!(encode(encoding, &data).len() <= bound);
            }
        }
    }

    fn chunked_decode(encoding: ContentEncoding, wire: &[u8], split: usize) -> Vec<u8> {
        let mut decoder = Decoder::new(encoding);
        let mut plain = Vec::new();
        for chunk in wire.chunks(split.max(1)) {
            decoder.step_into(chunk, &mut plain);
        }
        decoder.flush_into(&[], &mut plain);
        plain
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_roundtrip_large_inputs(
            data in proptest::collection::vec(any::<u8>(), 0..16_384),
            enc_split in 1usize..4_096,
            dec_split in 1usize..4_096,
        ) {
            for encoding in [
                ContentEncoding::Base64,
                ContentEncoding::QuotedPrintable,
                ContentEncoding::UuEncode,
                ContentEncoding::YEncode,
            ] {
                let plain = chunked_roundtrip(encoding, &data, enc_split, dec_split);
                prop_assert_eq!(&plain, &data, "encoding {:?}", encoding);
            }
        }

        #[test]
        fn prop_decode_garbage(
            wire in proptest::collection::vec(any::<u8>(), 0..4_096),
            split in 1usize..257,
        ) {
            for encoding in [
                ContentEncoding::Base64,
                ContentEncoding::YEncode,
            ] {
                let _ = chunked_decode(encoding, &wire, split);
            }
            for encoding in [ContentEncoding::QuotedPrintable, ContentEncoding::UuEncode] {
                prop_assert_eq!(chunked_decode(encoding, &wire, split), decode(encoding, &wire));
            }
        }

        #[test]
        fn prop_decode_uuencoded_garbage_lines(
            lines in proptest::collection::vec("[ -`]{0,90}", 0..64),
            split in 1usize..64,
        ) {
            let wire = format!("begin 644 x\n{}\nend\n", lines.join("\n"));
            prop_assert_eq!(
                chunked_decode(ContentEncoding::UuEncode, wire.as_bytes(), split),
                decode(ContentEncoding::UuEncode, wire.as_bytes())
            );
        }
    }
}
