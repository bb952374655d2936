//! Stream parser that builds the MIME object tree.
//!
//! The parser reads its stream once, from the current position to the end,
//! into a shared buffer and then works on byte offsets. Leaf content is
//! handed to [`DataWrapper`]s as slices of that buffer, so parsing copies no
//! body bytes.
//!
//! Both CRLF and bare LF line endings are accepted. The line break in front
//! of a boundary delimiter belongs to the delimiter, not to the preceding
//! part.

use std::borrow::Cow;

use bytes::Bytes;

use crate::charset;
use crate::encoding::ContentEncoding;
use crate::error::{Error, Result};
use crate::header::{HeaderList, split_field};
use crate::message::{Message, is_content_header};
use crate::object::{DataWrapper, Entity, MessagePart, MessagePartial, Multipart, Object, Part};
use crate::options::ParserOptions;
use crate::stream::{MemStream, Stream};

const MBOX_FROM: &[u8] = b"From ";

/// A line of the buffer: `[start, end)` without its line break, `next` is
/// the offset after the line break.
#[derive(Debug, Clone, Copy)]
struct Line {
    start: usize,
    end: usize,
    next: usize,
}

/// MIME parser over a [`Stream`].
#[derive(Debug)]
pub struct Parser<S: Stream = MemStream> {
    stream: Option<S>,
    buffer: Bytes,
    base: u64,
    pos: usize,
    options: ParserOptions,
    mbox_from: Option<String>,
}

impl Parser<MemStream> {
    /// Creates a parser over shared bytes without copying them.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Bytes>, options: ParserOptions) -> Self {
        Self {
            stream: None,
            buffer: bytes.into(),
            base: 0,
            pos: 0,
            options,
            mbox_from: None,
        }
    }
}

impl<S: Stream> Parser<S> {
    /// Creates a parser with default options.
    #[must_use]
    pub fn new(stream: S) -> Self {
        Self::with_options(stream, ParserOptions::default())
    }

    /// Creates a parser with explicit options.
    #[must_use]
    pub fn with_options(stream: S, options: ParserOptions) -> Self {
        Self {
            base: stream.tell(),
            stream: Some(stream),
            buffer: Bytes::new(),
            pos: 0,
            options,
            mbox_from: None,
        }
    }

    /// Enables or disables mbox scanning.
    pub const fn set_scan_from(&mut self, scan_from: bool) {
        self.options.scan_from = scan_from;
    }

    /// Current options.
    #[must_use]
    pub const fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// `From ` envelope line of the last message parsed in scan-from mode,
    /// without its line break.
    #[must_use]
    pub fn mbox_from(&self) -> Option<&str> {
        self.mbox_from.as_deref()
    }

    /// Absolute stream offset of the next unparsed byte.
    #[must_use]
    pub fn tell(&self) -> u64 {
        match &self.stream {
            Some(stream) => stream.tell(),
            None => self.base + self.pos as u64,
        }
    }

    /// Returns true when nothing is left to parse.
    pub fn eos(&mut self) -> bool {
        match &mut self.stream {
            Some(stream) => stream.eos(),
            None => self.pos >= self.buffer.len(),
        }
    }

    /// Pulls the rest of the stream into the buffer on first use.
    fn fill(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            self.base = stream.tell();
            let mut data = Vec::new();
            stream.read_to_end(&mut data)?;
            tracing::trace!(bytes = data.len(), offset = self.base, "Buffered parser input");
            self.buffer = Bytes::from(data);
            self.pos = 0;
        }
        Ok(())
    }

    /// Parses the next message.
    ///
    /// In scan-from mode a leading `From ` line is captured (see
    /// [`Self::mbox_from`]) and the message ends in front of the next
    /// `From ` line that follows an empty line.
    ///
    /// # Errors
    ///
    /// Returns a structural error for empty input, an invalid header line,
    /// a multipart without boundary, a multipart without any delimiter, or
    /// nesting beyond [`ParserOptions::max_depth`]. The failed message is
    /// still consumed, so in scan-from mode the next call reads the next
    /// message. Stream failures are returned as [`Error::Io`] or
    /// [`Error::Stream`].
    pub fn construct_message(&mut self) -> Result<Message> {
        self.fill()?;
        let mut start = self.pos;

        if self.options.scan_from {
            let line = next_line(&self.buffer, start, self.buffer.len());
            if self.buffer[line.start..line.end].starts_with(MBOX_FROM) {
                let envelope = header_text(&self.buffer[line.start..line.end]).into_owned();
                tracing::debug!(envelope = %envelope, "mbox envelope line");
                self.mbox_from = Some(envelope);
                start = line.next;
            }
        }

        let (end, resume) = if self.options.scan_from {
            find_mbox_end(&self.buffer, start)
        } else {
            (self.buffer.len(), self.buffer.len())
        };

        // Moves past the message even if it fails to parse.
        self.pos = resume;
        if start >= end {
            return Err(Error::structural(start, "truncated input: no message data"));
        }
        self.parse_message(start, end, 0)
    }

    /// Parses a single MIME entity (headers plus body) from the rest of
    /// the input.
    ///
    /// # Errors
    ///
    /// Same structural errors as [`Self::construct_message`].
    pub fn construct_part(&mut self) -> Result<Object> {
        self.fill()?;
        let (start, end) = (self.pos, self.buffer.len());
        if start >= end {
            return Err(Error::structural(start, "truncated input: no entity data"));
        }
        self.pos = end;
        self.parse_entity(start, end, 0)
    }

    fn parse_message(&self, start: usize, end: usize, depth: usize) -> Result<Message> {
        let (mut headers, body_start) = self.parse_headers(start, end)?;
        let content = headers.extract(|h| is_content_header(h.name()));
        let root = self.parse_body(Entity::from_headers(content), body_start, end, depth)?;
        Ok(Message::from_parts(headers, Some(root)))
    }

    fn parse_entity(&self, start: usize, end: usize, depth: usize) -> Result<Object> {
        let (headers, body_start) = self.parse_headers(start, end)?;
        self.parse_body(Entity::from_headers(headers), body_start, end, depth)
    }

    /// Reads a header block. Returns the headers and the offset of the body.
    fn parse_headers(&self, start: usize, end: usize) -> Result<(HeaderList, usize)> {
        let mut headers = HeaderList::new();
        let mut pending: Option<(String, String)> = None;
        let mut pos = start;

        while pos < end {
            let line = next_line(&self.buffer, pos, end);
            let bytes = &self.buffer[line.start..line.end];
            pos = line.next;

            if bytes.is_empty() {
                break;
            }
            if bytes[0] == b' ' || bytes[0] == b'\t' {
                if let Some((_, value)) = pending.as_mut() {
                    value.push('\n');
                    value.push_str(&header_text(bytes));
                } else {
                    tracing::warn!(offset = line.start, "Continuation line without a header");
                }
                continue;
            }

            let text = header_text(bytes);
            let (name, value) = split_field(&text)
                .ok_or_else(|| Error::structural(line.start, "invalid header line"))?;
            if let Some((name, value)) = pending.replace((name.to_string(), value.to_string())) {
                headers.append(name, &value);
            }
        }
        if let Some((name, value)) = pending {
            headers.append(name, &value);
        }
        Ok((headers, pos.min(end)))
    }

    /// Parses the body of `entity`, which sits `depth` containers below the
    /// top-level entity.
    fn parse_body(&self, entity: Entity, start: usize, end: usize, depth: usize) -> Result<Object> {
        let content_type = entity.content_type();
        tracing::trace!(content_type = %content_type.mime_type(), offset = start, depth, "Parsing body");

        let nests = content_type.is_multipart()
            || content_type.is_type("message", "rfc822")
            || content_type.is_type("message", "news");
        if nests && depth >= self.options.max_depth {
            tracing::warn!(depth, offset = start, "MIME nesting limit reached");
            return Err(Error::structural(start, "nesting too deep"));
        }

        match (content_type.media_type(), content_type.media_subtype()) {
            ("multipart", _) => {
                let boundary = match content_type.boundary() {
                    Some(b) if !b.is_empty() => b.to_string(),
                    _ => {
                        return Err(Error::MissingBoundary(content_type.mime_type(), start));
                    }
                };
                let parts = self.parse_multipart(start, end, &boundary, depth + 1)?;
                let mut multipart = Multipart::from_entity(entity);
                for part in parts {
                    multipart.add_part(part);
                }
                Ok(Object::Multipart(multipart))
            }
            ("message", "rfc822" | "news") => {
                let message = if start < end {
                    Some(self.parse_message(start, end, depth + 1)?)
                } else {
                    None
                };
                Ok(Object::MessagePart(MessagePart::from_entity(entity, message)))
            }
            ("message", "partial") => {
                let content = self.wrap_content(&entity, start, end);
                Ok(Object::MessagePartial(MessagePartial::from_entity(
                    entity,
                    Some(content),
                )))
            }
            _ => {
                let content = self.wrap_content(&entity, start, end);
                Ok(Object::Part(Part::from_entity(entity, Some(content))))
            }
        }
    }

    fn wrap_content(&self, entity: &Entity, start: usize, end: usize) -> DataWrapper {
        let declared = entity.header("Content-Transfer-Encoding").unwrap_or("");
        let encoding = ContentEncoding::parse(declared);
        if encoding == ContentEncoding::Default && !declared.trim().is_empty() {
            tracing::warn!(
                encoding = declared,
                offset = start,
                "Unknown Content-Transfer-Encoding, treating content as unencoded"
            );
        }
        DataWrapper::from_bytes(self.buffer.slice(start..end.max(start)), encoding)
    }

    /// Splits a multipart body on `--boundary` lines and parses each part.
    fn parse_multipart(
        &self,
        start: usize,
        end: usize,
        boundary: &str,
        depth: usize,
    ) -> Result<Vec<Object>> {
        let delimiter = format!("--{boundary}");
        let mut parts = Vec::new();
        let mut part_start: Option<usize> = None;
        let mut pos = start;

        while pos < end {
            let line = next_line(&self.buffer, pos, end);
            pos = line.next;
            let Some(closing) = match_delimiter(&self.buffer[line.start..line.end], &delimiter)
            else {
                continue;
            };

            if let Some(from) = part_start {
                let to = strip_line_break(&self.buffer, from, line.start);
                parts.push(self.parse_entity_or_empty(from, to, depth)?);
            }
            if closing {
                tracing::debug!(boundary, parts = parts.len(), "Parsed multipart");
                return Ok(parts);
            }
            part_start = Some(line.next);
        }

        match part_start {
            Some(from) => {
                tracing::warn!(boundary, "Multipart is missing its closing delimiter");
                parts.push(self.parse_entity_or_empty(from, end, depth)?);
                Ok(parts)
            }
            None => Err(Error::structural(
                start,
                format!("truncated multipart: no delimiter for boundary {boundary:?}"),
            )),
        }
    }

    fn parse_entity_or_empty(&self, start: usize, end: usize, depth: usize) -> Result<Object> {
        if start >= end {
            return Ok(Object::Part(Part::from_entity(Entity::default(), None)));
        }
        self.parse_entity(start, end, depth)
    }
}

/// Finds the line starting at `pos`, bounded by `end`.
fn next_line(buffer: &[u8], pos: usize, end: usize) -> Line {
    let haystack = &buffer[pos..end];
    let (content_end, next) = haystack
        .iter()
        .position(|&b| b == b'\n')
        .map_or((end, end), |i| (pos + i, pos + i + 1));
    let content_end = if content_end > pos && buffer[content_end - 1] == b'\r' {
        content_end - 1
    } else {
        content_end
    };
    Line {
        start: pos,
        end: content_end,
        next,
    }
}

/// Moves `end` back over the line break that ends the previous line.
fn strip_line_break(buffer: &[u8], start: usize, end: usize) -> usize {
    let mut end = end;
    if end > start && buffer[end - 1] == b'\n' {
        end -= 1;
        if end > start && buffer[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}

/// `Some(false)` for `--boundary`, `Some(true)` for `--boundary--`,
/// ignoring trailing whitespace.
fn match_delimiter(line: &[u8], delimiter: &str) -> Option<bool> {
    let line = line.trim_ascii_end();
    let rest = line.strip_prefix(delimiter.as_bytes())?;
    match rest {
        b"" => Some(false),
        b"--" => Some(true),
        _ => None,
    }
}

/// Returns `(end, resume)`: the end of the message body and the offset of
/// the next `From ` line (or the end of the buffer).
fn find_mbox_end(buffer: &[u8], start: usize) -> (usize, usize) {
    let mut pos = start;
    let mut previous_empty = false;
    while pos < buffer.len() {
        let line = next_line(buffer, pos, buffer.len());
        if previous_empty && buffer[line.start..line.end].starts_with(MBOX_FROM) {
            return (strip_line_break(buffer, start, line.start), line.start);
        }
        previous_empty = line.start == line.end;
        pos = line.next;
    }
    (buffer.len(), buffer.len())
}

/// Header bytes as text: UTF-8 when valid, windows-1252 otherwise.
fn header_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => charset::decode_lossy(bytes, "windows-1252"),
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

    fn parse(input: &str) -> Result<Message> {
        Parser::from_bytes(input.as_bytes().to_vec(), ParserOptions::default()).construct_message()
    }

    #[test]
    fn test_simple_message() {
        let msg = parse("Subject: hi\nFrom: a@b.c\n\nbody line\n").unwrap();
        assert_eq!(msg.subject().as_deref(), Some("hi"));
        let part = msg.mime_part().unwrap().as_part().unwrap();
        assert_eq!(part.content_type().mime_type(), "text/plain");
        assert_eq!(part.bytes(), b"body line\n");
    }

    #[test]
    fn test_folded_headers_unfold() {
        let msg = parse("Subject: a long\r\n\tsubject line\r\nX-Two: one\r\n  two\r\n\r\n").unwrap();
        assert_eq!(msg.header("Subject"), Some("a long\tsubject line"));
        assert_eq!(msg.header("X-Two"), Some("one  two"));
    }

    #[test]
    fn test_headers_only_is_bodyless() {
        let msg = parse("Subject: only headers").unwrap();
        assert_eq!(msg.subject().as_deref(), Some("only headers"));
        assert!(msg.mime_part().unwrap().as_part().unwrap().bytes().is_empty());
    }

    #[test]
    fn test_structural_errors() {
        let err = parse("").unwrap_err();
        assert!(err.is_structural());

        let err = parse("Subject: ok\nthis is not a header\n\nbody").unwrap_err();
        assert!(matches!(err, Error::Structural { offset: 12, .. }));

        let err = parse("Content-Type: multipart/mixed\n\n--x\n\n--x--\n").unwrap_err();
        assert!(matches!(err, Error::MissingBoundary(..)));

        let err = parse("Content-Type: multipart/mixed; boundary=x\n\nno delimiters here\n")
            .unwrap_err();
        assert!(matches!(err, Error::Structural { .. }));
    }

    #[test]
    fn test_multipart_split() {
        let input = "Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
            \r\n\
            preamble\r\n\
            --b1\r\n\
            Content-Type: text/plain\r\n\
            \r\n\
            first\r\n\
            --b1 \r\n\
            \r\n\
            second\r\n\
            \r\n\
            --b1--\r\n\
            epilogue\r\n";
        let msg = parse(input).unwrap();
        let multipart = msg.mime_part().unwrap().as_multipart().unwrap();
        assert_eq!(multipart.count(), 2);
        let first = multipart.get_part(0).unwrap().as_part().unwrap();
        assert_eq!(first.bytes(), b"first");
        let second = multipart.get_part(1).unwrap().as_part().unwrap();
        assert_eq!(second.bytes(), b"second\r\n");
    }

    #[test]
    fn test_missing_close_delimiter_tolerated() {
        let input = "Content-Type: multipart/alternative; boundary=zz\n\n--zz\n\nA\n--zz\n\nB\n";
        let msg = parse(input).unwrap();
        let multipart = msg.mime_part().unwrap().as_multipart().unwrap();
        assert_eq!(multipart.count(), 2);
        assert_eq!(multipart.get_part(1).unwrap().as_part().unwrap().bytes(), b"B\n");
    }

    #[test]
    fn test_nested_multipart_and_message() {
        let input = "Content-Type: multipart/mixed; boundary=outer\n\
            \n\
            --outer\n\
            Content-Type: multipart/alternative; boundary=inner\n\
            \n\
            --inner\n\
            \n\
            plain\n\
            --inner\n\
            Content-Type: text/html\n\
            \n\
            <b>html</b>\n\
            --inner--\n\
            --outer\n\
            Content-Type: message/rfc822\n\
            \n\
            Subject: inner message\n\
            \n\
            forwarded\n\
            --outer--\n";
        let msg = parse(input).unwrap();
        let outer = msg.mime_part().unwrap().as_multipart().unwrap();
        assert_eq!(outer.count(), 2);
        let inner = outer.get_part(0).unwrap().as_multipart().unwrap();
        assert_eq!(inner.count(), 2);
        assert_eq!(inner.get_part(1).unwrap().as_part().unwrap().bytes(), b"<b>html</b>");

        let embedded = outer.get_part(1).unwrap().as_message_part().unwrap();
        let embedded = embedded.message().unwrap();
        assert_eq!(embedded.subject().as_deref(), Some("inner message"));
        assert_eq!(
            embedded.mime_part().unwrap().as_part().unwrap().bytes(),
            b"forwarded"
        );
    }

    #[test]
    fn test_transfer_encodings() {
        let input = "Content-Type: multipart/mixed; boundary=b\n\n\
            --b\nContent-Transfer-Encoding: base64\n\naGVsbG8gd29ybGQ=\n\
            --b\nContent-Transfer-Encoding: quoted-printable\n\ncaf=C3=A9 =\nau lait\n\
            --b\nContent-Transfer-Encoding: x-rot13\n\nuryyb\n\
            --b--\n";
        let msg = parse(input).unwrap();
        let multipart = msg.mime_part().unwrap().as_multipart().unwrap();
        let bytes: Vec<&[u8]> = multipart
            .parts()
            .iter()
            .map(|p| p.as_part().unwrap().bytes())
            .collect();
        assert_eq!(bytes[0], b"hello world");
        assert_eq!(bytes[1], "café au lait".as_bytes());
        assert_eq!(bytes[2], b"uryyb");
        let unknown = multipart.get_part(2).unwrap().as_part().unwrap();
        assert_eq!(unknown.content_encoding(), ContentEncoding::Default);
        assert_eq!(unknown.header("Content-Transfer-Encoding"), Some("x-rot13"));
    }

    #[test]
    fn test_message_partial() {
        let input = "Content-Type: message/partial; id=\"abc\"; number=1; total=2\n\nSubject: part\n";
        let msg = parse(input).unwrap();
        let partial = msg.mime_part().unwrap().as_message_partial().unwrap();
        assert_eq!(partial.id(), Some("abc"));
        assert_eq!(partial.number(), Some(1));
        assert_eq!(partial.bytes(), b"Subject: part\n");
    }

    #[test]
    fn test_latin1_header_fallback() {
        let msg = Parser::from_bytes(&b"X-Name: Andr\xe9\n\nx"[..], ParserOptions::default())
            .construct_message()
            .unwrap();
        assert_eq!(msg.header("X-Name"), Some("André"));
    }

    #[test]
    fn test_scan_from_walks_mbox() {
        let mbox = "From alice@example.com Mon Jan  1 00:00:00 2024\n\
            Subject: one\n\
            \n\
            first body\n\
            \n\
            From bob@example.com Tue Jan  2 00:00:00 2024\n\
            Subject: two\n\
            \n\
            second body\n\
            From the start, this line is body text.\n";
        let options = ParserOptions::builder().scan_from(true).build();
        let mut parser = Parser::from_bytes(mbox.as_bytes().to_vec(), options);

        let first = parser.construct_message().unwrap();
        assert_eq!(parser.mbox_from(), Some("From alice@example.com Mon Jan  1 00:00:00 2024"));
        assert_eq!(first.subject().as_deref(), Some("one"));
        assert_eq!(
            first.mime_part().unwrap().as_part().unwrap().bytes(),
            b"first body\n"
        );
        assert!(!parser.eos());

        let second = parser.construct_message().unwrap();
        assert_eq!(parser.mbox_from(), Some("From bob@example.com Tue Jan  2 00:00:00 2024"));
        assert_eq!(second.subject().as_deref(), Some("two"));
        assert!(second.mime_part().unwrap().as_part().unwrap().text().contains("From the start"));
        assert!(parser.eos());
        assert!(parser.construct_message().unwrap_err().is_structural());
    }

    #[test]
    fn test_stream_parser_tracks_offsets() {
        let mut stream = MemStream::with_buffer(b"junk\nSubject: s\n\nbody");
        stream.seek(std::io::SeekFrom::Start(5)).unwrap();
        let mut parser = Parser::new(stream);
        assert_eq!(parser.tell(), 5);
        let msg = parser.construct_message().unwrap();
        assert_eq!(msg.subject().as_deref(), Some("s"));
        assert_eq!(parser.tell(), 21);
        assert!(parser.eos());
    }

    #[test]
    fn test_construct_part() {
        let mut parser = Parser::from_bytes(
            &b"Content-Type: image/gif\nContent-Transfer-Encoding: base64\n\nR0lGOA==\n"[..],
            ParserOptions::default(),
        );
        let object = parser.construct_part().unwrap();
        assert_eq!(object.content_type().mime_type(), "image/gif");
        assert_eq!(object.as_part().unwrap().bytes(), b"GIF8");
        assert!(parser.eos());
    }

    fn nested_messages(levels: usize) -> String {
        "Content-Type: message/rfc822\n\n".repeat(levels) + "Subject: x\n\nbody"
    }

    fn nested_multiparts(levels: usize) -> String {
        let mut out = String::new();
        for i in 0..levels {
            out.push_str(&format!("Content-Type: multipart/mixed; boundary=\"b{i}\"\n\n--b{i}\n"));
        }
        out.push_str("Content-Type: text/plain\n\nleaf\n");
        for i in (0..levels).rev() {
            out.push_str(&format!("--b{i}--\n"));
        }
        out
    }

    fn is_too_deep(err: &Error) -> bool {
        matches!(err, Error::Structural { reason, .. } if reason == "nesting too deep")
    }

    #[test]
    fn test_hostile_message_nesting_is_rejected() {
        let err = parse(&nested_messages(2_000)).unwrap_err();
        assert!(is_too_deep(&err));

        let err = parse(&nested_multiparts(5_000)).unwrap_err();
        assert!(is_too_deep(&err));
    }

    #[test]
    fn test_nesting_limit_boundary() {
        let options = ParserOptions::builder().max_depth(3).build();
        let parse_limited =
            |input: String| Parser::from_bytes(input.into_bytes(), options).construct_message();

        let msg = parse_limited(nested_messages(3)).unwrap();
        let mut inner = &msg;
        let mut levels = 0;
        while let Some(next) = inner
            .mime_part()
            .and_then(Object::as_message_part)
            .and_then(MessagePart::message)
        {
            levels += 1;
            inner = next;
        }
        assert_eq!(levels, 3);
        assert_eq!(inner.subject().as_deref(), Some("x"));
        assert!(is_too_deep(&parse_limited(nested_messages(4)).unwrap_err()));

        let msg = parse_limited(nested_multiparts(3)).unwrap();
        assert_eq!(msg.parts().map(|n| n.depth).max(), Some(3));
        assert_eq!(msg.text_body().as_deref(), Some("leaf"));
        assert!(is_too_deep(&parse_limited(nested_multiparts(4)).unwrap_err()));
    }

    #[test]
    fn test_default_limit_allows_ordinary_depth() {
        let msg = parse(&nested_multiparts(50)).unwrap();
        assert_eq!(msg.parts().count(), 51);
    }

    #[test]
    fn test_scan_from_skips_malformed_message() {
        let mbox = "From a@example.com Mon Jan  1 00:00:00 2024\n\
            Subject: one\n\
            \n\
            first\n\
            \n\
            From b@example.com Tue Jan  2 00:00:00 2024\n\
            Subject: two\n\
            not a header line\n\
            \n\
            second\n\
            \n\
            From c@example.com Wed Jan  3 00:00:00 2024\n\
            Subject: three\n\
            \n\
            third\n";
        let options = ParserOptions::builder().scan_from(true).build();
        let mut parser = Parser::from_bytes(mbox.as_bytes().to_vec(), options);

        assert_eq!(parser.construct_message().unwrap().subject().as_deref(), Some("one"));

        let before = parser.tell();
        assert!(parser.construct_message().unwrap_err().is_structural());
        assert!(parser.tell() > before);
        assert_eq!(parser.mbox_from(), Some("From b@example.com Tue Jan  2 00:00:00 2024"));

        let third = parser.construct_message().unwrap();
        assert_eq!(third.subject().as_deref(), Some("three"));
        assert_eq!(parser.mbox_from(), Some("From c@example.com Wed Jan  3 00:00:00 2024"));
        assert!(parser.eos());
    }
}
