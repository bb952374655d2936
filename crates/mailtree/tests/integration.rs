//! Integration tests for parsing, walking and exporting whole messages.
//!
//! Fixtures live in `tests/fixtures/` and are stored with the line endings
//! they would have on the wire.

#![allow(clippy::unwrap_used)]

use chrono::{Datelike, Timelike};
use proptest::prelude::*;
use sha2::{Digest, Sha256};

use mailtree::{
    AddressField, AddressList, ContentEncoding, ContentType, DEFAULT_MAX_DEPTH, Error,
    FormatOptions, MemStream, Message, MessageBuilder, MessagePart, Multipart, Newline, Object,
    Parser, ParserOptions, Part, PartIter,
};

const ALTERNATIVE_IMAGE: &[u8] = include_bytes!("fixtures/alternative_image.eml");
const ATTACHMENTS: &[u8] = include_bytes!("fixtures/attachments.eml");
const MISSING_BOUNDARY: &[u8] = include_bytes!("fixtures/missing_boundary.eml");
const MAILBOX: &[u8] = include_bytes!("fixtures/mailbox.mbox");
const MALFORMED_MAILBOX: &[u8] = include_bytes!("fixtures/malformed.mbox");

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Builds a message nested one level per entry: `true` is a multipart
/// layer, `false` an embedded `message/rfc822`. The innermost entity is a
/// text part reading "leaf".
fn nested_message(layers: &[bool]) -> String {
    let mut out = String::new();
    for (i, &multipart) in layers.iter().enumerate() {
        if multipart {
            out.push_str(&format!("Content-Type: multipart/mixed; boundary=\"n{i}\"\n\n--n{i}\n"));
        } else {
            out.push_str("Content-Type: message/rfc822\n\n");
        }
    }
    out.push_str("Content-Type: text/plain\n\nleaf\n");
    for (i, &multipart) in layers.iter().enumerate().rev() {
        if multipart {
            out.push_str(&format!("--n{i}--\n"));
        }
    }
    out
}

#[test]
fn test_alternative_with_image_structure() {
    init_tracing();
    let message = Message::parse(ALTERNATIVE_IMAGE).unwrap();

    let nodes: Vec<_> = message.parts().collect();
    let containers = nodes.iter().filter(|n| n.object.is_multipart()).count();
    let leaves: Vec<_> = nodes.iter().filter_map(|n| n.object.as_part()).collect();
    assert_eq!(containers, 2);
    assert_eq!(leaves.len(), 3);

    let types: Vec<String> = nodes
        .iter()
        .map(|n| n.object.content_type().mime_type())
        .collect();
    assert_eq!(
        types,
        [
            "multipart/alternative",
            "text/plain",
            "multipart/related",
            "text/html",
            "image/png",
        ]
    );

    let hashes: Vec<String> = leaves.iter().map(|p| sha256_hex(p.bytes())).collect();
    assert_eq!(
        hashes,
        [
            "22249a75fc423c23a113fb1de81c43652208525af4831cb0442386fb1eb439ec",
            "351a55ef9ce17671be206987aaa0c43bc947ff56d1533b691f61afe92762e8ec",
            "497790947d4666760ce38f3c00e852c71fdb66cae849bae8e9ede352719e1581",
        ]
    );
    assert_eq!(leaves[2].content_id(), Some("dot@example.com"));
    assert_eq!(leaves[2].filename(), Some("dot.png"));
}

#[test]
fn test_alternative_with_image_envelope() {
    let message = Message::parse(ALTERNATIVE_IMAGE).unwrap();
    assert_eq!(message.subject().as_deref(), Some("Café photos"));
    assert_eq!(message.message_id(), Some("fixture-1@example.com"));
    let date = message.date().unwrap();
    assert_eq!((date.year(), date.month(), date.day()), (2024, 3, 1));
    assert_eq!((date.hour(), date.minute()), (12, 30));
    assert_eq!(date.offset().local_minus_utc(), 3600);
    assert_eq!(message.boundary(), Some("outer-b"));

    assert_eq!(message.from().get(0).unwrap().name(), "Alice Example");
    let to: Vec<_> = message.to().iter().filter_map(|a| a.email()).collect();
    assert_eq!(to, ["bob@example.com", "carol@example.com"]);
    assert_eq!(message.all_recipients().len(), 2);

    assert_eq!(message.text_body().as_deref(), Some("Hello Bob,\r\nsee the photo.\r\n"));
    assert!(message.html_body().unwrap().contains("<img src=\"cid:dot@example.com\">"));
    assert_eq!(message.body().unwrap().content_type().mime_type(), "text/plain");

    // Content headers belong to the root object, not the message.
    assert!(message.header_list().get("Content-Type").is_none());
    assert!(message.header("Content-Type").unwrap().starts_with("multipart/alternative"));
}

#[test]
fn test_export_is_stable() {
    let message = Message::parse(ALTERNATIVE_IMAGE).unwrap();
    let first = message.export();
    assert_eq!(first, message.export());

    let reparsed = Message::parse(first.clone()).unwrap();
    assert_eq!(reparsed.export(), first);
    assert_eq!(reparsed.subject(), message.subject());
    assert_eq!(reparsed.parts().count(), message.parts().count());
}

#[test]
fn test_untouched_content_is_verbatim() {
    let message = Message::parse(ALTERNATIVE_IMAGE).unwrap();
    let exported = message.export();
    let text = String::from_utf8(exported).unwrap();
    assert!(text.contains("<img src=3D\"cid:dot@example.com\"> photo.</p>\r\n"));
    assert!(text.contains("iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAf\r\n"));
    assert!(text.ends_with("--inner-b--\r\n\r\n--outer-b--\r\n"));
}

#[test]
fn test_unix_export() {
    let message = Message::parse(ALTERNATIVE_IMAGE).unwrap();
    let options = FormatOptions::builder().newline(Newline::Unix).build();
    let exported = message.to_bytes_with(&options);
    assert!(!exported.contains(&b'\r'));
    let reparsed = Message::parse(exported).unwrap();
    assert_eq!(reparsed.text_body().as_deref(), Some("Hello Bob,\nsee the photo.\n"));
}

#[test]
fn test_attachment_classification() {
    init_tracing();
    let message = Message::parse(ATTACHMENTS).unwrap();

    let loose: Vec<bool> = message
        .parts()
        .map(|n| n.object.is_attachment())
        .collect();
    assert_eq!(loose, [false, false, true, true, false, false]);

    let strict: Vec<bool> = message.parts().map(|n| n.is_attachment_strict()).collect();
    assert_eq!(strict, [false, false, true, true, false, true]);

    let attachments = message.attachments();
    let names: Vec<&str> = attachments.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["logo.png", "résumé.pdf"]);
    assert_eq!(
        sha256_hex(attachments[1].1),
        "56c2ac043c28d3543275a6f50b593a6beb0b6888ed8159ac02e3e7f4a32ccb26"
    );
    assert_eq!(
        sha256_hex(attachments[0].1),
        "497790947d4666760ce38f3c00e852c71fdb66cae849bae8e9ede352719e1581"
    );

    assert_eq!(message.text_body().as_deref(), Some("Report attached.Inline footer."));
}

#[test]
fn test_embedded_message() {
    let message = Message::parse(ATTACHMENTS).unwrap();
    let root = message.mime_part().unwrap().as_multipart().unwrap();
    let embedded = root
        .get_part(4)
        .and_then(Object::as_message_part)
        .and_then(|m| m.message())
        .unwrap();
    assert_eq!(embedded.subject().as_deref(), Some("Forwarded"));
    assert_eq!(embedded.from().get(0).unwrap().email(), Some("old@example.com"));
    assert_eq!(embedded.text_body().as_deref(), Some("Original body."));

    // The iterator yields the embedded message but does not enter it.
    let depths: Vec<usize> = message.parts().map(|n| n.depth).collect();
    assert_eq!(depths, [0, 1, 1, 1, 1, 1]);
}

#[test]
fn test_missing_boundary_is_structural() {
    let err = Message::parse(MISSING_BOUNDARY).unwrap_err();
    assert!(matches!(err, Error::MissingBoundary(ref t, _) if t == "multipart/mixed"));
    assert!(err.is_structural());
}

#[test]
fn test_mbox_scan() {
    init_tracing();
    let options = ParserOptions::builder().scan_from(true).build();
    let mut parser = Parser::from_bytes(MAILBOX, options);

    let mut subjects = Vec::new();
    let mut envelopes = Vec::new();
    while !parser.eos() {
        let message = parser.construct_message().unwrap();
        subjects.push(message.subject().unwrap());
        envelopes.push(parser.mbox_from().unwrap().to_string());
        if let Some(text) = message.text_body() {
            assert!(text.starts_with(&format!("{} body", subjects.last().unwrap())));
        }
    }
    assert_eq!(subjects, ["first", "second", "third"]);
    assert!(envelopes[1].starts_with("From bob@example.com"));
}

#[test]
fn test_mbox_recovers_after_malformed_message() {
    init_tracing();
    let options = ParserOptions::builder().scan_from(true).build();
    let mut parser = Parser::from_bytes(MALFORMED_MAILBOX, options);

    let mut subjects = Vec::new();
    let mut failures = Vec::new();
    while !parser.eos() {
        match parser.construct_message() {
            Ok(message) => subjects.push(message.subject().unwrap()),
            Err(err) => {
                assert!(err.is_structural());
                failures.push(parser.mbox_from().unwrap().to_string());
            }
        }
    }
    assert_eq!(subjects, ["first", "third"]);
    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with("From mallory@example.com"));
}

#[test]
fn test_hostile_nesting_is_structural() {
    init_tracing();
    let deep = "Content-Type: message/rfc822\n\n".repeat(2_000) + "Subject: x\n\nbody";
    let err = Message::parse(deep.into_bytes()).unwrap_err();
    assert!(matches!(err, Error::Structural { ref reason, .. } if reason == "nesting too deep"));

    let deep = nested_message(&[true; 3_000]);
    assert!(Message::parse(deep.into_bytes()).unwrap_err().is_structural());

    let options = ParserOptions::builder().max_depth(2).build();
    let shallow = nested_message(&[true, false, true]);
    assert!(Message::parse_with(shallow.clone().into_bytes(), &options).is_err());
    assert!(Message::parse(shallow.into_bytes()).is_ok());
}

#[test]
fn test_deeply_nested_groups_do_not_overflow() {
    init_tracing();
    let raw = format!(
        "From: a@example.com\nTo: {}\nCc: kept@example.com\nSubject: groups\n\nbody\n",
        "g:".repeat(20_000)
    );
    let message = Message::parse(raw.into_bytes()).unwrap();
    assert_eq!(message.subject().as_deref(), Some("groups"));
    assert!(message.to().len() <= 1);
    assert!(message.to().flatten().is_empty());
    assert_eq!(message.cc().get(0).unwrap().email(), Some("kept@example.com"));
}

#[test]
fn test_mbox_from_stream() {
    let stream = MemStream::from_bytes(MAILBOX);
    let mut parser = Parser::with_options(stream, ParserOptions::builder().scan_from(true).build());
    let first = parser.construct_message().unwrap();
    assert_eq!(first.sender(), Some("alice@example.com"));
    let second = parser.construct_message().unwrap();
    assert!(second.mime_part().unwrap().is_multipart());
    assert_eq!(second.boundary(), Some("b"));
}

#[test]
fn test_multipart_exact_body() {
    let mut multipart = Multipart::with_content_type(ContentType::multipart("mixed", "B1"));
    let mut plain = Part::with_type("text", "plain");
    plain.set_text("A");
    let mut html = Part::with_type("text", "html");
    html.set_text("B");
    multipart.add_part(plain);
    multipart.add_part(html);

    let mut message = Message::new();
    message.set_mime_part(multipart);
    let exported = message.export();
    let body_start = exported.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
    assert_eq!(
        &exported[body_start..],
        b"--B1\r\nContent-Type: text/plain\r\n\r\nA\r\n--B1\r\nContent-Type: text/html\r\n\r\nB\r\n--B1--\r\n"
    );
}

#[test]
fn test_rewrite_and_reexport() {
    let mut message = Message::parse(ATTACHMENTS).unwrap();
    message.set_subject("Quarterly report (revised)");
    message.add_address("Cc", "Zoë", "zoe@example.com").unwrap();
    message
        .walk_mut(|object| {
            if let Some(part) = object.as_part_mut()
                && part.content_type().is_type("text", "plain")
                && part.filename().is_none()
            {
                part.set_text("Rewritten.");
            }
            Ok(())
        })
        .unwrap();

    let reparsed = Message::parse(message.export()).unwrap();
    assert_eq!(reparsed.subject().as_deref(), Some("Quarterly report (revised)"));
    assert_eq!(reparsed.cc().get(0).unwrap().name(), "Zoë");
    assert_eq!(reparsed.text_body().as_deref(), Some("Rewritten.Rewritten."));
    assert_eq!(reparsed.attachments().len(), 2);
}

#[test]
fn test_address_header_rules() {
    let mut message = Message::parse(ATTACHMENTS).unwrap();
    assert!(matches!(
        message.set_header("To", "x@example.com"),
        Err(Error::InvalidHeaderTarget(..))
    ));
    assert!(matches!(
        message.add_address("Subject", "", "x@example.com"),
        Err(Error::InvalidHeaderTarget(..))
    ));

    message.add_address("To", "Dee", "dee@example.com").unwrap();
    let rendered = message.header("To").unwrap();
    assert!(rendered.contains("dee@example.com") && rendered.contains("Dee"));

    message.clear_address("To").unwrap();
    assert!(message.addresses(AddressField::To).is_empty());
    assert!(message.header_list().contains("To"));
}

#[test]
fn test_builder_walk() {
    let message = MessageBuilder::new()
        .from("", "a@example.com")
        .to("", "b@example.com")
        .text("plain", ContentEncoding::Default)
        .html("<b>html</b>", ContentEncoding::Default)
        .build();
    let mut iter = PartIter::new(&message);
    assert_eq!(iter.current().unwrap().content_type().mime_type(), "multipart/alternative");
    assert!(iter.advance());
    assert_eq!(iter.path(), [1]);
    assert!(iter.advance());
    assert_eq!(iter.path(), [2]);
    assert!(!iter.advance());
}

proptest! {
    #[test]
    fn prop_text_message_survives_export(
        subject in "[A-Za-z0-9]{1,12}( [A-Za-z0-9,.!]{1,12}){0,10}",
        body in "[A-Za-z0-9 ,.!éü]{0,300}",
    ) {
        let message = MessageBuilder::new()
            .from("Sender", "sender@example.com")
            .to("", "rcpt@example.com")
            .subject(subject.clone())
            .text(&body, ContentEncoding::Default)
            .build();
        let exported = message.export();
        let parsed = Message::parse(exported.clone()).unwrap();

        prop_assert_eq!(parsed.subject(), Some(subject));
        prop_assert_eq!(parsed.content_type().mime_type(), "text/plain");
        prop_assert_eq!(parsed.text_body(), Some(body));
        prop_assert_eq!(parsed.export(), exported);
    }

    #[test]
    fn prop_parse_never_panics(input in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = Message::parse(input);
    }

    #[test]
    fn prop_nesting_depth_is_bounded(layers in proptest::collection::vec(any::<bool>(), 0..300)) {
        let result = Message::parse(nested_message(&layers).into_bytes());
        if layers.len() > DEFAULT_MAX_DEPTH {
            prop_assert!(result.unwrap_err().is_structural());
            return Ok(());
        }

        let message = result.unwrap();
        let mut object = message.mime_part().unwrap();
        let mut seen = 0;
        loop {
            if let Some(multipart) = object.as_multipart() {
                prop_assert_eq!(multipart.parts().len(), 1);
                object = &multipart.parts()[0];
            } else if let Some(inner) = object.as_message_part().and_then(MessagePart::message) {
                object = inner.mime_part().unwrap();
            } else {
                break;
            }
            seen += 1;
        }
        prop_assert_eq!(seen, layers.len());
        prop_assert!(object.as_part().unwrap().bytes().starts_with(b"leaf"));
    }

    #[test]
    fn prop_group_nesting_never_overflows(depth in 0usize..5_000, tail in "[a-z]{1,8}@example\\.com") {
        let value = format!("{}{tail};", "g:".repeat(depth));
        let list = AddressList::parse(&value);
        prop_assert!(list.len() <= 1);
        if depth <= 1 {
            let flat = list.flatten();
            prop_assert_eq!(flat.len(), 1);
            prop_assert_eq!(flat[0].email(), Some(tail.as_str()));
        }
    }
}
