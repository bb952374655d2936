//! # mailtree
//!
//! A mutable MIME object tree for email messages.
//!
//! ## Features
//!
//! - **Parsing**: Build a [`Message`] tree from bytes or any [`Stream`], with optional mbox `From ` scanning
//! - **Object tree**: Leaf parts, multiparts, embedded messages and `message/partial` fragments
//! - **Header sync**: Content-Type and Content-Disposition stay in step with their header text; address headers with their lists
//! - **Transfer encodings**: Base64, quoted-printable, uuencode and yEnc as incremental encoders and decoders
//! - **RFC 2047 / 2231**: Encoded-word headers and extended parameters
//! - **Export**: Verbatim re-emission of untouched content, configurable line endings
//!
//! ## Quick Start
//!
//! ### Parsing and walking
//!
//! ```ignore
//! use mailtree::Message;
//!
//! let message = Message::parse(&raw[..])?;
//! println!("Subject: {}", message.subject().unwrap_or_default());
//!
//! for node in message.parts() {
//!     if node.is_attachment_strict() {
//!         println!("attachment: {}", node.object.content_type());
//!     }
//! }
//! ```
//!
//! ### Building
//!
//! ```ignore
//! use mailtree::{ContentEncoding, ContentType, MessageBuilder};
//!
//! let message = MessageBuilder::new()
//!     .from("Alice", "alice@example.com")
//!     .to("Bob", "bob@example.com")
//!     .subject("Report")
//!     .text("See attached.\n", ContentEncoding::Default)
//!     .html("<p>See attached.</p>", ContentEncoding::Default)
//!     .attachment("report.pdf", ContentType::new("application", "pdf"), pdf_bytes)
//!     .build(); // multipart/mixed
//!
//! let wire = message.export();
//! ```
//!
//! ### Rewriting
//!
//! ```ignore
//! use mailtree::{Message, Multipart, Part};
//!
//! let mut message = Message::parse(&raw[..])?;
//! message.set_subject("Re: report");
//! message.add_to("", "carol@example.com");
//! message.add_html_alternative("<p>Hello</p>");
//! let bytes = message.to_bytes();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod address;
pub mod charset;
pub mod encoding;
pub mod object;

mod compose;
mod content_disposition;
mod content_type;
mod error;
mod header;
mod iter;
mod message;
mod options;
mod param;
mod parser;
mod stream;

pub use address::{Address, AddressKind, AddressList, Group, Mailbox};
pub use compose::{Composer, MessageBuilder};
pub use content_disposition::ContentDisposition;
pub use content_type::ContentType;
pub use encoding::{ContentEncoding, Decoder, Encoder};
pub use error::{Error, Result};
pub use header::{Header, HeaderList};
pub use iter::{PartIter, PartRef};
pub use message::{AddressField, Message};
pub use object::{DataWrapper, Entity, MessagePart, MessagePartial, Multipart, Object, Part};
pub use options::{
    DEFAULT_MAX_DEPTH, FormatOptions, FormatOptionsBuilder, Newline, ParserOptions,
    ParserOptionsBuilder,
};
pub use param::{Param, ParamList};
pub use parser::Parser;
pub use stream::{IoStream, MemStream, Stream};
