//! Lenient RFC 5322 address-list parser.
//!
//! Accepts display names built from atoms and quoted strings, angle
//! addresses, bare addr-specs (several may be separated by whitespace
//! alone), comments and nested groups. Entries that do not form an address
//! are dropped with a warning; parsing always continues with the next one.

use super::{Address, AddressKind, AddressList, Group, Mailbox};
use crate::encoding::rfc2047;

/// Groups nested deeper than this are dropped. RFC 5322 groups do not nest
/// at all; a few levels are tolerated for lenient input.
const MAX_GROUP_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Comment(String),
    Angle(String),
    Special(char),
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !"\"(<>,:;[]\\)".contains(c)
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        match c {
            '"' => {
                chars.next();
                let mut text = String::new();
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => text.extend(chars.next()),
                        '"' => break,
                        _ => text.push(c),
                    }
                }
                tokens.push(Token::Quoted(text));
            }
            '(' => {
                chars.next();
                let mut depth = 1;
                let mut text = String::new();
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => text.extend(chars.next()),
                        '(' => {
                            depth += 1;
                            text.push(c);
                        }
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                            text.push(c);
                        }
                        _ => text.push(c),
                    }
                }
                tokens.push(Token::Comment(text.trim().to_string()));
            }
            '<' => {
                chars.next();
                let mut text = String::new();
                for c in chars.by_ref() {
                    if c == '>' {
                        break;
                    }
                    text.push(c);
                }
                tokens.push(Token::Angle(text));
            }
            c if is_word_char(c) => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_word_char(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
            _ => {
                chars.next();
                tokens.push(Token::Special(c));
            }
        }
    }
    tokens
}

/// Returns true for `local@domain` with both sides non-empty.
fn is_addr_spec(s: &str) -> bool {
    s.rsplit_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty() && !domain.contains('@'))
}

/// Strips an obsolete source route (`@a,@b:user@host`) and whitespace.
fn clean_angle(raw: &str) -> String {
    let trimmed = raw.trim();
    let addr = if trimmed.starts_with('@') {
        trimmed.split_once(':').map_or(trimmed, |(_, rest)| rest)
    } else {
        trimmed
    };
    addr.split_whitespace().collect()
}

fn join_phrase(words: &[String]) -> String {
    rfc2047::decode_header(&words.join(" "))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    /// `;` closes a group; at the top level it is accepted as a stray
    /// separator.
    fn at_separator(&self) -> bool {
        matches!(self.peek(), None | Some(Token::Special(',' | ';')))
    }

    /// Parses entries until the end of input, or until `;` inside a group.
    fn parse_list(&mut self, depth: usize) -> Vec<Address> {
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None => break,
                Some(Token::Special(';')) if depth > 0 => {
                    self.pos += 1;
                    break;
                }
                Some(Token::Special(',' | ';')) => {
                    self.pos += 1;
                }
                Some(_) => out.extend(self.parse_entry(depth)),
            }
        }
        out
    }

    /// Parses one comma-separated entry, which may expand to several
    /// whitespace-separated bare addresses.
    fn parse_entry(&mut self, depth: usize) -> Vec<Address> {
        let start = self.pos;
        let mut phrase: Vec<String> = Vec::new();
        let mut bare: Vec<String> = Vec::new();
        let mut comments: Vec<String> = Vec::new();
        let mut invalid = false;

        while !self.at_separator() {
            let Some(token) = self.next() else { break };
            match token {
                Token::Word(w) if is_addr_spec(&w) => bare.push(w),
                Token::Word(w) | Token::Quoted(w) => phrase.push(w),
                Token::Comment(c) => comments.push(c),
                Token::Angle(raw) => {
                    self.skip_trailing();
                    if invalid {
                        break;
                    }
                    return self.angle_entry(&phrase, &bare, &raw, start);
                }
                Token::Special(':') if !invalid && bare.is_empty() => {
                    if depth >= MAX_GROUP_DEPTH {
                        self.skip_group();
                        tracing::warn!(entry = %self.describe(start), "dropping group nested too deeply");
                        return Vec::new();
                    }
                    let members: AddressList = self.parse_list(depth + 1).into_iter().collect();
                    return vec![Address::from_kind(AddressKind::Group(Group {
                        name: join_phrase(&phrase),
                        members,
                    }))];
                }
                Token::Special(_) => invalid = true,
            }
        }

        if invalid {
            tracing::warn!(entry = %self.describe(start), "dropping address with unquoted specials");
            return Vec::new();
        }
        if !phrase.is_empty() || bare.is_empty() {
            tracing::warn!(entry = %self.describe(start), "dropping unparseable address");
            return Vec::new();
        }

        let single = bare.len() == 1;
        bare.into_iter()
            .map(|email| {
                let name = if single {
                    comments.first().map(|c| rfc2047::decode_header(c)).unwrap_or_default()
                } else {
                    String::new()
                };
                Address::from_kind(AddressKind::Mailbox(Mailbox { name, email }))
            })
            .collect()
    }

    fn angle_entry(&self, phrase: &[String], bare: &[String], raw: &str, start: usize) -> Vec<Address> {
        let email = clean_angle(raw);
        if email.is_empty() {
            tracing::warn!(entry = %self.describe(start), "dropping empty angle address");
            return Vec::new();
        }
        let words: Vec<String> = phrase.iter().chain(bare).cloned().collect();
        vec![Address::from_kind(AddressKind::Mailbox(Mailbox {
            name: join_phrase(&words),
            email,
        }))]
    }

    /// Skips to the `;` that closes the group just opened, counting any
    /// groups opened inside it.
    fn skip_group(&mut self) {
        let mut open = 1usize;
        while let Some(token) = self.next() {
            match token {
                Token::Special(':') => open += 1,
                Token::Special(';') => {
                    open -= 1;
                    if open == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    /// Drops anything between an angle address and the next separator.
    fn skip_trailing(&mut self) {
        let from = self.pos;
        while !self.at_separator() {
            self.pos += 1;
        }
        let dropped = self.tokens[from..self.pos]
            .iter()
            .any(|t| !matches!(t, Token::Comment(_)));
        if dropped {
            tracing::warn!(entry = %self.describe(from), "ignoring text after angle address");
        }
    }

    fn describe(&self, from: usize) -> String {
        let end = self.pos.min(self.tokens.len());
        self.tokens[from.min(end)..end]
            .iter()
            .map(|t| match t {
                Token::Word(s) => s.clone(),
                Token::Quoted(s) => format!("\"{s}\""),
                Token::Comment(s) => format!("({s})"),
                Token::Angle(s) => format!("<{s}>"),
                Token::Special(c) => c.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Parses an address list, dropping entries that cannot be parsed.
pub(super) fn parse_list(text: &str) -> Vec<Address> {
    let mut parser = Parser {
        tokens: tokenize(text),
        pos: 0,
    };
    parser.parse_list(0)
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

    fn render(text: &str) -> String {
        AddressList::parse(text).to_string()
    }

    fn pairs(text: &str) -> Vec<(String, String)> {
        AddressList::parse(text)
            .iter()
            .map(|a| (a.name().to_string(), a.email().unwrap_or_default().to_string()))
            .collect()
    }

    #[test]
    fn test_lenient_rendering() {
        let cases = [
            ("a@a.com", "a@a.com"),
            ("a@a.com,b@b.com", "a@a.com, b@b.com"),
            ("a@a.com b@b.com", "a@a.com, b@b.com"),
            ("a <a@a.com> b b@b.com", "a <a@a.com>"),
            (r#"a a@a.com, b <b@b.com>, "c" <c@c.com>"#, "b <b@b.com>, c <c@c.com>"),
            ("a@a.com,b <b@b.com>", "a@a.com, b <b@b.com>"),
            ("a@a.com,[] <badbrackets@b.com>, c <c@c.com>", "a@a.com, c <c@c.com>"),
            (
                r#"a@a.com, "[]" <goodbrackets@b.com>, c@c.com"#,
                r#"a@a.com, "[]" <goodbrackets@b.com>, c@c.com"#,
            ),
        ];
        for (input, expected) in cases {
            assert_eq!(render(input), expected, "input: {input}");
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(
            pairs("Foo Bar <foo@bar.baz>, Bar Baz <bar@foo.com>, Not an email at all"),
            vec![
                ("Foo Bar".to_string(), "foo@bar.baz".to_string()),
                ("Bar Baz".to_string(), "bar@foo.com".to_string()),
            ]
        );
        assert_eq!(
            pairs("<foo@bar.baz>, <bar@foo.baz>"),
            vec![
                (String::new(), "foo@bar.baz".to_string()),
                (String::new(), "bar@foo.baz".to_string()),
            ]
        );
        assert_eq!(
            pairs("foo@bar.baz, Bar Foo bar@foo.baz"),
            vec![(String::new(), "foo@bar.baz".to_string())]
        );
    }

    #[test]
    fn test_comment_as_name() {
        assert_eq!(
            pairs("john@example.com (John Doe)"),
            vec![("John Doe".to_string(), "john@example.com".to_string())]
        );
        assert_eq!(
            pairs("Jane <jane@example.com> (work)"),
            vec![("Jane".to_string(), "jane@example.com".to_string())]
        );
    }

    #[test]
    fn test_encoded_display_name() {
        assert_eq!(
            pairs("=?utf-8?q?J=C3=B6rg?= <j@x.com>"),
            vec![("Jörg".to_string(), "j@x.com".to_string())]
        );
    }

    #[test]
    fn test_quoted_name_with_comma() {
        let list = AddressList::parse(r#""Doe, John" <john@x.com>, other@x.com"#);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0).unwrap().name(), "Doe, John");
        assert_eq!(list.to_string(), r#""Doe, John" <john@x.com>, other@x.com"#);
    }

    #[test]
    fn test_groups() {
        let list = AddressList::parse("Team: a@x.com, B <b@x.com>;, c@x.com");
        assert_eq!(list.len(), 2);
        let group = list.get(0).unwrap();
        assert!(group.is_group());
        assert_eq!(group.name(), "Team");
        assert_eq!(group.members().unwrap().len(), 2);
        assert_eq!(list.to_string(), "Team: a@x.com, B <b@x.com>;, c@x.com");
    }

    #[test]
    fn test_nested_and_empty_groups() {
        let list = AddressList::parse("Outer: a@x.com, Inner: b@x.com;;, undisclosed-recipients:;");
        assert_eq!(list.len(), 2);
        let outer = list.get(0).unwrap().members().unwrap();
        assert_eq!(outer.len(), 2);
        assert!(outer.get(1).unwrap().is_group());
        assert!(list.get(1).unwrap().members().unwrap().is_empty());

        let emails: Vec<&str> = list.flatten().iter().filter_map(|a| a.email()).collect();
        assert_eq!(emails, vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn test_deep_groups_are_capped() {
        let list = AddressList::parse(&"g:".repeat(20_000));
        assert_eq!(list.len(), 1);
        let mut depth = 0;
        let mut current = list.get(0).unwrap();
        while let Some(inner) = current.members().and_then(|m| m.get(0)) {
            depth += 1;
            current = inner;
        }
        assert_eq!(depth, MAX_GROUP_DEPTH - 1);
        assert!(list.flatten().is_empty());
    }

    #[test]
    fn test_too_deep_group_keeps_siblings() {
        let text = "A: B: C: D: E: lost@x.com;;;;;, kept@x.com, Top: t@x.com;";
        let list = AddressList::parse(text);
        let emails: Vec<&str> = list.flatten().iter().filter_map(|a| a.email()).collect();
        assert_eq!(emails, ["kept@x.com", "t@x.com"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_source_route_and_semicolons() {
        assert_eq!(render("<@relay.example:user@example.com>"), "user@example.com");
        assert_eq!(render("a@x.com; b@x.com"), "a@x.com, b@x.com");
        assert_eq!(render(""), "");
        assert_eq!(render(" , ,"), "");
    }
}
