//! Grammar text parser.
//!
//! A grammar is a run of commands, each one parenthesized group:
//!
//! ```text
//! (name)
//! (name (options))
//! (name (options) (child) (child) ...)
//! ```
//!
//! The options block is recognized by its alphabet: class letters
//! `u`, `a`, `c`, `p`, the flags `e` (explicit tagging), `i` (indefinite
//! length) and `*` (wildcard), and a decimal tag number. No type name is
//! spelled from those characters alone, so a child group can never be
//! mistaken for options.
//!
//! Children are not parsed eagerly: a [`Command`] keeps the span of its
//! children and the interpreter parses them when it descends.

use super::types::{lookup, TypeDescriptor, TypeKind};
use crate::ber::{Class, LengthForm};
use crate::error::{Error, Result};
use std::ops::Range;
use tracing::trace;

/// Whether a non-universal tag replaces or wraps the underlying type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tagging {
    /// The tag replaces the universal tag in place
    #[default]
    Implicit,
    /// The tag is carried by a constructed wrapper around the plain type
    Explicit,
}

/// One parsed grammar command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'g> {
    /// Registry entry of the command name
    pub descriptor: &'static TypeDescriptor,
    /// Effective tag class
    pub class: Class,
    /// Implicit or explicit tagging
    pub tagging: Tagging,
    /// Length form of the element carrying this command's tag
    pub length_form: LengthForm,
    /// Tag number from the options block
    pub tag_override: Option<u32>,
    /// Accept any element in place of the declared type
    pub wildcard: bool,
    source: &'g str,
    children: Range<usize>,
    offset: usize,
}

impl<'g> Command<'g> {
    /// Command name
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Effective tag number
    pub fn tag(&self) -> u32 {
        self.tag_override.unwrap_or(self.descriptor.tag)
    }

    /// True for explicit tagging
    pub fn is_explicit(&self) -> bool {
        self.tagging == Tagging::Explicit
    }

    /// True if the options moved the element off its universal tag
    pub fn is_tagged(&self) -> bool {
        self.class != Class::Universal || self.tag_override.is_some()
    }

    /// Offset of the opening parenthesis in the grammar text
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Unparsed text of the children
    pub fn children_text(&self) -> &'g str {
        &self.source[self.children.clone()]
    }

    /// Parses the children
    pub fn children(&self) -> Result<Vec<Command<'g>>> {
        parse_list(self.source, self.children.clone())
    }
}

#[derive(Debug, Default)]
struct Options {
    class: Option<Class>,
    explicit: bool,
    indefinite: bool,
    wildcard: bool,
    tag: Option<u32>,
    present: bool,
}

fn is_space(byte: u8) -> bool {
    byte.is_ascii_whitespace()
}

fn skip_space(bytes: &[u8], mut pos: usize, end: usize) -> usize {
    while pos < end && is_space(bytes[pos]) {
        pos += 1;
    }
    pos
}

/// Offset of the parenthesis closing the one at `open`
fn matching_paren(bytes: &[u8], open: usize, end: usize) -> Result<usize> {
    let mut depth = 0usize;
    for (pos, &byte) in bytes.iter().enumerate().take(end).skip(open) {
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(pos);
                }
            }
            _ => {}
        }
    }
    Err(Error::MissingParenthesis { offset: open })
}

fn is_options(text: &str) -> bool {
    text.bytes()
        .all(|b| is_space(b) || b.is_ascii_digit() || b"uacpei*".contains(&b))
}

fn parse_options(text: &str) -> Result<Options> {
    let mut options = Options {
        present: !text.trim().is_empty(),
        ..Options::default()
    };
    let mut in_number = false;

    for ch in text.chars() {
        if let Some(digit) = ch.to_digit(10) {
            let current = match (options.tag, in_number) {
                (Some(_), false) => {
                    return Err(Error::invalid_options(text, "more than one tag number"));
                }
                (current, _) => current.unwrap_or(0),
            };
            let tag = current
                .checked_mul(10)
                .and_then(|t| t.checked_add(digit))
                .ok_or_else(|| Error::invalid_options(text, "tag number exceeds 32 bits"))?;
            options.tag = Some(tag);
            in_number = true;
            continue;
        }
        in_number = false;

        let class = match ch {
            'u' => Class::Universal,
            'a' => Class::Application,
            'c' => Class::Context,
            'p' => Class::Private,
            'e' => {
                options.explicit = true;
                continue;
            }
            'i' => {
                options.indefinite = true;
                continue;
            }
            '*' => {
                options.wildcard = true;
                continue;
            }
            _ => continue,
        };
        match options.class {
            Some(existing) if existing != class => {
                return Err(Error::invalid_options(text, "conflicting class letters"));
            }
            _ => options.class = Some(class),
        }
    }
    Ok(options)
}

/// Parses the command starting at or after `pos`, stopping at `end`
///
/// Returns `None` when only whitespace remains, otherwise the command and
/// the offset just past its closing parenthesis.
pub fn parse_command(source: &str, pos: usize, end: usize) -> Result<Option<(Command<'_>, usize)>> {
    let bytes = source.as_bytes();
    let open = skip_space(bytes, pos, end);
    if open >= end {
        return Ok(None);
    }
    if bytes[open] != b'(' {
        return Err(Error::truncated(
            open,
            format!("expected '(' but found '{}'", char::from(bytes[open])),
        ));
    }
    let close = matching_paren(bytes, open, end)?;

    let name_start = skip_space(bytes, open + 1, close);
    let mut cursor = name_start;
    while cursor < close && !is_space(bytes[cursor]) && bytes[cursor] != b'(' {
        cursor += 1;
    }
    let name = &source[name_start..cursor];
    if name.is_empty() {
        return Err(Error::truncated(name_start, "expected a type name"));
    }
    let descriptor = lookup(name).ok_or_else(|| Error::unknown_command(name))?;

    cursor = skip_space(bytes, cursor, close);
    let mut options = Options::default();
    let mut options_text = "";
    if cursor < close && bytes[cursor] == b'(' {
        let group_end = matching_paren(bytes, cursor, close)?;
        let inner = &source[cursor + 1..group_end];
        if is_options(inner) {
            options = parse_options(inner)?;
            options_text = inner;
            cursor = group_end + 1;
        }
    }

    let class = options.class.unwrap_or(if options.present {
        Class::Context
    } else {
        Class::Universal
    });
    let command = Command {
        descriptor,
        class,
        tagging: if options.explicit {
            Tagging::Explicit
        } else {
            Tagging::Implicit
        },
        length_form: if options.indefinite {
            LengthForm::Indefinite
        } else {
            LengthForm::Definite
        },
        tag_override: options.tag,
        wildcard: options.wildcard,
        source,
        children: cursor..close,
        offset: open,
    };
    validate(&command, options_text)?;

    trace!(
        "Parsed '{}' at {} ({:?} {:?} tag {})",
        name,
        open,
        command.class,
        command.tagging,
        command.tag()
    );
    Ok(Some((command, close + 1)))
}

fn validate(command: &Command<'_>, options: &str) -> Result<()> {
    match command.descriptor.kind {
        TypeKind::Choice | TypeKind::Optional if !options.trim().is_empty() => {
            Err(Error::invalid_options(
                options,
                format!("'{}' takes no options", command.name()),
            ))
        }
        _ if command.is_explicit() && command.tag_override.is_none() => Err(
            Error::invalid_options(options, "explicit tagging needs a tag number"),
        ),
        TypeKind::Any
            if command.length_form == LengthForm::Indefinite && !command.is_explicit() =>
        {
            Err(Error::invalid_options(
                options,
                "indefinite length on 'any' needs explicit tagging",
            ))
        }
        _ => Ok(()),
    }
}

/// Parses every command in `range` of `source`
pub fn parse_list(source: &str, range: Range<usize>) -> Result<Vec<Command<'_>>> {
    let mut commands = Vec::new();
    let mut pos = range.start;
    while let Some((command, next)) = parse_command(source, pos, range.end)? {
        commands.push(command);
        pos = next;
    }
    Ok(commands)
}

/// Parses a whole grammar, which must hold at least one command
pub fn parse(source: &str) -> Result<Vec<Command<'_>>> {
    let commands = parse_list(source, 0..source.len())?;
    if commands.is_empty() {
        return Err(Error::truncated(source.len(), "grammar holds no command"));
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::tag;
    use pretty_assertions::assert_eq;

    fn single(source: &str) -> Command<'_> {
        let mut commands = parse(source).unwrap();
        assert_eq!(commands.len(), 1);
        commands.remove(0)
    }

    #[test]
    fn test_plain_command() {
        let command = single("(integer)");
        assert_eq!(command.name(), "integer");
        assert_eq!(command.class, Class::Universal);
        assert_eq!(command.tag(), tag::INTEGER);
        assert_eq!(command.tagging, Tagging::Implicit);
        assert_eq!(command.length_form, LengthForm::Definite);
        assert!(!command.is_tagged());
        assert!(command.children().unwrap().is_empty());
    }

    #[test]
    fn test_options_default_to_context() {
        let command = single("(octet-string (3))");
        assert_eq!(command.class, Class::Context);
        assert_eq!(command.tag(), 3);
        assert!(command.is_tagged());

        let command = single("( boolean ( a e 12 ) )");
        assert_eq!(command.class, Class::Application);
        assert_eq!(command.tagging, Tagging::Explicit);
        assert_eq!(command.tag(), 12);

        let command = single("(sequence (u i))");
        assert_eq!(command.class, Class::Universal);
        assert_eq!(command.length_form, LengthForm::Indefinite);
        assert_eq!(command.tag(), tag::SEQUENCE);
    }

    #[test]
    fn test_wildcard() {
        let command = single("(any (*))");
        assert!(command.wildcard);
        let command = single("(integer (u*))");
        assert!(command.wildcard);
        assert_eq!(command.class, Class::Universal);
    }

    #[test]
    fn test_children_span() {
        let command = single("(sequence (c 1) (integer) (set (boolean)))");
        assert_eq!(command.class, Class::Context);
        assert_eq!(command.children_text(), " (integer) (set (boolean))");
        let children = command.children().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].name(), "set");
        assert_eq!(children[1].children().unwrap()[0].name(), "boolean");
        assert_eq!(children[1].offset(), 26);
    }

    #[test]
    fn test_child_without_options() {
        let command = single("(sequence (null))");
        assert_eq!(command.class, Class::Universal);
        assert_eq!(command.children().unwrap()[0].name(), "null");
    }

    #[test]
    fn test_multiple_top_level() {
        let commands = parse("(integer) (boolean)\n(null)").unwrap();
        let names: Vec<&str> = commands.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["integer", "boolean", "null"]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse("(integr)"),
            Err(Error::UnknownCommand {
                name: "integr".to_string()
            })
        );
        assert_eq!(
            parse("(sequence (integer)"),
            Err(Error::MissingParenthesis { offset: 0 })
        );
        assert!(matches!(parse(""), Err(Error::TruncatedGrammar { .. })));
        assert!(matches!(parse("()"), Err(Error::TruncatedGrammar { .. })));
        assert!(matches!(parse("integer"), Err(Error::TruncatedGrammar { .. })));
        // The unknown name is reported lazily, when the children are parsed
        let command = single("(sequence (bogus))");
        assert!(matches!(command.children(), Err(Error::UnknownCommand { .. })));
    }

    #[test]
    fn test_invalid_options() {
        assert!(matches!(parse("(integer (e))"), Err(Error::InvalidOptions { .. })));
        assert!(matches!(parse("(integer (a c 1))"), Err(Error::InvalidOptions { .. })));
        assert!(matches!(parse("(integer (1 2))"), Err(Error::InvalidOptions { .. })));
        assert!(matches!(
            parse("(integer (99999999999))"),
            Err(Error::InvalidOptions { .. })
        ));
        assert!(matches!(
            parse("(choice (c 1) (integer))"),
            Err(Error::InvalidOptions { .. })
        ));
        assert!(matches!(parse("(any (i))"), Err(Error::InvalidOptions { .. })));
    }
}
