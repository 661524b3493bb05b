//! Tree walking and text dumps.
//!
//! [`walk`] drives a [`TreeVisitor`] over a chain in document order. The
//! crate ships three visitors: [`NullVisitor`], [`StatsVisitor`] and the
//! renderer behind [`TreeDump`].

use super::{NodeId, NodeState, Session};
use crate::ber::{
    decode_bit_string, decode_boolean, decode_generalized_time, decode_integer, decode_oid,
    decode_utc_time, tag, universal_name, Class, LengthForm,
};
use std::fmt::{self, Result, Write as FmtWrite};

/// Callbacks invoked while walking a tree
///
/// Every method has a no-op default, so implementors only override what
/// they need.
pub trait TreeVisitor {
    /// Called for each primitive node
    fn visit_primitive(&mut self, session: &Session, id: NodeId, depth: usize) -> Result {
        let _ = (session, id, depth);
        Ok(())
    }

    /// Called before the children of a constructed node
    fn enter_constructed(&mut self, session: &Session, id: NodeId, depth: usize) -> Result {
        let _ = (session, id, depth);
        Ok(())
    }

    /// Called after the children of a constructed node
    fn leave_constructed(&mut self, session: &Session, id: NodeId, depth: usize) -> Result {
        let _ = (session, id, depth);
        Ok(())
    }
}

/// A visitor that does nothing
pub struct NullVisitor;

impl TreeVisitor for NullVisitor {}

/// A visitor that counts nodes
#[derive(Debug, Default)]
pub struct StatsVisitor {
    /// Number of primitive nodes
    pub primitive_count: usize,
    /// Number of constructed nodes
    pub constructed_count: usize,
    /// Constructed nodes using the indefinite length form
    pub indefinite_count: usize,
    /// Deepest nesting level seen, the root chain being 0
    pub max_depth: usize,
}

impl StatsVisitor {
    /// Total number of nodes visited
    pub fn node_count(&self) -> usize {
        self.primitive_count + self.constructed_count
    }
}

impl TreeVisitor for StatsVisitor {
    fn visit_primitive(&mut self, _session: &Session, _id: NodeId, depth: usize) -> Result {
        self.primitive_count += 1;
        self.max_depth = self.max_depth.max(depth);
        Ok(())
    }

    fn enter_constructed(&mut self, session: &Session, id: NodeId, depth: usize) -> Result {
        self.constructed_count += 1;
        if session.node(id).length_form() == LengthForm::Indefinite {
            self.indefinite_count += 1;
        }
        self.max_depth = self.max_depth.max(depth);
        Ok(())
    }
}

/// Walks the chain at `head` and everything below it
pub fn walk(session: &Session, head: NodeId, visitor: &mut impl TreeVisitor) -> Result {
    walk_chain(session, Some(head), 0, visitor)
}

fn walk_chain(
    session: &Session,
    head: Option<NodeId>,
    depth: usize,
    visitor: &mut impl TreeVisitor,
) -> Result {
    for id in session.siblings(head) {
        let node = session.node(id);
        if node.is_constructed() {
            visitor.enter_constructed(session, id, depth)?;
            walk_chain(session, node.child(), depth + 1, visitor)?;
            visitor.leave_constructed(session, id, depth)?;
        } else {
            visitor.visit_primitive(session, id, depth)?;
        }
    }
    Ok(())
}

/// Configuration for [`TreeDump`]
#[derive(Debug, Clone)]
pub struct PrintConfig {
    /// Indentation string per nesting level
    pub indent_str: String,
    /// Content octets shown for primitives that are dumped as hex
    pub max_content: usize,
    /// Prefix lines with offset and header/content lengths
    pub show_offsets: bool,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            indent_str: "  ".to_string(),
            max_content: 32,
            show_offsets: false,
        }
    }
}

impl PrintConfig {
    /// Creates a new print config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the indentation string
    pub fn indent_str(mut self, s: impl Into<String>) -> Self {
        self.indent_str = s.into();
        self
    }

    /// Sets how many content octets are shown in hex
    pub fn max_content(mut self, max: usize) -> Self {
        self.max_content = max;
        self
    }

    /// Sets whether offsets and lengths are shown
    pub fn show_offsets(mut self, show: bool) -> Self {
        self.show_offsets = show;
        self
    }
}

/// Renders a tree as indented text, one line per element
///
/// ```text
/// SEQUENCE
///   INTEGER 5
///   [CONTEXT 0]
///     OBJECT IDENTIFIER 1.2.840.113549
/// ```
pub struct TreeDump<'a> {
    session: &'a Session,
    head: NodeId,
    config: PrintConfig,
}

impl<'a> TreeDump<'a> {
    /// Creates a dump of the chain at `head`
    pub fn new(session: &'a Session, head: NodeId) -> Self {
        Self {
            session,
            head,
            config: PrintConfig::default(),
        }
    }

    /// Replaces the print config
    pub fn with_config(mut self, config: PrintConfig) -> Self {
        self.config = config;
        self
    }

    /// Renders to a string
    pub fn render(&self) -> String {
        let mut output = String::new();
        // Writing to a String never fails
        let _ = self.write_to(&mut output);
        output
    }

    /// Renders to any formatter sink
    pub fn write_to(&self, w: &mut impl FmtWrite) -> Result {
        let mut visitor = DumpVisitor {
            writer: w,
            config: &self.config,
            offset: Some(0),
        };
        walk(self.session, self.head, &mut visitor)
    }
}

impl fmt::Display for TreeDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result {
        self.write_to(f)
    }
}

struct DumpVisitor<'a, W: FmtWrite> {
    writer: &'a mut W,
    config: &'a PrintConfig,
    /// Offset of the next element; unknown once a stale node was passed
    offset: Option<usize>,
}

impl<W: FmtWrite> DumpVisitor<'_, W> {
    fn write_prefix(&mut self, session: &Session, id: NodeId, depth: usize) -> Result {
        if self.config.show_offsets {
            let node = session.node(id);
            match (self.offset, node.tag_bytes(), node.content()) {
                (Some(offset), Some(tag_bytes), Some(content)) => write!(
                    self.writer,
                    "{:>6} {:>2}+{:<5} ",
                    offset,
                    tag_bytes.len(),
                    content.len()
                )?,
                _ => write!(self.writer, "{:>6} {:>8} ", "?", "")?,
            }
        }
        for _ in 0..depth {
            write!(self.writer, "{}", self.config.indent_str)?;
        }
        Ok(())
    }

    fn write_label(&mut self, session: &Session, id: NodeId) -> Result {
        let node = session.node(id);
        match (node.class(), universal_name(node.tag())) {
            (Class::Universal, Some(name)) => write!(self.writer, "{}", name),
            (Class::Universal, None) => write!(self.writer, "[UNIVERSAL {}]", node.tag()),
            (class, _) => write!(self.writer, "[{} {}]", class.as_str(), node.tag()),
        }
    }

    fn advance(&mut self, by: Option<usize>) {
        self.offset = match (self.offset, by) {
            (Some(offset), Some(by)) => Some(offset + by),
            _ => None,
        };
    }
}

impl<W: FmtWrite> TreeVisitor for DumpVisitor<'_, W> {
    fn visit_primitive(&mut self, session: &Session, id: NodeId, depth: usize) -> Result {
        self.write_prefix(session, id, depth)?;
        self.write_label(session, id)?;
        let node = session.node(id);
        match &node.state {
            NodeState::Encoded { tag_bytes, content } => {
                let summary = summarize(node.class(), node.tag(), content, self.config.max_content);
                if !summary.is_empty() {
                    write!(self.writer, " {}", summary)?;
                }
                writeln!(self.writer)?;
                self.advance(Some(tag_bytes.len() + content.len()));
            }
            NodeState::Pending { .. } => {
                writeln!(self.writer, " (stale)")?;
                self.advance(None);
            }
        }
        Ok(())
    }

    fn enter_constructed(&mut self, session: &Session, id: NodeId, depth: usize) -> Result {
        self.write_prefix(session, id, depth)?;
        self.write_label(session, id)?;
        let node = session.node(id);
        if node.length_form() == LengthForm::Indefinite {
            write!(self.writer, " (indefinite)")?;
        }
        writeln!(self.writer)?;
        self.advance(node.tag_bytes().map(|t| t.len()));
        Ok(())
    }

    fn leave_constructed(&mut self, session: &Session, id: NodeId, _depth: usize) -> Result {
        if session.node(id).length_form() == LengthForm::Indefinite {
            self.advance(Some(2));
        }
        Ok(())
    }
}

/// One-line rendering of a primitive's content
fn summarize(class: Class, tag_number: u32, content: &[u8], max: usize) -> String {
    if class != Class::Universal {
        return truncated_hex(content, max);
    }
    let decoded = match tag_number {
        tag::BOOLEAN => decode_boolean(content).map(|b| b.to_string()).ok(),
        tag::INTEGER | tag::ENUMERATED => decode_integer(content).map(|i| i.to_string()).ok(),
        tag::NULL => Some(String::new()),
        tag::OBJECT_IDENTIFIER => decode_oid(content).map(|oid| oid.to_string()).ok(),
        tag::UTC_TIME => decode_utc_time(content).map(|t| t.to_string()).ok(),
        tag::GENERALIZED_TIME => decode_generalized_time(content).map(|t| t.to_string()).ok(),
        tag::BIT_STRING => decode_bit_string(content)
            .map(|bits| {
                let shown = truncated_hex(bits.as_bytes(), max);
                format!("({} bits) {}", bits.bit_len(), shown)
            })
            .ok(),
        12 | tag::NUMERIC_STRING
        | tag::PRINTABLE_STRING
        | tag::TELETEX_STRING
        | tag::IA5_STRING
        | tag::GRAPHIC_STRING
        | tag::VISIBLE_STRING
        | tag::GENERAL_STRING => std::str::from_utf8(content)
            .ok()
            .filter(|s| !s.chars().any(char::is_control))
            .map(|s| format!("{:?}", s)),
        _ => None,
    };
    decoded.unwrap_or_else(|| truncated_hex(content, max))
}

/// Uppercase hex, truncated after `max` octets
pub(crate) fn truncated_hex(bytes: &[u8], max: usize) -> String {
    let mut out = hex::encode_upper(&bytes[..bytes.len().min(max)]);
    if bytes.len() > max {
        out.push_str("...");
    }
    out
}
