//! Whole-tree decoding.
//!
//! The decoder opens elements one after another until its span is used
//! up, recursing into constructed content. Nodes keep zero-copy slices of
//! the source, so an untouched tree re-encodes byte for byte.
//!
//! Garbage that the enclosing lengths fence off does not fail the decode.
//! Bytes after a complete top-level element are reported as
//! [`Trailing::Benign`]; undecodable bytes inside a definite-length
//! constructed element are reported as [`Trailing::Malformed`].

use super::{Node, NodeId, NodeState, Session, Tree};
use crate::ber::{open_element, LengthForm};
use crate::error::{Error, Result};
use bytes::Bytes;
use tracing::{debug, trace};

/// Configuration for the tree decoder
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Maximum nesting depth before decoding fails
    pub max_depth: usize,
    /// Fail instead of reporting [`Trailing::Malformed`]
    pub strict_trailing: bool,
    /// Accept indefinite-length elements (BER); off means DER-only input
    pub allow_indefinite: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_depth: crate::DEFAULT_MAX_DEPTH,
            strict_trailing: false,
            allow_indefinite: true,
        }
    }
}

impl DecoderConfig {
    /// Creates a new decoder config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets whether nested garbage is an error
    pub fn strict_trailing(mut self, strict: bool) -> Self {
        self.strict_trailing = strict;
        self
    }

    /// Sets whether indefinite lengths are accepted
    pub fn allow_indefinite(mut self, allow: bool) -> Self {
        self.allow_indefinite = allow;
        self
    }
}

/// What followed the last element the decoder could use
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Trailing {
    /// Every byte was consumed
    #[default]
    None,
    /// The top-level chain ended cleanly and unparseable bytes follow it
    Benign {
        /// Offset of the first unused byte
        offset: usize,
    },
    /// A constructed element holds bytes that are not a valid element
    Malformed {
        /// Offset of the first bad byte
        offset: usize,
        /// Why those bytes could not be decoded
        reason: Error,
    },
}

impl Trailing {
    /// True if every byte was consumed
    pub fn is_clean(&self) -> bool {
        matches!(self, Trailing::None)
    }
}

/// A decoded tree plus what was left over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// The decoded top-level chain
    pub tree: Tree,
    /// Leftover-byte report
    pub trailing: Trailing,
}

/// Where a run of sibling elements stopped
enum Stop {
    Exhausted,
    EndOfContents(usize),
    Garbage { offset: usize, reason: Error },
}

struct Decoder<'a> {
    session: &'a mut Session,
    source: Bytes,
    config: &'a DecoderConfig,
    malformed: Option<(usize, Error)>,
}

impl Decoder<'_> {
    /// Decodes sibling elements in `start..end`
    ///
    /// An indefinite run must end with an end-of-contents marker; any
    /// failure inside it is fatal because nothing else bounds it.
    fn decode_run(
        &mut self,
        start: usize,
        end: usize,
        parent: Option<NodeId>,
        depth: usize,
        indefinite: bool,
    ) -> Result<(Option<NodeId>, Stop)> {
        let mut head: Option<NodeId> = None;
        let mut tail: Option<NodeId> = None;
        let mut pos = start;

        loop {
            if pos >= end {
                if indefinite {
                    return Err(Error::invalid_header(pos, "missing end-of-contents marker"));
                }
                return Ok((head, Stop::Exhausted));
            }

            let element = match open_element(&self.source[..end], pos) {
                Ok(element) => element,
                Err(reason) if !indefinite => {
                    return Ok((head, Stop::Garbage { offset: pos, reason }));
                }
                Err(reason) => return Err(reason),
            };

            if element.header.is_end_of_contents() {
                let after = element.end();
                if indefinite {
                    return Ok((head, Stop::EndOfContents(after)));
                }
                trace!("Skipping stray end-of-contents at {}", pos);
                pos = after;
                continue;
            }

            if depth >= self.config.max_depth {
                return Err(Error::DepthExceeded {
                    depth: depth + 1,
                    max: self.config.max_depth,
                });
            }
            let header = element.header;
            if header.length_form == LengthForm::Indefinite && !self.config.allow_indefinite {
                return Err(Error::invalid_header(pos, "indefinite length is not allowed"));
            }

            let id = self.session.push(Node {
                class: header.class,
                encoding: header.encoding,
                tag: header.tag,
                length_form: header.length_form,
                parent,
                prev: tail,
                ..Node::default()
            });
            match tail {
                Some(tail) => self.session.node_mut(tail).next = Some(id),
                None => head = Some(id),
            }
            tail = Some(id);

            let content_end = if header.is_constructed() {
                let content = element.content.clone();
                let (child, stop) = match header.length_form {
                    LengthForm::Definite => {
                        self.decode_run(content.start, content.end, Some(id), depth + 1, false)?
                    }
                    LengthForm::Indefinite => {
                        self.decode_run(content.start, end, Some(id), depth + 1, true)?
                    }
                };
                self.session.node_mut(id).child = child;
                match stop {
                    Stop::Exhausted => content.end,
                    Stop::EndOfContents(after) => after,
                    Stop::Garbage { offset, reason } => {
                        debug!("Malformed content inside element at {}: {}", pos, reason);
                        if self.malformed.is_none() {
                            self.malformed = Some((offset, reason));
                        }
                        content.end
                    }
                }
            } else {
                element.content.end
            };

            self.session.node_mut(id).state = NodeState::Encoded {
                tag_bytes: self.source.slice(element.tag_range.clone()),
                content: self.source.slice(element.content.start..content_end),
            };
            pos = content_end;
        }
    }
}

impl Session {
    /// Decodes `source` into a new tree in this session
    pub fn decode(&mut self, source: impl Into<Bytes>) -> Result<Decoded> {
        self.decode_with_config(source, &DecoderConfig::default())
    }

    /// Decodes `source` with an explicit configuration
    pub fn decode_with_config(
        &mut self,
        source: impl Into<Bytes>,
        config: &DecoderConfig,
    ) -> Result<Decoded> {
        let source = source.into();
        let len = source.len();
        debug!("Decoding {} bytes", len);

        let mut decoder = Decoder {
            session: self,
            source,
            config,
            malformed: None,
        };
        let (head, stop) = decoder.decode_run(0, len, None, 0, false)?;
        let malformed = decoder.malformed.take();

        let Some(root) = head else {
            return Err(match stop {
                Stop::Garbage { reason, .. } => reason,
                _ => Error::invalid_header(0, "no element in input"),
            });
        };

        let trailing = match (malformed, stop) {
            (Some((offset, reason)), _) => {
                if config.strict_trailing {
                    return Err(reason);
                }
                Trailing::Malformed { offset, reason }
            }
            (None, Stop::Garbage { offset, .. }) => Trailing::Benign { offset },
            (None, _) => Trailing::None,
        };

        debug!("Decoded tree rooted at {:?} ({:?})", root, trailing);
        Ok(Decoded {
            tree: Tree::new(root),
            trailing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::{tag, Class, Encoding};
    use pretty_assertions::assert_eq;

    // SEQUENCE { INTEGER 5, SET { BOOLEAN TRUE, NULL } }
    const NESTED: [u8; 14] = [
        0x30, 0x0C, 0x02, 0x01, 0x05, 0x31, 0x05, 0x01, 0x01, 0xFF, 0x05, 0x00, 0x04, 0x00,
    ];

    #[test]
    fn test_decode_nested() {
        let mut session = Session::new();
        let decoded = session.decode(NESTED.to_vec()).unwrap();
        assert_eq!(decoded.trailing, Trailing::None);

        let root = decoded.tree.root();
        let node = session.node(root);
        assert!(node.is_universal(tag::SEQUENCE));
        assert_eq!(node.encoding(), Encoding::Constructed);

        let children: Vec<NodeId> = session.children(root).collect();
        assert_eq!(children.len(), 3);
        assert!(session.node(children[0]).is_universal(tag::INTEGER));
        assert_eq!(session.node(children[0]).content().unwrap().as_ref(), &[0x05]);
        assert!(session.node(children[1]).is_universal(tag::SET));
        assert_eq!(session.children(children[1]).count(), 2);
        assert!(session.node(children[2]).is_universal(tag::OCTET_STRING));
        assert_eq!(session.node(children[2]).parent(), Some(root));
    }

    #[test]
    fn test_decode_is_zero_copy() {
        let source = Bytes::from(NESTED.to_vec());
        let mut session = Session::new();
        let decoded = session.decode(source.clone()).unwrap();
        let content = session.node(decoded.tree.root()).content().unwrap();
        assert_eq!(content.as_ptr(), source[2..].as_ptr());
    }

    #[test]
    fn test_decode_indefinite() {
        // SEQUENCE (indefinite) { INTEGER 1 } EOC
        let data = vec![0x30, 0x80, 0x02, 0x01, 0x01, 0x00, 0x00];
        let mut session = Session::new();
        let decoded = session.decode(data.clone()).unwrap();
        assert_eq!(decoded.trailing, Trailing::None);

        let root = decoded.tree.root();
        assert_eq!(session.node(root).length_form(), LengthForm::Indefinite);
        assert_eq!(session.children(root).count(), 1);
        assert!(session.node(root).next().is_none());
        assert_eq!(session.encode_to_vec(root).unwrap(), data);
    }

    #[test]
    fn test_decode_nested_indefinite() {
        // SEQUENCE (indef) { SEQUENCE (indef) { NULL } EOC, BOOLEAN } EOC
        let data = vec![
            0x30, 0x80, 0x30, 0x80, 0x05, 0x00, 0x00, 0x00, 0x01, 0x01, 0x00, 0x00, 0x00,
        ];
        let mut session = Session::new();
        let decoded = session.decode(data).unwrap();
        let root = decoded.tree.root();
        let children: Vec<NodeId> = session.children(root).collect();
        assert_eq!(children.len(), 2);
        assert_eq!(session.children(children[0]).count(), 1);
        assert!(session.node(children[1]).is_universal(tag::BOOLEAN));
    }

    #[test]
    fn test_missing_end_of_contents() {
        let mut session = Session::new();
        let err = session.decode(vec![0x30, 0x80, 0x05, 0x00]).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_indefinite_rejected_by_config() {
        let mut session = Session::new();
        let config = DecoderConfig::new().allow_indefinite(false);
        let result = session.decode_with_config(vec![0x30, 0x80, 0x00, 0x00], &config);
        assert!(result.is_err());
    }

    #[test]
    fn test_benign_trailing() {
        let mut session = Session::new();
        let decoded = session.decode(vec![0x05, 0x00, 0x02, 0x05]).unwrap();
        assert_eq!(decoded.trailing, Trailing::Benign { offset: 2 });
        assert!(session.node(decoded.tree.root()).next().is_none());
    }

    #[test]
    fn test_multiple_top_level_elements() {
        let mut session = Session::new();
        let decoded = session.decode(vec![0x05, 0x00, 0x01, 0x01, 0x00]).unwrap();
        assert!(decoded.trailing.is_clean());
        assert_eq!(session.siblings(Some(decoded.tree.root())).count(), 2);
    }

    #[test]
    fn test_malformed_trailing() {
        // SEQUENCE { NULL, <one stray byte> }
        let data = vec![0x30, 0x03, 0x05, 0x00, 0x02];
        let mut session = Session::new();
        let decoded = session.decode(data.clone()).unwrap();
        match decoded.trailing {
            Trailing::Malformed { offset, ref reason } => {
                assert_eq!(offset, 4);
                assert!(reason.is_format());
            }
            ref other => panic!("unexpected trailing {:?}", other),
        }
        // The garbage is preserved when re-encoding untouched
        assert_eq!(session.encode_to_vec(decoded.tree.root()).unwrap(), data);

        let mut session = Session::new();
        let config = DecoderConfig::new().strict_trailing(true);
        assert!(session.decode_with_config(data, &config).is_err());
    }

    #[test]
    fn test_first_element_errors_are_fatal() {
        let mut session = Session::new();
        assert!(matches!(
            session.decode(vec![0x04, 0x05, 0x00]),
            Err(Error::BufferOverflow { .. })
        ));
        assert!(session.decode(Vec::new()).is_err());
    }

    #[test]
    fn test_depth_limit() {
        let mut data = Vec::new();
        for i in 0..4u8 {
            data.extend_from_slice(&[0x30, 2 * (3 - i)]);
        }
        let mut session = Session::new();
        let config = DecoderConfig::new().max_depth(3);
        assert!(matches!(
            session.decode_with_config(data.clone(), &config),
            Err(Error::DepthExceeded { .. })
        ));
        let config = DecoderConfig::new().max_depth(4);
        assert!(session.decode_with_config(data, &config).is_ok());
    }

    #[test]
    fn test_high_tag_context_element() {
        let data = vec![0xBF, 0x81, 0x49, 0x03, 0x02, 0x01, 0x07];
        let mut session = Session::new();
        let decoded = session.decode(data).unwrap();
        let root = session.node(decoded.tree.root());
        assert_eq!(root.class(), Class::Context);
        assert_eq!(root.tag(), 201);
        assert_eq!(session.children(decoded.tree.root()).count(), 1);
    }
}
