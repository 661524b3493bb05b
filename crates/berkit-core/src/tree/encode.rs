//! Two-pass tree encoding.
//!
//! [`Session::count_length`] measures stale nodes bottom-up and records the
//! sizes on them; `encode_recurse` then writes nodes depth-first. Cached
//! nodes are copied verbatim, stale ones get fresh identifier and length
//! octets around their children.

use super::{Measure, NodeId, NodeState, Session};
use crate::ber::{compute_tag_length, set_tag, Header, LengthForm};
use crate::error::{Error, Result};
use bytes::Bytes;
use tracing::debug;

/// End-of-contents pair closing an indefinite-length element
const END_OF_CONTENTS: [u8; 2] = [0x00, 0x00];

impl Session {
    /// Total encoded size of `id`, measuring stale nodes on the way
    pub fn count_length(&mut self, id: NodeId) -> usize {
        if let NodeState::Encoded { tag_bytes, content } = &self.node(id).state {
            return tag_bytes.len() + content.len();
        }

        let node = self.node(id);
        let constructed = node.is_constructed();
        let form = node.length_form();
        let child = node.child();
        let mut content_len = 0;
        if constructed {
            content_len = self.chain_length(child);
            if form == LengthForm::Indefinite {
                content_len += END_OF_CONTENTS.len();
            }
        }

        let header = self.node(id).header().with_content_len(content_len);
        let header_len = compute_tag_length(&header);
        self.node_mut(id).state = NodeState::Pending {
            measured: Some(Measure {
                header_len,
                content_len,
            }),
        };
        header_len + content_len
    }

    /// Total encoded size of the chain starting at `head`
    pub fn chain_length(&mut self, head: Option<NodeId>) -> usize {
        let mut total = 0;
        let mut current = head;
        while let Some(id) = current {
            total += self.count_length(id);
            current = self.node(id).next();
        }
        total
    }

    /// Encodes the chain starting at `head` into `out`
    ///
    /// Returns the number of octets written.
    pub fn encode_into(&mut self, head: NodeId, out: &mut [u8]) -> Result<usize> {
        let total = self.chain_length(Some(head));
        if out.len() < total {
            return Err(Error::buffer_too_small(total, out.len()));
        }
        self.encode_chain(Some(head), &mut out[..total])
    }

    /// Encodes the chain starting at `head` into a fresh vector
    pub fn encode_to_vec(&mut self, head: NodeId) -> Result<Vec<u8>> {
        let total = self.chain_length(Some(head));
        debug!("Encoding chain at {:?} ({} bytes)", head, total);
        let mut out = vec![0u8; total];
        let written = self.encode_chain(Some(head), &mut out)?;
        out.truncate(written);
        Ok(out)
    }

    /// Encodes `id` alone, ignoring its siblings
    pub fn encode_node(&mut self, id: NodeId) -> Result<Vec<u8>> {
        let total = self.count_length(id);
        let mut out = vec![0u8; total];
        let written = self.encode_recurse(id, &mut out)?;
        out.truncate(written);
        Ok(out)
    }

    /// Re-encodes a stale node and caches the octets on it and its stale
    /// descendants
    pub fn materialize(&mut self, id: NodeId) -> Result<()> {
        if !self.node(id).is_stale() {
            return Ok(());
        }
        let scratch = Bytes::from(self.encode_node(id)?);
        self.cache_node(id, &scratch, 0);
        Ok(())
    }

    /// Materializes every node of the chain at `head` from one scratch buffer
    pub(crate) fn materialize_chain(&mut self, head: NodeId) -> Result<()> {
        let scratch = Bytes::from(self.encode_to_vec(head)?);
        self.cache_chain(Some(head), &scratch, 0);
        Ok(())
    }

    fn encode_chain(&self, head: Option<NodeId>, out: &mut [u8]) -> Result<usize> {
        let mut pos = 0;
        for id in self.siblings(head) {
            pos += self.encode_recurse(id, &mut out[pos..])?;
        }
        Ok(pos)
    }

    /// Writes one measured or cached node, depth-first
    fn encode_recurse(&self, id: NodeId, out: &mut [u8]) -> Result<usize> {
        let node = self.node(id);
        let measure = match &node.state {
            NodeState::Encoded { tag_bytes, content } => {
                let total = tag_bytes.len() + content.len();
                if out.len() < total {
                    return Err(Error::buffer_too_small(total, out.len()));
                }
                out[..tag_bytes.len()].copy_from_slice(tag_bytes);
                out[tag_bytes.len()..total].copy_from_slice(content);
                return Ok(total);
            }
            NodeState::Pending {
                measured: Some(measure),
            } => *measure,
            NodeState::Pending { measured: None } => {
                unreachable!("node {:?} encoded before being measured", id)
            }
        };

        let total = measure.header_len + measure.content_len;
        if out.len() < total {
            return Err(Error::buffer_too_small(total, out.len()));
        }
        let header: Header = node.header().with_content_len(measure.content_len);
        let mut pos = set_tag(&header, out)?;
        if node.is_constructed() {
            pos += self.encode_chain(node.child(), &mut out[pos..total])?;
            if node.length_form() == LengthForm::Indefinite {
                out[pos..pos + END_OF_CONTENTS.len()].copy_from_slice(&END_OF_CONTENTS);
                pos += END_OF_CONTENTS.len();
            }
        }
        Ok(pos)
    }

    fn cache_chain(&mut self, head: Option<NodeId>, scratch: &Bytes, mut pos: usize) -> usize {
        let mut current = head;
        while let Some(id) = current {
            pos = self.cache_node(id, scratch, pos);
            current = self.node(id).next();
        }
        pos
    }

    /// Points a freshly encoded node at its octets in `scratch`
    fn cache_node(&mut self, id: NodeId, scratch: &Bytes, pos: usize) -> usize {
        let measure = match &self.node(id).state {
            NodeState::Encoded { tag_bytes, content } => {
                return pos + tag_bytes.len() + content.len();
            }
            NodeState::Pending { measured } => match measured {
                Some(measure) => *measure,
                None => unreachable!("node {:?} cached before being measured", id),
            },
        };

        let content_start = pos + measure.header_len;
        let end = content_start + measure.content_len;
        if self.node(id).is_constructed() {
            let child = self.node(id).child();
            self.cache_chain(child, scratch, content_start);
        }
        self.node_mut(id).state = NodeState::Encoded {
            tag_bytes: scratch.slice(pos..content_start),
            content: scratch.slice(content_start..end),
        };
        end
    }
}
