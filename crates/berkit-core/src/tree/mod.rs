//! In-memory element trees.
//!
//! ## Architecture
//!
//! A [`Session`] is an arena that owns every [`Node`] created while decoding
//! or building one tree. Nodes are addressed by [`NodeId`]; parent, child
//! and sibling relations are ids, not references, and nothing is freed until
//! the session is dropped. Ids from one session mean nothing in another.
//!
//! A [`Tree`] is a root id plus a movable cursor. Cloning a tree is a
//! shallow copy: both copies address the same nodes in the same session, so
//! a mutation made through one is visible through the other. This aliasing
//! is intentional; use a second session to get an independent tree.
//!
//! ## Cached Encodings
//!
//! Each node is either [`NodeState::Encoded`], holding its identifier and
//! length octets plus its content octets, or [`NodeState::Pending`], meaning
//! the octets must be recomputed from the children before encoding. Any
//! structural mutation turns the mutated node and all its constructed
//! ancestors back to `Pending`.

mod decode;
mod encode;
mod sort;
pub mod visit;

use crate::ber::{header_bytes, Class, Encoding, Header, LengthForm};
use crate::error::{Error, Result};
use bytes::Bytes;
use tracing::trace;

pub use decode::{Decoded, DecoderConfig, Trailing};
pub use sort::der_compare;

/// Stable handle of a node inside its session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Position of the node in the session arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Sizes recorded by the measuring pass of the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measure {
    /// Identifier plus length octets
    pub header_len: usize,
    /// Content octets, including a trailing end-of-contents pair
    pub content_len: usize,
}

/// Cached octets of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeState {
    /// Octets are known and can be copied verbatim
    Encoded {
        /// Identifier and length octets
        tag_bytes: Bytes,
        /// Content octets
        content: Bytes,
    },
    /// Octets must be rebuilt from the children
    Pending {
        /// Filled in by the measuring pass
        measured: Option<Measure>,
    },
}

/// One BER/DER element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    class: Class,
    encoding: Encoding,
    tag: u32,
    length_form: LengthForm,
    pub(crate) state: NodeState,
    parent: Option<NodeId>,
    child: Option<NodeId>,
    next: Option<NodeId>,
    prev: Option<NodeId>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            class: Class::Universal,
            encoding: Encoding::Primitive,
            tag: 0,
            length_form: LengthForm::Definite,
            state: NodeState::Pending { measured: None },
            parent: None,
            child: None,
            next: None,
            prev: None,
        }
    }
}

impl Node {
    /// Tag class
    pub fn class(&self) -> Class {
        self.class
    }

    /// Primitive or constructed
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Tag number
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Definite or indefinite length
    pub fn length_form(&self) -> LengthForm {
        self.length_form
    }

    /// True if the node holds children rather than raw content
    pub fn is_constructed(&self) -> bool {
        self.encoding == Encoding::Constructed
    }

    /// True if the node matches a universal tag
    pub fn is_universal(&self, tag: u32) -> bool {
        self.class == Class::Universal && self.tag == tag
    }

    /// Cached state
    pub fn state(&self) -> &NodeState {
        &self.state
    }

    /// True if the cached octets must be recomputed before encoding
    pub fn is_stale(&self) -> bool {
        matches!(self.state, NodeState::Pending { .. })
    }

    /// Identifier and length octets, if cached
    pub fn tag_bytes(&self) -> Option<&Bytes> {
        match &self.state {
            NodeState::Encoded { tag_bytes, .. } => Some(tag_bytes),
            NodeState::Pending { .. } => None,
        }
    }

    /// Content octets, if cached
    pub fn content(&self) -> Option<&Bytes> {
        match &self.state {
            NodeState::Encoded { content, .. } => Some(content),
            NodeState::Pending { .. } => None,
        }
    }

    /// Header view of the node; the content length is zero while stale
    pub fn header(&self) -> Header {
        Header::new(self.class, self.encoding, self.tag)
            .with_length_form(self.length_form)
            .with_content_len(self.content().map_or(0, Bytes::len))
    }

    /// Parent, or `None` for a root
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// First child
    pub fn child(&self) -> Option<NodeId> {
        self.child
    }

    /// Next sibling
    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    /// Previous sibling
    pub fn prev(&self) -> Option<NodeId> {
        self.prev
    }
}

/// Arena owning every node of one decode or build session
#[derive(Debug, Default)]
pub struct Session {
    nodes: Vec<Node>,
}

impl Session {
    /// Creates an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes ever allocated in this session
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if nothing has been allocated
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up a node
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this session.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Looks up a node, returning `None` for ids past the end of the arena
    ///
    /// An id from another session that happens to be in range still
    /// resolves; ids carry no session identity.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub(crate) fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Allocates a detached universal primitive node with tag 0 and no content
    pub fn alloc_node(&mut self) -> NodeId {
        self.push(Node::default())
    }

    /// Allocates a detached primitive node holding `content`
    pub fn new_primitive(&mut self, class: Class, tag: u32, content: impl Into<Bytes>) -> NodeId {
        let content = content.into();
        let header = Header::new(class, Encoding::Primitive, tag).with_content_len(content.len());
        self.push(Node {
            class,
            tag,
            state: NodeState::Encoded {
                tag_bytes: Bytes::from(header_bytes(&header)),
                content,
            },
            ..Node::default()
        })
    }

    /// Allocates a detached, empty constructed node
    pub fn new_constructed(&mut self, class: Class, tag: u32, length_form: LengthForm) -> NodeId {
        self.push(Node {
            class,
            encoding: Encoding::Constructed,
            tag,
            length_form,
            ..Node::default()
        })
    }

    /// Replaces the content of a primitive node
    pub fn set_content(&mut self, id: NodeId, content: impl Into<Bytes>) -> Result<()> {
        let node = self.node(id);
        if node.is_constructed() {
            return Err(Error::type_mismatch("primitive node", "constructed node"));
        }
        let content = content.into();
        let header = Header::new(node.class, Encoding::Primitive, node.tag)
            .with_content_len(content.len());
        self.node_mut(id).state = NodeState::Encoded {
            tag_bytes: Bytes::from(header_bytes(&header)),
            content,
        };
        self.invalidate_parent(id);
        Ok(())
    }

    /// Changes the class and tag number of a node (implicit tagging)
    pub fn retag(&mut self, id: NodeId, class: Class, tag: u32) {
        let node = self.node_mut(id);
        node.class = class;
        node.tag = tag;
        let primitive_content = match &node.state {
            NodeState::Encoded { content, .. } if !node.is_constructed() => Some(content.clone()),
            _ => None,
        };
        match primitive_content {
            Some(content) => {
                let header =
                    Header::new(class, Encoding::Primitive, tag).with_content_len(content.len());
                node.state = NodeState::Encoded {
                    tag_bytes: Bytes::from(header_bytes(&header)),
                    content,
                };
                self.invalidate_parent(id);
            }
            None => self.invalidate(id),
        }
    }

    /// Switches a constructed node between definite and indefinite length
    pub fn set_length_form(&mut self, id: NodeId, form: LengthForm) -> Result<()> {
        if !self.node(id).is_constructed() {
            return Err(Error::NotConstructed);
        }
        if self.node(id).length_form != form {
            self.node_mut(id).length_form = form;
            self.invalidate(id);
        }
        Ok(())
    }

    /// Marks `id` and every constructed ancestor as needing re-encoding
    ///
    /// Primitive nodes keep their content; only their ancestors are cleared.
    pub fn invalidate(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(id) = current {
            let node = self.node_mut(id);
            if node.is_constructed() {
                node.state = NodeState::Pending { measured: None };
            }
            current = node.parent;
        }
    }

    fn invalidate_parent(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            self.invalidate(parent);
        }
    }

    /// Iterates over `head` and the siblings after it
    pub fn siblings(&self, head: Option<NodeId>) -> Siblings<'_> {
        Siblings {
            session: self,
            next: head,
        }
    }

    /// Iterates over the children of `id`
    pub fn children(&self, id: NodeId) -> Siblings<'_> {
        self.siblings(self.node(id).child)
    }

    /// Last node of the chain starting at `head`
    fn chain_tail(&self, head: NodeId) -> NodeId {
        let mut tail = head;
        while let Some(next) = self.node(tail).next {
            tail = next;
        }
        tail
    }

    /// Checks that `head` starts a detached chain that may be linked next
    /// to `anchor` under `parent`
    ///
    /// A node with neither parent nor `prev` heads its chain, since every
    /// `next` link has a matching `prev`. Top-level chains look detached
    /// that way, so the anchor must also lie outside the chain.
    fn check_spliceable(
        &self,
        head: NodeId,
        anchor: Option<NodeId>,
        parent: Option<NodeId>,
    ) -> Result<()> {
        let node = self.node(head);
        if node.parent.is_some() || node.prev.is_some() {
            return Err(Error::NodeAttached);
        }
        let chain: Vec<NodeId> = self.siblings(Some(head)).collect();
        if anchor.is_some_and(|anchor| chain.contains(&anchor)) {
            return Err(Error::NodeAttached);
        }
        // Refuse to hang a chain below one of its own members
        let mut ancestor = parent;
        while let Some(id) = ancestor {
            if chain.contains(&id) {
                return Err(Error::NodeAttached);
            }
            ancestor = self.node(id).parent;
        }
        Ok(())
    }

    fn adopt_chain(&mut self, head: NodeId, parent: Option<NodeId>) {
        let mut current = Some(head);
        while let Some(id) = current {
            let node = self.node_mut(id);
            node.parent = parent;
            current = node.next;
        }
    }

    /// Appends the detached chain `head` to the children of `parent`
    pub fn append_child(&mut self, parent: NodeId, head: NodeId) -> Result<()> {
        if !self.node(parent).is_constructed() {
            return Err(Error::NotConstructed);
        }
        match self.node(parent).child {
            Some(first) => {
                let last = self.chain_tail(first);
                self.insert_after(last, head)
            }
            None => {
                self.check_spliceable(head, None, Some(parent))?;
                self.adopt_chain(head, Some(parent));
                self.node_mut(parent).child = Some(head);
                self.invalidate(parent);
                trace!("Attached chain {:?} under {:?}", head, parent);
                Ok(())
            }
        }
    }

    /// Splices the detached chain `head` right after `anchor`
    pub fn insert_after(&mut self, anchor: NodeId, head: NodeId) -> Result<()> {
        let parent = self.node(anchor).parent;
        self.check_spliceable(head, Some(anchor), parent)?;
        let tail = self.chain_tail(head);
        let after = self.node(anchor).next;

        self.adopt_chain(head, parent);
        self.node_mut(tail).next = after;
        if let Some(after) = after {
            self.node_mut(after).prev = Some(tail);
        }
        self.node_mut(anchor).next = Some(head);
        self.node_mut(head).prev = Some(anchor);

        if let Some(parent) = parent {
            self.invalidate(parent);
        }
        Ok(())
    }

    /// Splices the detached chain `head` right before `anchor`
    pub fn insert_before(&mut self, anchor: NodeId, head: NodeId) -> Result<()> {
        let parent = self.node(anchor).parent;
        self.check_spliceable(head, Some(anchor), parent)?;
        self.adopt_chain(head, parent);
        self.link_chain_before(anchor, head);
        if let Some(parent) = parent {
            self.invalidate(parent);
        }
        Ok(())
    }

    /// Relinks an already-adopted chain in front of `anchor`
    pub(crate) fn link_chain_before(&mut self, anchor: NodeId, head: NodeId) {
        let tail = self.chain_tail(head);
        let before = self.node(anchor).prev;

        self.node_mut(head).prev = before;
        match before {
            Some(before) => self.node_mut(before).next = Some(head),
            None => {
                if let Some(parent) = self.node(anchor).parent {
                    self.node_mut(parent).child = Some(head);
                }
            }
        }
        self.node_mut(tail).next = Some(anchor);
        self.node_mut(anchor).prev = Some(tail);
    }

    /// Unlinks one node from its sibling chain without touching caches
    pub(crate) fn unlink(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let node = self.node(id);
            (node.parent, node.prev, node.next)
        };
        match prev {
            Some(prev) => self.node_mut(prev).next = next,
            None => {
                if let Some(parent) = parent {
                    self.node_mut(parent).child = next;
                }
            }
        }
        if let Some(next) = next {
            self.node_mut(next).prev = prev;
        }
        let node = self.node_mut(id);
        node.prev = None;
        node.next = None;
    }

    /// Detaches `id` (with its subtree) from its parent and siblings
    ///
    /// The node stays in the arena and can be spliced elsewhere.
    pub fn remove(&mut self, id: NodeId) {
        let parent = self.node(id).parent;
        self.unlink(id);
        self.node_mut(id).parent = None;
        if let Some(parent) = parent {
            self.invalidate(parent);
        }
        trace!("Removed {:?} from {:?}", id, parent);
    }

    /// Number of ancestors above `id`
    pub fn depth(&self, id: NodeId) -> usize {
        std::iter::successors(self.node(id).parent, |&p| self.node(p).parent).count()
    }
}

/// Iterator over a sibling chain
#[derive(Debug, Clone)]
pub struct Siblings<'a> {
    session: &'a Session,
    next: Option<NodeId>,
}

impl Iterator for Siblings<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.session.node(id).next;
        Some(id)
    }
}

/// A root plus a movable cursor over nodes of one session
///
/// Cloning is shallow: the clone shares nodes with the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    root: NodeId,
    current: NodeId,
    encoded: Option<Bytes>,
}

impl Tree {
    /// Creates a tree with the cursor on `root`
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            current: root,
            encoded: None,
        }
    }

    /// First node of the top-level chain
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Node under the cursor
    pub fn current(&self) -> NodeId {
        self.current
    }

    /// Places the cursor on `id`
    pub fn set_current(&mut self, id: NodeId) {
        self.current = id;
    }

    /// Octets from the last [`Tree::encode`], which mutations do not update
    pub fn encoded(&self) -> Option<&Bytes> {
        self.encoded.as_ref()
    }

    /// Moves the cursor back to the root
    pub fn reset(&mut self) {
        self.current = self.root;
    }

    /// Moves up to `steps` siblings forward, returning the steps taken
    pub fn forward(&mut self, session: &Session, steps: usize) -> usize {
        let mut taken = 0;
        while taken < steps {
            match session.node(self.current).next {
                Some(next) => self.current = next,
                None => break,
            }
            taken += 1;
        }
        taken
    }

    /// Moves up to `steps` siblings backward, returning the steps taken
    pub fn backward(&mut self, session: &Session, steps: usize) -> usize {
        let mut taken = 0;
        while taken < steps {
            match session.node(self.current).prev {
                Some(prev) => self.current = prev,
                None => break,
            }
            taken += 1;
        }
        taken
    }

    /// Moves to the first child of the current node
    pub fn down(&mut self, session: &Session) -> Result<()> {
        self.current = session.node(self.current).child.ok_or(Error::NoChild)?;
        Ok(())
    }

    /// Moves to the parent of the current node
    pub fn up(&mut self, session: &Session) -> Result<()> {
        self.current = session.node(self.current).parent.ok_or(Error::NoParent)?;
        Ok(())
    }

    /// Encodes the whole top-level chain and keeps the result
    pub fn encode(&mut self, session: &mut Session) -> Result<Bytes> {
        let bytes = Bytes::from(session.encode_to_vec(self.root)?);
        self.encoded = Some(bytes.clone());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::tag;

    fn leaf(session: &mut Session, value: u8) -> NodeId {
        session.new_primitive(Class::Universal, tag::INTEGER, vec![value])
    }

    fn sequence_of(session: &mut Session, values: &[u8]) -> (NodeId, Vec<NodeId>) {
        let seq = session.new_constructed(Class::Universal, tag::SEQUENCE, LengthForm::Definite);
        let ids: Vec<NodeId> = values.iter().map(|&v| leaf(session, v)).collect();
        for &id in &ids {
            session.append_child(seq, id).unwrap();
        }
        (seq, ids)
    }

    #[test]
    fn test_alloc_defaults() {
        let mut session = Session::new();
        let id = session.alloc_node();
        let node = session.node(id);
        assert_eq!(node.class(), Class::Universal);
        assert_eq!(node.encoding(), Encoding::Primitive);
        assert!(node.parent().is_none());
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_append_links_siblings() {
        let mut session = Session::new();
        let (seq, ids) = sequence_of(&mut session, &[1, 2, 3]);

        assert_eq!(session.node(seq).child(), Some(ids[0]));
        assert_eq!(session.children(seq).collect::<Vec<_>>(), ids);
        assert_eq!(session.node(ids[1]).prev(), Some(ids[0]));
        assert_eq!(session.node(ids[1]).next(), Some(ids[2]));
        assert!(ids.iter().all(|&id| session.node(id).parent() == Some(seq)));
    }

    #[test]
    fn test_append_to_primitive_fails() {
        let mut session = Session::new();
        let a = leaf(&mut session, 1);
        let b = leaf(&mut session, 2);
        assert_eq!(session.append_child(a, b), Err(Error::NotConstructed));
    }

    #[test]
    fn test_insert_before_head_fixes_parent() {
        let mut session = Session::new();
        let (seq, ids) = sequence_of(&mut session, &[1, 2]);
        let new = leaf(&mut session, 0);
        session.insert_before(ids[0], new).unwrap();

        assert_eq!(session.node(seq).child(), Some(new));
        assert_eq!(session.children(seq).collect::<Vec<_>>(), vec![new, ids[0], ids[1]]);
        assert_eq!(session.node(new).parent(), Some(seq));
    }

    #[test]
    fn test_insert_after_splices_chain() {
        let mut session = Session::new();
        let (seq, ids) = sequence_of(&mut session, &[1, 4]);

        // Build a detached two-node chain and splice it in the middle
        let two = leaf(&mut session, 2);
        let three = leaf(&mut session, 3);
        session.insert_after(two, three).unwrap();
        session.insert_after(ids[0], two).unwrap();

        let order: Vec<NodeId> = session.children(seq).collect();
        assert_eq!(order, vec![ids[0], two, three, ids[1]]);
        assert_eq!(session.node(three).parent(), Some(seq));
        assert_eq!(session.node(ids[1]).prev(), Some(three));
    }

    #[test]
    fn test_attached_node_rejected() {
        let mut session = Session::new();
        let (_, ids) = sequence_of(&mut session, &[1, 2]);
        let (other, _) = sequence_of(&mut session, &[3]);
        assert_eq!(session.append_child(other, ids[1]), Err(Error::NodeAttached));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut session = Session::new();
        let (outer, _) = sequence_of(&mut session, &[1]);
        let inner = session.new_constructed(Class::Universal, tag::SEQUENCE, LengthForm::Definite);
        session.append_child(outer, inner).unwrap();
        assert_eq!(session.append_child(inner, outer), Err(Error::NodeAttached));
    }

    #[test]
    fn test_insert_next_to_itself_rejected() {
        let mut session = Session::new();
        let a = leaf(&mut session, 1);
        assert_eq!(session.insert_after(a, a), Err(Error::NodeAttached));
        assert_eq!(session.insert_before(a, a), Err(Error::NodeAttached));
        assert!(session.node(a).next().is_none());
        assert!(session.node(a).prev().is_none());
    }

    #[test]
    fn test_top_level_chain_cannot_loop() {
        let mut session = Session::new();
        let tree = session.decode(vec![0x05, 0x00, 0x05, 0x00]).unwrap().tree;
        let r0 = tree.root();
        let r1 = session.node(r0).next().unwrap();

        assert_eq!(session.insert_after(r1, r0), Err(Error::NodeAttached));
        assert_eq!(session.insert_before(r1, r0), Err(Error::NodeAttached));
        assert_eq!(session.siblings(Some(r0)).take(10).count(), 2);
        assert_eq!(session.encode_to_vec(r0).unwrap(), vec![0x05, 0x00, 0x05, 0x00]);

        // A separate top-level chain may still be spliced in
        let extra = leaf(&mut session, 7);
        session.insert_after(r1, extra).unwrap();
        assert_eq!(session.siblings(Some(r0)).count(), 3);
    }

    #[test]
    fn test_get_out_of_range() {
        let mut session = Session::new();
        let a = leaf(&mut session, 1);
        assert!(session.get(a).is_some());
        let other = Session::new();
        assert!(other.get(a).is_none());
    }

    #[test]
    fn test_remove_head_and_tail() {
        let mut session = Session::new();
        let (seq, ids) = sequence_of(&mut session, &[1, 2, 3]);
        session.remove(ids[0]);
        assert_eq!(session.node(seq).child(), Some(ids[1]));
        assert!(session.node(ids[1]).prev().is_none());
        session.remove(ids[2]);
        assert_eq!(session.children(seq).collect::<Vec<_>>(), vec![ids[1]]);
        assert!(session.node(ids[0]).parent().is_none());
    }

    #[test]
    fn test_invalidation_climbs_to_root() {
        let mut session = Session::new();
        let outer = session.new_constructed(Class::Universal, tag::SEQUENCE, LengthForm::Definite);
        let (inner, ids) = sequence_of(&mut session, &[1, 2]);
        session.append_child(outer, inner).unwrap();
        session.encode_to_vec(outer).unwrap();
        session.materialize(outer).unwrap();
        session.materialize(inner).unwrap();
        assert!(!session.node(outer).is_stale());
        assert!(!session.node(inner).is_stale());

        session.remove(ids[1]);
        assert!(session.node(inner).is_stale());
        assert!(session.node(outer).is_stale());
        assert!(!session.node(ids[0]).is_stale());
    }

    #[test]
    fn test_cursor_moves() {
        let mut session = Session::new();
        let (seq, ids) = sequence_of(&mut session, &[1, 2, 3]);
        let mut tree = Tree::new(seq);

        assert_eq!(tree.up(&session), Err(Error::NoParent));
        tree.down(&session).unwrap();
        assert_eq!(tree.current(), ids[0]);
        assert_eq!(tree.forward(&session, 5), 2);
        assert_eq!(tree.current(), ids[2]);
        assert_eq!(tree.backward(&session, 1), 1);
        assert_eq!(tree.current(), ids[1]);
        assert_eq!(tree.down(&session), Err(Error::NoChild));
        tree.up(&session).unwrap();
        assert_eq!(tree.current(), seq);
        tree.forward(&session, 1);
        tree.reset();
        assert_eq!(tree.current(), seq);
    }

    #[test]
    fn test_tree_clone_aliases_nodes() {
        let mut session = Session::new();
        let (seq, ids) = sequence_of(&mut session, &[1, 2]);
        let tree = Tree::new(seq);
        let mut copy = tree.clone();
        copy.down(&session).unwrap();

        session.remove(ids[0]);
        assert_eq!(session.node(tree.root()).child(), Some(ids[1]));
        assert_eq!(copy.current(), ids[0]);
        assert!(session.node(copy.current()).parent().is_none());
    }

    #[test]
    fn test_retag_primitive_rewrites_header() {
        let mut session = Session::new();
        let (seq, ids) = sequence_of(&mut session, &[5]);
        session.materialize(seq).unwrap();
        session.retag(ids[0], Class::Context, 3);
        let node = session.node(ids[0]);
        assert_eq!(node.tag_bytes().unwrap().as_ref(), &[0x83, 0x01]);
        assert!(session.node(seq).is_stale());
    }

    #[test]
    fn test_depth() {
        let mut session = Session::new();
        let outer = session.new_constructed(Class::Universal, tag::SEQUENCE, LengthForm::Definite);
        let (inner, ids) = sequence_of(&mut session, &[1]);
        session.append_child(outer, inner).unwrap();
        assert_eq!(session.depth(outer), 0);
        assert_eq!(session.depth(ids[0]), 2);
    }
}
