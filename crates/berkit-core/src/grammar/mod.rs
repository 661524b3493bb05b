//! Grammar-driven building, reading, matching and searching.
//!
//! ## Grammar Text
//!
//! A grammar describes ASN.1 structure with parenthesized commands, see
//! [`parser`] for the syntax and [`types`] for the command names:
//!
//! ```text
//! (sequence
//!     (object-identifier)
//!     (optional (boolean (c 0)))
//!     (octet-string))
//! ```
//!
//! ## Modes
//!
//! - [`build`] creates a new tree from positional [`Value`] arguments.
//! - [`read`] destructures the tree under the cursor into values and moves
//!   the cursor past what it consumed.
//! - [`matches`] runs the same traversal without decoding anything.
//! - [`search`] walks the whole tree for the first place the grammar matches
//!   and moves the cursor there.
//!
//! Reading returns one value per slot in grammar order; see [`value`].

mod interp;
pub mod parser;
pub mod types;
pub mod value;

pub use parser::{parse, Command, Tagging};
pub use types::{lookup, Codec, TypeDescriptor, TypeKind};
pub use value::Value;

use crate::error::{Error, Result};
use crate::tree::{NodeId, Session, Tree};
use interp::{Builder, DiscardSlots, Interp, Level, Scope};
use tracing::debug;

/// Builds a new tree from `grammar`, consuming one argument per slot
///
/// `choice` and `optional` cannot be built; the caller decides which
/// branch to write by picking the grammar.
pub fn build(session: &mut Session, grammar: &str, args: &[Value]) -> Result<Tree> {
    let commands = parse(grammar)?;
    let mut builder = Builder::new(session, args);
    let head = builder.build_list(&commands)?;
    let unused = builder.remaining();
    if unused > 0 {
        return Err(Error::UnusedArguments { count: unused });
    }
    let root = head.ok_or_else(|| Error::truncated(grammar.len(), "grammar holds no command"))?;
    debug!("Built tree from {} arguments", args.len());
    Ok(Tree::new(root))
}

/// Reads the elements starting at the cursor into slot values
///
/// On success the cursor moves to the element following the last one
/// consumed at the top level. When that element ends its chain the cursor
/// stays on it, so a repeated read sees the same element again.
pub fn read(session: &Session, tree: &mut Tree, grammar: &str) -> Result<Vec<Value>> {
    let commands = parse(grammar)?;
    let mut values = Vec::with_capacity(interp::slot_count_all(&commands)?);
    let mut level = Level::new(Some(tree.current()), Scope::TopLevel);
    Interp::new(session, &mut values).run_list(&commands, &mut level)?;
    if let Some(next) = level.cursor() {
        tree.set_current(next);
    }
    Ok(values)
}

/// Tests whether the elements starting at the cursor fit `grammar`
///
/// Neither the tree nor the cursor changes. A mismatch is `Ok(false)`;
/// malformed grammar and ambiguous choices are still errors.
///
/// Leaf contents are validated but not kept. Content that fails its type's
/// decoder counts as a mismatch. [`read`] reports the same input
/// as the decode error instead.
pub fn matches(session: &Session, tree: &Tree, grammar: &str) -> Result<bool> {
    let commands = parse(grammar)?;
    let mut level = Level::new(Some(tree.current()), Scope::TopLevel);
    match Interp::new(session, &mut DiscardSlots::default()).run_list(&commands, &mut level) {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Moves the cursor to the first node, in depth-first order, where
/// `grammar` matches
///
/// Returns [`Error::MatchNotFound`] and leaves the cursor alone if no node
/// qualifies.
pub fn search(session: &Session, tree: &mut Tree, grammar: &str) -> Result<()> {
    let commands = parse(grammar)?;
    let first = &commands[0];
    let any_candidate = match first.descriptor.kind {
        TypeKind::Choice | TypeKind::Optional => true,
        TypeKind::Any => !first.is_tagged() && !first.wildcard,
        TypeKind::Plain => false,
    };

    let mut discard = DiscardSlots::default();
    let mut candidate = Some(tree.root());
    let mut tested = 0usize;
    while let Some(id) = candidate {
        if any_candidate || Interp::new(session, &mut discard).fits(first, id) {
            tested += 1;
            let mut level = Level::new(Some(id), Scope::Anchored);
            match Interp::new(session, &mut discard).run_list(&commands, &mut level) {
                Ok(()) => {
                    debug!("Search matched {:?} after {} candidates", id, tested);
                    tree.set_current(id);
                    return Ok(());
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        candidate = next_preorder(session, id);
    }
    debug!("Search found nothing after {} candidates", tested);
    Err(Error::MatchNotFound)
}

/// Number of slots [`read`] returns for `grammar`
pub fn slot_count(grammar: &str) -> Result<usize> {
    interp::slot_count_all(&parse(grammar)?)
}

/// Children first, then siblings, then the siblings of each ancestor
fn next_preorder(session: &Session, id: NodeId) -> Option<NodeId> {
    let node = session.node(id);
    if let Some(child) = node.child() {
        return Some(child);
    }
    let mut current = id;
    loop {
        let node = session.node(current);
        if let Some(next) = node.next() {
            return Some(next);
        }
        current = node.parent()?;
    }
}
