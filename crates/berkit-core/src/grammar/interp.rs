//! Grammar traversal engine.
//!
//! Reading, matching and searching share one walker, [`Interp`], which
//! differs only in its [`SlotSink`]: a `Vec<Value>` collects decoded slots,
//! [`DiscardSlots`] counts them and skips decoding. Building walks the
//! grammar separately with [`Builder`] because it creates nodes instead of
//! locating them.

use super::parser::Command;
use super::types::TypeKind;
use super::value::Value;
use crate::ber::{tag, Class, LengthForm};
use crate::error::{Error, Result};
use crate::tree::{NodeId, Session};
use tracing::trace;

/// How a command locates its element among the siblings of one level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Search {
    /// Any unused sibling of the level
    ScanAll,
    /// Unused siblings from the cursor onwards
    ScanFwd,
    /// Only the node under the cursor
    NoScan,
    /// The node under the cursor, without checking its type
    NoMatch,
}

/// What kind of sibling run a level walks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    /// Top-level chain starting at the tree cursor
    TopLevel,
    /// Children of a SEQUENCE
    Sequence,
    /// Children of a SET
    Set,
    /// Alternatives of a CHOICE
    Choice,
    /// A search candidate and the siblings after it
    Anchored,
}

/// Cursor state of one sibling run
#[derive(Debug, Clone)]
pub(crate) struct Level {
    head: Option<NodeId>,
    cursor: Option<NodeId>,
    used: Vec<NodeId>,
    searches: usize,
    scope: Scope,
}

impl Level {
    pub(crate) fn new(head: Option<NodeId>, scope: Scope) -> Self {
        Self {
            head,
            cursor: head,
            used: Vec::new(),
            searches: 0,
            scope,
        }
    }

    /// Node following the last consumed one
    pub(crate) fn cursor(&self) -> Option<NodeId> {
        self.cursor
    }

    fn consume(&mut self, session: &Session, id: NodeId) {
        self.used.push(id);
        self.cursor = session.node(id).next();
    }
}

/// Receiver of read slots
pub(crate) trait SlotSink {
    /// Whether leaf contents are decoded into values
    fn decodes(&self) -> bool;

    /// Appends one slot
    fn push(&mut self, value: Value);

    /// Number of slots pushed so far
    fn len(&self) -> usize;

    /// Drops slots after `len`
    fn truncate(&mut self, len: usize);

    /// Overwrites the slot at `index`
    fn set(&mut self, index: usize, value: Value);
}

impl SlotSink for Vec<Value> {
    fn decodes(&self) -> bool {
        true
    }

    fn push(&mut self, value: Value) {
        Vec::push(self, value);
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn truncate(&mut self, len: usize) {
        Vec::truncate(self, len);
    }

    fn set(&mut self, index: usize, value: Value) {
        self[index] = value;
    }
}

/// A sink that only counts slots
#[derive(Debug, Default)]
pub(crate) struct DiscardSlots {
    count: usize,
}

impl SlotSink for DiscardSlots {
    fn decodes(&self) -> bool {
        false
    }

    fn push(&mut self, _value: Value) {
        self.count += 1;
    }

    fn len(&self) -> usize {
        self.count
    }

    fn truncate(&mut self, len: usize) {
        self.count = self.count.min(len);
    }

    fn set(&mut self, _index: usize, _value: Value) {}
}

/// Number of slots a command reads or builds
pub(crate) fn slot_count(command: &Command<'_>) -> Result<usize> {
    let descriptor = command.descriptor;
    Ok(match descriptor.kind {
        TypeKind::Any => 1,
        TypeKind::Plain if descriptor.is_constructed() => slot_count_all(&command.children()?)?,
        TypeKind::Plain => 1,
        TypeKind::Choice | TypeKind::Optional => 1 + slot_count_all(&command.children()?)?,
    })
}

pub(crate) fn slot_count_all(commands: &[Command<'_>]) -> Result<usize> {
    commands.iter().map(slot_count).sum()
}

/// Walks grammar commands against live nodes
pub(crate) struct Interp<'a, S: SlotSink> {
    session: &'a Session,
    sink: &'a mut S,
}

impl<'a, S: SlotSink> Interp<'a, S> {
    pub(crate) fn new(session: &'a Session, sink: &'a mut S) -> Self {
        Self { session, sink }
    }

    pub(crate) fn run_list(&mut self, commands: &[Command<'_>], level: &mut Level) -> Result<()> {
        for command in commands {
            self.run_one(command, level)?;
        }
        Ok(())
    }

    fn run_one(&mut self, command: &Command<'_>, level: &mut Level) -> Result<()> {
        match command.descriptor.kind {
            TypeKind::Plain | TypeKind::Any => self.run_element(command, level),
            TypeKind::Choice => self.run_choice(command, level),
            TypeKind::Optional => self.run_optional(command, level),
        }
    }

    fn rule(command: &Command<'_>, level: &Level) -> Search {
        if command.descriptor.kind == TypeKind::Any && !command.is_tagged() {
            return Search::NoMatch;
        }
        match level.scope {
            Scope::Set => Search::ScanAll,
            Scope::Sequence if level.searches == 0 || command.is_tagged() => Search::ScanAll,
            Scope::Sequence => Search::ScanFwd,
            Scope::TopLevel if command.is_tagged() => Search::ScanAll,
            Scope::TopLevel => Search::ScanFwd,
            Scope::Choice => Search::NoScan,
            Scope::Anchored if level.searches == 0 => Search::NoScan,
            Scope::Anchored => Search::ScanFwd,
        }
    }

    fn find(&self, command: &Command<'_>, level: &Level, rule: Search) -> Option<NodeId> {
        let start = match rule {
            Search::ScanAll => level.head,
            _ => level.cursor,
        };
        let limit = match rule {
            Search::ScanAll | Search::ScanFwd => usize::MAX,
            Search::NoScan | Search::NoMatch => 1,
        };
        self.session
            .siblings(start)
            .take(limit)
            .filter(|id| !level.used.contains(id))
            .find(|&id| {
                trace!("Testing {:?} against '{}' ({:?})", id, command.name(), rule);
                rule == Search::NoMatch || self.fits(command, id)
            })
    }

    /// True if `id` has the class, tag, encoding and length form `command`
    /// asks for
    pub(crate) fn fits(&self, command: &Command<'_>, id: NodeId) -> bool {
        let node = self.session.node(id);
        let sole_child = || {
            let child = node.child()?;
            self.session.node(child).next().is_none().then_some(child)
        };
        if command.wildcard {
            return !command.is_explicit() || sole_child().is_some();
        }

        let descriptor = command.descriptor;
        if node.class() != command.class || node.tag() != command.tag() {
            return false;
        }
        if command.is_explicit() {
            if !node.is_constructed() || node.length_form() != command.length_form {
                return false;
            }
            let Some(child) = sole_child() else {
                return false;
            };
            if descriptor.kind == TypeKind::Any {
                return true;
            }
            let inner = self.session.node(child);
            return inner.class() == Class::Universal
                && inner.tag() == descriptor.tag
                && inner.encoding() == descriptor.encoding();
        }
        if descriptor.kind == TypeKind::Any {
            return true;
        }
        node.encoding() == descriptor.encoding() && node.length_form() == command.length_form
    }

    fn run_element(&mut self, command: &Command<'_>, level: &mut Level) -> Result<()> {
        let rule = Self::rule(command, level);
        let found = self.find(command, level, rule);
        level.searches += 1;
        let id = found.ok_or(Error::MatchNotFound)?;
        level.consume(self.session, id);

        let target = if command.is_explicit() {
            self.session.node(id).child().ok_or(Error::NoChild)?
        } else {
            id
        };
        let descriptor = command.descriptor;
        match descriptor.kind {
            TypeKind::Any => {
                self.sink.push(Value::Node(target));
                Ok(())
            }
            TypeKind::Plain if descriptor.is_constructed() => {
                let scope = if descriptor.tag == tag::SET {
                    Scope::Set
                } else {
                    Scope::Sequence
                };
                let mut inner = Level::new(self.session.node(target).child(), scope);
                self.run_list(&command.children()?, &mut inner)
            }
            TypeKind::Plain => self.read_leaf(command, target),
            TypeKind::Choice | TypeKind::Optional => {
                unreachable!("'{}' is not an element", command.name())
            }
        }
    }

    fn read_leaf(&mut self, command: &Command<'_>, id: NodeId) -> Result<()> {
        let node = self.session.node(id);
        let content: &[u8] = node.content().map_or(&[][..], |c| &c[..]);
        let codec = command.descriptor.codec;
        if self.sink.decodes() {
            let value = codec.decode(content)?;
            self.sink.push(value);
        } else {
            codec.skip(content).map_err(|_| Error::MatchNotFound)?;
            self.sink.push(Value::Absent);
        }
        Ok(())
    }

    fn fill_absent(&mut self, count: usize) {
        for _ in 0..count {
            self.sink.push(Value::Absent);
        }
    }

    fn run_choice(&mut self, command: &Command<'_>, level: &mut Level) -> Result<()> {
        let alternatives = command.children()?;
        let scope = if level.scope == Scope::Set {
            Scope::Set
        } else {
            Scope::Choice
        };

        let mut fitting = Vec::new();
        for (index, alternative) in alternatives.iter().enumerate() {
            let mut probe = Level {
                scope,
                ..level.clone()
            };
            let mut discard = DiscardSlots::default();
            match Interp::new(self.session, &mut discard).run_one(alternative, &mut probe) {
                Ok(()) => fitting.push(index),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        let chosen = match fitting.as_slice() {
            [] => return Err(Error::MatchNotFound),
            [only] => *only,
            many => {
                return Err(Error::ChoiceTooManyMatches { count: many.len() });
            }
        };
        trace!("Choice at {} took alternative {}", command.offset(), chosen);

        self.sink.push(Value::Selector(chosen));
        for (index, alternative) in alternatives.iter().enumerate() {
            if index == chosen {
                let outer = level.scope;
                level.scope = scope;
                let result = self.run_one(alternative, level);
                level.scope = outer;
                result?;
            } else {
                self.fill_absent(slot_count(alternative)?);
            }
        }
        Ok(())
    }

    fn run_optional(&mut self, command: &Command<'_>, level: &mut Level) -> Result<()> {
        let fields = command.children()?;
        let flag = self.sink.len();
        self.sink.push(Value::Found(true));
        let saved = level.clone();

        for (index, field) in fields.iter().enumerate() {
            match self.run_one(field, level) {
                Ok(()) => {}
                // Absent as a whole until some field consumed a node
                Err(e) if e.is_not_found() && level.used.len() == saved.used.len() => {
                    trace!("Optional block at {} absent", command.offset());
                    *level = saved;
                    self.sink.truncate(flag + 1);
                    self.sink.set(flag, Value::Found(false));
                    self.fill_absent(slot_count_all(&fields)?);
                    return Ok(());
                }
                Err(e) if e.is_not_found() => {
                    return Err(Error::PartialOptional { field: index });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Creates nodes from grammar commands and positional arguments
pub(crate) struct Builder<'a, 'v> {
    session: &'a mut Session,
    args: &'v [Value],
    next: usize,
}

impl<'a, 'v> Builder<'a, 'v> {
    pub(crate) fn new(session: &'a mut Session, args: &'v [Value]) -> Self {
        Self {
            session,
            args,
            next: 0,
        }
    }

    /// Arguments not consumed so far
    pub(crate) fn remaining(&self) -> usize {
        self.args.len() - self.next
    }

    /// Builds a chain of nodes, returning its head
    pub(crate) fn build_list(&mut self, commands: &[Command<'_>]) -> Result<Option<NodeId>> {
        let mut head = None;
        let mut tail: Option<NodeId> = None;
        for command in commands {
            let id = self.build_one(command)?;
            match tail {
                Some(tail) => self.session.insert_after(tail, id)?,
                None => head = Some(id),
            }
            tail = Some(id);
        }
        Ok(head)
    }

    fn take(&mut self, command: &Command<'_>) -> Result<(usize, &'v Value)> {
        let index = self.next;
        let value = self.args.get(index).ok_or(Error::MissingArgument {
            index,
            command: command.name(),
        })?;
        self.next += 1;
        Ok((index, value))
    }

    /// Class and tag of the element holding the content
    fn inner_tag(command: &Command<'_>) -> (Class, u32) {
        if command.is_explicit() {
            (Class::Universal, command.descriptor.tag)
        } else {
            (command.class, command.tag())
        }
    }

    fn build_one(&mut self, command: &Command<'_>) -> Result<NodeId> {
        let descriptor = command.descriptor;
        let id = match descriptor.kind {
            TypeKind::Choice | TypeKind::Optional => {
                return Err(Error::NotBuildable {
                    command: command.name(),
                });
            }
            TypeKind::Any => {
                let (index, value) = self.take(command)?;
                let id = value
                    .as_node()
                    .filter(|&id| self.session.get(id).is_some())
                    .ok_or(Error::ArgumentMismatch {
                        index,
                        command: command.name(),
                        expected: "node",
                    })?;
                if !command.is_explicit() && command.is_tagged() {
                    self.session.retag(id, command.class, command.tag());
                }
                id
            }
            TypeKind::Plain if descriptor.is_constructed() => {
                let (class, tag_number) = Self::inner_tag(command);
                let form = if command.is_explicit() {
                    LengthForm::Definite
                } else {
                    command.length_form
                };
                let id = self.session.new_constructed(class, tag_number, form);
                if let Some(head) = self.build_list(&command.children()?)? {
                    self.session.append_child(id, head)?;
                }
                if descriptor.tag == tag::SET {
                    self.session.sort_set(id)?;
                }
                id
            }
            TypeKind::Plain => {
                if !command.is_explicit() && command.length_form == LengthForm::Indefinite {
                    return Err(Error::IndefinitePrimitive {
                        command: command.name(),
                    });
                }
                let (index, value) = self.take(command)?;
                let codec = descriptor.codec;
                let content = codec.encode(value).ok_or(Error::ArgumentMismatch {
                    index,
                    command: command.name(),
                    expected: codec.value_kind(),
                })??;
                let (class, tag_number) = Self::inner_tag(command);
                self.session.new_primitive(class, tag_number, content)
            }
        };

        if !command.is_explicit() {
            return Ok(id);
        }
        let wrapper =
            self.session
                .new_constructed(command.class, command.tag(), command.length_form);
        self.session.append_child(wrapper, id)?;
        Ok(wrapper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parser::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slot_count() {
        let commands =
            parse("(sequence (integer) (choice (null) (set (boolean) (any))) (optional (enum)))")
                .unwrap();
        // integer, selector + null + boolean + any, flag + enum
        assert_eq!(slot_count_all(&commands).unwrap(), 7);
    }

    #[test]
    fn test_discard_slots_counts() {
        let mut sink = DiscardSlots::default();
        assert!(!sink.decodes());
        sink.push(Value::Null);
        sink.push(Value::Null);
        sink.truncate(1);
        sink.set(0, Value::Absent);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_rules() {
        let tagged = parse("(integer (c 0))").unwrap().remove(0);
        let plain = parse("(integer)").unwrap().remove(0);
        let any = parse("(any)").unwrap().remove(0);

        let mut level = Level::new(None, Scope::Sequence);
        assert_eq!(Interp::<DiscardSlots>::rule(&plain, &level), Search::ScanAll);
        level.searches = 1;
        assert_eq!(Interp::<DiscardSlots>::rule(&plain, &level), Search::ScanFwd);
        assert_eq!(Interp::<DiscardSlots>::rule(&tagged, &level), Search::ScanAll);
        assert_eq!(Interp::<DiscardSlots>::rule(&any, &level), Search::NoMatch);

        let level = Level::new(None, Scope::Anchored);
        assert_eq!(Interp::<DiscardSlots>::rule(&tagged, &level), Search::NoScan);
        let level = Level::new(None, Scope::Set);
        assert_eq!(Interp::<DiscardSlots>::rule(&plain, &level), Search::ScanAll);
    }
}
