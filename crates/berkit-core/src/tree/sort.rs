//! DER canonical ordering.
//!
//! Members of a SET are ordered by their complete encodings compared as
//! octet strings, a shorter encoding first when it is a prefix of a longer
//! one (X.690 §11.6).

use super::{NodeId, Session};
use crate::ber::{tag, LengthForm};
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Compares two complete encodings in DER SET order
pub fn der_compare(a: &[u8], b: &[u8]) -> Ordering {
    let overlap = a.len().min(b.len());
    match a[..overlap].cmp(&b[..overlap]) {
        Ordering::Equal => a.len().cmp(&b.len()),
        other => other,
    }
}

impl Session {
    /// Sorts the children of `parent` into DER SET order
    ///
    /// Every child is materialized first so that each has cached octets to
    /// compare. The parent is invalidated only if the order changed.
    pub fn sort_set(&mut self, parent: NodeId) -> Result<()> {
        if !self.node(parent).is_constructed() {
            return Err(Error::NotConstructed);
        }
        let Some(head) = self.node(parent).child() else {
            return Ok(());
        };
        self.materialize_chain(head)?;

        let keys: HashMap<NodeId, Vec<u8>> = self
            .siblings(Some(head))
            .map(|id| {
                let node = self.node(id);
                let mut key = Vec::new();
                if let (Some(tag_bytes), Some(content)) = (node.tag_bytes(), node.content()) {
                    key.extend_from_slice(tag_bytes);
                    key.extend_from_slice(content);
                }
                (id, key)
            })
            .collect();

        // Selection sort: pull the smallest remaining member in front of
        // the first unsorted one.
        let mut changed = false;
        let mut unsorted = Some(head);
        while let Some(start) = unsorted {
            let mut min = start;
            for id in self.siblings(self.node(start).next()) {
                if der_compare(&keys[&id], &keys[&min]) == Ordering::Less {
                    min = id;
                }
            }
            if min == start {
                unsorted = self.node(start).next();
            } else {
                self.unlink(min);
                self.link_chain_before(start, min);
                changed = true;
            }
        }

        if changed {
            debug!("Reordered {} members of {:?}", keys.len(), parent);
            self.invalidate(parent);
        }
        Ok(())
    }

    /// Brings the chain at `root` into DER form
    ///
    /// Every universal SET is sorted and every indefinite length becomes
    /// definite. Inner elements are handled before their parents, so a
    /// parent sorts on its members' final encodings.
    pub fn canonicalize(&mut self, root: NodeId) -> Result<()> {
        let chain: Vec<NodeId> = self.siblings(Some(root)).collect();
        for id in chain {
            if !self.node(id).is_constructed() {
                continue;
            }
            if let Some(child) = self.node(id).child() {
                self.canonicalize(child)?;
            }
            self.set_length_form(id, LengthForm::Definite)?;
            if self.node(id).is_universal(tag::SET) {
                self.sort_set(id)?;
            }
        }
        Ok(())
    }
}
