//! Ordered sequence for insert/delete membership
//!
//! Elements are kept sorted by their natural order after every insert, so the
//! visible sequence depends only on which inserts and deletes are known.
//! Elements are not deduplicated by value: exactly-once membership relies on
//! operation ids being unique.

use super::history::{History, Stamped};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SequenceEdit<E> {
    Insert(E),
    /// Removes one element equal to the given one, if present
    Delete(E),
}

pub type SequenceOp<E> = Stamped<SequenceEdit<E>>;

#[derive(Clone, Debug)]
pub struct SequenceCrdt<E> {
    history: History<Vec<E>, SequenceEdit<E>>,
}

impl<E: Ord + Clone> SequenceCrdt<E> {
    pub fn new(initial: Vec<E>) -> Self {
        let mut initial = initial;
        initial.sort();
        Self {
            history: History::new(initial),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn elements(&self) -> &[E] {
        self.history.current()
    }

    pub fn contains(&self, element: &E) -> bool {
        self.elements().binary_search(element).is_ok()
    }

    pub fn initial(&self) -> &[E] {
        self.history.initial()
    }

    /// `(elements after edit, edit)` pairs in merge order
    pub fn history(&self) -> impl Iterator<Item = (&[E], &SequenceOp<E>)> {
        self.history
            .entries()
            .iter()
            .map(|entry| (entry.state.as_slice(), &entry.op))
    }

    pub fn len(&self) -> usize {
        self.elements().len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements().is_empty()
    }

    pub fn by_inserting(&self, op: SequenceOp<E>) -> Self {
        self.by_inserting_all(std::iter::once(op))
    }

    pub fn by_inserting_all<I>(&self, ops: I) -> Self
    where
        I: IntoIterator<Item = SequenceOp<E>>,
    {
        Self {
            history: self.history.by_inserting(ops, apply_edit),
        }
    }
}

impl<E: Ord + Clone> Default for SequenceCrdt<E> {
    fn default() -> Self {
        Self::empty()
    }
}

#[allow(clippy::ptr_arg)]
fn apply_edit<E: Ord + Clone>(elements: &Vec<E>, edit: &SequenceEdit<E>) -> Vec<E> {
    let mut next = elements.clone();
    match edit {
        SequenceEdit::Insert(element) => {
            let at = next.partition_point(|existing| existing <= element);
            next.insert(at, element.clone());
        }
        SequenceEdit::Delete(element) => {
            if let Some(at) = next.iter().position(|existing| existing == element) {
                next.remove(at);
            }
        }
    }
    next
}
