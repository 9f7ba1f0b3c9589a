//! Last-write-wins register
//!
//! A single value slot driven by `mutate` and `delete` edits. "Create" is a
//! mutate from an absent value, so transforms always see `Option<&T>`.

use super::history::{History, Stamped};
use std::fmt;
use std::sync::Arc;

/// Pure transformation of the previous value
pub type Transform<T> = Arc<dyn Fn(Option<&T>) -> Option<T> + Send + Sync>;

pub enum RegisterEdit<T> {
    Mutate(Transform<T>),
    Delete,
}

impl<T> RegisterEdit<T> {
    pub fn mutate<F>(transform: F) -> Self
    where
        F: Fn(Option<&T>) -> Option<T> + Send + Sync + 'static,
    {
        RegisterEdit::Mutate(Arc::new(transform))
    }

    /// Mutate that ignores the previous value
    pub fn set(value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        RegisterEdit::mutate(move |_| Some(value.clone()))
    }
}

impl<T> Clone for RegisterEdit<T> {
    fn clone(&self) -> Self {
        match self {
            RegisterEdit::Mutate(transform) => RegisterEdit::Mutate(Arc::clone(transform)),
            RegisterEdit::Delete => RegisterEdit::Delete,
        }
    }
}

impl<T> fmt::Debug for RegisterEdit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterEdit::Mutate(_) => f.write_str("Mutate(..)"),
            RegisterEdit::Delete => f.write_str("Delete"),
        }
    }
}

pub type RegisterOp<T> = Stamped<RegisterEdit<T>>;

#[derive(Clone, Debug)]
pub struct RegisterCrdt<T> {
    history: History<Option<T>, RegisterEdit<T>>,
}

impl<T: Clone> RegisterCrdt<T> {
    pub fn new(initial: Option<T>) -> Self {
        Self {
            history: History::new(initial),
        }
    }

    /// Register with no initial value
    pub fn empty() -> Self {
        Self::new(None)
    }

    /// Current merged value; `None` when absent or deleted
    pub fn value(&self) -> Option<&T> {
        self.history.current().as_ref()
    }

    pub fn initial(&self) -> Option<&T> {
        self.history.initial().as_ref()
    }

    /// `(value after edit, edit)` pairs in merge order
    pub fn history(&self) -> impl Iterator<Item = (Option<&T>, &RegisterOp<T>)> {
        self.history
            .entries()
            .iter()
            .map(|entry| (entry.state.as_ref(), &entry.op))
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn by_inserting(&self, op: RegisterOp<T>) -> Self {
        self.by_inserting_all(std::iter::once(op))
    }

    pub fn by_inserting_all<I>(&self, ops: I) -> Self
    where
        I: IntoIterator<Item = RegisterOp<T>>,
    {
        Self {
            history: self.history.by_inserting(ops, apply_edit),
        }
    }
}

impl<T: Clone> Default for RegisterCrdt<T> {
    fn default() -> Self {
        Self::empty()
    }
}

fn apply_edit<T>(value: &Option<T>, edit: &RegisterEdit<T>) -> Option<T> {
    match edit {
        RegisterEdit::Mutate(transform) => transform(value.as_ref()),
        RegisterEdit::Delete => None,
    }
}
