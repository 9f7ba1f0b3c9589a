//! Merge-by-id, sort, replay
//!
//! Both CRDT types in this crate are thin wrappers around [`History`]: a
//! starting state plus the trace of every known edit in `(created_at, id)`
//! order, each paired with the state it produced. Inserting edits rebuilds
//! the trace from the operation *set*, so arrival order never matters.

use crate::operation::{compare_stamps, OperationBase};
use crate::types::OpId;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// An edit tagged with the id and timestamp of the operation that carried it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stamped<P> {
    pub id: OpId,
    pub created_at: i64,
    pub edit: P,
}

impl<P> Stamped<P> {
    pub fn new(id: impl Into<OpId>, created_at: i64, edit: P) -> Self {
        Self {
            id: id.into(),
            created_at,
            edit,
        }
    }

    pub fn from_base(base: &OperationBase, edit: P) -> Self {
        Self {
            id: base.operation_id.clone(),
            created_at: base.created_at,
            edit,
        }
    }

    pub fn merge_order(&self, other: &Self) -> Ordering {
        compare_stamps(self.created_at, &self.id, other.created_at, &other.id)
    }
}

/// One replay step: the state right after `op` was applied
#[derive(Clone, Debug)]
pub struct Entry<S, P> {
    pub state: S,
    pub op: Stamped<P>,
}

#[derive(Clone, Debug)]
pub struct History<S, P> {
    initial: S,
    entries: Vec<Entry<S, P>>,
}

impl<S: Clone, P: Clone> History<S, P> {
    pub fn new(initial: S) -> Self {
        Self {
            initial,
            entries: Vec::new(),
        }
    }

    pub fn initial(&self) -> &S {
        &self.initial
    }

    pub fn entries(&self) -> &[Entry<S, P>] {
        &self.entries
    }

    /// State after the last edit, or the initial state
    pub fn current(&self) -> &S {
        self.entries
            .last()
            .map(|entry| &entry.state)
            .unwrap_or(&self.initial)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &OpId) -> bool {
        self.entries.iter().any(|entry| &entry.op.id == id)
    }

    /// Merge `incoming` into the known edits and rebuild the trace.
    ///
    /// An incoming edit replaces any known edit with the same id (the last
    /// copy within `incoming` wins). `step` must be a pure function of the
    /// previous state and the edit.
    pub fn by_inserting<I, F>(&self, incoming: I, step: F) -> Self
    where
        I: IntoIterator<Item = Stamped<P>>,
        F: Fn(&S, &P) -> S,
    {
        let mut latest: HashMap<OpId, Stamped<P>> = HashMap::new();
        for op in incoming {
            latest.insert(op.id.clone(), op);
        }
        if latest.is_empty() {
            return self.clone();
        }

        let mut incoming: Vec<Stamped<P>> = latest.into_values().collect();
        incoming.sort_by(Stamped::merge_order);

        if self.appends_cleanly(&incoming) {
            let mut next = self.clone();
            next.replay_onto(incoming, &step);
            return next;
        }

        let replaced: HashSet<&OpId> = incoming.iter().map(|op| &op.id).collect();
        let mut merged: Vec<Stamped<P>> = self
            .entries
            .iter()
            .filter(|entry| !replaced.contains(&entry.op.id))
            .map(|entry| entry.op.clone())
            .collect();
        merged.extend(incoming);
        merged.sort_by(Stamped::merge_order);

        let mut next = Self::new(self.initial.clone());
        next.replay_onto(merged, &step);
        next
    }

    /// True when every incoming edit is new and sorts after the last known
    /// edit, so replay can continue from the current state.
    fn appends_cleanly(&self, sorted_incoming: &[Stamped<P>]) -> bool {
        let Some(first) = sorted_incoming.first() else {
            return true;
        };
        match self.entries.last() {
            None => true,
            Some(last) => {
                last.op.merge_order(first) == Ordering::Less
                    && !sorted_incoming.iter().any(|op| self.contains(&op.id))
            }
        }
    }

    fn replay_onto<F>(&mut self, ops: Vec<Stamped<P>>, step: &F)
    where
        F: Fn(&S, &P) -> S,
    {
        self.entries.reserve(ops.len());
        for op in ops {
            let state = step(self.current(), &op.edit);
            self.entries.push(Entry { state, op });
        }
    }
}
