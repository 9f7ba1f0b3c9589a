//! Merged application state
//!
//! [`State`] is a value: reducers take one by value and hand back the next
//! one. The maps are `im` persistent maps, so cloning a State is cheap and
//! snapshots held by readers are never affected by later applies.

use crate::crdt::{RegisterCrdt, RegisterOp, SequenceCrdt, SequenceOp};
use crate::types::*;
use std::collections::BTreeMap;

#[derive(Clone, Default, Debug)]
pub struct State {
    users: im::HashMap<UserId, RegisterCrdt<User>>,
    profile: RegisterCrdt<Profile>,
    spending_groups: im::HashMap<SpendingGroupId, RegisterCrdt<SpendingGroup>>,
    spending_groups_order: SequenceCrdt<SpendingGroupId>,
    group_members: im::HashMap<SpendingGroupId, SequenceCrdt<UserId>>,
    spendings: im::HashMap<SpendingId, RegisterCrdt<Spending>>,
    spendings_order: im::HashMap<SpendingGroupId, SequenceCrdt<SpendingId>>,
}

// Reducer-facing updates. Unseen ids get a fresh, empty CRDT before the
// edit is inserted.
impl State {
    pub(crate) fn with_user(mut self, id: &UserId, op: RegisterOp<User>) -> Self {
        let register = self.users.get(id).cloned().unwrap_or_default();
        self.users.insert(id.clone(), register.by_inserting(op));
        self
    }

    pub(crate) fn with_profile(mut self, op: RegisterOp<Profile>) -> Self {
        self.profile = self.profile.by_inserting(op);
        self
    }

    pub(crate) fn with_spending_group(
        mut self,
        id: &SpendingGroupId,
        op: RegisterOp<SpendingGroup>,
    ) -> Self {
        let register = self.spending_groups.get(id).cloned().unwrap_or_default();
        self.spending_groups.insert(id.clone(), register.by_inserting(op));
        self
    }

    pub(crate) fn with_spending_groups_order(mut self, op: SequenceOp<SpendingGroupId>) -> Self {
        self.spending_groups_order = self.spending_groups_order.by_inserting(op);
        self
    }

    pub(crate) fn with_group_members<I>(mut self, group: &SpendingGroupId, ops: I) -> Self
    where
        I: IntoIterator<Item = SequenceOp<UserId>>,
    {
        let sequence = self.group_members.get(group).cloned().unwrap_or_default();
        self.group_members
            .insert(group.clone(), sequence.by_inserting_all(ops));
        self
    }

    pub(crate) fn with_spending(mut self, id: &SpendingId, op: RegisterOp<Spending>) -> Self {
        let register = self.spendings.get(id).cloned().unwrap_or_default();
        self.spendings.insert(id.clone(), register.by_inserting(op));
        self
    }

    pub(crate) fn with_spendings_order(
        mut self,
        group: &SpendingGroupId,
        op: SequenceOp<SpendingId>,
    ) -> Self {
        let sequence = self.spendings_order.get(group).cloned().unwrap_or_default();
        self.spendings_order.insert(group.clone(), sequence.by_inserting(op));
        self
    }
}

// Consumer accessors
impl State {
    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.get(id).and_then(RegisterCrdt::value)
    }

    pub fn user_register(&self, id: &UserId) -> Option<&RegisterCrdt<User>> {
        self.users.get(id)
    }

    /// Live users sorted by id
    pub fn users(&self) -> Vec<&User> {
        let mut users: Vec<&User> = self.users.values().filter_map(RegisterCrdt::value).collect();
        users.sort_by(|a, b| a.id().cmp(b.id()));
        users
    }

    pub fn find_users<F>(&self, predicate: F) -> Vec<&User>
    where
        F: Fn(&User) -> bool,
    {
        self.users()
            .into_iter()
            .filter(|user| predicate(user))
            .collect()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.value()
    }

    pub fn spending_group(&self, id: &SpendingGroupId) -> Option<&SpendingGroup> {
        self.spending_groups.get(id).and_then(RegisterCrdt::value)
    }

    pub fn spending_group_register(
        &self,
        id: &SpendingGroupId,
    ) -> Option<&RegisterCrdt<SpendingGroup>> {
        self.spending_groups.get(id)
    }

    /// Group ids in sequence order
    pub fn spending_group_ids(&self) -> &[SpendingGroupId] {
        self.spending_groups_order.elements()
    }

    /// Groups listed in the order sequence that currently have a value
    pub fn spending_groups(&self) -> Vec<&SpendingGroup> {
        self.spending_group_ids()
            .iter()
            .filter_map(|id| self.spending_group(id))
            .collect()
    }

    pub fn members(&self, group: &SpendingGroupId) -> &[UserId] {
        self.group_members
            .get(group)
            .map(SequenceCrdt::elements)
            .unwrap_or(&[])
    }

    /// Members that resolve to a live user
    pub fn member_users(&self, group: &SpendingGroupId) -> Vec<&User> {
        self.members(group)
            .iter()
            .filter_map(|id| self.user(id))
            .collect()
    }

    pub fn spending(&self, id: &SpendingId) -> Option<&Spending> {
        self.spendings.get(id).and_then(RegisterCrdt::value)
    }

    pub fn spending_register(&self, id: &SpendingId) -> Option<&RegisterCrdt<Spending>> {
        self.spendings.get(id)
    }

    pub fn spending_ids(&self, group: &SpendingGroupId) -> &[SpendingId] {
        self.spendings_order
            .get(group)
            .map(SequenceCrdt::elements)
            .unwrap_or(&[])
    }

    /// Live spendings of a group, newest first
    pub fn spendings(&self, group: &SpendingGroupId) -> Vec<&Spending> {
        let mut spendings: Vec<&Spending> = self
            .spending_ids(group)
            .iter()
            .filter_map(|id| self.spending(id))
            .collect();
        spendings.sort_by(|a, b| b.spent_at.cmp(&a.spent_at).then_with(|| b.id.cmp(&a.id)));
        spendings
    }

    /// Net position per user in minor units: what they paid minus their shares.
    /// Amounts in different currencies are summed as-is, and totals
    /// saturate at the `i64` bounds.
    pub fn balances(&self, group: &SpendingGroupId) -> BTreeMap<UserId, i64> {
        let mut balances: BTreeMap<UserId, i64> = BTreeMap::new();
        for spending in self.spendings(group) {
            let paid = balances.entry(spending.payer_id.clone()).or_insert(0);
            *paid = paid.saturating_add(spending.amount);
            for share in &spending.shares {
                let owed = balances.entry(share.user_id.clone()).or_insert(0);
                *owed = owed.saturating_sub(share.amount);
            }
        }
        balances
    }
}
