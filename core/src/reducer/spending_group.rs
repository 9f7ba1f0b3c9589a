use super::sub_operation_id;
use crate::crdt::{RegisterEdit, SequenceEdit, Stamped};
use crate::operation::{
    AddSpendingGroupMember, CreateSpendingGroup, DeleteSpendingGroup, OperationBase,
    RemoveSpendingGroupMember, RenameSpendingGroup,
};
use crate::state::State;
use crate::types::SpendingGroup;

pub fn create_spending_group(
    base: &OperationBase,
    payload: &CreateSpendingGroup,
    state: State,
) -> State {
    let group = SpendingGroup {
        id: payload.group_id.clone(),
        name: payload.name.clone(),
        created_by: base.author_id.clone(),
        created_at: base.created_at,
    };
    let members = payload
        .member_ids
        .iter()
        .enumerate()
        .map(|(index, user_id)| Stamped {
            id: sub_operation_id(base, index),
            created_at: base.created_at,
            edit: SequenceEdit::Insert(user_id.clone()),
        });

    state
        .with_spending_group(&payload.group_id, Stamped::from_base(base, RegisterEdit::set(group)))
        .with_spending_groups_order(Stamped::from_base(
            base,
            SequenceEdit::Insert(payload.group_id.clone()),
        ))
        .with_group_members(&payload.group_id, members)
}

pub fn rename_spending_group(
    base: &OperationBase,
    payload: &RenameSpendingGroup,
    state: State,
) -> State {
    let name = payload.name.clone();
    let edit = RegisterEdit::mutate(move |existing: Option<&SpendingGroup>| {
        existing.map(|group| SpendingGroup {
            name: name.clone(),
            ..group.clone()
        })
    });
    state.with_spending_group(&payload.group_id, Stamped::from_base(base, edit))
}

pub fn add_spending_group_member(
    base: &OperationBase,
    payload: &AddSpendingGroupMember,
    state: State,
) -> State {
    let insert = Stamped::from_base(base, SequenceEdit::Insert(payload.user_id.clone()));
    state.with_group_members(&payload.group_id, std::iter::once(insert))
}

pub fn remove_spending_group_member(
    base: &OperationBase,
    payload: &RemoveSpendingGroupMember,
    state: State,
) -> State {
    let delete = Stamped::from_base(base, SequenceEdit::Delete(payload.user_id.clone()));
    state.with_group_members(&payload.group_id, std::iter::once(delete))
}

/// One logical delete, two physical edits: the group's register and its
/// slot in the groups order, both under this operation's id and timestamp.
pub fn delete_spending_group(
    base: &OperationBase,
    payload: &DeleteSpendingGroup,
    state: State,
) -> State {
    state
        .with_spending_group(&payload.group_id, Stamped::from_base(base, RegisterEdit::Delete))
        .with_spending_groups_order(Stamped::from_base(
            base,
            SequenceEdit::Delete(payload.group_id.clone()),
        ))
}
