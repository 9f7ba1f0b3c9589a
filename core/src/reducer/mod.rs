//! Reducers: route each operation to the CRDT it edits
//!
//! Every reducer has the shape `(base, payload, state) -> state`: it builds
//! one stamped edit per affected CRDT (carrying `base.operation_id` and
//! `base.created_at`), inserts it, and returns the next [`State`]. Reducers
//! are pure; everything they know comes from the operation and the state.

mod profile;
mod spending;
mod spending_group;
mod user;

use crate::operation::{Operation, OperationBase, OperationPayload};
use crate::state::State;
use crate::types::OpId;

pub use profile::{update_email, verify_email};
pub use spending::{create_spending, delete_spending, update_spending};
pub use spending_group::{
    add_spending_group_member, create_spending_group, delete_spending_group,
    remove_spending_group_member, rename_spending_group,
};
pub use user::{
    bind_user, create_sandbox_user, create_user, update_avatar, update_display_name,
};

/// Apply one operation
pub fn reduce(state: State, operation: &Operation) -> State {
    let base = operation.base();
    match &operation.payload {
        OperationPayload::CreateSandboxUser(payload) => create_sandbox_user(&base, payload, state),
        OperationPayload::CreateUser(payload) => create_user(&base, payload, state),
        OperationPayload::BindUser(payload) => bind_user(&base, payload, state),
        OperationPayload::UpdateDisplayName(payload) => update_display_name(&base, payload, state),
        OperationPayload::UpdateAvatar(payload) => update_avatar(&base, payload, state),
        OperationPayload::UpdateEmail(payload) => update_email(&base, payload, state),
        OperationPayload::VerifyEmail(payload) => verify_email(&base, payload, state),
        OperationPayload::CreateSpendingGroup(payload) => {
            create_spending_group(&base, payload, state)
        }
        OperationPayload::RenameSpendingGroup(payload) => {
            rename_spending_group(&base, payload, state)
        }
        OperationPayload::AddSpendingGroupMember(payload) => {
            add_spending_group_member(&base, payload, state)
        }
        OperationPayload::RemoveSpendingGroupMember(payload) => {
            remove_spending_group_member(&base, payload, state)
        }
        OperationPayload::DeleteSpendingGroup(payload) => {
            delete_spending_group(&base, payload, state)
        }
        OperationPayload::CreateSpending(payload) => create_spending(&base, payload, state),
        OperationPayload::UpdateSpending(payload) => update_spending(&base, payload, state),
        OperationPayload::DeleteSpending(payload) => delete_spending(&base, payload, state),
        OperationPayload::Unknown(unknown) => {
            tracing::debug!(
                op_id = %base.operation_id,
                kind = %unknown.kind,
                "Ignoring operation of unknown kind"
            );
            state
        }
    }
}

/// Apply operations in iteration order. Feeding them in merge order lets
/// every CRDT take its append fast path.
pub fn reduce_all<'a, I>(state: State, operations: I) -> State
where
    I: IntoIterator<Item = &'a Operation>,
{
    operations.into_iter().fold(state, reduce)
}

/// Id for the `index`-th edit an operation makes to one sequence.
///
/// A single operation may insert several elements into the same CRDT; each
/// needs its own id or the merge-by-id step would collapse them. Derived
/// ids share the operation's timestamp and sort right after it.
pub(crate) fn sub_operation_id(base: &OperationBase, index: usize) -> OpId {
    OpId(format!("{}/{}", base.operation_id, index))
}

#[cfg(test)]
mod tests;
