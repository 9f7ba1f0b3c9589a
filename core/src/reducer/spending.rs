use crate::crdt::{RegisterEdit, SequenceEdit, Stamped};
use crate::operation::{CreateSpending, DeleteSpending, OperationBase, UpdateSpending};
use crate::state::State;
use crate::types::Spending;

pub fn create_spending(base: &OperationBase, payload: &CreateSpending, state: State) -> State {
    let spending = Spending {
        id: payload.spending_id.clone(),
        group_id: payload.group_id.clone(),
        title: payload.title.clone(),
        amount: payload.amount,
        currency: payload.currency.clone(),
        payer_id: payload.payer_id.clone(),
        shares: payload.shares.clone(),
        spent_at: payload.spent_at,
    };
    state
        .with_spending(&payload.spending_id, Stamped::from_base(base, RegisterEdit::set(spending)))
        .with_spendings_order(
            &payload.group_id,
            Stamped::from_base(base, SequenceEdit::Insert(payload.spending_id.clone())),
        )
}

/// Partial update; a spending that is absent (never created or deleted)
/// stays absent
pub fn update_spending(base: &OperationBase, payload: &UpdateSpending, state: State) -> State {
    let update = payload.clone();
    let edit = RegisterEdit::mutate(move |existing: Option<&Spending>| {
        existing.map(|spending| {
            let mut spending = spending.clone();
            if let Some(title) = &update.title {
                spending.title = title.clone();
            }
            if let Some(amount) = update.amount {
                spending.amount = amount;
            }
            if let Some(shares) = &update.shares {
                spending.shares = shares.clone();
            }
            spending
        })
    });
    state.with_spending(&payload.spending_id, Stamped::from_base(base, edit))
}

pub fn delete_spending(base: &OperationBase, payload: &DeleteSpending, state: State) -> State {
    state
        .with_spending(&payload.spending_id, Stamped::from_base(base, RegisterEdit::Delete))
        .with_spendings_order(
            &payload.group_id,
            Stamped::from_base(base, SequenceEdit::Delete(payload.spending_id.clone())),
        )
}
