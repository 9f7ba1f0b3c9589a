use crate::crdt::{RegisterEdit, Stamped};
use crate::operation::{OperationBase, UpdateEmail, VerifyEmail};
use crate::state::State;
use crate::types::Profile;

/// Setting an email creates the profile if needed and clears verification
pub fn update_email(base: &OperationBase, payload: &UpdateEmail, state: State) -> State {
    let email = payload.email.clone();
    let edit = RegisterEdit::mutate(move |existing: Option<&Profile>| {
        let mut profile = existing.cloned().unwrap_or_default();
        profile.email = Some(email.clone());
        profile.email_verified = false;
        Some(profile)
    });
    state.with_profile(Stamped::from_base(base, edit))
}

/// Only verifies when the address still matches; a verification for an
/// address that was replaced in the meantime is stale.
pub fn verify_email(base: &OperationBase, payload: &VerifyEmail, state: State) -> State {
    let email = payload.email.clone();
    let edit = RegisterEdit::mutate(move |existing: Option<&Profile>| {
        existing.map(|profile| {
            let mut profile = profile.clone();
            if profile.email.as_deref() == Some(email.as_str()) {
                profile.email_verified = true;
            }
            profile
        })
    });
    state.with_profile(Stamped::from_base(base, edit))
}
