use crate::crdt::{RegisterEdit, Stamped};
use crate::operation::{
    BindUser, CreateSandboxUser, CreateUser, OperationBase, UpdateAvatar, UpdateDisplayName,
};
use crate::state::State;
use crate::types::{RegularUser, SandboxUser, User};

pub fn create_sandbox_user(
    base: &OperationBase,
    payload: &CreateSandboxUser,
    state: State,
) -> State {
    let user = User::Sandbox(SandboxUser {
        id: payload.user_id.clone(),
        display_name: payload.display_name.clone(),
        avatar: None,
    });
    state.with_user(&payload.user_id, Stamped::from_base(base, RegisterEdit::set(user)))
}

pub fn create_user(base: &OperationBase, payload: &CreateUser, state: State) -> State {
    let user = User::Regular(RegularUser {
        id: payload.user_id.clone(),
        server_id: payload.user_id.to_string(),
        display_name: payload.display_name.clone(),
        avatar: payload.avatar.clone(),
    });
    state.with_user(&payload.user_id, Stamped::from_base(base, RegisterEdit::set(user)))
}

/// Sandbox -> regular. Binding a user that is already regular is a caller
/// bug, not a merge conflict: it asserts in debug builds and leaves the
/// value untouched otherwise. Binding an absent user keeps it absent.
pub fn bind_user(base: &OperationBase, payload: &BindUser, state: State) -> State {
    let server_id = payload.server_user_id.clone();
    let op_id = base.operation_id.clone();
    let edit = RegisterEdit::mutate(move |existing: Option<&User>| match existing {
        Some(User::Sandbox(user)) => Some(User::Regular(RegularUser {
            id: user.id.clone(),
            server_id: server_id.clone(),
            display_name: user.display_name.clone(),
            avatar: user.avatar.clone(),
        })),
        Some(User::Regular(user)) => {
            tracing::error!(
                op_id = %op_id,
                user_id = %user.id,
                "bindUser applied to a user that is already regular"
            );
            if cfg!(debug_assertions) {
                panic!("bindUser applied to regular user {}", user.id);
            }
            Some(User::Regular(user.clone()))
        }
        None => None,
    });
    state.with_user(&payload.user_id, Stamped::from_base(base, edit))
}

pub fn update_display_name(
    base: &OperationBase,
    payload: &UpdateDisplayName,
    state: State,
) -> State {
    let display_name = payload.display_name.clone();
    let edit = RegisterEdit::mutate(move |existing: Option<&User>| {
        existing.map(|user| match user {
            User::Sandbox(user) => User::Sandbox(SandboxUser {
                display_name: display_name.clone(),
                ..user.clone()
            }),
            User::Regular(user) => User::Regular(RegularUser {
                display_name: display_name.clone(),
                ..user.clone()
            }),
        })
    });
    state.with_user(&payload.user_id, Stamped::from_base(base, edit))
}

pub fn update_avatar(base: &OperationBase, payload: &UpdateAvatar, state: State) -> State {
    let avatar = payload.avatar.clone();
    let edit = RegisterEdit::mutate(move |existing: Option<&User>| {
        existing.map(|user| match user {
            User::Sandbox(user) => User::Sandbox(SandboxUser {
                avatar: avatar.clone(),
                ..user.clone()
            }),
            User::Regular(user) => User::Regular(RegularUser {
                avatar: avatar.clone(),
                ..user.clone()
            }),
        })
    });
    state.with_user(&payload.user_id, Stamped::from_base(base, edit))
}
