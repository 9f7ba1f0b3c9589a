use super::*;
use crate::operation::*;
use crate::types::*;
use serde_json::Map;

fn op(id: &str, created_at: i64, payload: OperationPayload) -> Operation {
    Operation::new(OpId::from(id), AuthorId::from("device-a"), created_at, payload)
}

fn create_group(id: &str, at: i64, group: &str, members: &[&str]) -> Operation {
    op(
        id,
        at,
        OperationPayload::CreateSpendingGroup(CreateSpendingGroup {
            group_id: SpendingGroupId::from(group),
            name: format!("Group {}", group),
            member_ids: members.iter().map(|m| UserId::from(*m)).collect(),
        }),
    )
}

fn create_spending(id: &str, at: i64, spending: &str, group: &str) -> Operation {
    op(
        id,
        at,
        OperationPayload::CreateSpending(CreateSpending {
            spending_id: SpendingId::from(spending),
            group_id: SpendingGroupId::from(group),
            title: "Groceries".to_string(),
            amount: 4200,
            currency: "EUR".to_string(),
            payer_id: UserId::from("u1"),
            shares: vec![
                Share { user_id: UserId::from("u1"), amount: 2100 },
                Share { user_id: UserId::from("u2"), amount: 2100 },
            ],
            spent_at: at,
        }),
    )
}

fn delete_spending(id: &str, at: i64, spending: &str, group: &str) -> Operation {
    op(
        id,
        at,
        OperationPayload::DeleteSpending(DeleteSpending {
            spending_id: SpendingId::from(spending),
            group_id: SpendingGroupId::from(group),
        }),
    )
}

fn sandbox_user(id: &str, at: i64, user: &str, name: &str) -> Operation {
    op(
        id,
        at,
        OperationPayload::CreateSandboxUser(CreateSandboxUser {
            user_id: UserId::from(user),
            display_name: name.to_string(),
        }),
    )
}

#[test]
fn test_unknown_kind_is_a_noop() {
    let unknown = op(
        "x",
        1,
        OperationPayload::Unknown(UnknownPayload {
            kind: "futureKind".to_string(),
            fields: Map::new(),
        }),
    );
    let state = reduce(State::default(), &unknown);
    assert!(state.users().is_empty());
    assert!(state.spending_group_ids().is_empty());
    assert!(state.profile().is_none());
}

#[test]
fn test_spending_lifecycle_converges_in_any_arrival_order() {
    let ops = vec![
        create_group("op-g", 100, "G", &[]),
        create_spending("op-s", 200, "S", "G"),
        delete_spending("op-d", 300, "S", "G"),
    ];
    let group = SpendingGroupId::from("G");
    let spending = SpendingId::from("S");

    for arrival in [ops.clone(), ops.iter().rev().cloned().collect()] {
        let state = reduce_all(State::default(), &arrival);
        assert!(state.spending_group(&group).is_some());
        assert!(state.spending_ids(&group).is_empty());
        assert!(state.spendings(&group).is_empty());
        let register = state.spending_register(&spending).unwrap();
        assert!(register.value().is_none());
        assert_eq!(register.len(), 2);
    }
}

#[test]
fn test_delete_spending_touches_register_and_order_with_same_stamp() {
    let state = reduce_all(
        State::default(),
        &[
            create_spending("op-s", 200, "S", "G"),
            delete_spending("op-d", 300, "S", "G"),
        ],
    );
    let (_, last) = state
        .spending_register(&SpendingId::from("S"))
        .unwrap()
        .history()
        .last()
        .unwrap();
    assert_eq!(last.id, OpId::from("op-d"));
    assert_eq!(last.created_at, 300);
}

#[test]
fn test_create_group_inserts_order_and_members() {
    let state = reduce(State::default(), &create_group("op-g", 10, "G", &["u2", "u1"]));
    let group = SpendingGroupId::from("G");

    assert_eq!(state.spending_group_ids(), &[group.clone()]);
    assert_eq!(state.members(&group), &[UserId::from("u1"), UserId::from("u2")]);
    let created = state.spending_group(&group).unwrap();
    assert_eq!(created.created_by, AuthorId::from("device-a"));
    assert_eq!(created.created_at, 10);
}

#[test]
fn test_member_add_and_remove() {
    let group = SpendingGroupId::from("G");
    let state = reduce_all(
        State::default(),
        &[
            create_group("op-g", 10, "G", &["u1"]),
            op(
                "op-add",
                20,
                OperationPayload::AddSpendingGroupMember(AddSpendingGroupMember {
                    group_id: group.clone(),
                    user_id: UserId::from("u3"),
                }),
            ),
            op(
                "op-rm",
                30,
                OperationPayload::RemoveSpendingGroupMember(RemoveSpendingGroupMember {
                    group_id: group.clone(),
                    user_id: UserId::from("u1"),
                }),
            ),
        ],
    );
    assert_eq!(state.members(&group), &[UserId::from("u3")]);
}

#[test]
fn test_delete_group_removes_it_from_order() {
    let group = SpendingGroupId::from("G");
    let state = reduce_all(
        State::default(),
        &[
            create_group("op-g", 10, "G", &[]),
            op(
                "op-del",
                20,
                OperationPayload::DeleteSpendingGroup(DeleteSpendingGroup {
                    group_id: group.clone(),
                }),
            ),
        ],
    );
    assert!(state.spending_group(&group).is_none());
    assert!(state.spending_group_ids().is_empty());
}

#[test]
fn test_rename_of_absent_group_stays_absent() {
    let state = reduce(
        State::default(),
        &op(
            "op-r",
            10,
            OperationPayload::RenameSpendingGroup(RenameSpendingGroup {
                group_id: SpendingGroupId::from("G"),
                name: "Renamed".to_string(),
            }),
        ),
    );
    assert!(state.spending_group(&SpendingGroupId::from("G")).is_none());
}

#[test]
fn test_bind_user_turns_sandbox_into_regular() {
    let user = UserId::from("u1");
    let state = reduce_all(
        State::default(),
        &[
            sandbox_user("op-1", 1, "u1", "Ann"),
            op(
                "op-2",
                2,
                OperationPayload::BindUser(BindUser {
                    user_id: user.clone(),
                    server_user_id: "srv-42".to_string(),
                }),
            ),
        ],
    );
    match state.user(&user) {
        Some(User::Regular(regular)) => {
            assert_eq!(regular.server_id, "srv-42");
            assert_eq!(regular.display_name, "Ann");
            assert_eq!(regular.id, user);
        }
        other => panic!("expected regular user, got {:?}", other),
    }
}

#[test]
fn test_bind_absent_user_stays_absent() {
    let state = reduce(
        State::default(),
        &op(
            "op-2",
            2,
            OperationPayload::BindUser(BindUser {
                user_id: UserId::from("ghost"),
                server_user_id: "srv".to_string(),
            }),
        ),
    );
    assert!(state.user(&UserId::from("ghost")).is_none());
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "bindUser applied to regular user")]
fn test_bind_regular_user_is_an_invariant_violation() {
    reduce_all(
        State::default(),
        &[
            op(
                "op-1",
                1,
                OperationPayload::CreateUser(CreateUser {
                    user_id: UserId::from("u1"),
                    display_name: "Ann".to_string(),
                    avatar: None,
                }),
            ),
            op(
                "op-2",
                2,
                OperationPayload::BindUser(BindUser {
                    user_id: UserId::from("u1"),
                    server_user_id: "srv".to_string(),
                }),
            ),
        ],
    );
}

#[test]
fn test_display_name_and_avatar_keep_user_variant() {
    let rename = |id: &str, at: i64, user: &str| {
        op(
            id,
            at,
            OperationPayload::UpdateDisplayName(UpdateDisplayName {
                user_id: UserId::from(user),
                display_name: "Renamed".to_string(),
            }),
        )
    };
    let avatar = |id: &str, at: i64, user: &str| {
        op(
            id,
            at,
            OperationPayload::UpdateAvatar(UpdateAvatar {
                user_id: UserId::from(user),
                avatar: Some("pic.png".to_string()),
            }),
        )
    };
    let state = reduce_all(
        State::default(),
        &[
            sandbox_user("op-1", 1, "sandbox", "Ann"),
            op(
                "op-2",
                2,
                OperationPayload::CreateUser(CreateUser {
                    user_id: UserId::from("regular"),
                    display_name: "Bob".to_string(),
                    avatar: None,
                }),
            ),
            rename("op-3", 3, "sandbox"),
            rename("op-4", 4, "regular"),
            avatar("op-5", 5, "sandbox"),
            avatar("op-6", 6, "regular"),
        ],
    );

    let sandbox = state.user(&UserId::from("sandbox")).unwrap();
    let regular = state.user(&UserId::from("regular")).unwrap();
    assert!(sandbox.is_sandbox());
    assert!(!regular.is_sandbox());
    for user in [sandbox, regular] {
        assert_eq!(user.display_name(), "Renamed");
        assert_eq!(user.avatar(), Some("pic.png"));
    }
}

#[test]
fn test_email_verification_requires_matching_address() {
    let update = |id: &str, at: i64, email: &str| {
        op(
            id,
            at,
            OperationPayload::UpdateEmail(UpdateEmail { email: email.to_string() }),
        )
    };
    let verify = |id: &str, at: i64, email: &str| {
        op(
            id,
            at,
            OperationPayload::VerifyEmail(VerifyEmail { email: email.to_string() }),
        )
    };

    let stale = reduce_all(
        State::default(),
        &[update("1", 1, "old@x"), update("2", 2, "new@x"), verify("3", 3, "old@x")],
    );
    let profile = stale.profile().unwrap();
    assert_eq!(profile.email.as_deref(), Some("new@x"));
    assert!(!profile.email_verified);

    let fresh = reduce_all(State::default(), &[update("1", 1, "a@x"), verify("2", 2, "a@x")]);
    assert!(fresh.profile().unwrap().email_verified);
}

#[test]
fn test_update_spending_and_balances() {
    let group = SpendingGroupId::from("G");
    let state = reduce_all(
        State::default(),
        &[
            create_spending("op-s", 200, "S", "G"),
            op(
                "op-u",
                250,
                OperationPayload::UpdateSpending(UpdateSpending {
                    spending_id: SpendingId::from("S"),
                    title: Some("Market".to_string()),
                    amount: None,
                    shares: None,
                }),
            ),
        ],
    );
    let spending = state.spending(&SpendingId::from("S")).unwrap();
    assert_eq!(spending.title, "Market");
    assert_eq!(spending.amount, 4200);

    let balances = state.balances(&group);
    assert_eq!(balances.get(&UserId::from("u1")), Some(&2100));
    assert_eq!(balances.get(&UserId::from("u2")), Some(&-2100));
}

#[test]
fn test_spendings_listed_newest_first() {
    let group = SpendingGroupId::from("G");
    let state = reduce_all(
        State::default(),
        &[
            create_spending("op-1", 100, "old", "G"),
            create_spending("op-2", 300, "new", "G"),
            create_spending("op-3", 200, "mid", "G"),
        ],
    );
    let titles: Vec<&str> = state
        .spendings(&group)
        .iter()
        .map(|spending| spending.id.as_str())
        .collect();
    assert_eq!(titles, vec!["new", "mid", "old"]);
}

#[test]
fn test_sub_operation_ids_are_distinct_and_sort_after_base() {
    let base = OperationBase {
        operation_id: OpId::from("op"),
        author_id: AuthorId::from("a"),
        created_at: 1,
    };
    let first = sub_operation_id(&base, 0);
    let second = sub_operation_id(&base, 1);
    assert_ne!(first, second);
    assert!(base.operation_id < first);
}
