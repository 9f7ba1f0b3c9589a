//! Property tests: an engine fed a fixed operation set in any arrival order
//! and batching ends in the same state as a single batch.

use proptest::prelude::*;
use std::sync::Arc;
use tally_core::operation::*;
use tally_core::storage::MemoryStore;
use tally_core::types::*;
use tally_core::{Engine, EngineConfig, SessionMode, State};

fn op(id: &str, created_at: i64, payload: OperationPayload) -> Operation {
    Operation::new(OpId::from(id), AuthorId::from("device"), created_at, payload)
}

fn catalogue() -> Vec<Operation> {
    let g = SpendingGroupId::from("g");
    let s = SpendingId::from("s");
    vec![
        op("01", 10, OperationPayload::CreateSandboxUser(CreateSandboxUser {
            user_id: UserId::from("ann"),
            display_name: "Ann".to_string(),
        })),
        op("02", 20, OperationPayload::CreateSpendingGroup(CreateSpendingGroup {
            group_id: g.clone(),
            name: "Trip".to_string(),
            member_ids: vec![UserId::from("ann")],
        })),
        op("03", 30, OperationPayload::AddSpendingGroupMember(AddSpendingGroupMember {
            group_id: g.clone(),
            user_id: UserId::from("ben"),
        })),
        op("04", 30, OperationPayload::RenameSpendingGroup(RenameSpendingGroup {
            group_id: g.clone(),
            name: "Road trip".to_string(),
        })),
        op("05", 40, OperationPayload::CreateSpending(CreateSpending {
            spending_id: s.clone(),
            group_id: g.clone(),
            title: "Fuel".to_string(),
            amount: 5000,
            currency: "EUR".to_string(),
            payer_id: UserId::from("ann"),
            shares: vec![Share { user_id: UserId::from("ben"), amount: 5000 }],
            spent_at: 40,
        })),
        op("06", 50, OperationPayload::UpdateSpending(UpdateSpending {
            spending_id: s.clone(),
            title: Some("Diesel".to_string()),
            amount: None,
            shares: None,
        })),
        op("07", 50, OperationPayload::UpdateDisplayName(UpdateDisplayName {
            user_id: UserId::from("ann"),
            display_name: "Annie".to_string(),
        })),
        op("08", 60, OperationPayload::RemoveSpendingGroupMember(RemoveSpendingGroupMember {
            group_id: g.clone(),
            user_id: UserId::from("ann"),
        })),
        op("09", 60, OperationPayload::UpdateEmail(UpdateEmail {
            email: "ann@example.com".to_string(),
        })),
        op("10", 70, OperationPayload::VerifyEmail(VerifyEmail {
            email: "ann@example.com".to_string(),
        })),
        op("11", 80, OperationPayload::BindUser(BindUser {
            user_id: UserId::from("ann"),
            server_user_id: "srv-ann".to_string(),
        })),
    ]
}

/// Everything a reader can observe, in a comparable form
fn fingerprint(state: &State) -> String {
    let groups: Vec<_> = state
        .spending_group_ids()
        .iter()
        .map(|id| {
            (
                state.spending_group(id).cloned(),
                state.members(id).to_vec(),
                state.spendings(id).into_iter().cloned().collect::<Vec<_>>(),
            )
        })
        .collect();
    format!("{:?} {:?} {:?}", groups, state.users(), state.profile())
}

fn replay(arrival: Vec<Vec<Operation>>) -> String {
    tokio_test::block_on(async {
        let engine = Engine::open(
            SessionMode::Sandbox,
            EngineConfig::default(),
            Arc::new(MemoryStore::new()),
            None,
        )
        .await
        .unwrap();
        for batch in arrival {
            engine.pulled(batch).await.unwrap();
        }
        fingerprint(&engine.state())
    })
}

fn arb_arrival() -> impl Strategy<Value = Vec<Vec<Operation>>> {
    (Just(catalogue()).prop_shuffle(), prop::collection::vec(1usize..4, 11))
        .prop_map(|(ops, sizes)| {
            let mut batches = Vec::new();
            let mut rest = ops.as_slice();
            for size in sizes {
                if rest.is_empty() {
                    break;
                }
                let (batch, tail) = rest.split_at(size.min(rest.len()));
                batches.push(batch.to_vec());
                rest = tail;
            }
            batches
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_engine_converges_for_any_arrival(arrival in arb_arrival()) {
        let expected = replay(vec![catalogue()]);
        prop_assert_eq!(replay(arrival), expected);
    }

    #[test]
    fn test_redelivery_changes_nothing(arrival in arb_arrival()) {
        let mut doubled = arrival.clone();
        doubled.extend(arrival.into_iter().rev());
        prop_assert_eq!(replay(doubled), replay(vec![catalogue()]));
    }
}

#[test]
fn test_catalogue_final_state() {
    let state = tokio_test::block_on(async {
        let engine = Engine::open(
            SessionMode::Sandbox,
            EngineConfig::default(),
            Arc::new(MemoryStore::new()),
            None,
        )
        .await
        .unwrap();
        engine.pulled(catalogue()).await.unwrap();
        engine.state()
    });

    let group = SpendingGroupId::from("g");
    assert_eq!(state.spending_group(&group).unwrap().name, "Road trip");
    assert_eq!(state.members(&group), &[UserId::from("ben")]);
    assert_eq!(state.spendings(&group)[0].title, "Diesel");
    assert!(state.profile().unwrap().email_verified);
    match state.user(&UserId::from("ann")) {
        Some(User::Regular(user)) => assert_eq!(user.display_name, "Annie"),
        other => panic!("expected regular user, got {:?}", other),
    }
}
