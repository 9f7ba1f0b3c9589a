//! Core identifiers and entity types used throughout the system

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Fresh random identifier (UUID v4, hyphenated lowercase)
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Operation identifier, unique across the lifetime of the log
    OpId
);
string_id!(
    /// Identity of the device/session that authored an operation
    AuthorId
);
string_id!(
    /// Local user identifier (stable across sandbox -> regular binding)
    UserId
);
string_id!(
    /// Spending group identifier
    SpendingGroupId
);
string_id!(
    /// Spending identifier
    SpendingId
);

/// A user created locally that has not been linked to a server identity yet
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct SandboxUser {
    pub id: UserId,
    pub display_name: String,
    pub avatar: Option<String>,
}

/// A user known to the server
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct RegularUser {
    pub id: UserId,
    /// Server-assigned identity; equals `id` for users created as regular
    pub server_id: String,
    pub display_name: String,
    pub avatar: Option<String>,
}

/// Either flavour of user. Edits apply to both; binding turns a sandbox
/// user into a regular one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum User {
    Sandbox(SandboxUser),
    Regular(RegularUser),
}

impl User {
    pub fn id(&self) -> &UserId {
        match self {
            User::Sandbox(user) => &user.id,
            User::Regular(user) => &user.id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            User::Sandbox(user) => &user.display_name,
            User::Regular(user) => &user.display_name,
        }
    }

    pub fn avatar(&self) -> Option<&str> {
        match self {
            User::Sandbox(user) => user.avatar.as_deref(),
            User::Regular(user) => user.avatar.as_deref(),
        }
    }

    pub fn is_sandbox(&self) -> bool {
        matches!(self, User::Sandbox(_))
    }
}

/// Account-level profile of the session owner
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize, Debug)]
pub struct Profile {
    pub email: Option<String>,
    pub email_verified: bool,
}

/// A group of users sharing spendings. Membership lives in its own
/// ordered sequence, see [`crate::State::members`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct SpendingGroup {
    pub id: SpendingGroupId,
    pub name: String,
    pub created_by: AuthorId,
    pub created_at: i64,
}

/// Part of a spending owed by one member
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    pub user_id: UserId,
    /// Minor currency units
    pub amount: i64,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Spending {
    pub id: SpendingId,
    pub group_id: SpendingGroupId,
    pub title: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub payer_id: UserId,
    pub shares: Vec<Share>,
    /// Milliseconds since epoch
    pub spent_at: i64,
}

impl Spending {
    /// Sum of shares; equals `amount` for a fully split spending.
    /// Saturates instead of overflowing on out-of-range amounts.
    pub fn shared_total(&self) -> i64 {
        self.shares
            .iter()
            .fold(0i64, |total, share| total.saturating_add(share.amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = OpId::generate();
        let b = OpId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_id_ordering_is_lexicographic() {
        assert!(OpId::from("a") < OpId::from("b"));
        assert!(OpId::from("ab") < OpId::from("b"));
        assert!(OpId::from("B") < OpId::from("a"));
    }

    #[test]
    fn test_user_accessors_cover_both_variants() {
        let sandbox = User::Sandbox(SandboxUser {
            id: UserId::from("u1"),
            display_name: "Ann".to_string(),
            avatar: None,
        });
        let regular = User::Regular(RegularUser {
            id: UserId::from("u2"),
            server_id: "srv-2".to_string(),
            display_name: "Bob".to_string(),
            avatar: Some("bob.png".to_string()),
        });

        assert!(sandbox.is_sandbox());
        assert_eq!(sandbox.display_name(), "Ann");
        assert!(!regular.is_sandbox());
        assert_eq!(regular.avatar(), Some("bob.png"));
        assert_eq!(regular.id(), &UserId::from("u2"));
    }

    #[test]
    fn test_spending_shared_total() {
        let spending = Spending {
            id: SpendingId::from("s"),
            group_id: SpendingGroupId::from("g"),
            title: "Dinner".to_string(),
            amount: 3000,
            currency: "EUR".to_string(),
            payer_id: UserId::from("u1"),
            shares: vec![
                Share { user_id: UserId::from("u1"), amount: 1500 },
                Share { user_id: UserId::from("u2"), amount: 1500 },
            ],
            spent_at: 0,
        };
        assert_eq!(spending.shared_total(), spending.amount);
    }

    #[test]
    fn test_shared_total_saturates() {
        let spending = Spending {
            id: SpendingId::from("s"),
            group_id: SpendingGroupId::from("g"),
            title: "Yacht".to_string(),
            amount: i64::MAX,
            currency: "EUR".to_string(),
            payer_id: UserId::from("u1"),
            shares: vec![
                Share { user_id: UserId::from("u1"), amount: i64::MAX },
                Share { user_id: UserId::from("u2"), amount: i64::MAX },
            ],
            spent_at: 0,
        };
        assert_eq!(spending.shared_total(), i64::MAX);
    }
}
