//! Operation envelope and payload catalogue
//!
//! Every edit in the system travels as an [`Operation`]: a globally unique id,
//! the authoring device, a millisecond creation timestamp and a typed payload.
//! The wire form is a flat JSON object discriminated by `kind`:
//!
//! ```json
//! { "id": "…", "authorId": "…", "createdAt": 1700000000000,
//!   "kind": "updateDisplayName", "userId": "…", "displayName": "Ann" }
//! ```
//!
//! Kinds this build does not know decode into [`OperationPayload::Unknown`]
//! and encode back byte-for-byte equivalent, so version skew between client
//! and server never drops a log entry.

use crate::types::*;
use serde::de::Error as DeError;
use serde::ser::{Error as SerError, SerializeMap};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Immutable, uniquely identified edit
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: OpId,
    pub author_id: AuthorId,
    /// Milliseconds since UNIX epoch, assigned by the author
    pub created_at: i64,
    #[serde(flatten)]
    pub payload: OperationPayload,
}

/// Payload-free header handed to reducers
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct OperationBase {
    pub operation_id: OpId,
    pub author_id: AuthorId,
    pub created_at: i64,
}

impl Operation {
    pub fn new(id: OpId, author_id: AuthorId, created_at: i64, payload: OperationPayload) -> Self {
        Self {
            id,
            author_id,
            created_at,
            payload,
        }
    }

    pub fn base(&self) -> OperationBase {
        OperationBase {
            operation_id: self.id.clone(),
            author_id: self.author_id.clone(),
            created_at: self.created_at,
        }
    }

    /// Total merge order: `(created_at, id)` ascending
    pub fn merge_order(&self, other: &Operation) -> Ordering {
        compare_stamps(self.created_at, &self.id, other.created_at, &other.id)
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Compare two `(created_at, id)` stamps. Equal timestamps fall back to the
/// lexicographically smaller id being earlier.
pub fn compare_stamps(a_at: i64, a_id: &OpId, b_at: i64, b_id: &OpId) -> Ordering {
    a_at.cmp(&b_at).then_with(|| a_id.cmp(b_id))
}

/// Sort operations into merge order in place
pub fn sort_in_merge_order(operations: &mut [Operation]) {
    operations.sort_by(|a, b| a.merge_order(b));
}

/// A payload kind unknown to this build
#[derive(Clone, PartialEq, Debug)]
pub struct UnknownPayload {
    pub kind: String,
    pub fields: Map<String, Value>,
}

macro_rules! operation_payloads {
    ($($(#[$doc:meta])* $variant:ident($ty:ident) => $kind:literal,)*) => {
        /// Closed set of edit kinds plus a tolerant catch-all
        #[derive(Clone, PartialEq, Debug)]
        pub enum OperationPayload {
            $($(#[$doc])* $variant($ty),)*
            /// Kind not known to this build; preserved verbatim, ignored by reducers
            Unknown(UnknownPayload),
        }

        impl OperationPayload {
            /// Wire discriminant
            pub fn kind(&self) -> &str {
                match self {
                    $(Self::$variant(_) => $kind,)*
                    Self::Unknown(unknown) => &unknown.kind,
                }
            }

            fn to_fields(&self) -> serde_json::Result<Map<String, Value>> {
                let value = match self {
                    $(Self::$variant(payload) => serde_json::to_value(payload)?,)*
                    Self::Unknown(unknown) => return Ok(unknown.fields.clone()),
                };
                match value {
                    Value::Object(fields) => Ok(fields),
                    other => Err(<serde_json::Error as SerError>::custom(format!(
                        "payload encoded as non-object: {}",
                        other
                    ))),
                }
            }

            fn from_fields(kind: String, fields: Map<String, Value>) -> serde_json::Result<Self> {
                match kind.as_str() {
                    $($kind => serde_json::from_value(Value::Object(fields)).map(Self::$variant),)*
                    _ => Ok(Self::Unknown(UnknownPayload { kind, fields })),
                }
            }
        }
    };
}

operation_payloads! {
    CreateSandboxUser(CreateSandboxUser) => "createSandboxUser",
    CreateUser(CreateUser) => "createUser",
    /// Link a locally created sandbox user to a server identity
    BindUser(BindUser) => "bindUser",
    UpdateDisplayName(UpdateDisplayName) => "updateDisplayName",
    UpdateAvatar(UpdateAvatar) => "updateAvatar",
    UpdateEmail(UpdateEmail) => "updateEmail",
    VerifyEmail(VerifyEmail) => "verifyEmail",
    CreateSpendingGroup(CreateSpendingGroup) => "createSpendingGroup",
    RenameSpendingGroup(RenameSpendingGroup) => "renameSpendingGroup",
    AddSpendingGroupMember(AddSpendingGroupMember) => "addSpendingGroupMember",
    RemoveSpendingGroupMember(RemoveSpendingGroupMember) => "removeSpendingGroupMember",
    DeleteSpendingGroup(DeleteSpendingGroup) => "deleteSpendingGroup",
    CreateSpending(CreateSpending) => "createSpending",
    UpdateSpending(UpdateSpending) => "updateSpending",
    DeleteSpending(DeleteSpending) => "deleteSpending",
}

impl OperationPayload {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

impl Serialize for OperationPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.to_fields().map_err(S::Error::custom)?;
        let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
        map.serialize_entry("kind", self.kind())?;
        for (key, value) in &fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OperationPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let kind = match fields.remove("kind") {
            Some(Value::String(kind)) => kind,
            Some(other) => {
                return Err(D::Error::custom(format!("`kind` must be a string, got {}", other)))
            }
            None => return Err(D::Error::missing_field("kind")),
        };
        OperationPayload::from_fields(kind, fields).map_err(D::Error::custom)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateSandboxUser {
    pub user_id: UserId,
    pub display_name: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub user_id: UserId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BindUser {
    pub user_id: UserId,
    pub server_user_id: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDisplayName {
    pub user_id: UserId,
    pub display_name: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAvatar {
    pub user_id: UserId,
    /// `None` clears the avatar
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmail {
    pub email: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmail {
    pub email: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateSpendingGroup {
    pub group_id: SpendingGroupId,
    pub name: String,
    #[serde(default)]
    pub member_ids: Vec<UserId>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RenameSpendingGroup {
    pub group_id: SpendingGroupId,
    pub name: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AddSpendingGroupMember {
    pub group_id: SpendingGroupId,
    pub user_id: UserId,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RemoveSpendingGroupMember {
    pub group_id: SpendingGroupId,
    pub user_id: UserId,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSpendingGroup {
    pub group_id: SpendingGroupId,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateSpending {
    pub spending_id: SpendingId,
    pub group_id: SpendingGroupId,
    pub title: String,
    pub amount: i64,
    pub currency: String,
    pub payer_id: UserId,
    #[serde(default)]
    pub shares: Vec<Share>,
    pub spent_at: i64,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSpending {
    pub spending_id: SpendingId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<Vec<Share>>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSpending {
    pub spending_id: SpendingId,
    pub group_id: SpendingGroupId,
}
