//! Wire protocol for `POST /sync` and the auth boundary
//!
//! Record fields travel snake_case; the one camelCase key is `lastPulledAt`.
//! All timestamps are milliseconds since epoch.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CallLog, Category, Lead, RecordId, Role};

/// Namespace for deriving canonical record ids from provisional ones
const CANONICAL_ID_NAMESPACE: Uuid = Uuid::from_u128(0x9f2c_4d1e_8b57_4a0f_9e63_21d8_c0ab_5e74);

/// Derive the canonical server id for a record first pushed by `actor` under
/// a provisional client id.
///
/// The derivation is deterministic and shared by client and server: a crashed
/// client re-pushing the same created record maps to the same canonical id
/// (no duplicate rows), and the client can rewrite its provisional rows after
/// a successful cycle without a mapping travelling in the response.
#[must_use]
pub fn canonical_id(actor: RecordId, provisional: RecordId) -> RecordId {
    let material = format!("{actor}:{provisional}");
    RecordId::from(Uuid::new_v5(&CANONICAL_ID_NAMESPACE, material.as_bytes()))
}

/// Created/updated/deleted-ids triple for one entity collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ChangeSet<T> {
    #[serde(default)]
    pub created: Vec<T>,
    #[serde(default)]
    pub updated: Vec<T>,
    #[serde(default)]
    pub deleted: Vec<RecordId>,
}

impl<T> ChangeSet<T> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

impl<T> Default for ChangeSet<T> {
    fn default() -> Self {
        Self {
            created: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

/// Change sets for all three synced collections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncChanges {
    #[serde(default)]
    pub leads: ChangeSet<Lead>,
    #[serde(default)]
    pub call_logs: ChangeSet<CallLog>,
    #[serde(default)]
    pub categories: ChangeSet<Category>,
}

impl SyncChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leads.is_empty() && self.call_logs.is_empty() && self.categories.is_empty()
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.leads.len() + self.call_logs.len() + self.categories.len()
    }
}

/// Body of `POST /sync`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub changes: SyncChanges,
    /// Watermark of the previous successful pull; null means "since epoch"
    #[serde(rename = "lastPulledAt")]
    pub last_pulled_at: Option<i64>,
}

/// Successful `POST /sync` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub changes: SyncChanges,
    /// The client's next watermark, always >= the request's `lastPulledAt`
    pub timestamp: i64,
}

/// Public view of a user, returned by the auth endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: RecordId,
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// Body of successful `POST /auth/login` and `POST /auth/register`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    /// Defaults to viewer when omitted
    #[serde(default)]
    pub role: Option<Role>,
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
