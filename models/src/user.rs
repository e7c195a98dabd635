use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Root identity for every portal login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Member,
    Provider,
    Employer,
    InsuranceAgent,
    Adjudicator,
}

impl Role {
    /// Roles allowed to move a claim through adjudication.
    pub fn can_adjudicate(&self) -> bool {
        matches!(self, Role::Admin | Role::Adjudicator)
    }
}

/// The resolved caller of a request, produced by the auth layer from a
/// bearer token. `member_id` / `provider_id` are populated when the user
/// has the corresponding profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    pub member_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
}

impl AuthContext {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        AuthContext {
            user_id,
            role,
            member_id: None,
            provider_id: None,
        }
    }
}
