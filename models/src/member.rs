use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identifiers::member_number;

/// An insured member. Belongs to a `User`; owns policies and dependents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date_of_birth: NaiveDate,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub enrolled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Member {
    /// The `MEM-YYYY-XXXXXX` card number shown on member documents.
    pub fn member_number(&self) -> String {
        member_number(self.id, self.enrolled_at.year())
    }
}

/// A dependent covered under a member's policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependent {
    pub id: Uuid,
    pub member_id: Uuid,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub relationship: String,
}
