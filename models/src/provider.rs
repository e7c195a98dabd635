use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identifiers::Npi;

/// A care provider able to bill claims. Belongs to a `User`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: Uuid,
    pub user_id: Uuid,
    pub npi: Npi,
    pub specialty: String,
    pub status: ProviderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Pending,
    Verified,
    Suspended,
    Rejected,
}

impl Provider {
    /// Only verified providers may bill claims.
    pub fn can_bill(&self) -> bool {
        self.status == ProviderStatus::Verified && self.deleted_at.is_none()
    }
}
