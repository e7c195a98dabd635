use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identifiers::PolicyNumber;

/// An insurance contract owned by a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: Uuid,
    pub member_id: Uuid,
    pub policy_number: PolicyNumber,
    pub plan: PlanTier,
    pub status: PolicyStatus,
    pub premium_amount: f64,
    pub deductible: f64,
    pub coverage_limit: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Policy {
    pub fn is_active(&self) -> bool {
        self.status == PolicyStatus::Active && self.deleted_at.is_none()
    }

    /// Initial status for a newly written policy given today's date.
    pub fn initial_status(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> PolicyStatus {
        if today >= start && today < end {
            PolicyStatus::Active
        } else if today >= end {
            PolicyStatus::Expired
        } else {
            PolicyStatus::Pending
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
}

/// Static display metadata per plan tier: marketing name and the flat
/// copay quoted during eligibility checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanInfo {
    pub name: &'static str,
    pub copay: &'static str,
}

impl PlanTier {
    pub fn info(&self) -> PlanInfo {
        match self {
            PlanTier::Platinum => PlanInfo {
                name: "Platinum Elite Plan",
                copay: "ksh 500",
            },
            PlanTier::Gold => PlanInfo {
                name: "Gold Executive Plan",
                copay: "ksh 1,000",
            },
            PlanTier::Silver => PlanInfo {
                name: "Silver Plus Plan",
                copay: "ksh 1,500",
            },
            PlanTier::Bronze => PlanInfo {
                name: "Bronze Essential Plan",
                copay: "ksh 2,500",
            },
        }
    }
}
