use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A request for reimbursement tied to a policy and service date.
///
/// `status` is the single source of truth for workflow state and only
/// moves along the transition table in [`ClaimStatus::can_transition_to`].
/// `version` increments on every adjudication write and guards against
/// two adjudicators racing on the same claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: Uuid,
    pub policy_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub status: ClaimStatus,
    pub claim_type: ClaimType,
    pub diagnosis_codes: Vec<String>,
    pub procedure_codes: Vec<String>,
    pub total_amount: f64,
    pub approved_amount: Option<f64>,
    pub patient_responsibility: Option<f64>,
    pub service_date: NaiveDate,
    pub notes: Option<String>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Claim {
    /// Claims may still be edited by the submitter before review starts.
    pub fn is_editable(&self) -> bool {
        matches!(self.status, ClaimStatus::Submitted | ClaimStatus::Received)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Submitted,
    Received,
    UnderReview,
    Approved,
    Rejected,
    Paid,
    Appealed,
}

impl ClaimStatus {
    /// The explicit workflow transition table. Anything not listed here is
    /// an illegal move, including any transition out of `Paid`.
    pub fn can_transition_to(self, next: ClaimStatus) -> bool {
        use ClaimStatus::*;
        matches!(
            (self, next),
            (Submitted, Received)
                | (Submitted, UnderReview)
                | (Submitted, Rejected)
                | (Received, UnderReview)
                | (Received, Rejected)
                | (UnderReview, Approved)
                | (UnderReview, Rejected)
                | (Approved, Paid)
                | (Rejected, Appealed)
                | (Appealed, UnderReview)
        )
    }

    /// Terminal or decision states that carry payable amounts.
    pub fn is_decision(self) -> bool {
        matches!(
            self,
            ClaimStatus::Approved | ClaimStatus::Rejected | ClaimStatus::Paid
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Medical,
    Dental,
    Vision,
    Pharmacy,
    MentalHealth,
}

/// Caller-supplied outcome of an adjudication call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjudicationDecision {
    pub status: ClaimStatus,
    pub approved_amount: Option<f64>,
    pub patient_responsibility: Option<f64>,
    pub notes: Option<String>,
    /// Claim version the adjudicator read; a mismatch means a concurrent
    /// write won and the decision must be retaken on fresh data.
    pub version: u32,
}
