use serde::{Deserialize, Serialize};

use crate::claim::{ClaimStatus, ClaimType};

/// Top-level response for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    /// Live (non-deleted) user count.
    pub total_users: u64,
    pub total_members: u64,
    pub total_providers: u64,
    /// Policies currently in `active` status.
    pub active_policies: u64,
    /// Claim counts per workflow status.
    pub claims_by_status: Vec<StatusCount>,
    /// Sum of billed amounts across all claims.
    pub total_billed: f64,
    /// Sum of approved amounts across decided claims.
    pub total_approved: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: ClaimStatus,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeCount {
    pub claim_type: ClaimType,
    pub count: u64,
}

/// One month of claim volume for the analytics trend chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTrendPoint {
    /// `YYYY-MM`.
    pub month: String,
    pub claim_count: u64,
    pub billed_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsAnalytics {
    pub monthly_trend: Vec<MonthlyTrendPoint>,
    /// approved + paid over all decided claims, 0.0 when nothing decided.
    pub approval_rate: f64,
    pub by_type: Vec<TypeCount>,
}

/// Request-time rollup for a provider's own dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStats {
    /// Claims awaiting a decision (submitted/received/under review/appealed).
    pub pending_claims: u64,
    /// Billed value of those pending claims.
    pub pending_value: f64,
    /// Approved amounts on claims already paid out.
    pub revenue_to_date: f64,
    pub approval_rate: f64,
}
