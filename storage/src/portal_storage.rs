use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use models::claim::{Claim, ClaimStatus};
use models::dashboard::{MonthlyTrendPoint, ProviderStats, StatusCount, TypeCount};
use models::errors::PortalResult;
use models::member::Member;
use models::policy::Policy;
use models::provider::Provider;
use models::user::{AuthContext, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// Postgres connection string; required for `StorageKind::Postgres`.
    pub connection_string: Option<String>,
    /// Optional redis URL for the best-effort session cache.
    pub redis_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            kind: StorageKind::Memory,
            connection_string: None,
            redis_url: None,
        }
    }
}

/// An issued bearer token resolved to its caller. Token issuance lives
/// outside the portal; the store only resolves what it was handed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub context: AuthContext,
    pub created_at: DateTime<Utc>,
}

/// Filter for claim listings. All fields are conjunctive; `None` means
/// "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimFilter {
    /// Restrict to claims on these policies (member scoping).
    pub policy_ids: Option<Vec<Uuid>>,
    pub provider_id: Option<Uuid>,
    pub status: Option<ClaimStatus>,
}

/// The relational store behind the portal. One implementation per backend;
/// services only ever see `Arc<dyn PortalStorage>`.
#[async_trait]
pub trait PortalStorage: Send + Sync {
    async fn connect(&self) -> PortalResult<()>;
    async fn close(&self) -> PortalResult<()>;

    // --- users ---
    async fn create_user(&self, user: User) -> PortalResult<()>;
    async fn get_user(&self, id: Uuid) -> PortalResult<Option<User>>;

    // --- members ---
    async fn create_member(&self, member: Member) -> PortalResult<()>;
    async fn get_member(&self, id: Uuid) -> PortalResult<Option<Member>>;
    /// Resolves a member by the first six hex characters of their UUID
    /// (lowercase) and an exact date-of-birth match.
    async fn find_member_by_prefix(
        &self,
        hex_prefix: &str,
        date_of_birth: NaiveDate,
    ) -> PortalResult<Option<Member>>;

    // --- providers ---
    async fn create_provider(&self, provider: Provider) -> PortalResult<()>;
    async fn get_provider(&self, id: Uuid) -> PortalResult<Option<Provider>>;
    async fn get_provider_by_user(&self, user_id: Uuid) -> PortalResult<Option<Provider>>;

    // --- policies ---
    async fn create_policy(&self, policy: Policy) -> PortalResult<()>;
    async fn get_policy(&self, id: Uuid) -> PortalResult<Option<Policy>>;
    async fn policies_for_member(&self, member_id: Uuid) -> PortalResult<Vec<Policy>>;
    async fn active_policy_for_member(&self, member_id: Uuid) -> PortalResult<Option<Policy>>;
    async fn count_policies(&self) -> PortalResult<u64>;

    // --- claims ---
    async fn create_claim(&self, claim: Claim) -> PortalResult<()>;
    async fn get_claim(&self, id: Uuid) -> PortalResult<Option<Claim>>;
    async fn list_claims(&self, filter: ClaimFilter) -> PortalResult<Vec<Claim>>;
    /// Pre-review edit of codes and notes. Does not touch workflow state.
    async fn update_claim(&self, claim: Claim) -> PortalResult<()>;
    /// Compare-and-swap adjudication write: applies the new status and
    /// amounts only if the stored row still carries `expected_version`.
    /// Returns the updated claim, or `PortalError::Conflict` on a lost race.
    async fn adjudicate_claim(
        &self,
        id: Uuid,
        expected_version: u32,
        status: ClaimStatus,
        approved_amount: Option<f64>,
        patient_responsibility: Option<f64>,
        notes: Option<String>,
    ) -> PortalResult<Claim>;

    // --- sessions ---
    async fn put_session(&self, session: Session) -> PortalResult<()>;
    async fn get_session(&self, token: &str) -> PortalResult<Option<Session>>;

    // --- aggregates (request-time COUNT/SUM, no precomputation) ---
    async fn count_users(&self) -> PortalResult<u64>;
    async fn count_members(&self) -> PortalResult<u64>;
    async fn count_providers(&self) -> PortalResult<u64>;
    async fn count_active_policies(&self) -> PortalResult<u64>;
    async fn claim_status_counts(&self) -> PortalResult<Vec<StatusCount>>;
    async fn claim_type_counts(&self) -> PortalResult<Vec<TypeCount>>;
    /// `(total_billed, total_approved)` over all live claims.
    async fn claim_amount_totals(&self) -> PortalResult<(f64, f64)>;
    async fn monthly_claim_trend(&self) -> PortalResult<Vec<MonthlyTrendPoint>>;
    async fn provider_claim_stats(&self, provider_id: Uuid) -> PortalResult<ProviderStats>;
}
