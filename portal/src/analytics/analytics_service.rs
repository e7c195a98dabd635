//! Request-time aggregates for the admin dashboard, claims analytics and the
//! provider dashboard. Nothing here is precomputed or cached; every call
//! rolls the figures up from the store.

use std::sync::Arc;

use log::info;

use models::claim::ClaimStatus;
use models::dashboard::{AdminDashboard, ClaimsAnalytics, ProviderStats};
use models::errors::{PortalError, PortalResult};
use models::user::{AuthContext, Role};
use storage::PortalStorage;

pub struct AnalyticsService {
    store: Arc<dyn PortalStorage>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn PortalStorage>) -> Self {
        AnalyticsService { store }
    }

    pub async fn admin_dashboard(&self, ctx: &AuthContext) -> PortalResult<AdminDashboard> {
        require_admin(ctx)?;
        let (total_billed, total_approved) = self.store.claim_amount_totals().await?;
        let dashboard = AdminDashboard {
            total_users: self.store.count_users().await?,
            total_members: self.store.count_members().await?,
            total_providers: self.store.count_providers().await?,
            active_policies: self.store.count_active_policies().await?,
            claims_by_status: self.store.claim_status_counts().await?,
            total_billed,
            total_approved,
        };
        info!(
            "[STATS] dashboard rolled up: {} users, {} active policies",
            dashboard.total_users, dashboard.active_policies
        );
        Ok(dashboard)
    }

    pub async fn claims_analytics(&self, ctx: &AuthContext) -> PortalResult<ClaimsAnalytics> {
        require_admin(ctx)?;
        let by_status = self.store.claim_status_counts().await?;
        Ok(ClaimsAnalytics {
            monthly_trend: self.store.monthly_claim_trend().await?,
            approval_rate: approval_rate(&by_status),
            by_type: self.store.claim_type_counts().await?,
        })
    }

    /// Stats for the calling provider's own dashboard.
    pub async fn provider_stats(&self, ctx: &AuthContext) -> PortalResult<ProviderStats> {
        let provider_id = match ctx.role {
            Role::Provider => ctx.provider_id.ok_or_else(|| {
                PortalError::Forbidden("caller has no provider profile".to_string())
            })?,
            _ => {
                return Err(PortalError::Forbidden(
                    "provider stats are scoped to provider callers".to_string(),
                ))
            }
        };
        self.store.provider_claim_stats(provider_id).await
    }
}

fn require_admin(ctx: &AuthContext) -> PortalResult<()> {
    if ctx.role == Role::Admin {
        Ok(())
    } else {
        Err(PortalError::Forbidden(
            "admin role required".to_string(),
        ))
    }
}

/// Decided = approved, paid or rejected; the rate is the decided share that
/// went the provider's way. Zero when nothing has been decided yet.
fn approval_rate(by_status: &[models::dashboard::StatusCount]) -> f64 {
    let mut favorable = 0u64;
    let mut decided = 0u64;
    for entry in by_status {
        match entry.status {
            ClaimStatus::Approved | ClaimStatus::Paid => {
                favorable += entry.count;
                decided += entry.count;
            }
            ClaimStatus::Rejected => decided += entry.count,
            _ => {}
        }
    }
    if decided == 0 {
        0.0
    } else {
        favorable as f64 / decided as f64
    }
}
