//! Policy enrollment. A member holds at most one active policy at a time;
//! enrolling while one is active is a business-rule failure, not an error
//! the store has to untangle later.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use log::info;
use serde::Deserialize;
use uuid::Uuid;

use models::errors::{PortalError, PortalResult};
use models::identifiers::PolicyNumber;
use models::policy::{PlanTier, Policy};
use models::user::{AuthContext, Role};
use storage::PortalStorage;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollPolicyRequest {
    pub member_id: Uuid,
    pub plan: PlanTier,
    pub premium_amount: f64,
    pub deductible: f64,
    pub coverage_limit: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

pub struct EnrollmentService {
    store: Arc<dyn PortalStorage>,
}

impl EnrollmentService {
    pub fn new(store: Arc<dyn PortalStorage>) -> Self {
        EnrollmentService { store }
    }

    pub async fn enroll(
        &self,
        ctx: &AuthContext,
        req: EnrollPolicyRequest,
    ) -> PortalResult<Policy> {
        self.enroll_as_of(ctx, req, Utc::now().date_naive()).await
    }

    /// Enrollment with an explicit "today", so status assignment around the
    /// start/end boundary is testable.
    pub async fn enroll_as_of(
        &self,
        ctx: &AuthContext,
        req: EnrollPolicyRequest,
        today: NaiveDate,
    ) -> PortalResult<Policy> {
        match ctx.role {
            Role::Admin | Role::InsuranceAgent => {}
            Role::Member if ctx.member_id == Some(req.member_id) => {}
            Role::Member => {
                return Err(PortalError::Forbidden(
                    "members may only enroll themselves".to_string(),
                ))
            }
            _ => {
                return Err(PortalError::Forbidden(
                    "role may not enroll policies".to_string(),
                ))
            }
        }
        if req.start_date >= req.end_date {
            return Err(PortalError::Validation(
                "startDate must fall before endDate".to_string(),
            ));
        }
        if req.premium_amount <= 0.0 || req.deductible < 0.0 || req.coverage_limit <= 0.0 {
            return Err(PortalError::Validation(
                "premium, deductible and coverage limit must be valid amounts".to_string(),
            ));
        }
        let member = self
            .store
            .get_member(req.member_id)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("member {}", req.member_id)))?;

        if let Some(existing) = self.store.active_policy_for_member(member.id).await? {
            return Err(PortalError::BusinessRule(format!(
                "member already holds active policy {}",
                existing.policy_number
            )));
        }

        let sequence = (self.store.count_policies().await? + 1) as u32;
        let status = Policy::initial_status(req.start_date, req.end_date, today);
        let now = Utc::now();
        let policy = Policy {
            id: Uuid::new_v4(),
            member_id: member.id,
            policy_number: PolicyNumber::new(req.start_date.year(), sequence),
            plan: req.plan,
            status,
            premium_amount: req.premium_amount,
            deductible: req.deductible,
            coverage_limit: req.coverage_limit,
            start_date: req.start_date,
            end_date: req.end_date,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.store.create_policy(policy.clone()).await?;
        info!(
            "[ENROLL] member {} enrolled in {:?} as {} ({:?})",
            member.id, policy.plan, policy.policy_number, policy.status
        );
        Ok(policy)
    }

    /// Policy lookup for the dashboards. Members read their own policies;
    /// admins, agents and adjudicators read any.
    pub async fn get_policy(&self, ctx: &AuthContext, id: Uuid) -> PortalResult<Policy> {
        let policy = self
            .store
            .get_policy(id)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("policy {}", id)))?;
        let allowed = match ctx.role {
            Role::Admin | Role::InsuranceAgent | Role::Adjudicator => true,
            Role::Member => ctx.member_id == Some(policy.member_id),
            _ => false,
        };
        if !allowed {
            return Err(PortalError::Forbidden(
                "policy belongs to another member".to_string(),
            ));
        }
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::{EnrollPolicyRequest, EnrollmentService};
    use crate::fixtures;
    use chrono::NaiveDate;
    use models::errors::PortalError;
    use models::policy::{PlanTier, PolicyStatus};
    use models::user::Role;

    fn request(member_id: uuid::Uuid) -> EnrollPolicyRequest {
        EnrollPolicyRequest {
            member_id,
            plan: PlanTier::Silver,
            premium_amount: 3_200.0,
            deductible: 30_000.0,
            coverage_limit: 500_000.0,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        }
    }

    #[tokio::test]
    async fn should_enroll_member_with_active_status_inside_term() {
        let store = fixtures::store();
        let user = fixtures::user(Role::Member);
        store.create_user(user.clone()).await.unwrap();
        let member = fixtures::member(user.id, NaiveDate::from_ymd_opt(1990, 5, 1).unwrap());
        store.create_member(member.clone()).await.unwrap();
        let svc = EnrollmentService::new(store);

        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let policy = svc
            .enroll_as_of(&fixtures::member_ctx(member.id), request(member.id), today)
            .await
            .unwrap();

        assert_eq!(policy.status, PolicyStatus::Active);
        assert_eq!(policy.plan, PlanTier::Silver);
        assert!(policy.policy_number.to_string().starts_with("POL-2025-"));
    }

    #[tokio::test]
    async fn should_reject_second_active_enrollment() {
        let store = fixtures::store();
        let user = fixtures::user(Role::Member);
        store.create_user(user.clone()).await.unwrap();
        let member = fixtures::member(user.id, NaiveDate::from_ymd_opt(1990, 5, 1).unwrap());
        store.create_member(member.clone()).await.unwrap();
        store
            .create_policy(fixtures::policy(
                member.id,
                PlanTier::Gold,
                PolicyStatus::Active,
            ))
            .await
            .unwrap();
        let svc = EnrollmentService::new(store);

        let err = svc
            .enroll_as_of(
                &fixtures::admin_ctx(),
                request(member.id),
                NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::BusinessRule(_)));
    }

    #[tokio::test]
    async fn should_allow_enrollment_after_previous_policy_expired() {
        let store = fixtures::store();
        let user = fixtures::user(Role::Member);
        store.create_user(user.clone()).await.unwrap();
        let member = fixtures::member(user.id, NaiveDate::from_ymd_opt(1990, 5, 1).unwrap());
        store.create_member(member.clone()).await.unwrap();
        store
            .create_policy(fixtures::policy(
                member.id,
                PlanTier::Gold,
                PolicyStatus::Expired,
            ))
            .await
            .unwrap();
        let svc = EnrollmentService::new(store);

        let policy = svc
            .enroll_as_of(
                &fixtures::admin_ctx(),
                request(member.id),
                NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(policy.status, PolicyStatus::Active);
    }

    #[tokio::test]
    async fn should_forbid_enrolling_another_member() {
        let store = fixtures::store();
        let user = fixtures::user(Role::Member);
        store.create_user(user.clone()).await.unwrap();
        let member = fixtures::member(user.id, NaiveDate::from_ymd_opt(1990, 5, 1).unwrap());
        store.create_member(member.clone()).await.unwrap();
        let svc = EnrollmentService::new(store);

        let err = svc
            .enroll_as_of(
                &fixtures::member_ctx(uuid::Uuid::new_v4()),
                request(member.id),
                NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Forbidden(_)));
    }

    #[tokio::test]
    async fn should_scope_policy_reads_to_owner_or_staff() {
        let store = fixtures::store();
        let user = fixtures::user(Role::Member);
        store.create_user(user.clone()).await.unwrap();
        let member = fixtures::member(user.id, NaiveDate::from_ymd_opt(1990, 5, 1).unwrap());
        store.create_member(member.clone()).await.unwrap();
        let policy = fixtures::policy(member.id, PlanTier::Gold, PolicyStatus::Active);
        store.create_policy(policy.clone()).await.unwrap();
        let svc = EnrollmentService::new(store);

        let own = svc
            .get_policy(&fixtures::member_ctx(member.id), policy.id)
            .await
            .unwrap();
        assert_eq!(own.id, policy.id);

        let err = svc
            .get_policy(&fixtures::member_ctx(uuid::Uuid::new_v4()), policy.id)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Forbidden(_)));
    }

    #[tokio::test]
    async fn should_reject_inverted_term_dates() {
        let store = fixtures::store();
        let svc = EnrollmentService::new(store);
        let mut req = request(uuid::Uuid::new_v4());
        req.end_date = req.start_date;

        let err = svc
            .enroll_as_of(
                &fixtures::admin_ctx(),
                req,
                NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
    }
}
