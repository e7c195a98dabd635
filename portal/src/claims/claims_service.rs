//! Claim lifecycle — submission, role-scoped reads, pre-review edits, and
//! adjudication through the explicit status transition table. Adjudication
//! writes are compare-and-swap on the claim version so two adjudicators
//! racing on the same claim cannot both win.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use log::{info, warn};
use serde::Deserialize;
use uuid::Uuid;

use models::claim::{AdjudicationDecision, Claim, ClaimStatus, ClaimType};
use models::errors::{PortalError, PortalResult};
use models::user::{AuthContext, Role};
use storage::{ClaimFilter, PortalStorage};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitClaimRequest {
    pub policy_id: Uuid,
    /// Ignored for provider callers; their own profile is used instead.
    pub provider_id: Option<Uuid>,
    pub claim_type: ClaimType,
    pub service_date: NaiveDate,
    pub billed_amount: f64,
    #[serde(default)]
    pub diagnosis_codes: Vec<String>,
    #[serde(default)]
    pub procedure_codes: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClaimRequest {
    pub diagnosis_codes: Option<Vec<String>>,
    pub procedure_codes: Option<Vec<String>>,
    pub notes: Option<String>,
}

pub struct ClaimsService {
    store: Arc<dyn PortalStorage>,
}

impl ClaimsService {
    pub fn new(store: Arc<dyn PortalStorage>) -> Self {
        ClaimsService { store }
    }

    /// Creates a claim in `submitted` status with the billed amount as its
    /// total. The referenced policy must exist and be active.
    pub async fn submit(
        &self,
        ctx: &AuthContext,
        req: SubmitClaimRequest,
    ) -> PortalResult<Claim> {
        if !matches!(ctx.role, Role::Member | Role::Provider | Role::Admin) {
            return Err(PortalError::Forbidden(
                "role may not submit claims".to_string(),
            ));
        }
        if req.billed_amount <= 0.0 {
            return Err(PortalError::Validation(
                "billedAmount must be positive".to_string(),
            ));
        }
        let policy = self
            .store
            .get_policy(req.policy_id)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("policy {}", req.policy_id)))?;
        if !policy.is_active() {
            return Err(PortalError::BusinessRule(format!(
                "policy {} is not active",
                policy.policy_number
            )));
        }

        let provider_id = self.billing_provider(ctx, req.provider_id).await?;

        let now = Utc::now();
        let claim = Claim {
            id: Uuid::new_v4(),
            policy_id: policy.id,
            provider_id,
            status: ClaimStatus::Submitted,
            claim_type: req.claim_type,
            diagnosis_codes: req.diagnosis_codes,
            procedure_codes: req.procedure_codes,
            total_amount: req.billed_amount,
            approved_amount: None,
            patient_responsibility: None,
            service_date: req.service_date,
            notes: req.notes,
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.store.create_claim(claim.clone()).await?;
        info!(
            "[CLAIMS] claim {} submitted on policy {} for {:.2}",
            claim.id, claim.policy_id, claim.total_amount
        );
        Ok(claim)
    }

    /// Provider callers always bill as themselves and must be verified.
    /// Other roles may attach an explicit provider.
    async fn billing_provider(
        &self,
        ctx: &AuthContext,
        requested: Option<Uuid>,
    ) -> PortalResult<Option<Uuid>> {
        let provider_id = if ctx.role == Role::Provider {
            let own = match ctx.provider_id {
                Some(id) => Some(id),
                None => self
                    .store
                    .get_provider_by_user(ctx.user_id)
                    .await?
                    .map(|p| p.id),
            };
            Some(own.ok_or_else(|| {
                PortalError::Forbidden("caller has no provider profile".to_string())
            })?)
        } else {
            requested
        };
        if let Some(id) = provider_id {
            let provider = self
                .store
                .get_provider(id)
                .await?
                .ok_or_else(|| PortalError::NotFound(format!("provider {}", id)))?;
            if !provider.can_bill() {
                return Err(PortalError::BusinessRule(format!(
                    "provider {} is not verified for billing",
                    provider.npi
                )));
            }
        }
        Ok(provider_id)
    }

    pub async fn get(&self, ctx: &AuthContext, id: Uuid) -> PortalResult<Claim> {
        let claim = self
            .store
            .get_claim(id)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("claim {}", id)))?;
        self.authorize_read(ctx, &claim).await?;
        Ok(claim)
    }

    /// Role-scoped listing: members see claims on their own policies,
    /// providers their own billings, admin/adjudicator everything.
    pub async fn list(
        &self,
        ctx: &AuthContext,
        status: Option<ClaimStatus>,
    ) -> PortalResult<Vec<Claim>> {
        let mut filter = ClaimFilter {
            status,
            ..ClaimFilter::default()
        };
        match ctx.role {
            Role::Admin | Role::Adjudicator => {}
            Role::Provider => {
                filter.provider_id = Some(ctx.provider_id.ok_or_else(|| {
                    PortalError::Forbidden("caller has no provider profile".to_string())
                })?);
            }
            Role::Member => {
                let member_id = ctx.member_id.ok_or_else(|| {
                    PortalError::Forbidden("caller has no member profile".to_string())
                })?;
                let policies = self.store.policies_for_member(member_id).await?;
                filter.policy_ids = Some(policies.into_iter().map(|p| p.id).collect());
            }
            _ => {
                return Err(PortalError::Forbidden(
                    "role may not list claims".to_string(),
                ))
            }
        }
        self.store.list_claims(filter).await
    }

    /// Pre-review edit of codes and notes by the owning party or an admin.
    pub async fn update(
        &self,
        ctx: &AuthContext,
        id: Uuid,
        req: UpdateClaimRequest,
    ) -> PortalResult<Claim> {
        let mut claim = self.get(ctx, id).await?;
        if !claim.is_editable() {
            return Err(PortalError::BusinessRule(format!(
                "claim {} is already {:?} and can no longer be edited",
                id, claim.status
            )));
        }
        if let Some(codes) = req.diagnosis_codes {
            claim.diagnosis_codes = codes;
        }
        if let Some(codes) = req.procedure_codes {
            claim.procedure_codes = codes;
        }
        if req.notes.is_some() {
            claim.notes = req.notes;
        }
        claim.updated_at = Utc::now();
        self.store.update_claim(claim.clone()).await?;
        Ok(claim)
    }

    /// Adjudicates a claim: validates the decision, enforces the transition
    /// table, then applies it with a version compare-and-swap.
    pub async fn process(
        &self,
        ctx: &AuthContext,
        id: Uuid,
        decision: AdjudicationDecision,
    ) -> PortalResult<Claim> {
        if !ctx.role.can_adjudicate() {
            return Err(PortalError::Forbidden(
                "only admins and adjudicators may process claims".to_string(),
            ));
        }
        let claim = self
            .store
            .get_claim(id)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("claim {}", id)))?;

        // A stale version means the adjudicator decided on outdated state;
        // report the lost race before judging the transition itself.
        if claim.version != decision.version {
            warn!(
                "[CLAIMS] claim {} adjudication lost a concurrent race (version {})",
                id, decision.version
            );
            return Err(PortalError::Conflict(format!(
                "claim {} was adjudicated concurrently (version {} != {})",
                id, claim.version, decision.version
            )));
        }
        if !claim.status.can_transition_to(decision.status) {
            return Err(PortalError::InvalidTransition(format!(
                "{:?} -> {:?} is not allowed",
                claim.status, decision.status
            )));
        }
        validate_decision(&claim, &decision)?;

        // A decision that does not re-supply an amount keeps what is
        // already on the claim, matching what the validator accepts
        // (marking an approved claim paid without repeating the figure).
        let approved = decision.approved_amount.or(claim.approved_amount);
        let patient_resp = decision
            .patient_responsibility
            .or(claim.patient_responsibility);

        let updated = self
            .store
            .adjudicate_claim(
                id,
                decision.version,
                decision.status,
                approved,
                patient_resp,
                decision.notes,
            )
            .await;
        match &updated {
            Ok(c) => info!(
                "[CLAIMS] claim {} adjudicated {:?} -> {:?} by {} (approved {:?})",
                id, claim.status, c.status, ctx.user_id, c.approved_amount
            ),
            Err(PortalError::Conflict(_)) => warn!(
                "[CLAIMS] claim {} adjudication lost a concurrent race (version {})",
                id, decision.version
            ),
            Err(_) => {}
        }
        updated
    }

    async fn authorize_read(&self, ctx: &AuthContext, claim: &Claim) -> PortalResult<()> {
        match ctx.role {
            Role::Admin | Role::Adjudicator => Ok(()),
            Role::Provider => {
                if ctx.provider_id.is_some() && claim.provider_id == ctx.provider_id {
                    Ok(())
                } else {
                    Err(PortalError::Forbidden(
                        "claim belongs to another provider".to_string(),
                    ))
                }
            }
            Role::Member => {
                let member_id = ctx.member_id.ok_or_else(|| {
                    PortalError::Forbidden("caller has no member profile".to_string())
                })?;
                let policy = self
                    .store
                    .get_policy(claim.policy_id)
                    .await?
                    .ok_or_else(|| PortalError::NotFound(format!("policy {}", claim.policy_id)))?;
                if policy.member_id == member_id {
                    Ok(())
                } else {
                    Err(PortalError::Forbidden(
                        "claim belongs to another member".to_string(),
                    ))
                }
            }
            _ => Err(PortalError::Forbidden(
                "role may not read claims".to_string(),
            )),
        }
    }
}

fn validate_decision(claim: &Claim, decision: &AdjudicationDecision) -> PortalResult<()> {
    if let Some(amount) = decision.approved_amount {
        if amount < 0.0 {
            return Err(PortalError::Validation(
                "approvedAmount must not be negative".to_string(),
            ));
        }
        if amount > claim.total_amount {
            return Err(PortalError::Validation(format!(
                "approvedAmount {:.2} exceeds billed total {:.2}",
                amount, claim.total_amount
            )));
        }
    }
    if let Some(resp) = decision.patient_responsibility {
        if resp < 0.0 {
            return Err(PortalError::Validation(
                "patientResponsibility must not be negative".to_string(),
            ));
        }
    }
    if matches!(decision.status, ClaimStatus::Approved | ClaimStatus::Paid)
        && decision.approved_amount.is_none()
        && claim.approved_amount.is_none()
    {
        return Err(PortalError::Validation(format!(
            "an approved amount is required to mark a claim {:?}",
            decision.status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ClaimsService, SubmitClaimRequest, UpdateClaimRequest};
    use crate::fixtures;
    use chrono::NaiveDate;
    use models::claim::{AdjudicationDecision, ClaimStatus};
    use models::errors::PortalError;
    use models::policy::{PlanTier, PolicyStatus};
    use models::provider::ProviderStatus;
    use models::user::Role;
    use std::sync::Arc;
    use storage::PortalStorage;

    struct World {
        store: Arc<dyn PortalStorage>,
        member: models::Member,
        policy: models::Policy,
        provider: models::Provider,
    }

    async fn world(policy_status: PolicyStatus, provider_status: ProviderStatus) -> World {
        let store = fixtures::store();
        let member_user = fixtures::user(Role::Member);
        store.create_user(member_user.clone()).await.unwrap();
        let member = fixtures::member(
            member_user.id,
            NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
        );
        store.create_member(member.clone()).await.unwrap();
        let policy = fixtures::policy(member.id, PlanTier::Gold, policy_status);
        store.create_policy(policy.clone()).await.unwrap();
        let provider_user = fixtures::user(Role::Provider);
        store.create_user(provider_user.clone()).await.unwrap();
        let provider = fixtures::provider(provider_user.id, provider_status);
        store.create_provider(provider.clone()).await.unwrap();
        World {
            store,
            member,
            policy,
            provider,
        }
    }

    fn submit_req(policy_id: uuid::Uuid) -> SubmitClaimRequest {
        SubmitClaimRequest {
            policy_id,
            provider_id: None,
            claim_type: models::ClaimType::Medical,
            service_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            billed_amount: 12_000.0,
            diagnosis_codes: vec!["J06.9".to_string()],
            procedure_codes: vec![],
            notes: None,
        }
    }

    #[tokio::test]
    async fn should_create_claim_in_submitted_status_with_billed_total() {
        let w = world(PolicyStatus::Active, ProviderStatus::Verified).await;
        let svc = ClaimsService::new(w.store.clone());

        let claim = svc
            .submit(&fixtures::member_ctx(w.member.id), submit_req(w.policy.id))
            .await
            .unwrap();

        assert_eq!(claim.status, ClaimStatus::Submitted);
        assert_eq!(claim.total_amount, 12_000.0);
        assert_eq!(claim.version, 0);
        assert!(claim.approved_amount.is_none());
    }

    #[tokio::test]
    async fn should_infer_provider_from_caller_profile() {
        let w = world(PolicyStatus::Active, ProviderStatus::Verified).await;
        let svc = ClaimsService::new(w.store.clone());

        let mut req = submit_req(w.policy.id);
        req.provider_id = None;
        let claim = svc
            .submit(&fixtures::provider_ctx(w.provider.id), req)
            .await
            .unwrap();

        assert_eq!(claim.provider_id, Some(w.provider.id));
    }

    #[tokio::test]
    async fn should_reject_submission_on_inactive_policy() {
        let w = world(PolicyStatus::Expired, ProviderStatus::Verified).await;
        let svc = ClaimsService::new(w.store.clone());

        let err = svc
            .submit(&fixtures::member_ctx(w.member.id), submit_req(w.policy.id))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::BusinessRule(_)));
    }

    #[tokio::test]
    async fn should_reject_submission_by_unverified_provider() {
        let w = world(PolicyStatus::Active, ProviderStatus::Pending).await;
        let svc = ClaimsService::new(w.store.clone());

        let err = svc
            .submit(&fixtures::provider_ctx(w.provider.id), submit_req(w.policy.id))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::BusinessRule(_)));
    }

    #[tokio::test]
    async fn should_persist_amounts_on_terminal_decision() {
        let w = world(PolicyStatus::Active, ProviderStatus::Verified).await;
        let claim = fixtures::claim(w.policy.id, Some(w.provider.id), ClaimStatus::UnderReview);
        w.store.create_claim(claim.clone()).await.unwrap();
        let svc = ClaimsService::new(w.store.clone());
        let ctx = fixtures::adjudicator_ctx();

        let approved = svc
            .process(
                &ctx,
                claim.id,
                AdjudicationDecision {
                    status: ClaimStatus::Approved,
                    approved_amount: Some(9_500.0),
                    patient_responsibility: Some(2_500.0),
                    notes: Some("partial approval".to_string()),
                    version: 0,
                },
            )
            .await
            .unwrap();
        assert_eq!(approved.approved_amount, Some(9_500.0));
        assert_eq!(approved.version, 1);

        let paid = svc
            .process(
                &ctx,
                claim.id,
                AdjudicationDecision {
                    status: ClaimStatus::Paid,
                    approved_amount: Some(9_500.0),
                    patient_responsibility: Some(2_500.0),
                    notes: None,
                    version: 1,
                },
            )
            .await
            .unwrap();
        assert_eq!(paid.status, ClaimStatus::Paid);
        assert_eq!(paid.approved_amount, Some(9_500.0));
        assert_eq!(paid.patient_responsibility, Some(2_500.0));
    }

    #[tokio::test]
    async fn should_reject_illegal_transition() {
        let w = world(PolicyStatus::Active, ProviderStatus::Verified).await;
        let claim = fixtures::claim(w.policy.id, None, ClaimStatus::Paid);
        w.store.create_claim(claim.clone()).await.unwrap();
        let svc = ClaimsService::new(w.store.clone());

        let err = svc
            .process(
                &fixtures::admin_ctx(),
                claim.id,
                AdjudicationDecision {
                    status: ClaimStatus::Submitted,
                    approved_amount: None,
                    patient_responsibility: None,
                    notes: None,
                    version: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn should_reject_approval_above_billed_total() {
        let w = world(PolicyStatus::Active, ProviderStatus::Verified).await;
        let claim = fixtures::claim(w.policy.id, None, ClaimStatus::UnderReview);
        w.store.create_claim(claim.clone()).await.unwrap();
        let svc = ClaimsService::new(w.store.clone());

        let err = svc
            .process(
                &fixtures::admin_ctx(),
                claim.id,
                AdjudicationDecision {
                    status: ClaimStatus::Approved,
                    approved_amount: Some(claim.total_amount + 1.0),
                    patient_responsibility: None,
                    notes: None,
                    version: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
    }

    #[tokio::test]
    async fn should_conflict_on_stale_version() {
        let w = world(PolicyStatus::Active, ProviderStatus::Verified).await;
        let claim = fixtures::claim(w.policy.id, None, ClaimStatus::UnderReview);
        w.store.create_claim(claim.clone()).await.unwrap();
        let svc = ClaimsService::new(w.store.clone());
        let ctx = fixtures::adjudicator_ctx();

        svc.process(
            &ctx,
            claim.id,
            AdjudicationDecision {
                status: ClaimStatus::Approved,
                approved_amount: Some(1_000.0),
                patient_responsibility: None,
                notes: None,
                version: 0,
            },
        )
        .await
        .unwrap();

        // Second adjudicator read version 0 before the first one wrote.
        let err = svc
            .process(
                &ctx,
                claim.id,
                AdjudicationDecision {
                    status: ClaimStatus::Rejected,
                    approved_amount: None,
                    patient_responsibility: None,
                    notes: None,
                    version: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Conflict(_)));
    }

    #[tokio::test]
    async fn should_keep_approved_amount_when_marking_paid() {
        let w = world(PolicyStatus::Active, ProviderStatus::Verified).await;
        let claim = fixtures::claim(w.policy.id, None, ClaimStatus::UnderReview);
        w.store.create_claim(claim.clone()).await.unwrap();
        let svc = ClaimsService::new(w.store.clone());
        let ctx = fixtures::adjudicator_ctx();

        svc.process(
            &ctx,
            claim.id,
            AdjudicationDecision {
                status: ClaimStatus::Approved,
                approved_amount: Some(9_500.0),
                patient_responsibility: Some(500.0),
                notes: None,
                version: 0,
            },
        )
        .await
        .unwrap();

        // Marking a claim paid does not require repeating the figures.
        let paid = svc
            .process(
                &ctx,
                claim.id,
                AdjudicationDecision {
                    status: ClaimStatus::Paid,
                    approved_amount: None,
                    patient_responsibility: None,
                    notes: None,
                    version: 1,
                },
            )
            .await
            .unwrap();
        assert_eq!(paid.status, ClaimStatus::Paid);
        assert_eq!(paid.approved_amount, Some(9_500.0));
        assert_eq!(paid.patient_responsibility, Some(500.0));
    }

    #[tokio::test]
    async fn should_forbid_adjudication_by_non_adjudicator() {
        let w = world(PolicyStatus::Active, ProviderStatus::Verified).await;
        let claim = fixtures::claim(w.policy.id, None, ClaimStatus::UnderReview);
        w.store.create_claim(claim.clone()).await.unwrap();
        let svc = ClaimsService::new(w.store.clone());

        let err = svc
            .process(
                &fixtures::member_ctx(w.member.id),
                claim.id,
                AdjudicationDecision {
                    status: ClaimStatus::Approved,
                    approved_amount: Some(1.0),
                    patient_responsibility: None,
                    notes: None,
                    version: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Forbidden(_)));
    }

    #[tokio::test]
    async fn should_scope_member_listing_to_own_policies() {
        let w = world(PolicyStatus::Active, ProviderStatus::Verified).await;
        let own = fixtures::claim(w.policy.id, None, ClaimStatus::Submitted);
        w.store.create_claim(own.clone()).await.unwrap();

        // Another member's policy and claim.
        let other_user = fixtures::user(Role::Member);
        w.store.create_user(other_user.clone()).await.unwrap();
        let other_member = fixtures::member(
            other_user.id,
            NaiveDate::from_ymd_opt(1985, 1, 1).unwrap(),
        );
        w.store.create_member(other_member.clone()).await.unwrap();
        let other_policy =
            fixtures::policy(other_member.id, PlanTier::Silver, PolicyStatus::Active);
        w.store.create_policy(other_policy.clone()).await.unwrap();
        w.store
            .create_claim(fixtures::claim(other_policy.id, None, ClaimStatus::Submitted))
            .await
            .unwrap();

        let svc = ClaimsService::new(w.store.clone());
        let listed = svc
            .list(&fixtures::member_ctx(w.member.id), None)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, own.id);
    }

    #[tokio::test]
    async fn should_block_edits_once_review_started() {
        let w = world(PolicyStatus::Active, ProviderStatus::Verified).await;
        let claim = fixtures::claim(w.policy.id, None, ClaimStatus::UnderReview);
        w.store.create_claim(claim.clone()).await.unwrap();
        let svc = ClaimsService::new(w.store.clone());

        let err = svc
            .update(
                &fixtures::admin_ctx(),
                claim.id,
                UpdateClaimRequest {
                    diagnosis_codes: None,
                    procedure_codes: None,
                    notes: Some("late note".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::BusinessRule(_)));
    }
}
