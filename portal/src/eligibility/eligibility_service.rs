//! Eligibility verification — resolves a member reference plus date of
//! birth to their active coverage before a provider renders billable
//! service. Every check re-queries the store; results are never cached.

use std::sync::Arc;

use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};

use models::errors::{PortalError, PortalResult};
use models::identifiers::MemberRef;
use models::member::Member;
use storage::PortalStorage;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEligibilityRequest {
    /// Raw member UUID or `MEM-YYYY-XXXXXX` card number.
    pub member_id: String,
    /// `YYYY-MM-DD`.
    pub date_of_birth: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityReport {
    pub eligible: bool,
    pub coverage_status: String,
    pub member_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copay: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deductible: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_number: Option<String>,
}

pub struct EligibilityService {
    store: Arc<dyn PortalStorage>,
}

impl EligibilityService {
    pub fn new(store: Arc<dyn PortalStorage>) -> Self {
        EligibilityService { store }
    }

    pub async fn verify(&self, req: &VerifyEligibilityRequest) -> PortalResult<EligibilityReport> {
        let member_ref: MemberRef = req.member_id.parse()?;
        let dob = NaiveDate::parse_from_str(&req.date_of_birth, "%Y-%m-%d").map_err(|_| {
            PortalError::Validation(format!(
                "dateOfBirth must be YYYY-MM-DD, got '{}'",
                req.date_of_birth
            ))
        })?;

        let member = self.resolve_member(&member_ref, dob).await?.ok_or_else(|| {
            PortalError::NotFound(format!("no member matching {}", member_ref))
        })?;

        let report = match self.store.active_policy_for_member(member.id).await? {
            Some(policy) => {
                let plan = policy.plan.info();
                EligibilityReport {
                    eligible: true,
                    coverage_status: "Active".to_string(),
                    member_number: member.member_number(),
                    plan_name: Some(plan.name.to_string()),
                    copay: Some(plan.copay.to_string()),
                    deductible: Some(policy.deductible),
                    policy_number: Some(policy.policy_number.to_string()),
                }
            }
            None => EligibilityReport {
                eligible: false,
                coverage_status: "Inactive".to_string(),
                member_number: member.member_number(),
                plan_name: None,
                copay: None,
                deductible: None,
                policy_number: None,
            },
        };
        info!(
            "[ELIG] member {} checked: eligible={}",
            member.id, report.eligible
        );
        Ok(report)
    }

    /// Exact id + exact DOB, or 6-hex prefix + exact DOB.
    async fn resolve_member(
        &self,
        member_ref: &MemberRef,
        dob: NaiveDate,
    ) -> PortalResult<Option<Member>> {
        match member_ref {
            MemberRef::Id(id) => Ok(self
                .store
                .get_member(*id)
                .await?
                .filter(|m| m.date_of_birth == dob)),
            MemberRef::Prefix(prefix) => self.store.find_member_by_prefix(prefix, dob).await,
        }
    }
}
